//! Monotonic tick source and periodic-handler hook.
//!
//! Two counters drive the scheduler:
//!
//! - `clock_ticks()` advances at [`CLOCK_HZ`] and is the time base for sleep
//!   and block deadlines (`wake_ticks`),
//! - `ticks()` advances at [`TICKS_HZ`] and paces the preemption slice.
//!
//! Both reads go through a replaceable [`ClockCallbacks`] backend. The
//! default backend is a soft counter pair advanced by the platform timer ISR
//! calling [`tick`] once per [`TICKS_HZ`] period; a port with a free-running
//! hardware counter installs callbacks reading it instead. Hosted tests
//! drive the soft counters directly.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::fatal;
use crate::sync::spinlock::SpinLock;

/// Rate of the fine counter behind [`clock_ticks`], in ticks per second.
pub const CLOCK_HZ: u32 = 1_000_000;

/// Rate of the coarse counter behind [`ticks`], in ticks per second.
pub const TICKS_HZ: u32 = 100;

/// Fine clock ticks per microsecond, used for deadline conversion.
pub const TICKS_PER_MICRO: u32 = CLOCK_HZ / 1_000_000;

/// Fine clock ticks elapsed per coarse tick.
const CLOCK_TICKS_PER_TICK: u32 = CLOCK_HZ / TICKS_HZ;

/// Capacity of the periodic-handler table.
const MAX_PERIODIC_HANDLERS: usize = 4;

static SOFT_CLOCK_TICKS: AtomicU32 = AtomicU32::new(0);
static SOFT_TICKS: AtomicU32 = AtomicU32::new(0);

/// Handler invoked from timer-interrupt context on every coarse tick.
pub type PeriodicHandler = fn();

static PERIODIC_HANDLERS: SpinLock<[Option<PeriodicHandler>; MAX_PERIODIC_HANDLERS]> =
    SpinLock::new([None; MAX_PERIODIC_HANDLERS]);

/// Replaceable tick-source backend.
#[derive(Clone, Copy)]
pub struct ClockCallbacks {
    /// Reads the fine monotonic counter ([`CLOCK_HZ`] rate).
    pub clock_ticks: fn() -> u32,
    /// Reads the coarse monotonic counter ([`TICKS_HZ`] rate).
    pub ticks: fn() -> u32,
}

fn default_clock_ticks() -> u32 {
    SOFT_CLOCK_TICKS.load(Ordering::Acquire)
}

fn default_ticks() -> u32 {
    SOFT_TICKS.load(Ordering::Acquire)
}

impl ClockCallbacks {
    const fn default_callbacks() -> Self {
        Self {
            clock_ticks: default_clock_ticks,
            ticks: default_ticks,
        }
    }
}

static CLOCK_CALLBACKS: SpinLock<ClockCallbacks> =
    SpinLock::new(ClockCallbacks::default_callbacks());

/// Returns the fine monotonic tick count.
pub fn clock_ticks() -> u32 {
    (CLOCK_CALLBACKS.lock().clock_ticks)()
}

/// Returns the coarse monotonic tick count.
pub fn ticks() -> u32 {
    (CLOCK_CALLBACKS.lock().ticks)()
}

/// Replaces the tick-source backend (hardware counters, mock clocks).
pub fn set_clock_callbacks(callbacks: ClockCallbacks) {
    *CLOCK_CALLBACKS.lock() = callbacks;
}

/// Restores the default soft-counter backend.
pub fn reset_clock_callbacks_to_default() {
    *CLOCK_CALLBACKS.lock() = ClockCallbacks::default_callbacks();
}

/// Registers a handler to run on every coarse tick, in timer-ISR context.
///
/// The table is fixed-size; registering beyond its capacity is fatal.
pub fn register_periodic_handler(handler: PeriodicHandler) {
    let mut handlers = PERIODIC_HANDLERS.lock();
    for slot in handlers.iter_mut() {
        if slot.is_none() {
            *slot = Some(handler);
            return;
        }
    }
    drop(handlers);

    fatal!("clock", "periodic handler table exhausted");
}

/// Advances the soft clock by one coarse tick and runs periodic handlers.
///
/// The platform timer ISR calls this once per [`TICKS_HZ`] period.
pub fn tick() {
    SOFT_CLOCK_TICKS.fetch_add(CLOCK_TICKS_PER_TICK, Ordering::AcqRel);
    SOFT_TICKS.fetch_add(1, Ordering::AcqRel);

    // Copy the table out so handlers can register further handlers.
    let handlers = *PERIODIC_HANDLERS.lock();
    for handler in handlers.into_iter().flatten() {
        handler();
    }
}

/// Advances only the fine soft counter, for platforms (and tests) that have
/// sub-tick timing resolution.
pub fn advance_clock_ticks(clock_ticks: u32) {
    SOFT_CLOCK_TICKS.fetch_add(clock_ticks, Ordering::AcqRel);
}
