//! Interrupt-enable state and critical sections.
//!
//! On a bare-metal x86-64 target these map to `cli`/`sti`/RFLAGS.IF. On any
//! other target (notably the hosted integration-test build) the
//! interrupt-enable flag is modeled as process state with identical
//! semantics, so locking discipline and interrupt-state restoration can be
//! exercised without privileged instructions.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
mod imp {
    use core::arch::asm;

    /// Enable interrupts globally.
    pub fn enable() {
        // SAFETY:
        // - `sti` is a privileged instruction and valid in ring 0.
        unsafe {
            asm!("sti", options(nomem, nostack, preserves_flags));
        }
    }

    /// Disable interrupts globally.
    pub fn disable() {
        // SAFETY:
        // - `cli` is a privileged instruction and valid in ring 0.
        unsafe {
            asm!("cli", options(nomem, nostack, preserves_flags));
        }
    }

    /// Returns whether interrupts are currently enabled (IF flag set).
    #[inline]
    pub fn are_enabled() -> bool {
        let rflags: u64;
        // SAFETY:
        // - Reading RFLAGS via pushfq/pop does not modify flags.
        // - `rflags` is a plain register output.
        unsafe {
            asm!(
                "pushfq",
                "pop {}",
                out(reg) rflags,
                options(nomem, preserves_flags)
            );
        }
        (rflags & (1 << 9)) != 0
    }
}

#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
mod imp {
    use core::sync::atomic::{AtomicBool, Ordering};

    /// Modeled interrupt-enable flag. Starts enabled, matching the state the
    /// scheduler is normally brought up in.
    static INTERRUPTS_ENABLED: AtomicBool = AtomicBool::new(true);

    /// Enable interrupts globally.
    pub fn enable() {
        INTERRUPTS_ENABLED.store(true, Ordering::Release);
    }

    /// Disable interrupts globally.
    pub fn disable() {
        INTERRUPTS_ENABLED.store(false, Ordering::Release);
    }

    /// Returns whether interrupts are currently enabled.
    #[inline]
    pub fn are_enabled() -> bool {
        INTERRUPTS_ENABLED.load(Ordering::Acquire)
    }
}

pub use imp::{are_enabled, disable, enable};

/// Nesting depth of critical sections entered via [`enter_critical`].
static CRITICAL_DEPTH: AtomicU32 = AtomicU32::new(0);

/// Interrupt-enable state captured when the outermost critical section was
/// entered; restored by the matching [`leave_critical`].
static SAVED_ENABLE_STATE: AtomicBool = AtomicBool::new(false);

/// Enters a critical section, masking interrupts.
///
/// `level` names the highest interrupt level to mask; this port only
/// distinguishes IRQ level, so any value masks all maskable interrupts.
/// Critical sections nest; only the outermost entry records the prior
/// interrupt-enable state.
pub fn enter_critical(level: u8) {
    debug_assert!(level >= 1, "critical level must mask at least IRQ level");

    let was_enabled = are_enabled();
    disable();

    if CRITICAL_DEPTH.fetch_add(1, Ordering::AcqRel) == 0 {
        SAVED_ENABLE_STATE.store(was_enabled, Ordering::Release);
    }
}

/// Leaves a critical section entered via [`enter_critical`].
///
/// The outermost leave restores the interrupt-enable state captured on
/// entry. Leaving without a matching enter is a programming error.
pub fn leave_critical() {
    let depth = CRITICAL_DEPTH.fetch_sub(1, Ordering::AcqRel);
    debug_assert!(depth > 0, "leave_critical without matching enter_critical");

    if depth == 1 && SAVED_ENABLE_STATE.load(Ordering::Acquire) {
        enable();
    }
}
