//! Counting semaphore over the synchronization event.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::sync::event::SyncEvent;

pub struct Semaphore {
    count: AtomicU32,
    event: SyncEvent,
}

impl Semaphore {
    pub const fn new(initial: u32) -> Self {
        Self {
            count: AtomicU32::new(initial),
            event: SyncEvent::new(initial > 0),
        }
    }

    /// Returns the current counter value.
    pub fn value(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Takes one unit without blocking. Returns `false` when the counter is
    /// already zero.
    pub fn try_down(&self) -> bool {
        match self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1))
        {
            Ok(previous) => {
                if previous == 1 {
                    self.event.clear();
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Takes one unit, blocking while the counter is zero.
    pub fn down(&self) {
        loop {
            if self.try_down() {
                return;
            }
            self.event.wait();
        }
    }

    /// Takes one unit, giving up after `micros` microseconds without one
    /// becoming available. Returns `true` when a unit was taken.
    pub fn down_with_timeout(&self, micros: u32) -> bool {
        loop {
            if self.try_down() {
                return true;
            }
            if !self.event.wait_with_timeout(micros) {
                return false;
            }
        }
    }

    /// Returns one unit and wakes waiters.
    pub fn up(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
        self.event.set();
    }
}
