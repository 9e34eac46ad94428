//! Synchronization event over a scheduler wait list.
//!
//! The event holds a boolean state. Waiters block on the embedded wait list
//! while the state is clear; [`set`](SyncEvent::set) flips the state and
//! wakes **all** waiters (broadcast). Woken tasks re-check the state and go
//! back to sleep if another task cleared it first, the same re-sleep pattern
//! the scheduler's wake semantics are built for.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::scheduler;
use crate::sync::waitlist::WaitList;

pub struct SyncEvent {
    state: AtomicBool,
    wait_list: WaitList,
}

impl SyncEvent {
    pub const fn new(initial_state: bool) -> Self {
        Self {
            state: AtomicBool::new(initial_state),
            wait_list: WaitList::new(),
        }
    }

    /// Returns whether the event is currently set.
    pub fn state(&self) -> bool {
        self.state.load(Ordering::Acquire)
    }

    /// Sets the event and wakes every waiter.
    pub fn set(&self) {
        self.state.store(true, Ordering::Release);
        scheduler::wake_tasks(&self.wait_list);
    }

    /// Clears the event; future waiters will block.
    pub fn clear(&self) {
        self.state.store(false, Ordering::Release);
    }

    /// Wakes every waiter without setting the event.
    pub fn pulse(&self) {
        scheduler::wake_tasks(&self.wait_list);
    }

    /// Blocks the calling task until the event is set.
    ///
    /// The state check and the enqueue happen under the scheduler lock, so
    /// a `set` that preempts this call either is observed by the check or
    /// finds the task already on the wait list. Checking outside the lock
    /// would lose that wakeup and block forever.
    pub fn wait(&self) {
        loop {
            let blocked = scheduler::block_task_if(&self.wait_list, 0, || !self.state());
            if blocked.is_none() {
                return;
            }
            // Woken; another task may have cleared the state first, so go
            // around and re-check.
        }
    }

    /// Blocks the calling task until the event is set or `micros`
    /// microseconds elapse without a signal.
    ///
    /// Returns `true` when the event was observed set, `false` on timeout.
    /// Each signal that arrives without the state being set restarts the
    /// timeout window. The check-then-block sequence is atomic against
    /// signallers, as in [`wait`](Self::wait).
    pub fn wait_with_timeout(&self, micros: u32) -> bool {
        loop {
            match scheduler::block_task_if(&self.wait_list, micros, || !self.state()) {
                None => return true,
                Some(true) => continue,
                Some(false) => return false,
            }
        }
    }
}
