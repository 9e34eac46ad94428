//! Selection, reaping, and compaction integration tests.
//!
//! These tests drive the preemptive entry point with fabricated register
//! frames, the same way the IRQ stub does on hardware.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

use corten_kernel::arch::registers::TaskRegisters;
use corten_kernel::clock;
use corten_kernel::scheduler::{self as sched, Task, TaskState};

fn sched_guard() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

extern "C" fn noop_entry(_ctx: *mut core::ffi::c_void) {}

fn spawn(name: &str) -> sched::TaskId {
    sched::add_task(Task::with_entry(name, noop_entry, core::ptr::null_mut()))
}

#[test]
fn test_round_robin_selection_order() {
    let _guard = sched_guard();
    sched::init();

    let a = spawn("worker-a");
    let b = spawn("worker-b");
    let c = spawn("worker-c");

    let mut frame = TaskRegisters::default();

    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(sched::current_task(), a, "first switch should select task A");

    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(sched::current_task(), b, "second switch should select task B");

    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(sched::current_task(), c, "third switch should select task C");

    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(
        sched::current_task(),
        0,
        "fourth switch should wrap around to main"
    );
}

#[test]
fn test_sleeping_task_resumes_after_deadline() {
    let _guard = sched_guard();
    sched::init();

    let b = spawn("worker-b");

    // Main goes to sleep; selection immediately moves to B.
    sched::us_sleep(1_000);
    assert_eq!(
        sched::current_task(),
        b,
        "sleeping main must hand the CPU to the ready task"
    );
    assert_eq!(
        sched::task_state(0),
        Some(TaskState::Sleeping),
        "main must be parked as Sleeping"
    );

    // Before the deadline the sleeper is not selectable.
    let mut frame = TaskRegisters::default();
    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(
        sched::current_task(),
        b,
        "selection must skip a sleeper whose deadline is in the future"
    );

    clock::advance_clock_ticks(1_000);
    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(
        sched::current_task(),
        0,
        "an expired sleeper must be selected again"
    );
    assert_eq!(
        sched::task_state(0),
        Some(TaskState::Ready),
        "selection flips an expired sleeper back to Ready"
    );
    assert_ne!(
        sched::task_wake_ticks(0),
        Some(0),
        "sleep expiry must not clear wake ticks; only block timeouts do"
    );
}

#[test]
fn test_partially_initialized_task_is_skipped() {
    let _guard = sched_guard();
    sched::init();

    // No entry callable set: the task's program counter still points at the
    // trampoline, so selection must treat it as partially initialized.
    let bare = sched::add_task(Task::new("not-ready-yet"));
    let b = spawn("worker-b");

    let mut frame = TaskRegisters::default();
    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(
        sched::current_task(),
        b,
        "selection must skip a task without an entry point"
    );

    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(
        sched::current_task(),
        0,
        "the partially initialized task must stay unscheduled"
    );
    assert_eq!(
        sched::task_state(bare),
        Some(TaskState::Ready),
        "skipping must not disturb the task's state"
    );
}

static REAPED: AtomicUsize = AtomicUsize::new(0);

fn count_reaped(_task: &Task) {
    REAPED.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn test_terminated_task_is_reaped_once_with_handler() {
    let _guard = sched_guard();
    sched::init();
    REAPED.store(0, Ordering::SeqCst);

    sched::register_task_termination_handler(count_reaped);
    let a = spawn("worker-a");

    let mut frame = TaskRegisters::default();

    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(sched::current_task(), a);
    sched::mark_current_terminated();

    // The switch away happens first; A is still current during that pass and
    // must not be reaped from under its own stack.
    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(sched::current_task(), 0);
    assert!(
        sched::is_valid_task(a),
        "a terminated task that was current during selection is reaped later"
    );
    assert_eq!(REAPED.load(Ordering::SeqCst), 0);

    // The next pass reaps it: handler fires once, slot is vacated, and the
    // emptied half of the table is compacted away.
    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(REAPED.load(Ordering::SeqCst), 1, "handler must fire exactly once");
    assert!(!sched::is_valid_task(a), "reaped slot must be vacated");
    assert_eq!(
        sched::task_count(),
        1,
        "compaction must lower the high-water mark"
    );

    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(
        REAPED.load(Ordering::SeqCst),
        1,
        "later passes must not reap again"
    );
}

#[test]
fn test_compaction_keeps_current_and_survivors() {
    let _guard = sched_guard();
    sched::init();

    let a = spawn("worker-a");
    let b = spawn("worker-b");
    let c = spawn("worker-c");

    let mut frame = TaskRegisters::default();

    // Terminate A and B, switching through them.
    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(sched::current_task(), a);
    sched::mark_current_terminated();

    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(sched::current_task(), b);
    sched::mark_current_terminated();

    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(sched::current_task(), c, "selection must skip the dead tasks");

    // By now A is reaped and B terminated+non-current: the next pass removes
    // B, sees half the prefix empty, and compacts. C must keep its identity
    // through the shift, and current must follow it.
    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(sched::current_task(), 0, "round robin continues at main");
    assert_eq!(sched::task_count(), 2, "only main and C survive compaction");
    assert_eq!(
        sched::find_task("worker-c"),
        Some(1),
        "compaction must shift the survivor to the front"
    );
    assert_eq!(sched::task_name(1).as_deref(), Some("worker-c"));
    assert!(
        !sched::is_valid_task(2) && !sched::is_valid_task(3),
        "slots above the new high-water mark must be vacant"
    );

    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(
        sched::current_task(),
        1,
        "the compacted table must still round-robin to C"
    );
}

static SWITCHED_TO: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn record_switch(task: &Task) {
    SWITCHED_TO.lock().unwrap().push(task.name().to_string());
}

#[test]
fn test_switch_handler_sees_each_incoming_task() {
    let _guard = sched_guard();
    sched::init();
    SWITCHED_TO.lock().unwrap().clear();

    sched::register_task_switch_handler(record_switch);
    spawn("worker-a");
    spawn("worker-b");

    let mut frame = TaskRegisters::default();
    sched::context_switch_on_irq_return(&mut frame);
    sched::context_switch_on_irq_return(&mut frame);
    sched::context_switch_on_irq_return(&mut frame);

    let seen = SWITCHED_TO.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec!["worker-a", "worker-b", "main"],
        "switch handler must be invoked with every incoming task"
    );
}

#[test]
#[should_panic(expected = "already registered")]
fn test_double_switch_handler_registration_is_fatal() {
    let _guard = sched_guard();
    sched::init();

    sched::register_task_switch_handler(record_switch);
    sched::register_task_switch_handler(record_switch);
}

#[test]
fn test_yield_now_moves_to_next_ready_task() {
    let _guard = sched_guard();
    sched::init();

    let a = spawn("worker-a");

    sched::yield_now();
    assert_eq!(
        sched::current_task(),
        a,
        "a voluntary yield must hand the CPU to the next ready task"
    );

    sched::yield_now();
    assert_eq!(
        sched::current_task(),
        0,
        "yield must round-robin back to main"
    );
}
