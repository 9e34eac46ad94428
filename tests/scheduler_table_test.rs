//! Task table, registration, and lifecycle-control integration tests.

use std::sync::{Mutex, MutexGuard, OnceLock};

use corten_kernel::arch::registers::TaskRegisters;
use corten_kernel::scheduler::{self as sched, Task, TaskState};

/// Serializes tests in this binary around the process-global scheduler.
fn sched_guard() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

extern "C" fn noop_entry(_ctx: *mut core::ffi::c_void) {}

#[test]
fn test_init_creates_main_task_as_current() {
    let _guard = sched_guard();
    sched::init();

    assert_eq!(sched::current_task(), 0, "boot context must be task 0");
    assert_eq!(
        sched::task_name(0).as_deref(),
        Some("main"),
        "boot context must be registered as 'main'"
    );
    assert_eq!(
        sched::task_state(0),
        Some(TaskState::Ready),
        "the current task must be ready"
    );
    assert!(sched::is_valid_task(0), "main must occupy a table slot");
    assert_eq!(sched::task_count(), 1, "only main should be registered");
}

#[test]
fn test_add_task_appends_and_finds_by_name() {
    let _guard = sched_guard();
    sched::init();

    let a = sched::add_task(Task::with_entry("worker-a", noop_entry, core::ptr::null_mut()));
    let b = sched::add_task(Task::with_entry("worker-b", noop_entry, core::ptr::null_mut()));

    assert_eq!(a, 1, "first added task should land in slot 1");
    assert_eq!(b, 2, "second added task should land in slot 2");
    assert_eq!(sched::find_task("worker-a"), Some(a));
    assert_eq!(sched::find_task("worker-b"), Some(b));
    assert_eq!(
        sched::find_task("worker-c"),
        None,
        "lookup of an unknown name must fail"
    );
    assert!(
        !sched::is_valid_task(5),
        "a slot above the high-water mark is not a valid task"
    );
}

#[test]
fn test_add_task_reuses_vacant_slot_after_reap() {
    let _guard = sched_guard();
    sched::init();

    let a = sched::add_task(Task::with_entry("worker-a", noop_entry, core::ptr::null_mut()));
    let b = sched::add_task(Task::with_entry("worker-b", noop_entry, core::ptr::null_mut()));
    let c = sched::add_task(Task::with_entry("worker-c", noop_entry, core::ptr::null_mut()));

    let mut frame = TaskRegisters::default();

    // Switch to A, terminate it, then switch away so it becomes reapable.
    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(sched::current_task(), a, "first switch should select task A");
    sched::mark_current_terminated();
    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(sched::current_task(), b, "terminated A must be skipped");

    // The next selection pass reaps A; with one removal out of four slots
    // the table is not compacted, so A's slot stays vacant for reuse.
    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(sched::current_task(), c, "round robin should continue with C");
    assert!(!sched::is_valid_task(a), "reaped task must leave the table");

    let replacement =
        sched::add_task(Task::with_entry("worker-d", noop_entry, core::ptr::null_mut()));
    assert_eq!(
        replacement, a,
        "registration must reuse the first vacant slot"
    );
    assert_eq!(
        sched::task_count(),
        4,
        "slot reuse must not raise the high-water mark"
    );
}

#[test]
#[should_panic(expected = "system limit")]
fn test_add_task_beyond_capacity_is_fatal() {
    let _guard = sched_guard();
    sched::init();

    // Slot 0 is main; fill the rest of the table.
    for i in 1..sched::MAX_TASKS {
        let name = format!("filler-{}", i);
        sched::add_task(Task::with_entry(&name, noop_entry, core::ptr::null_mut()));
    }

    sched::add_task(Task::with_entry("one-too-many", noop_entry, core::ptr::null_mut()));
}

#[test]
fn test_suspend_new_tasks_nests() {
    let _guard = sched_guard();
    sched::init();

    sched::suspend_new_tasks();
    sched::suspend_new_tasks();

    let t1 = sched::add_task(Task::with_entry("late-1", noop_entry, core::ptr::null_mut()));
    let t2 = sched::add_task(Task::with_entry("late-2", noop_entry, core::ptr::null_mut()));

    assert_eq!(
        sched::task_state(t1),
        Some(TaskState::New),
        "tasks created inside a suspend region must start as New"
    );
    assert_eq!(sched::task_state(t2), Some(TaskState::New));

    sched::resume_new_tasks();
    assert_eq!(
        sched::task_state(t1),
        Some(TaskState::New),
        "the inner resume must not start tasks while the region is still open"
    );

    sched::resume_new_tasks();
    assert_eq!(
        sched::task_state(t1),
        Some(TaskState::Ready),
        "the final resume must start every New task"
    );
    assert_eq!(sched::task_state(t2), Some(TaskState::Ready));
}

#[test]
#[should_panic(expected = "without matching")]
fn test_resume_without_suspend_is_fatal() {
    let _guard = sched_guard();
    sched::init();

    sched::resume_new_tasks();
}

#[test]
fn test_start_task_transitions_only_new_tasks() {
    let _guard = sched_guard();
    sched::init();

    sched::suspend_new_tasks();
    let t = sched::add_task(Task::with_entry("eager", noop_entry, core::ptr::null_mut()));
    assert_eq!(sched::task_state(t), Some(TaskState::New));

    sched::start_task(t);
    assert_eq!(
        sched::task_state(t),
        Some(TaskState::Ready),
        "start_task must move a New task to Ready"
    );

    sched::start_task(t);
    assert_eq!(
        sched::task_state(t),
        Some(TaskState::Ready),
        "start_task must be a no-op on a task that already started"
    );

    // No task is left in New, so the closing resume has nothing to start.
    sched::resume_new_tasks();
}

#[test]
fn test_list_tasks_prints_header_and_rows() {
    let _guard = sched_guard();
    sched::init();

    let a = sched::add_task(Task::with_entry("worker-a", noop_entry, core::ptr::null_mut()));
    sched::suspend_task(a);

    let mut listing = String::new();
    sched::list_tasks(&mut listing).expect("listing into a String cannot fail");

    let mut lines = listing.lines();
    assert_eq!(
        lines.next(),
        Some("#  ADDR     STAT  FL NAME"),
        "header line must use the stable listing format"
    );

    let main_row = lines.next().expect("main row must be present");
    assert!(main_row.starts_with("00 "), "rows start with the slot index");
    assert!(
        main_row.contains(" run "),
        "the current task is listed as running: {}",
        main_row
    );
    assert!(main_row.ends_with("main"));

    let worker_row = lines.next().expect("worker row must be present");
    assert!(worker_row.starts_with("01 "));
    assert!(
        worker_row.contains(" ready "),
        "a ready task shows the ready state: {}",
        worker_row
    );
    assert!(
        worker_row.ends_with("S  worker-a"),
        "a suspended task carries the S flag: {}",
        worker_row
    );
}

#[test]
fn test_suspend_task_flag_roundtrip() {
    let _guard = sched_guard();
    sched::init();

    let a = sched::add_task(Task::with_entry("worker-a", noop_entry, core::ptr::null_mut()));
    sched::suspend_task(a);

    // The flag is orthogonal to state: the task stays Ready while suspended.
    assert_eq!(sched::task_state(a), Some(TaskState::Ready));

    let mut frame = TaskRegisters::default();
    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(
        sched::current_task(),
        0,
        "a suspended task must not be selected even when Ready"
    );

    sched::resume_task(a);
    sched::context_switch_on_irq_return(&mut frame);
    assert_eq!(
        sched::current_task(),
        a,
        "a resumed task must be selectable again"
    );
}
