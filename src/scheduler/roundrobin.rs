//! Round-robin scheduler core.
//!
//! Owns the fixed task table and is the sole arbiter of which task's
//! register context is live on the CPU. Selection is strict round-robin
//! over the table; there are no priorities. Two context-switch flavors share
//! the selection logic:
//!
//! - voluntary (`yield_now` and everything built on it) hands the live
//!   context to the architecture switch primitive,
//! - preemptive (`context_switch_on_irq_return`) edits the IRQ-saved
//!   register frame in place so the interrupt epilogue returns into a
//!   different task.
//!
//! Terminated tasks are reaped lazily by the next selection pass, because a
//! task cannot free its own stack; the table is compacted once enough slots
//! have emptied.

use core::ffi::c_void;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use alloc::boxed::Box;
use alloc::string::String;

use crate::arch::interrupts;
use crate::arch::registers::TaskRegisters;
use crate::clock;
use crate::fatal;
use crate::sync::spinlock::SpinLock;
use crate::sync::waitlist::WaitList;

use super::task::{trampoline_addr, Task, TaskEntryFn, TaskState};

/// Slot index identifying a registered task.
pub type TaskId = usize;

/// Fixed ceiling of the task table.
pub const MAX_TASKS: usize = 16;

/// Handler invoked with the task involved in a switch or termination.
///
/// Handlers run with the scheduler lock held and must not call back into
/// scheduler operations.
pub type TaskHandler = fn(&Task);

/// Minimum coarse ticks between preemptive switches.
const SLICE_TICKS: u32 = 1;

/// Log target of the scheduler.
const TARGET: &str = "sched";

struct SchedulerState {
    initialized: bool,
    /// Task table. Occupied slots live in `slots[0..task_count)`; everything
    /// above the high-water mark must stay vacant.
    slots: [Option<Box<Task>>; MAX_TASKS],
    /// High-water mark of the occupied prefix.
    task_count: usize,
    /// Slot index of the task whose register context is live on the CPU.
    current: usize,
    switch_handler: Option<TaskHandler>,
    termination_handler: Option<TaskHandler>,
    /// Nesting depth of create-tasks-suspended regions.
    suspend_new_tasks: u32,
}

impl SchedulerState {
    const fn new() -> Self {
        Self {
            initialized: false,
            slots: [const { None }; MAX_TASKS],
            task_count: 0,
            current: 0,
            switch_handler: None,
            termination_handler: None,
            suspend_new_tasks: 0,
        }
    }
}

// SAFETY:
// - `SchedulerState` is only accessed behind `SpinLock<SchedulerState>`.
// - The raw entry-context pointers inside task control blocks are only
//   dereferenced from the scheduler's CPU (in the task trampoline).
unsafe impl Send for SchedulerState {}

static SCHED: SpinLock<SchedulerState> = SpinLock::new(SchedulerState::new());

/// Set by the slice handler; the IRQ stub checks it on return and calls
/// [`context_switch_on_irq_return`] when set.
static SHOULD_CONTEXT_SWITCH: AtomicBool = AtomicBool::new(false);

/// Coarse tick of the last preemptive switch decision.
static LAST_SWITCH_TICK: AtomicU32 = AtomicU32::new(0);

/// Latch so the slice handler registers with the clock source only once.
static PREEMPTION_ENABLED: AtomicBool = AtomicBool::new(false);

/// Executes `f` while holding the scheduler spinlock.
fn with_sched<R>(f: impl FnOnce(&mut SchedulerState) -> R) -> R {
    let mut sched = SCHED.lock();
    f(&mut sched)
}

fn slot_ref(s: &SchedulerState, id: TaskId) -> &Task {
    match s.slots[id].as_deref() {
        Some(task) => task,
        None => fatal!(TARGET, "vacant task slot {} referenced", id),
    }
}

fn slot_mut(s: &mut SchedulerState, id: TaskId) -> &mut Task {
    match s.slots[id].as_deref_mut() {
        Some(task) => task,
        None => fatal!(TARGET, "vacant task slot {} referenced", id),
    }
}

/// Architecture backend used by the voluntary switch path.
///
/// This isolates the assembly context-switch primitive from selection logic
/// and makes the behavior replaceable in tests without modifying scheduler
/// internals.
#[derive(Clone, Copy)]
pub struct SchedArchCallbacks {
    /// Saves the live CPU context into `save`, then restores `load`.
    ///
    /// Contract: invoked with interrupts masked; returns only when the
    /// saved context is scheduled again (the restored frame's `rflags`
    /// re-enables interrupts). `save` and `load` use the exact frame layout
    /// the IRQ stub saves, see [`TaskRegisters`].
    pub switch_context: unsafe fn(save: *mut TaskRegisters, load: *const TaskRegisters),
    /// Relaxes the CPU while the selector waits for a task to become
    /// runnable.
    pub idle_wait: fn(),
}

/// Hosted stand-in: no hardware context is moved, the call returns
/// immediately. A bare-metal port installs its assembly primitive via
/// [`set_sched_arch_callbacks`] during bring-up.
unsafe fn default_switch_context(_save: *mut TaskRegisters, _load: *const TaskRegisters) {}

fn default_idle_wait() {
    core::hint::spin_loop();
}

impl SchedArchCallbacks {
    const fn default_callbacks() -> Self {
        Self {
            switch_context: default_switch_context,
            idle_wait: default_idle_wait,
        }
    }
}

static SCHED_ARCH_CALLBACKS: SpinLock<SchedArchCallbacks> =
    SpinLock::new(SchedArchCallbacks::default_callbacks());

fn arch_callbacks() -> SchedArchCallbacks {
    *SCHED_ARCH_CALLBACKS.lock()
}

/// Replaces the architecture backend used by the voluntary switch path.
pub fn set_sched_arch_callbacks(callbacks: SchedArchCallbacks) {
    *SCHED_ARCH_CALLBACKS.lock() = callbacks;
}

/// Restores the default (hosted stand-in) architecture backend.
pub fn reset_sched_arch_callbacks_to_default() {
    *SCHED_ARCH_CALLBACKS.lock() = SchedArchCallbacks::default_callbacks();
}

/// Resets and initializes the scheduler.
///
/// The boot context becomes the first table entry ("main") and the current
/// task; there is exactly one current task from here on.
pub fn init() {
    with_sched(|s| {
        *s = SchedulerState::new();
        s.initialized = true;
        s.slots[0] = Some(Box::new(Task::new_main()));
        s.task_count = 1;
        s.current = 0;
    });

    SHOULD_CONTEXT_SWITCH.store(false, Ordering::Release);
    LAST_SWITCH_TICK.store(clock::ticks(), Ordering::Release);
}

/// Registers `task` in the first vacant slot, or appends at the high-water
/// mark. Exceeding [`MAX_TASKS`] is fatal.
///
/// While a create-tasks-suspended region is active the task is forced to
/// [`TaskState::New`] and stays unschedulable until the region closes.
pub fn add_task(task: Task) -> TaskId {
    with_sched(move |s| {
        if !s.initialized {
            fatal!(TARGET, "scheduler used before init");
        }

        let mut task = task;
        if s.suspend_new_tasks > 0 {
            task.state = TaskState::New;
        }

        let id = match (0..s.task_count).find(|&i| s.slots[i].is_none()) {
            Some(i) => i,
            None => {
                if s.task_count >= MAX_TASKS {
                    fatal!(TARGET, "system limit of {} tasks exceeded", MAX_TASKS);
                }
                let i = s.task_count;
                s.task_count += 1;
                i
            }
        };

        s.slots[id] = Some(Box::new(task));
        id
    })
}

/// Returns the slot index of the currently running task.
pub fn current_task() -> TaskId {
    with_sched(|s| s.current)
}

/// Linear scan for the first task with the given name.
pub fn find_task(name: &str) -> Option<TaskId> {
    with_sched(|s| {
        (0..s.task_count).find(|&i| s.slots[i].as_deref().is_some_and(|t| t.name == name))
    })
}

/// Returns whether `id` currently occupies a table slot.
pub fn is_valid_task(id: TaskId) -> bool {
    with_sched(|s| id < s.task_count && s.slots[id].is_some())
}

/// Opens a create-tasks-suspended region. Regions nest.
pub fn suspend_new_tasks() {
    with_sched(|s| {
        s.suspend_new_tasks += 1;
    });
}

/// Closes one create-tasks-suspended region. The close that drops the
/// nesting to zero starts every task still in [`TaskState::New`], in
/// insertion order. Closing without a matching open is fatal.
pub fn resume_new_tasks() {
    with_sched(|s| {
        if s.suspend_new_tasks == 0 {
            fatal!(TARGET, "resume_new_tasks without matching suspend_new_tasks");
        }
        s.suspend_new_tasks -= 1;

        if s.suspend_new_tasks == 0 {
            for i in 0..s.task_count {
                if let Some(task) = s.slots[i].as_deref_mut() {
                    if task.state == TaskState::New {
                        task.start();
                    }
                }
            }
        }
    });
}

/// Starts a task left in [`TaskState::New`]; no effect on other states.
pub fn start_task(id: TaskId) {
    with_sched(|s| {
        if id < s.task_count {
            if let Some(task) = s.slots[id].as_deref_mut() {
                if task.state == TaskState::New {
                    task.start();
                }
            }
        }
    });
}

/// Marks `id` suspended: selection skips it regardless of state.
pub fn suspend_task(id: TaskId) {
    with_sched(|s| {
        if id < s.task_count {
            if let Some(task) = s.slots[id].as_deref_mut() {
                task.suspended = true;
            }
        }
    });
}

/// Clears the suspended mark on `id`.
pub fn resume_task(id: TaskId) {
    with_sched(|s| {
        if id < s.task_count {
            if let Some(task) = s.slots[id].as_deref_mut() {
                task.suspended = false;
            }
        }
    });
}

/// Registers the handler invoked after every task switch. Registering twice
/// is fatal.
pub fn register_task_switch_handler(handler: TaskHandler) {
    with_sched(|s| {
        if s.switch_handler.is_some() {
            fatal!(TARGET, "task switch handler already registered");
        }
        s.switch_handler = Some(handler);
    });
}

/// Registers the handler invoked for each task reaped after termination.
/// Registering twice is fatal.
pub fn register_task_termination_handler(handler: TaskHandler) {
    with_sched(|s| {
        if s.termination_handler.is_some() {
            fatal!(TARGET, "task termination handler already registered");
        }
        s.termination_handler = Some(handler);
    });
}

/// Outcome of one voluntary selection pass.
enum SwitchPlan {
    /// The current task stays on the CPU.
    Stay,
    /// Nothing is runnable; relax and reselect.
    Idle,
    /// Switch from the frame at `save` to the frame at `load`.
    Switch {
        save: *mut TaskRegisters,
        load: *const TaskRegisters,
    },
}

fn plan_voluntary_switch(s: &mut SchedulerState) -> SwitchPlan {
    let Some(next) = get_next_task(s) else {
        if s.task_count == 0 {
            fatal!(TARGET, "selection with an empty task table");
        }
        return SwitchPlan::Idle;
    };

    if next == s.current {
        return SwitchPlan::Stay;
    }

    let outgoing = s.current;
    let save: *mut TaskRegisters = &mut slot_mut(s, outgoing).regs;
    s.current = next;

    if let Some(handler) = s.switch_handler {
        handler(slot_ref(s, next));
    }

    let load: *const TaskRegisters = &slot_ref(s, next).regs;
    SwitchPlan::Switch { save, load }
}

/// Voluntarily hands the CPU to the next runnable task.
///
/// Returns once this task is scheduled again. The caller's state is not
/// changed by the yield itself; sleep and block set their state before
/// calling here.
pub fn yield_now() {
    loop {
        interrupts::enter_critical(1);
        let plan = with_sched(plan_voluntary_switch);

        match plan {
            SwitchPlan::Stay => {
                interrupts::leave_critical();
                return;
            }
            SwitchPlan::Idle => {
                // Reselect with interrupts unmasked in between, so a timer
                // tick or an ISR wakeup can make a task runnable.
                interrupts::leave_critical();
                (arch_callbacks().idle_wait)();
            }
            SwitchPlan::Switch { save, load } => {
                // SAFETY:
                // - Both frames live inside boxed task control blocks whose
                //   addresses are stable across table compaction.
                // - Interrupts stay masked from selection until the switch,
                //   so no IRQ-return reselection can reap the outgoing task
                //   or move `current` in between.
                unsafe { (arch_callbacks().switch_context)(save, load) };
                interrupts::leave_critical();
                return;
            }
        }
    }
}

/// Sleeps the current task for at least `micros` microseconds.
pub fn us_sleep(micros: u32) {
    if micros == 0 {
        return;
    }

    with_sched(|s| {
        let id = s.current;
        let task = slot_mut(s, id);
        debug_assert!(task.state == TaskState::Ready, "sleeping a non-ready task");
        task.wake_ticks = clock::clock_ticks().wrapping_add(micros * clock::TICKS_PER_MICRO);
        task.state = TaskState::Sleeping;
    });

    yield_now();

    debug_assert!(
        with_sched(|s| slot_ref(s, s.current).state) == TaskState::Ready,
        "task resumed from sleep in a non-ready state"
    );
}

/// Sleeps the current task for at least `millis` milliseconds.
pub fn ms_sleep(millis: u32) {
    if millis > 0 {
        us_sleep(millis * 1_000);
    }
}

/// Sleeps the current task for at least `seconds` seconds.
///
/// Long intervals are chunked so the tick delta the selector computes stays
/// within signed range.
pub fn sleep(seconds: u32) {
    // 2147 would fit, but stay well clear of the signed limit.
    const SLEEP_MAX_SECONDS: u32 = 1_800;

    let mut remaining = seconds;
    while remaining > SLEEP_MAX_SECONDS {
        us_sleep(SLEEP_MAX_SECONDS * 1_000_000);
        remaining -= SLEEP_MAX_SECONDS;
    }
    us_sleep(remaining * 1_000_000);
}

/// Blocks the current task on `wait_list` until [`wake_tasks`] signals the
/// list or, with a non-zero `micros`, until the deadline expires.
///
/// Returns `true` when woken by an event signal, `false` on timeout.
pub fn block_task(wait_list: &WaitList, micros: u32) -> bool {
    block_task_with(wait_list, micros, yield_now)
}

/// [`block_task`] with an explicit yield operation.
///
/// `yield_once` must provide one scheduling opportunity and return once the
/// blocked task is resumed. Exposed so the signal-versus-timeout contract
/// stays directly testable without a hardware context switch.
pub fn block_task_with(wait_list: &WaitList, micros: u32, mut yield_once: impl FnMut()) -> bool {
    with_sched(|s| enqueue_current(s, wait_list, micros));

    yield_once();

    finish_block(wait_list)
}

/// [`block_task`] gated by a predicate.
///
/// `should_block` is evaluated with the scheduler lock held, the same lock
/// [`wake_tasks`] takes: no signal can land between the check and the
/// enqueue, because a signaller waits on the lock and then finds the task
/// already on the list. Sync primitives use this for their
/// check-then-block sequences, which would otherwise lose a wakeup to a
/// preemptive switch in that window.
///
/// Returns `None` when the predicate declined the block, otherwise
/// `Some(woken_by_event)` as in [`block_task`].
pub fn block_task_if(
    wait_list: &WaitList,
    micros: u32,
    should_block: impl FnOnce() -> bool,
) -> Option<bool> {
    block_task_if_with(wait_list, micros, should_block, yield_now)
}

/// [`block_task_if`] with an explicit yield operation, for the same reason
/// as [`block_task_with`].
pub fn block_task_if_with(
    wait_list: &WaitList,
    micros: u32,
    should_block: impl FnOnce() -> bool,
    mut yield_once: impl FnMut(),
) -> Option<bool> {
    let blocked = with_sched(|s| {
        if !should_block() {
            return false;
        }
        enqueue_current(s, wait_list, micros);
        true
    });

    if !blocked {
        return None;
    }

    yield_once();

    Some(finish_block(wait_list))
}

/// Pushes the current task onto `wait_list` and parks it. Runs under the
/// scheduler lock.
fn enqueue_current(s: &mut SchedulerState, wait_list: &WaitList, micros: u32) {
    let id = s.current;
    let task = slot_mut(s, id);
    debug_assert!(
        task.wait_next.is_none(),
        "blocking task already on a wait list"
    );
    debug_assert!(task.state == TaskState::Ready, "blocking a non-ready task");

    task.timed_out = false;
    // Intrusive LIFO push.
    task.wait_next = wait_list.head();
    wait_list.set_head(Some(id));

    if micros == 0 {
        task.state = TaskState::Blocked;
    } else {
        task.wake_ticks = clock::clock_ticks().wrapping_add(micros * clock::TICKS_PER_MICRO);
        task.state = TaskState::BlockedWithTimeout;
    }
}

/// Post-yield half of a block: defensive unlink and wake-cause report.
fn finish_block(wait_list: &WaitList) -> bool {
    with_sched(|s| {
        let id = s.current;

        // Unlink in case the wake came from timeout expiry; after an event
        // signal the list is already detached and this walk is a no-op.
        unlink_from_wait_list(s, wait_list, id);

        let task = slot_mut(s, id);
        task.wait_next = None;
        !task.timed_out
    })
}

fn unlink_from_wait_list(s: &mut SchedulerState, wait_list: &WaitList, id: TaskId) {
    let mut prev: Option<TaskId> = None;
    let mut cursor = wait_list.head();

    while let Some(t) = cursor {
        let next = slot_ref(s, t).wait_next;
        if t == id {
            match prev {
                Some(p) => slot_mut(s, p).wait_next = next,
                None => wait_list.set_head(next),
            }
        } else {
            prev = Some(t);
        }
        cursor = next;
    }
}

/// Wakes every task blocked on `wait_list`. This is a broadcast: the whole
/// chain is detached atomically and each task becomes ready exactly once.
/// Waking a task that is not blocked is fatal.
pub fn wake_tasks(wait_list: &WaitList) {
    with_sched(|s| {
        let mut cursor = wait_list.take_head();

        while let Some(id) = cursor {
            let task = slot_mut(s, id);
            if task.state != TaskState::Blocked && task.state != TaskState::BlockedWithTimeout {
                fatal!(TARGET, "tried to wake non-blocked task {}", id);
            }
            // `wake_ticks` is deliberately left alone: a zero written by a
            // racing timeout expiry stays observable at the block site.
            task.state = TaskState::Ready;
            cursor = task.wait_next.take();
        }
    });
}

/// Marks the current task [`TaskState::Terminated`]. The task keeps running
/// until it yields; a later selection pass reaps it once it is no longer
/// current.
pub fn mark_current_terminated() {
    with_sched(|s| {
        let id = s.current;
        slot_mut(s, id).state = TaskState::Terminated;
    });
}

/// Terminates the current task and hands the CPU away for good.
pub fn terminate() -> ! {
    mark_current_terminated();
    yield_now();

    // Nothing else was runnable; wait for the preemption path to move
    // execution off this task so it can be reaped.
    loop {
        (arch_callbacks().idle_wait)();
    }
}

/// Reaps terminated tasks, skipping the current one. Vacant slots count
/// toward the removal total so the compaction trigger tracks how empty the
/// occupied prefix actually is.
fn reap_terminated(s: &mut SchedulerState) -> usize {
    let termination_handler = s.termination_handler;
    let mut removed = 0;

    for i in 0..s.task_count {
        match s.slots[i].as_deref() {
            None => removed += 1,
            Some(task) => {
                if task.state != TaskState::Terminated || i == s.current {
                    continue;
                }
                let task = s.slots[i].take().expect("slot vanished during reap");
                if let Some(handler) = termination_handler {
                    handler(&task);
                }
                removed += 1;
            }
        }
    }

    removed
}

/// Shifts occupied slots to the front and lowers the high-water mark,
/// keeping `current` pointing at the same task.
fn compact(s: &mut SchedulerState) {
    let mut live = 0;
    for i in 0..s.task_count {
        if s.slots[i].is_none() {
            continue;
        }
        if live != i {
            s.slots[live] = s.slots[i].take();
        }
        if i == s.current {
            s.current = live;
        }
        live += 1;
    }
    s.task_count = live;
}

/// Round-robin selection, starting after the current task and wrapping.
///
/// Also the place where deferred work happens: terminated tasks are reaped,
/// the table is compacted when at least half the occupied prefix is empty,
/// and expired sleep/block deadlines flip their tasks back to ready.
/// Returns `None` when nothing is selectable.
fn get_next_task(s: &mut SchedulerState) -> Option<TaskId> {
    // A non-empty slot above the high-water mark means a removal leaked.
    for i in s.task_count..MAX_TASKS {
        if s.slots[i].is_some() {
            fatal!(TARGET, "task slot {} above the high-water mark is occupied", i);
        }
    }

    let removed = reap_terminated(s);
    if removed >= s.task_count / 2 {
        compact(s);
    }

    let now = clock::clock_ticks();
    let mut index = s.current;

    for _ in 1..=s.task_count {
        index += 1;
        if index >= s.task_count {
            index = 0;
        }

        let current = s.current;
        let Some(task) = s.slots[index].as_deref_mut() else {
            continue;
        };

        // A task whose program counter still points at the trampoline with
        // no entry callable set was constructed but never finished
        // initialization; it must not run.
        if task.regs.rip == trampoline_addr() && task.entry.is_none() {
            continue;
        }

        if task.suspended {
            continue;
        }

        match task.state {
            TaskState::Ready => return Some(index),

            TaskState::Blocked | TaskState::New => continue,

            TaskState::BlockedWithTimeout => {
                if task.wake_ticks.wrapping_sub(now) as i32 > 0 {
                    continue;
                }
                task.state = TaskState::Ready;
                // Zeroed wake ticks tell the block site the timeout fired.
                task.wake_ticks = 0;
                task.timed_out = true;
                return Some(index);
            }

            TaskState::Sleeping => {
                if task.wake_ticks.wrapping_sub(now) as i32 > 0 {
                    continue;
                }
                task.state = TaskState::Ready;
                return Some(index);
            }

            TaskState::Terminated => {
                // Reaping removed every terminated task except the current.
                if index != current {
                    fatal!(TARGET, "terminated task {} survived reaping", index);
                }
                continue;
            }
        }
    }

    None
}

/// Preemptive context switch, invoked by the IRQ stub on return with the
/// register frame it saved on entry.
///
/// Retries selection until a task is selectable (an expired deadline or an
/// ISR wakeup between retries makes one runnable). If the selected task is
/// already current the frame is left untouched; otherwise the IRQ-saved
/// frame is copied into the outgoing task and overwritten with the incoming
/// task's frame, so the interrupt epilogue returns into the incoming task.
pub fn context_switch_on_irq_return(irq_frame: &mut TaskRegisters) {
    SHOULD_CONTEXT_SWITCH.store(false, Ordering::Release);

    loop {
        let switched = with_sched(|s| {
            let Some(next) = get_next_task(s) else {
                if s.task_count == 0 {
                    fatal!(TARGET, "selection with an empty task table");
                }
                return false;
            };

            if next != s.current {
                let outgoing = s.current;
                // Capture where the outgoing task was interrupted.
                slot_mut(s, outgoing).regs = *irq_frame;
                s.current = next;

                if let Some(handler) = s.switch_handler {
                    handler(slot_ref(s, next));
                }

                *irq_frame = slot_ref(s, next).regs;
            }
            true
        });

        if switched {
            return;
        }
        (arch_callbacks().idle_wait)();
    }
}

/// Slice pacing, run from timer-interrupt context on every coarse tick.
fn preemption_tick_handler() {
    let now = clock::ticks();
    let last = LAST_SWITCH_TICK.load(Ordering::Acquire);

    if now.wrapping_sub(last) >= SLICE_TICKS {
        // The interrupted task used up its slice; switch on IRQ return.
        SHOULD_CONTEXT_SWITCH.store(true, Ordering::Release);
        LAST_SWITCH_TICK.store(now, Ordering::Release);
    } else {
        SHOULD_CONTEXT_SWITCH.store(false, Ordering::Release);
    }
}

/// Registers the slice handler with the clock source and arms preemption.
pub fn enable_preemptive_multitasking() {
    SHOULD_CONTEXT_SWITCH.store(false, Ordering::Release);
    LAST_SWITCH_TICK.store(clock::ticks(), Ordering::Release);

    if !PREEMPTION_ENABLED.swap(true, Ordering::AcqRel) {
        clock::register_periodic_handler(preemption_tick_handler);
    }
}

/// Checked by the IRQ stub on return; set means the stub must call
/// [`context_switch_on_irq_return`] with the frame it saved on entry.
pub fn should_context_switch() -> bool {
    SHOULD_CONTEXT_SWITCH.load(Ordering::Acquire)
}

/// Writes a header line plus one line per occupied slot to `sink`.
pub fn list_tasks(sink: &mut dyn fmt::Write) -> fmt::Result {
    sink.write_str("#  ADDR     STAT  FL NAME\n")?;

    with_sched(|s| {
        for i in 0..s.task_count {
            let Some(task) = s.slots[i].as_deref() else {
                continue;
            };

            let state_name = if i == s.current {
                "run"
            } else {
                match task.state {
                    TaskState::New => "new",
                    TaskState::Ready => "ready",
                    TaskState::Blocked => "block",
                    TaskState::BlockedWithTimeout => "block",
                    TaskState::Sleeping => "sleep",
                    TaskState::Terminated => "term",
                }
            };

            writeln!(
                sink,
                "{:02} {:08X} {:<5} {}{} {}",
                i,
                task as *const Task as usize,
                state_name,
                if task.suspended { 'S' } else { ' ' },
                if task.state == TaskState::BlockedWithTimeout {
                    'T'
                } else {
                    ' '
                },
                task.name
            )?;
        }
        Ok(())
    })
}

/// Entry callable of the current task, fetched by the task trampoline.
pub(crate) fn current_entry() -> Option<(TaskEntryFn, *mut c_void)> {
    with_sched(|s| {
        let task = slot_ref(s, s.current);
        task.entry.map(|entry| (entry, task.entry_ctx))
    })
}

/// Returns the lifecycle state of `id`, or `None` for a vacant slot.
pub fn task_state(id: TaskId) -> Option<TaskState> {
    with_sched(|s| {
        if id >= s.task_count {
            return None;
        }
        s.slots[id].as_deref().map(|t| t.state)
    })
}

/// Returns the wake deadline of `id`, or `None` for a vacant slot.
pub fn task_wake_ticks(id: TaskId) -> Option<u32> {
    with_sched(|s| {
        if id >= s.task_count {
            return None;
        }
        s.slots[id].as_deref().map(|t| t.wake_ticks)
    })
}

/// Returns a copy of the saved register frame of `id`.
pub fn task_regs(id: TaskId) -> Option<TaskRegisters> {
    with_sched(|s| {
        if id >= s.task_count {
            return None;
        }
        s.slots[id].as_deref().map(|t| t.regs)
    })
}

/// Returns the name of `id`, or `None` for a vacant slot.
pub fn task_name(id: TaskId) -> Option<String> {
    with_sched(|s| {
        if id >= s.task_count {
            return None;
        }
        s.slots[id].as_deref().map(|t| String::from(t.name()))
    })
}

/// High-water mark of the occupied table prefix.
pub fn task_count() -> usize {
    with_sched(|s| s.task_count)
}
