//! Task control block and task stacks.

use core::alloc::Layout;
use core::ffi::c_void;
use core::ptr;

use alloc::alloc as heap_alloc;
use alloc::string::String;

use crate::arch::registers::TaskRegisters;
use crate::fatal;

/// Entry point type for schedulable tasks.
///
/// The entry runs on the task's own stack, reached through the task-entry
/// trampoline. When it returns, the task terminates.
pub type TaskEntryFn = extern "C" fn(ctx: *mut c_void);

const TASK_STACK_SIZE: usize = 64 * 1024;
const STACK_ALIGNMENT: usize = 16;

/// RFLAGS bit 9: Interrupt Enable Flag.
const RFLAGS_IF: u64 = 1 << 9;

/// RFLAGS bit 1: reserved, must be set in all RFLAGS values.
const RFLAGS_RESERVED: u64 = 1 << 1;

/// Default RFLAGS for new tasks: interrupts enabled so preemption stays
/// active once the task first runs.
const DEFAULT_RFLAGS: u64 = RFLAGS_IF | RFLAGS_RESERVED;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Constructed while new-task suspension was active; never selected
    /// until explicitly started.
    New,

    /// Eligible for selection. The running task is also `Ready`; "running"
    /// is identified by the scheduler's current-task slot, not by state.
    Ready,

    /// On a wait list with no timeout.
    Blocked,

    /// On a wait list with a `wake_ticks` deadline.
    BlockedWithTimeout,

    /// Off any wait list, waiting for a `wake_ticks` deadline.
    Sleeping,

    /// Finished execution. Reaped by the next selection pass unless it is
    /// still the current task, which cannot free its own stack.
    Terminated,
}

/// Per-task control block.
///
/// Created by external code and handed to the scheduler via
/// [`add_task`](crate::scheduler::add_task), which owns it from then on.
pub struct Task {
    pub(crate) name: String,
    pub(crate) state: TaskState,
    /// Orthogonal to `state`: a suspended task is skipped by selection
    /// regardless of state.
    pub(crate) suspended: bool,
    /// Deadline for `Sleeping`/`BlockedWithTimeout` in fine clock ticks.
    /// Zeroed by the selector when a block timeout expires, so a blocker can
    /// tell timeout expiry from an event signal after waking.
    pub(crate) wake_ticks: u32,
    /// Set by the selector when a block timeout expires, cleared when a
    /// block begins. Backs the sentinel meaning of `wake_ticks == 0` for
    /// untimed blocks, whose `wake_ticks` may legitimately be zero.
    pub(crate) timed_out: bool,
    pub(crate) regs: TaskRegisters,
    /// Intrusive wait-list link; `Some` only while on a wait list.
    pub(crate) wait_next: Option<super::TaskId>,
    pub(crate) entry: Option<TaskEntryFn>,
    pub(crate) entry_ctx: *mut c_void,
    stack_base: *mut u8,
    stack_size: usize,
}

impl Task {
    /// Creates a task with its own stack and its program counter aimed at
    /// the task-entry trampoline. The task has no entry point yet; the
    /// selector skips it until [`set_entry`](Self::set_entry) is called.
    pub fn new(name: &str) -> Self {
        let stack_base = allocate_task_stack(TASK_STACK_SIZE);

        let stack_top = stack_base as usize + TASK_STACK_SIZE;
        // SysV-friendly entry alignment: one return-address slot below a
        // 16-byte boundary.
        let entry_rsp = align_down(stack_top, STACK_ALIGNMENT) - 8;

        let mut regs = TaskRegisters::default();
        regs.rip = trampoline_addr();
        regs.rsp = entry_rsp as u64;
        regs.rflags = DEFAULT_RFLAGS;

        Self {
            name: String::from(name),
            state: TaskState::Ready,
            suspended: false,
            wake_ticks: 0,
            timed_out: false,
            regs,
            wait_next: None,
            entry: None,
            entry_ctx: ptr::null_mut(),
            stack_base,
            stack_size: TASK_STACK_SIZE,
        }
    }

    /// Creates a task with its entry point already set.
    pub fn with_entry(name: &str, entry: TaskEntryFn, ctx: *mut c_void) -> Self {
        let mut task = Self::new(name);
        task.set_entry(entry, ctx);
        task
    }

    /// Control block for the boot context, which is already running and
    /// needs neither a fresh stack nor the trampoline.
    pub(crate) fn new_main() -> Self {
        Self {
            name: String::from("main"),
            state: TaskState::Ready,
            suspended: false,
            wake_ticks: 0,
            timed_out: false,
            regs: TaskRegisters::default(),
            wait_next: None,
            entry: None,
            entry_ctx: ptr::null_mut(),
            stack_base: ptr::null_mut(),
            stack_size: 0,
        }
    }

    /// Sets the task's entry point and context pointer.
    ///
    /// `ctx` is passed to `entry` verbatim when the task first runs; it must
    /// stay valid until then and is only ever used on the scheduler's CPU.
    pub fn set_entry(&mut self, entry: TaskEntryFn, ctx: *mut c_void) {
        self.entry = Some(entry);
        self.entry_ctx = ctx;
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = String::from(name);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Transitions a `New` task to `Ready`.
    pub(crate) fn start(&mut self) {
        debug_assert!(self.state == TaskState::New, "start on a non-new task");
        self.state = TaskState::Ready;
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if !self.stack_base.is_null() {
            // SAFETY:
            // - `stack_base` was returned by `allocate_task_stack` with this
            //   task's `stack_size` and is freed exactly once, here.
            unsafe {
                let layout =
                    Layout::from_size_align_unchecked(self.stack_size, STACK_ALIGNMENT);
                heap_alloc::dealloc(self.stack_base, layout);
            }
        }
    }
}

/// Aligns `value` down to the given power-of-two `align`.
#[inline]
const fn align_down(value: usize, align: usize) -> usize {
    value & !(align - 1)
}

/// Allocates a task stack from the heap. Fatal on exhaustion: a system that
/// cannot stack a task it was asked to create has no way to proceed.
fn allocate_task_stack(size: usize) -> *mut u8 {
    // SAFETY:
    // - `size` is non-zero and `STACK_ALIGNMENT` is a power of two.
    let layout = unsafe { Layout::from_size_align_unchecked(size, STACK_ALIGNMENT) };
    // SAFETY:
    // - Layout has non-zero size.
    let ptr = unsafe { heap_alloc::alloc(layout) };
    if ptr.is_null() {
        fatal!("task", "task stack allocation failed");
    }
    ptr
}

/// The only target of a fresh task's saved program counter. Runs the task's
/// entry callable and terminates the task when it returns.
pub(crate) extern "C" fn task_entry_trampoline() -> ! {
    let Some((entry, ctx)) = super::current_entry() else {
        fatal!("task", "task started without an entry point");
    };

    entry(ctx);

    super::terminate();
}

pub(crate) fn trampoline_addr() -> u64 {
    task_entry_trampoline as usize as u64
}
