//! Saved CPU register state for one task.

use core::mem::size_of;

/// Saved CPU state for one task, as pushed by the IRQ trampolines.
///
/// Layout contract:
/// - Must match the push/pop order of the architecture's IRQ save stub and
///   of the voluntary context-switch primitive. Any change requires a
///   synchronized update in the assembly and in the tests.
/// - The frame the IRQ stub saves on interrupt entry and the frame stored in
///   each task control block are this same type, bit for bit. The preemptive
///   context switch relies on that identity: it copies the stub-saved frame
///   into the outgoing task and overwrites it with the incoming task's frame
///   so the interrupt epilogue returns into a different task.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskRegisters {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rbp: u64,
    pub rbx: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rax: u64,
    /// Saved program counter. A freshly constructed task points this at the
    /// task-entry trampoline; the selector uses that to detect tasks that
    /// were constructed but never given an entry point.
    pub rip: u64,
    pub rflags: u64,
    pub rsp: u64,
}

const _: () = {
    assert!(size_of::<TaskRegisters>() == 18 * 8);
};
