/*
 * Saved CPU context
 *
 * Layout of the register state saved by the naked-asm interrupt trampolines
 * in `sched::mod` around a context switch: the hardware-pushed iret frame
 * followed by the general-purpose registers we push ourselves, in push
 * order. Kept identical to the teacher's scheduler::scheduler layout since
 * the trampolines that produce and consume it are unchanged.
 */

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InterruptFrame {
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

impl Default for InterruptFrame {
    fn default() -> Self {
        Self {
            rip: 0,
            cs: 0x08,
            rflags: 0x202,
            rsp: 0,
            ss: 0x10,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct InterruptContext {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub iret_frame: InterruptFrame,
}

impl InterruptContext {
    /// Build the initial saved context for a brand-new thread: every
    /// general-purpose register zeroed, instruction pointer at the trampoline
    /// that calls the thread's entry function, stack pointer at the top of
    /// its freshly allocated kernel stack.
    pub fn new_kernel_thread(entry_trampoline: u64, stack_top: u64) -> Self {
        Self {
            iret_frame: InterruptFrame {
                rip: entry_trampoline,
                cs: 0x08,
                rflags: 0x202,
                rsp: stack_top,
                ss: 0x10,
            },
            ..Default::default()
        }
    }
}
