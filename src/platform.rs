/*
 * Architecture capability boundary
 *
 * Everything the scheduler core, futex, and signal subsystem need from the
 * surrounding architecture layer goes through this single trait, installed
 * once at boot. Modeling it as one injected table rather than scattered
 * per-call lookups is deliberate: it's the one seam the concurrency core
 * reaches across, and it's the seam a test build replaces with a fake to
 * exercise multi-core code paths without real hardware.
 */

use spin::Once;

use crate::sched::context::InterruptContext;
use crate::sched::types::CpuId;

pub trait PlatformOps: Sync {
    /// Monotonic tick counter since boot, incremented by the timer IRQ.
    fn current_tick(&self) -> u64;

    /// Milliseconds of kernel uptime since boot.
    fn uptime_ms(&self) -> u64;

    /// The core this call is executing on.
    fn current_core_id(&self) -> CpuId;

    /// How many cores this platform reports as online.
    fn core_count(&self) -> usize;

    /// Send an inter-processor interrupt to `target`, which should result in
    /// `sched::dispatch::drain_local_mailbox` running on that core.
    fn send_ipi(&self, target: CpuId);

    /// Park the calling core until the next interrupt. Used by the idle
    /// object.
    fn idle_stall(&self);

    /// Rewrite `ctx` so it resumes execution at `handler(new_stack_top, sig,
    /// arg, flags)` instead of wherever it was interrupted. The register
    /// snapshot and original return address are preserved on the stack the
    /// interceptor runs on - either `ctx`'s own stack, or `altstack_top` if
    /// `flags` carries `SEPARATE_STACK` - behind a sentinel return address
    /// that resumes the original context when the handler returns.
    fn push_signal_interceptor(
        &self,
        ctx: &mut InterruptContext,
        handler: u64,
        sig: u64,
        arg: u64,
        flags: u32,
        altstack_top: u64,
    );

    /// True if the program counter saved in `ctx` was executing kernel code
    /// at the time it was captured.
    fn is_kernel_pc(&self, ctx: &InterruptContext) -> bool;
}

static PLATFORM: Once<&'static dyn PlatformOps> = Once::new();

pub fn install(ops: &'static dyn PlatformOps) {
    PLATFORM.call_once(|| ops);
}

fn ops() -> &'static dyn PlatformOps {
    *PLATFORM
        .get()
        .expect("platform::install() must run before any scheduler operation")
}

pub fn current_tick() -> u64 {
    ops().current_tick()
}

pub fn uptime_ms() -> u64 {
    ops().uptime_ms()
}

pub fn current_core_id() -> CpuId {
    ops().current_core_id()
}

pub fn core_count() -> usize {
    ops().core_count()
}

pub fn send_ipi(target: CpuId) {
    ops().send_ipi(target)
}

pub fn idle_stall() {
    ops().idle_stall()
}

pub fn push_signal_interceptor(
    ctx: &mut InterruptContext,
    handler: u64,
    sig: u64,
    arg: u64,
    flags: u32,
    altstack_top: u64,
) {
    ops().push_signal_interceptor(ctx, handler, sig, arg, flags, altstack_top)
}

pub fn is_kernel_pc(ctx: &InterruptContext) -> bool {
    ops().is_kernel_pc(ctx)
}

pub mod x86_64_impl {
    use super::PlatformOps;
    use crate::sched::context::InterruptContext;
    use crate::sched::types::CpuId;

    /// The concrete platform this kernel boots with. Real SMP (parking and
    /// bringing up application processors) is out of scope, matching the
    /// teacher's own `_start`, which parks every non-bootstrap core at `hlt`
    /// without ever entering Rust; `core_count()` therefore always reports 1
    /// and `send_ipi` to anything but the BSP is unreachable in practice.
    pub struct X86Platform;

    impl PlatformOps for X86Platform {
        fn current_tick(&self) -> u64 {
            crate::utils::timer::scheduler_ticks()
        }

        fn uptime_ms(&self) -> u64 {
            crate::utils::timer::uptime_ms()
        }

        fn current_core_id(&self) -> CpuId {
            CpuId::BSP
        }

        fn core_count(&self) -> usize {
            1
        }

        fn send_ipi(&self, target: CpuId) {
            if target == CpuId::BSP {
                crate::sched::dispatch::drain_local_mailbox();
            }
        }

        fn idle_stall(&self) {
            x86_64::instructions::hlt();
        }

        fn push_signal_interceptor(
            &self,
            ctx: &mut InterruptContext,
            handler: u64,
            sig: u64,
            arg: u64,
            flags: u32,
            altstack_top: u64,
        ) {
            // No user/kernel split in this build: the interceptor frame is
            // built on one of the thread's own kernel stacks (its normal
            // stack, or its alternate signal stack when SEPARATE_STACK is
            // set) rather than crossing a privilege boundary.
            use crate::signal::SignalFlags;
            let stack_flags = SignalFlags::from_bits_truncate(flags);

            let raw_top = if stack_flags.contains(SignalFlags::SEPARATE_STACK) {
                altstack_top
            } else {
                ctx.iret_frame.rsp
            };

            let frame_size = core::mem::size_of::<InterruptContext>() as u64;
            let ctx_base = (raw_top - frame_size) & !0xF;
            let return_slot = ctx_base - 8;

            unsafe {
                core::ptr::write_unaligned(ctx_base as *mut InterruptContext, *ctx);
                core::ptr::write_unaligned(return_slot as *mut u64, signal_return_trampoline as u64);
            }

            ctx.rdi = raw_top;
            ctx.rsi = sig;
            ctx.rdx = arg;
            ctx.rcx = flags as u64;
            ctx.iret_frame.rip = handler;
            ctx.iret_frame.rsp = return_slot;
        }

        fn is_kernel_pc(&self, _ctx: &InterruptContext) -> bool {
            // Every thread in this build runs in ring 0.
            true
        }
    }

    pub static PLATFORM: X86Platform = X86Platform;

    /// Sentinel a signal interceptor's return address points at. Restores
    /// the register snapshot `push_signal_interceptor` wrote below the
    /// handler's stack frame and irets back into the context the signal
    /// interrupted - the same pop/iretq sequence the scheduler's own
    /// context-switch trampolines use, run against a context that was never
    /// actually pushed by hardware.
    #[unsafe(naked)]
    pub unsafe extern "C" fn signal_return_trampoline() {
        core::arch::naked_asm!(
            "pop r15",
            "pop r14",
            "pop r13",
            "pop r12",
            "pop r11",
            "pop r10",
            "pop r9",
            "pop r8",
            "pop rbp",
            "pop rdi",
            "pop rsi",
            "pop rdx",
            "pop rcx",
            "pop rbx",
            "pop rax",
            "iretq",
        )
    }
}
