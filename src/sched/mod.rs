/*
 * Scheduler core
 *
 * Ties together the per-core multilevel-feedback schedulers (percpu), the
 * slab-indexed scheduler objects they run (object), the thread table mapping
 * a ThreadId to its saved context and bookkeeping (thread), and cross-core
 * dispatch (dispatch). This is the module every other file in the crate
 * reaches into to spawn work, block on a condition, or switch context -
 * the replacement for the teacher's scheduler::mod, generalized from a
 * single round-robin ready queue to one MLFQ instance per core.
 *
 * Context switches still ride the same interrupt-based mechanism as the
 * teacher: INT 0x81 for voluntary yields and IRQ0 for preemption, both
 * landing in a naked trampoline that saves registers, calls
 * schedule_from_interrupt, and iretqs into whatever it returns.
 */

use alloc::collections::BTreeMap;
use alloc::string::String;
use core::arch::asm;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod object;
pub mod percpu;
pub mod queue;
pub mod thread;
pub mod types;

use crate::platform;
use crate::sync::IrqSpinlock;
use config::MAX_CORES;
use context::InterruptContext;
use error::SchedError;
use object::ObjectFlags;
use percpu::PerCoreScheduler;
use thread::{Thread, ThreadId, ThreadState};
use types::CpuId;

static THREADS: IrqSpinlock<BTreeMap<ThreadId, Thread>> = IrqSpinlock::new(BTreeMap::new());

static CORES: [PerCoreScheduler; MAX_CORES] = [
    PerCoreScheduler::new(CpuId(0)),
    PerCoreScheduler::new(CpuId(1)),
    PerCoreScheduler::new(CpuId(2)),
    PerCoreScheduler::new(CpuId(3)),
    PerCoreScheduler::new(CpuId(4)),
    PerCoreScheduler::new(CpuId(5)),
    PerCoreScheduler::new(CpuId(6)),
    PerCoreScheduler::new(CpuId(7)),
];

/// Thread currently executing on each core, 0 meaning "none yet" (no
/// ThreadId is ever allocated as 0).
static CURRENT_THREAD_ID: [AtomicUsize; MAX_CORES] = [
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
];

static SCHEDULER_ENABLED: AtomicBool = AtomicBool::new(false);

/// Runs on a core whenever nothing else is runnable. Never boosted, never
/// counted against scheduling fairness.
fn idle_entry() {
    loop {
        platform::idle_stall();
    }
}

/// Build and install an idle thread/object on every core the platform
/// reports, then bring up the synchronization and signal subsystems that
/// depend on the scheduler existing. Must run before any other sched, sync,
/// or signal call.
pub fn init() {
    let core_count = platform::core_count().max(1);
    let mut threads = THREADS.lock();

    for cpu in 0..core_count {
        let tid = thread::allocate_thread_id();
        let stack = thread::new_stack();
        let stack_top = stack.as_ptr() as u64 + stack.len() as u64;
        let context = InterruptContext::new_kernel_thread(
            thread::thread_entry_trampoline as u64,
            stack_top,
        );

        let handle = {
            let mut inner = CORES[cpu].inner.lock();
            let handle = inner.objects.insert(tid, CpuId(cpu as u32), ObjectFlags::IDLE);
            inner.idle = Some(handle);
            inner.current = Some(handle);
            handle
        };

        threads.insert(
            tid,
            Thread {
                id: tid,
                name: String::from("idle"),
                state: ThreadState::Running,
                sched_handle: handle,
                home_core: CpuId(cpu as u32),
                stack,
                altstack: thread::new_altstack(),
                context,
                signals: crate::signal::SignalState::new(),
                cpu_ticks: 0,
                exit_code: None,
                entry: idle_entry,
            },
        );

        CURRENT_THREAD_ID[cpu].store(tid.0, Ordering::SeqCst);
    }
    drop(threads);

    log::info!("scheduler core initialized ({} core(s))", core_count);
}

/// Start preemption. Before this, the timer and yield interrupt handlers
/// leave the interrupted context running untouched.
pub fn enable() {
    SCHEDULER_ENABLED.store(true, Ordering::SeqCst);
    log::info!("scheduler enabled");
}

/// Create a new kernel thread running `entry`, placed on whichever core
/// currently holds the fewest scheduler objects (ties broken by lowest core
/// id). Returns immediately runnable.
pub fn spawn_kernel_thread(entry: fn(), name: &str) -> ThreadId {
    let tid = thread::allocate_thread_id();
    let stack = thread::new_stack();
    let stack_top = stack.as_ptr() as u64 + stack.len() as u64;
    let context =
        InterruptContext::new_kernel_thread(thread::thread_entry_trampoline as u64, stack_top);

    let core_count = platform::core_count().max(1);
    let mut target = CpuId(0);
    let mut fewest = usize::MAX;
    for cpu in 0..core_count {
        let count = CORES[cpu].inner.lock().object_count();
        if count < fewest {
            fewest = count;
            target = CpuId(cpu as u32);
        }
    }

    let handle = {
        let mut inner = CORES[target.as_usize()].inner.lock();
        let handle = inner.objects.insert(tid, target, ObjectFlags::empty());
        inner.enqueue(handle);
        handle
    };

    THREADS.lock().insert(
        tid,
        Thread {
            id: tid,
            name: String::from(name),
            state: ThreadState::Ready,
            sched_handle: handle,
            home_core: target,
            stack,
            altstack: thread::new_altstack(),
            context,
            signals: crate::signal::SignalState::new(),
            cpu_ticks: 0,
            exit_code: None,
            entry,
        },
    );

    log::debug!("spawned {} as {} on core {}", name, tid, target.as_usize());
    tid
}

/// Tear down the calling thread's scheduler object and thread record, then
/// give up the CPU for good. Never returns.
pub fn exit_current_thread(code: i32) -> ! {
    let tid = current_thread_id();

    let info = THREADS.lock().get(&tid).map(|t| (t.home_core, t.sched_handle));
    if let Some((home_core, handle)) = info {
        let mut inner = CORES[home_core.as_usize()].inner.lock();
        inner.dequeue(handle);
        inner.objects.remove(handle);
        if inner.current == Some(handle) {
            inner.current = None;
        }
    }

    THREADS.lock().remove(&tid);
    log::debug!("{} exited with code {}", tid, code);

    loop {
        yield_now();
    }
}

/// The thread currently running on this core.
pub fn current_thread_id() -> ThreadId {
    ThreadId(CURRENT_THREAD_ID[platform::current_core_id().as_usize()].load(Ordering::SeqCst))
}

pub fn with_thread<F, R>(tid: ThreadId, f: F) -> Option<R>
where
    F: FnOnce(&Thread) -> R,
{
    THREADS.lock().get(&tid).map(f)
}

pub fn with_thread_mut<F, R>(tid: ThreadId, f: F) -> Option<R>
where
    F: FnOnce(&mut Thread) -> R,
{
    THREADS.lock().get_mut(&tid).map(f)
}

/// Remove `tid` from its run queue and mark it Blocked, waking on its own
/// once `deadline_ms` (absolute kernel uptime) passes if given. If `tid` is
/// the calling thread, this doesn't return until something (`unblock`,
/// `expedite`, or the deadline) makes it Ready again - every other caller is
/// waking a different thread and only needs the bookkeeping done.
pub fn block(tid: ThreadId, deadline_ms: Option<u64>) {
    let info = with_thread_mut(tid, |t| {
        t.state = ThreadState::Blocked;
        (t.home_core, t.sched_handle)
    });
    if let Some((home_core, handle)) = info {
        CORES[home_core.as_usize()].inner.lock().park(handle, deadline_ms);
    }

    if tid == current_thread_id() {
        while with_thread(tid, |t| t.state == ThreadState::Blocked).unwrap_or(false) {
            yield_now();
        }
    }
}

/// Move a Blocked thread back onto its home core's run queue at the top
/// feedback level. A no-op if the thread isn't Blocked.
pub fn unblock(tid: ThreadId) {
    let info = with_thread_mut(tid, |t| {
        if t.state == ThreadState::Blocked {
            t.state = ThreadState::Ready;
            Some((t.home_core, t.sched_handle))
        } else {
            None
        }
    })
    .flatten();

    if let Some((home_core, handle)) = info {
        let mut inner = CORES[home_core.as_usize()].inner.lock();
        inner.unpark(handle);
        if let Some(obj) = inner.objects.get_mut(handle) {
            obj.boost_to_top();
        }
        inner.enqueue(handle);
    }
}

/// Cancel whatever wait or sleep `tid` is currently parked in, distinct from
/// a normal wake: the thread's scheduler object records when the
/// cancellation happened so callers asleep on a condition can tell they were
/// interrupted rather than satisfied. Used by the signal subsystem.
pub fn expedite(tid: ThreadId) {
    let Some((home_core, handle)) = with_thread(tid, |t| (t.home_core, t.sched_handle)) else {
        return;
    };
    let now = platform::current_tick();
    let expedited = CORES[home_core.as_usize()].inner.lock().expedite(handle, now);
    if expedited {
        with_thread_mut(tid, |t| t.state = ThreadState::Ready);
    }
}

/// Block the calling thread until `ms` milliseconds of kernel uptime have
/// passed. Returns `Err(Interrupted)` if an `expedite` cut the sleep short
/// instead of letting the deadline elapse.
pub fn sleep_current(ms: u64) -> Result<(), SchedError> {
    let tid = current_thread_id();
    let Some((home_core, handle)) = with_thread_mut(tid, |t| {
        t.state = ThreadState::Blocked;
        (t.home_core, t.sched_handle)
    }) else {
        return Err(SchedError::NotFound);
    };

    let wake_at = platform::uptime_ms() + ms;
    CORES[home_core.as_usize()].inner.lock().sleep(handle, wake_at);

    while with_thread(tid, |t| t.state == ThreadState::Blocked).unwrap_or(false) {
        yield_now();
    }

    if CORES[home_core.as_usize()].inner.lock().is_timeout(handle) {
        Ok(())
    } else {
        Err(SchedError::Interrupted)
    }
}

/// Whether `tid`'s most recent `sleep_current`/`block` ended because its
/// deadline elapsed, as opposed to an ordinary wake or an `expedite`
/// cancellation. The scheduler downcall named in the external interface;
/// `sync::futex` uses it instead of tracking wait-list membership itself.
pub fn is_timeout(tid: ThreadId) -> bool {
    let Some((home_core, handle)) = with_thread(tid, |t| (t.home_core, t.sched_handle)) else {
        return false;
    };
    CORES[home_core.as_usize()].inner.lock().is_timeout(handle)
}

/// Whether `tid`'s most recent wait was cut short by `expedite` rather than
/// an ordinary wake or a timeout.
pub fn was_expedited(tid: ThreadId) -> bool {
    let Some((home_core, handle)) = with_thread(tid, |t| (t.home_core, t.sched_handle)) else {
        return false;
    };
    CORES[home_core.as_usize()].inner.lock().is_expedited(handle)
}

/// Current feedback level of `tid`'s scheduler object. Diagnostic accessor
/// carried over from the original's per-thread priority reporting.
pub fn queue_level(tid: ThreadId) -> Option<u8> {
    let (home_core, handle) = with_thread(tid, |t| (t.home_core, t.sched_handle))?;
    CORES[home_core.as_usize()].inner.lock().queue_level(handle)
}

/// The core `tid` is bound to.
pub fn affinity(tid: ThreadId) -> Option<CpuId> {
    with_thread(tid, |t| t.home_core)
}

/// Voluntarily give up the CPU via the same interrupt-based switch used for
/// preemption. A no-op before the scheduler is enabled or with interrupts
/// already disabled (we'd have nothing to restore them to).
pub fn yield_now() {
    if !SCHEDULER_ENABLED.load(Ordering::SeqCst) {
        return;
    }
    if !crate::arch::x86_64::interrupts::are_enabled() {
        return;
    }
    unsafe {
        asm!("int 0x81", options(nostack));
    }
}

/// Software interrupt handler for voluntary yields (INT 0x81). Identical to
/// the timer handler below except it needs no end-of-interrupt, since
/// software interrupts never touch the PIC.
#[unsafe(naked)]
pub unsafe extern "C" fn yield_interrupt_handler() {
    core::arch::naked_asm!(
        "push rax",
        "push rbx",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push rbp",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rdi, rsp",
        "xor esi, esi", // preemptive = false: a voluntary yield never demotes
        "call {schedule_fn}",
        "mov rsp, rax",
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
        schedule_fn = sym schedule_from_interrupt,
    )
}

/// Hardware timer interrupt handler (IRQ0, 100Hz). Same register save/switch
/// as the yield handler, plus a PIC end-of-interrupt before returning.
#[unsafe(naked)]
pub unsafe extern "C" fn preemptive_timer_interrupt_handler() {
    core::arch::naked_asm!(
        "push rax",
        "push rbx",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push rbp",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rdi, rsp",
        "mov esi, 1", // preemptive = true: timer exhaustion demotes
        "call {schedule_fn}",
        "mov rsp, rax",
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
        "push rax",
        "mov al, 0x20",
        "out 0x20, al",
        "pop rax",
        "iretq",
        schedule_fn = sym schedule_from_interrupt,
    )
}

/// Called from the naked trampolines with a pointer to the interrupted
/// thread's saved context. Advances the calling core's scheduler and
/// returns a pointer to whichever thread should run next - which may be the
/// one we were just given.
#[unsafe(no_mangle)]
pub extern "C" fn schedule_from_interrupt(
    current_ctx_ptr: *const InterruptContext,
    preemptive: u64,
) -> *const InterruptContext {
    if !SCHEDULER_ENABLED.load(Ordering::SeqCst) {
        crate::utils::timer::on_timer_interrupt();
        return current_ctx_ptr;
    }
    crate::utils::timer::on_timer_interrupt();

    let cpu = platform::current_core_id();
    let now_ms = crate::utils::timer::uptime_ms();
    let prev_tid = current_thread_id();

    if prev_tid.0 != 0 {
        with_thread_mut(prev_tid, |t| {
            t.context = unsafe { *current_ctx_ptr };
            if t.state == ThreadState::Running {
                t.state = ThreadState::Ready;
            }
        });
    }

    let next_handle = match CORES[cpu.as_usize()].inner.lock().advance(now_ms, preemptive != 0) {
        Some(h) => h,
        None => return current_ctx_ptr,
    };
    let next_tid = match CORES[cpu.as_usize()].inner.lock().payload_of(next_handle) {
        Some(tid) => tid,
        None => return current_ctx_ptr,
    };

    CURRENT_THREAD_ID[cpu.as_usize()].store(next_tid.0, Ordering::SeqCst);

    with_thread_mut(next_tid, |t| t.state = ThreadState::Running);

    // Push any pending signal's handler into the context we're about to
    // switch into, the way `signal::deliver` leaves it for a thread that
    // wasn't current when the signal arrived.
    crate::signal::process_queued(next_tid);

    let ctx_ptr = with_thread(next_tid, |t| &t.context as *const InterruptContext);

    ctx_ptr.unwrap_or(current_ctx_ptr)
}
