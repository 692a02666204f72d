/*
 * Thread-signal subsystem
 *
 * Each thread owns a mask of currently blocked signals and a small
 * single-producer ring of signals that arrived while blocked (or that simply
 * haven't been drained yet). Delivery is asynchronous: `send` decides
 * whether to deliver now or leave the signal pending, and dispatches the
 * actual delivery work onto the target thread's home core via
 * sched::dispatch so it always runs with that core's scheduler lock free.
 *
 * Ported from the delivery protocol in the original signal.c:
 * ExecuteSignalOnCoreFunction's four cases collapse to two here because this
 * build has no user/kernel mode split - every thread is a kernel thread - so
 * "current thread, user mode" and "remote thread, user mode" both disappear.
 */

use heapless::spsc::Queue;

use crate::sched::config::SIGNAL_RING_CAPACITY;
use crate::sched::thread::ThreadId;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SignalFlags: u32 {
        /// Build the interceptor frame on the thread's alternate signal
        /// stack rather than its current kernel stack.
        const SEPARATE_STACK = 1 << 0;
        /// Delivered on behalf of a hardware trap (e.g. a page fault) rather
        /// than a `send`; carried through so a handler can tell the two
        /// apart.
        const HARDWARE_TRAP  = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalNumber {
    Interrupt,
    Kill,
    Alarm,
    User1,
    User2,
}

impl SignalNumber {
    fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// Trap-class signals delivered to a thread executing kernel code are a
    /// kernel bug, not a recoverable condition - there's no user-mode
    /// fallback path to hand them to.
    fn fatal_in_kernel_mode(self) -> bool {
        matches!(self, SignalNumber::Kill)
    }
}

/// One entry in a thread's pending-signal ring: the signal number plus the
/// argument and delivery flags `send` was called with.
#[derive(Debug, Clone, Copy)]
pub struct PendingSignal {
    pub sig: SignalNumber,
    pub arg: u64,
    pub flags: SignalFlags,
}

pub struct SignalState {
    mask: u32,
    pending: Queue<PendingSignal, SIGNAL_RING_CAPACITY>,
    handler: [Option<u64>; 5],
}

impl SignalState {
    pub const fn new() -> Self {
        Self {
            mask: 0,
            pending: Queue::new(),
            handler: [None; 5],
        }
    }

    pub fn set_mask(&mut self, mask: u32) {
        self.mask = mask;
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    fn is_blocked(&self, sig: SignalNumber) -> bool {
        self.mask & sig.bit() != 0
    }

    fn enqueue(&mut self, pending: PendingSignal) -> bool {
        self.pending.enqueue(pending).is_ok()
    }

    fn dequeue(&mut self) -> Option<PendingSignal> {
        self.pending.dequeue()
    }

    pub fn install_handler(&mut self, sig: SignalNumber, handler_addr: u64) {
        self.handler[sig as usize] = Some(handler_addr);
    }

    fn handler_for(&self, sig: SignalNumber) -> Option<u64> {
        self.handler[sig as usize]
    }
}

/// Send `sig` to `target` with argument `arg`. Always enqueues it, even when
/// this returns `Err(Blocked)` - only whether *immediate* delivery is
/// dispatched depends on the mask. Returns `Err(NotFound)` if `target`
/// doesn't exist.
pub fn send(
    target: ThreadId,
    sig: SignalNumber,
    arg: u64,
) -> Result<(), crate::sched::error::SchedError> {
    let pending = PendingSignal {
        sig,
        arg,
        flags: SignalFlags::empty(),
    };
    let (masked, home_core) = match crate::sched::with_thread_mut(target, |t| {
        let masked = t.signals.is_blocked(sig);
        t.signals.enqueue(pending);
        (masked, t.home_core)
    }) {
        Some(v) => v,
        None => return Err(crate::sched::error::SchedError::NotFound),
    };

    if masked {
        return Err(crate::sched::error::SchedError::Blocked);
    }

    crate::sched::dispatch::queue_on_core(home_core, move || {
        deliver(target, sig);
    });
    Ok(())
}

/// Runs on the target thread's home core, dispatched via queue_on_core.
fn deliver(target: ThreadId, sig: SignalNumber) {
    let is_current = crate::sched::current_thread_id() == target;

    let running_in_kernel_mode = crate::sched::with_thread(target, |t| {
        crate::platform::is_kernel_pc(&t.context)
    })
    .unwrap_or(false);

    if running_in_kernel_mode && sig.fatal_in_kernel_mode() && is_current {
        panic!(
            "fatal signal {:?} delivered to thread {} in kernel mode",
            sig, target
        );
    }

    // Interrupt any wait the target is parked in so it observes the signal
    // promptly rather than whenever its wait condition happens to change.
    crate::sched::expedite(target);

    if is_current {
        process_queued(target);
    }
    // If the target isn't current, the interceptor frame is pushed into its
    // saved context and will run the next time it's scheduled; see
    // process_queued, called again from the scheduler's switch-in path.
}

/// Drain every non-blocked pending signal for `tid`, pushing an interceptor
/// for the first one with an installed handler onto its saved context. Safe
/// to call whenever `tid` is not currently running with its context in
/// flight (i.e. from the scheduler's switch-in hook, or synchronously for
/// the calling thread itself).
pub fn process_queued(tid: ThreadId) {
    let next = crate::sched::with_thread_mut(tid, |t| {
        while let Some(pending) = t.signals.dequeue() {
            if let Some(handler) = t.signals.handler_for(pending.sig) {
                return Some((handler, pending));
            }
            // No handler installed: default action is to drop the signal.
        }
        None
    });

    if let Some((handler, pending)) = next {
        crate::sched::with_thread_mut(tid, |t| {
            let altstack_top = t.altstack.as_ptr() as u64 + t.altstack.len() as u64;
            crate::platform::push_signal_interceptor(
                &mut t.context,
                handler,
                pending.sig as u64,
                pending.arg,
                pending.flags.bits(),
                altstack_top,
            );
        });
    }
}

/// Deliver `sig`/`arg` to the calling thread right now, in place, instead of
/// going through the pending ring - the path a hardware trap (page fault,
/// divide error) takes to hand itself to a user-installed handler on the
/// context the trap interrupted. Panics if no handler for `sig` is
/// installed: an unhandled trap is a kernel bug, not a recoverable
/// condition.
pub fn execute_local_trap(ctx: &mut crate::sched::context::InterruptContext, sig: SignalNumber, arg: u64) {
    let tid = crate::sched::current_thread_id();
    let (handler, altstack_top) = crate::sched::with_thread(tid, |t| {
        (
            t.signals.handler_for(sig),
            t.altstack.as_ptr() as u64 + t.altstack.len() as u64,
        )
    })
    .unwrap_or((None, 0));

    let handler = handler.unwrap_or_else(|| panic!("unhandled hardware trap {:?} in {}", sig, tid));

    let flags = SignalFlags::HARDWARE_TRAP | SignalFlags::SEPARATE_STACK;
    crate::platform::push_signal_interceptor(ctx, handler, sig as u64, arg, flags.bits(), altstack_top);
}

pub fn init() {
    log::info!("signal subsystem initialized");
}
