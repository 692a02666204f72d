/*
 * Cross-core function dispatch (component F)
 *
 * Queues a closure for execution on a target core, running it locally if
 * we're already there and otherwise appending it to that core's FIFO and
 * nudging it with an inter-processor interrupt. The signal subsystem uses
 * this to deliver a signal to a thread currently running on another core
 * without touching that core's scheduler state directly.
 */

use alloc::boxed::Box;
use alloc::collections::VecDeque;

use crate::platform;
use crate::sched::config::MAX_CORES;
use crate::sched::types::CpuId;
use crate::sync::IrqSpinlock;

type RemoteFn = Box<dyn FnOnce() + Send + 'static>;

struct CoreMailbox {
    pending: IrqSpinlock<VecDeque<RemoteFn>>,
}

impl CoreMailbox {
    const fn new() -> Self {
        Self {
            pending: IrqSpinlock::new(VecDeque::new()),
        }
    }
}

static MAILBOXES: [CoreMailbox; MAX_CORES] = [
    CoreMailbox::new(),
    CoreMailbox::new(),
    CoreMailbox::new(),
    CoreMailbox::new(),
    CoreMailbox::new(),
    CoreMailbox::new(),
    CoreMailbox::new(),
    CoreMailbox::new(),
];

/// Run `f` on `target`. If `target` is the calling core, runs it inline;
/// otherwise queues it and sends an IPI so the target drains its mailbox.
pub fn queue_on_core<F>(target: CpuId, f: F)
where
    F: FnOnce() + Send + 'static,
{
    if target == platform::current_core_id() {
        f();
        return;
    }
    MAILBOXES[target.as_usize()].pending.lock().push_back(Box::new(f));
    platform::send_ipi(target);
}

/// Drain and run every queued function for the calling core. Invoked from
/// the IPI handler.
pub fn drain_local_mailbox() {
    let cpu = platform::current_core_id();
    loop {
        let next = MAILBOXES[cpu.as_usize()].pending.lock().pop_front();
        match next {
            Some(f) => f(),
            None => break,
        }
    }
}
