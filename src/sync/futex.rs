/*
 * Futex-style wait word
 *
 * A compare-and-sleep primitive keyed by the address of a memory location.
 * Callers never synchronize on the futex directly; they load the word
 * themselves, decide whether to wait, and hand us the address plus the value
 * they observed so we can detect a concurrent wake racing the sleep.
 *
 * Grounded on the channel-keyed wait queue table in the teacher's
 * scheduler::io_wait, generalized from an enum channel key to a raw address.
 */

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::sched::{self, error::SchedError, thread::ThreadId};
use crate::sync::spinlock::IrqSpinlock;

/// Identifies a wait word by the address of the backing atomic.
pub type FutexKey = usize;

struct WaitQueue {
    waiters: Vec<ThreadId>,
}

impl WaitQueue {
    const fn new() -> Self {
        Self {
            waiters: Vec::new(),
        }
    }
}

static WAIT_QUEUES: IrqSpinlock<BTreeMap<FutexKey, WaitQueue>> = IrqSpinlock::new(BTreeMap::new());

fn key_of(word: &AtomicU32) -> FutexKey {
    word as *const AtomicU32 as usize
}

/// Block the current thread if `*word == expected`, atomically with respect
/// to a concurrent `wake` on the same key.
///
/// Returns `Err(WouldBlock)` immediately if the value had already changed
/// before the caller joined the wait list (the caller should re-check and
/// retry, not treat this as failure). Otherwise blocks until woken, up to
/// `timeout` milliseconds if given. Returns `Err(TimedOut)` if the deadline
/// elapsed first, `Err(Interrupted)` if a signal's `expedite` cut the wait
/// short, or `Ok(())` for an ordinary wake.
pub fn wait(word: &AtomicU32, expected: u32, timeout: Option<u64>) -> Result<(), SchedError> {
    let key = key_of(word);
    let tid = sched::current_thread_id();

    let mut queues = WAIT_QUEUES.lock();
    // Re-check under the queue lock: if the value already changed, a racing
    // wake might have happened before we joined the list, and we must not
    // sleep forever waiting for a wake that already fired.
    if word.load(Ordering::SeqCst) != expected {
        return Err(SchedError::WouldBlock);
    }
    queues
        .entry(key)
        .or_insert_with(WaitQueue::new)
        .waiters
        .push(tid);
    drop(queues);

    let deadline_ms = timeout.map(|ms| crate::platform::uptime_ms() + ms);
    sched::block(tid, deadline_ms);

    // Drop our entry from the wait list regardless of how we woke; a matching
    // `wake` may already have removed it, and that's fine. This is just list
    // hygiene now - the outcome comes from the scheduler's own downcalls.
    let mut queues = WAIT_QUEUES.lock();
    if let Some(q) = queues.get_mut(&key) {
        q.waiters.retain(|&t| t != tid);
        if q.waiters.is_empty() {
            queues.remove(&key);
        }
    }
    drop(queues);

    if sched::is_timeout(tid) {
        Err(SchedError::TimedOut)
    } else if sched::was_expedited(tid) {
        Err(SchedError::Interrupted)
    } else {
        Ok(())
    }
}

/// Wake up to `count` threads waiting on `word`. Returns the number actually
/// woken.
pub fn wake(word: &AtomicU32, count: usize) -> usize {
    let key = key_of(word);
    let mut queues = WAIT_QUEUES.lock();
    let Some(q) = queues.get_mut(&key) else {
        return 0;
    };
    let n = count.min(q.waiters.len());
    let woken: Vec<ThreadId> = q.waiters.drain(..n).collect();
    if q.waiters.is_empty() {
        queues.remove(&key);
    }
    drop(queues);

    for tid in &woken {
        sched::unblock(*tid);
    }
    woken.len()
}

/// Number of threads currently parked on `word`. Diagnostic only.
pub fn waiter_count(word: &AtomicU32) -> usize {
    let key = key_of(word);
    WAIT_QUEUES
        .lock()
        .get(&key)
        .map(|q| q.waiters.len())
        .unwrap_or(0)
}

pub fn init() {
    log::info!("futex wait-queue table initialized");
}
