/*
 * Per-core multilevel-feedback scheduler
 *
 * One instance per core, each guarded by its own IRQ spinlock so a timer
 * interrupt landing on core N never contends with core M's scheduling
 * decision. Implements the advance() algorithm transcribed from the
 * original scheduler.c: account the running object's time slice, age the
 * sleep list, periodically boost everything back to the top level, then
 * pick the next object to run by scanning levels from highest to lowest
 * priority.
 */

use alloc::vec::Vec;

use crate::sched::config::{time_slice_for_level, BOOST_INTERVAL_TICKS, LEVEL_LOW};
use crate::sched::object::{ObjectFlags, ObjectPool};
use crate::sched::queue::LevelQueues;
use crate::sched::thread::ThreadId;
use crate::sched::types::{CpuId, SchedObjHandle};
use crate::sync::IrqSpinlock;

pub struct PerCoreSchedulerInner {
    pub objects: ObjectPool,
    queues: LevelQueues,
    /// Objects off any run queue, waiting either for a deadline
    /// (`sleep_until_ms = Some`, a timed sleep or a timed block) or
    /// indefinitely for an explicit `unpark`/`expedite`
    /// (`sleep_until_ms = None`, an untimed futex/semaphore wait). Both
    /// share one list since both leave it the same two ways: the deadline
    /// elapsing, or the waiter being pulled out early.
    waiting: Vec<SchedObjHandle>,
    pub current: Option<SchedObjHandle>,
    pub idle: Option<SchedObjHandle>,
    total_ticks: u64,
    last_boost_tick: u64,
}

impl PerCoreSchedulerInner {
    const fn new() -> Self {
        Self {
            objects: ObjectPool::new(),
            queues: LevelQueues::new(),
            waiting: Vec::new(),
            current: None,
            idle: None,
            total_ticks: 0,
            last_boost_tick: 0,
        }
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Register a new scheduler object (already inserted into `objects`) as
    /// runnable at its current level.
    pub fn enqueue(&mut self, handle: SchedObjHandle) {
        if let Some(obj) = self.objects.get_mut(handle) {
            if !obj.queued {
                obj.queued = true;
                let level = obj.queue;
                self.queues.push_back(level, handle);
            }
        }
    }

    /// Remove an object from whichever run queue holds it (used for
    /// blocking and for expedited cancellation). Returns true if it was
    /// found queued.
    pub fn dequeue(&mut self, handle: SchedObjHandle) -> bool {
        let removed = self.queues.remove(handle);
        if removed {
            if let Some(obj) = self.objects.get_mut(handle) {
                obj.queued = false;
            }
        }
        removed
    }

    /// Put an object to sleep until `wake_at_ms` (absolute kernel uptime).
    pub fn sleep(&mut self, handle: SchedObjHandle, wake_at_ms: u64) {
        self.park(handle, Some(wake_at_ms));
    }

    /// Park an object off its run queue, waiting on `deadline_ms` if given
    /// or indefinitely otherwise (a futex or semaphore wait with no
    /// timeout). Clears any stale wake bookkeeping left over from a
    /// previous wait so the next `is_timeout`/`is_expedited` query reflects
    /// only this wait.
    pub fn park(&mut self, handle: SchedObjHandle, deadline_ms: Option<u64>) {
        self.dequeue(handle);
        if let Some(obj) = self.objects.get_mut(handle) {
            obj.sleep_until_ms = deadline_ms;
            obj.interrupted_at = None;
            obj.woke_by_timeout = false;
        }
        self.waiting.push(handle);
        if self.current == Some(handle) {
            self.current = None;
        }
    }

    /// Remove an object from the waiting list (a normal wake via `unblock`).
    /// Returns true if it was there.
    pub fn unpark(&mut self, handle: SchedObjHandle) -> bool {
        let before = self.waiting.len();
        self.waiting.retain(|h| *h != handle);
        self.waiting.len() != before
    }

    /// Expedite (cancel) a waiting or queued object: pull it out immediately
    /// and mark when the cancellation happened, distinguishing it from a
    /// normal wake/timeout for the caller (used by the signal subsystem to
    /// interrupt a blocked thread).
    pub fn expedite(&mut self, handle: SchedObjHandle, at_tick: u64) -> bool {
        let was_waiting = self.unpark(handle);
        let was_queued = self.dequeue(handle);

        if !was_waiting && !was_queued {
            return false;
        }
        if let Some(obj) = self.objects.get_mut(handle) {
            obj.sleep_until_ms = None;
            obj.interrupted_at = Some(at_tick);
            obj.woke_by_timeout = false;
            obj.boost_to_top();
        }
        self.enqueue(handle);
        true
    }

    /// Age the waiting list against the current uptime, moving every object
    /// whose deadline has passed back onto a run queue at the top level.
    /// Objects with no deadline (`sleep_until_ms == None`) stay until an
    /// explicit `unpark`/`expedite` removes them.
    fn update_waiting_queue(&mut self, now_ms: u64) {
        let mut still_waiting = Vec::with_capacity(self.waiting.len());
        for handle in self.waiting.drain(..) {
            let due = self
                .objects
                .get(handle)
                .map(|o| matches!(o.sleep_until_ms, Some(deadline) if now_ms >= deadline))
                .unwrap_or(true);
            if due {
                if let Some(obj) = self.objects.get_mut(handle) {
                    obj.sleep_until_ms = None;
                    obj.woke_by_timeout = true;
                    obj.boost_to_top();
                }
                self.enqueue(handle);
            } else {
                still_waiting.push(handle);
            }
        }
        self.waiting = still_waiting;
    }

    /// Splice every non-idle level above LEVEL_LOW back onto level 0. Run
    /// periodically so a thread demoted by heavy CPU use can't starve
    /// forever behind newer arrivals.
    fn boost(&mut self) {
        for level in 1..LEVEL_LOW {
            self.queues.drain_into(level, 0);
        }
        // Every handle that moved needs its own `queue`/`time_slice` fields
        // brought in line with its new position, or the next demotion would
        // compute the wrong slice.
        for obj in self.objects.iter().map(|o| o.handle).collect::<Vec<_>>() {
            if let Some(o) = self.objects.get_mut(obj) {
                if o.queued && o.queue != 0 && !o.flags.contains(ObjectFlags::IDLE) {
                    o.queue = 0;
                    o.time_slice = time_slice_for_level(0);
                }
            }
        }
    }

    /// One scheduler tick: account the currently running object, age
    /// waiters, boost if due, then pick the next object to run.
    ///
    /// `preemptive` distinguishes a timer-driven call (IRQ0) from a
    /// voluntary yield (INT 0x81): only a preemptive call that exhausts the
    /// current object's time slice demotes it a level. A voluntary yield
    /// always keeps the object at its current level, re-enqueued behind any
    /// other ready work.
    ///
    /// Returns the handle that should run next (may be the same as before).
    pub fn advance(&mut self, now_ms: u64, preemptive: bool) -> Option<SchedObjHandle> {
        self.total_ticks += 1;

        if let Some(cur) = self.current {
            let mut demoted = false;
            if preemptive {
                if let Some(obj) = self.objects.get_mut(cur) {
                    if obj.time_slice > 0 {
                        obj.time_slice -= 1;
                    }
                    if obj.time_slice == 0 && !obj.flags.contains(ObjectFlags::IDLE) {
                        obj.demote();
                        demoted = true;
                    }
                }
            }
            // Fast path: nothing else is runnable, so there's no point
            // dequeuing/requeuing the current object just to hand it back
            // to itself.
            if !demoted && self.queues.highest_nonempty().is_none() {
                self.update_waiting_queue(now_ms);
                if self.queues.highest_nonempty().is_none() {
                    return self.current;
                }
            }
            self.enqueue(cur);
        }

        self.update_waiting_queue(now_ms);

        if self.total_ticks - self.last_boost_tick >= BOOST_INTERVAL_TICKS {
            self.boost();
            self.last_boost_tick = self.total_ticks;
        }

        let next = self
            .queues
            .highest_nonempty()
            .and_then(|level| self.queues.pop_front(level))
            .or(self.idle);

        if let Some(handle) = next {
            if let Some(obj) = self.objects.get_mut(handle) {
                obj.queued = false;
            }
        }
        self.current = next;
        next
    }

    pub fn queue_level(&self, handle: SchedObjHandle) -> Option<u8> {
        self.objects.get(handle).map(|o| o.queue)
    }

    /// Whether `handle`'s most recent wait ended because its deadline
    /// elapsed, as opposed to an ordinary wake or an `expedite`
    /// cancellation. Re-queryable (unlike the consuming accessor it
    /// replaced): callers can check it any number of times after the wait
    /// returns.
    pub fn is_timeout(&self, handle: SchedObjHandle) -> bool {
        self.objects.get(handle).map(|o| o.woke_by_timeout).unwrap_or(false)
    }

    /// Whether `handle`'s most recent wait was cut short by `expedite`
    /// rather than an ordinary wake or a timeout.
    pub fn is_expedited(&self, handle: SchedObjHandle) -> bool {
        self.objects.get(handle).map(|o| o.interrupted_at.is_some()).unwrap_or(false)
    }

    pub fn payload_of(&self, handle: SchedObjHandle) -> Option<ThreadId> {
        self.objects.get(handle).map(|o| o.payload)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

pub struct PerCoreScheduler {
    pub cpu: CpuId,
    pub inner: IrqSpinlock<PerCoreSchedulerInner>,
}

impl PerCoreScheduler {
    pub const fn new(cpu: CpuId) -> Self {
        Self {
            cpu,
            inner: IrqSpinlock::new(PerCoreSchedulerInner::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::config::BOOST_INTERVAL_TICKS;

    fn bound(tid: usize) -> ThreadId {
        ThreadId(tid)
    }

    #[test]
    fn cpu_bound_threads_demote_toward_level_low() {
        let mut inner = PerCoreSchedulerInner::new();
        let idle = inner.objects.insert(bound(0), CpuId(0), ObjectFlags::IDLE);
        inner.idle = Some(idle);
        let a = inner.objects.insert(bound(1), CpuId(0), ObjectFlags::empty());
        inner.enqueue(a);
        inner.current = inner.advance(0, true);
        assert_eq!(inner.current, Some(a));

        for tick in 1..=200u64 {
            inner.current = inner.advance(tick, true);
        }

        let level = inner.queue_level(a).unwrap();
        assert!(level > 0, "thread never demoted after sustained CPU use");
    }

    #[test]
    fn voluntary_yield_never_demotes() {
        let mut inner = PerCoreSchedulerInner::new();
        let idle = inner.objects.insert(bound(0), CpuId(0), ObjectFlags::IDLE);
        inner.idle = Some(idle);
        let a = inner.objects.insert(bound(1), CpuId(0), ObjectFlags::empty());
        inner.enqueue(a);
        inner.current = inner.advance(0, true);

        for tick in 1..=200u64 {
            inner.current = inner.advance(tick, false);
        }

        assert_eq!(
            inner.queue_level(a),
            Some(0),
            "a voluntary yield must never demote, only a preemptive timeout"
        );
    }

    #[test]
    fn boost_resets_demoted_threads_to_level_zero() {
        let mut inner = PerCoreSchedulerInner::new();
        let idle = inner.objects.insert(bound(0), CpuId(0), ObjectFlags::IDLE);
        inner.idle = Some(idle);
        let a = inner.objects.insert(bound(1), CpuId(0), ObjectFlags::empty());
        inner.enqueue(a);
        inner.current = inner.advance(0, true);

        for tick in 1..BOOST_INTERVAL_TICKS {
            inner.current = inner.advance(tick, true);
        }
        assert!(inner.queue_level(a).unwrap() > 0);

        inner.current = inner.advance(BOOST_INTERVAL_TICKS, true);
        assert_eq!(inner.queue_level(a), Some(0), "boost failed to restore level 0");
    }

    #[test]
    fn equal_level_threads_are_selected_in_fifo_order() {
        let mut inner = PerCoreSchedulerInner::new();
        let idle = inner.objects.insert(bound(0), CpuId(0), ObjectFlags::IDLE);
        inner.idle = Some(idle);

        let a = inner.objects.insert(bound(1), CpuId(0), ObjectFlags::empty());
        let b = inner.objects.insert(bound(2), CpuId(0), ObjectFlags::empty());
        let c = inner.objects.insert(bound(3), CpuId(0), ObjectFlags::empty());
        inner.enqueue(a);
        inner.enqueue(b);
        inner.enqueue(c);

        // All three ready at level 0; dispatch order must match insertion
        // order, not slab index or any other incidental ordering.
        let first = inner.advance(0, true);
        inner.current = first;
        assert_eq!(first, Some(a));
    }

    #[test]
    fn expedite_pulls_a_parked_object_out_immediately() {
        let mut inner = PerCoreSchedulerInner::new();
        let idle = inner.objects.insert(bound(0), CpuId(0), ObjectFlags::IDLE);
        inner.idle = Some(idle);
        let a = inner.objects.insert(bound(1), CpuId(0), ObjectFlags::empty());
        inner.enqueue(a);
        inner.park(a, None);

        let expedited = inner.expedite(a, 5);
        assert!(expedited, "expedite must find an object parked via block()");
        assert!(inner.objects.get(a).unwrap().queued);
        assert!(!inner.is_timeout(a));
    }

    #[test]
    fn expedite_pulls_a_sleeping_object_out_immediately() {
        let mut inner = PerCoreSchedulerInner::new();
        let idle = inner.objects.insert(bound(0), CpuId(0), ObjectFlags::IDLE);
        inner.idle = Some(idle);
        let a = inner.objects.insert(bound(1), CpuId(0), ObjectFlags::empty());
        inner.sleep(a, 50);

        let expedited = inner.expedite(a, 20);
        assert!(expedited);
        assert_eq!(
            inner.objects.get(a).unwrap().interrupted_at,
            Some(20),
            "expedite must record when the cancellation happened"
        );
        assert!(inner.objects.get(a).unwrap().queued);
        assert!(inner.is_expedited(a));
        assert!(!inner.is_timeout(a));
    }

    #[test]
    fn parking_the_current_object_clears_it_so_advance_does_not_resurrect_it() {
        let mut inner = PerCoreSchedulerInner::new();
        let idle = inner.objects.insert(bound(0), CpuId(0), ObjectFlags::IDLE);
        inner.idle = Some(idle);
        let a = inner.objects.insert(bound(1), CpuId(0), ObjectFlags::empty());
        inner.enqueue(a);
        inner.current = inner.advance(0, true);
        assert_eq!(inner.current, Some(a));

        // `a` blocks itself on a futex/semaphore wait with no deadline.
        inner.park(a, None);
        assert_eq!(inner.current, None, "park must clear the stale current pointer");

        // The parked thread's own busy-wait yield drives another advance();
        // with nothing else runnable this must hand back the idle object,
        // never re-enqueue `a` while it's still parked.
        let next = inner.advance(1, false);
        assert_eq!(next, Some(idle));
        assert!(!inner.objects.get(a).unwrap().queued, "a parked object must not be re-queued");
    }

    #[test]
    fn a_timed_wait_reports_is_timeout_when_its_deadline_elapses() {
        let mut inner = PerCoreSchedulerInner::new();
        let idle = inner.objects.insert(bound(0), CpuId(0), ObjectFlags::IDLE);
        inner.idle = Some(idle);
        let a = inner.objects.insert(bound(1), CpuId(0), ObjectFlags::empty());
        inner.current = inner.advance(0, true);
        inner.park(a, Some(10));

        inner.current = inner.advance(10, true);
        assert!(inner.is_timeout(a), "deadline elapsed, must report timeout");
        assert!(!inner.is_expedited(a));
    }
}
