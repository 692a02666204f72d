/*
 * Counting Semaphore
 *
 * Built entirely on top of the futex wait word: the count is a plain atomic,
 * and both wait and signal retry against it rather than holding any lock of
 * their own. Ported from the original scheduler's SemaphoreWait/SemaphoreSignal
 * compare-and-retry loops.
 */

use core::sync::atomic::{AtomicU32, Ordering};

use crate::sched::error::SchedError;
use crate::sync::futex;

pub struct Semaphore {
    count: AtomicU32,
    max: u32,
}

impl Semaphore {
    pub const fn new(initial: u32, max: u32) -> Self {
        Self {
            count: AtomicU32::new(initial),
            max,
        }
    }

    /// Acquire one unit, blocking until available or until `timeout`
    /// milliseconds pass (if given). Returns `Err(TimedOut)` if the deadline
    /// elapsed first, or `Err(Interrupted)` if a signal's expedite cut the
    /// wait short instead of a unit becoming available.
    pub fn wait(&self, timeout: Option<u64>) -> Result<(), SchedError> {
        let deadline_ms = timeout.map(|ms| crate::platform::uptime_ms() + ms);
        loop {
            let current = self.count.load(Ordering::Acquire);
            if current == 0 {
                let remaining = match deadline_ms {
                    Some(deadline) => {
                        let now = crate::platform::uptime_ms();
                        if now >= deadline {
                            return Err(SchedError::TimedOut);
                        }
                        Some(deadline - now)
                    }
                    None => None,
                };
                match futex::wait(&self.count, 0, remaining) {
                    Ok(()) | Err(SchedError::WouldBlock) => continue,
                    Err(e) => return Err(e),
                }
            }
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(_) => continue,
            }
        }
    }

    /// Release `units` back to the semaphore, saturating at `max` rather than
    /// erroring past it - a signal that would overflow is a caller bug, but
    /// the units that do fit are still applied and woken before reporting
    /// `Err(Saturated)`, the way the original implementation clamps rather
    /// than rejects the whole call.
    pub fn signal(&self, units: u32) -> Result<(), SchedError> {
        if units == 0 {
            return Ok(());
        }
        let mut saturated = false;
        for _ in 0..units {
            let current = self.count.load(Ordering::Acquire);
            if current >= self.max {
                saturated = true;
                break;
            }
            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    futex::wake(&self.count, 1);
                }
                Err(_) => continue,
            }
        }
        if saturated {
            Err(SchedError::Saturated)
        } else {
            Ok(())
        }
    }

    /// Try to acquire without blocking. Returns true if a unit was taken.
    pub fn try_wait(&self) -> bool {
        loop {
            let current = self.count.load(Ordering::Acquire);
            if current == 0 {
                return false;
            }
            if self
                .count
                .compare_exchange_weak(current, current - 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub fn available(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_wait_takes_a_unit_when_available() {
        let sem = Semaphore::new(1, 1);
        assert!(sem.try_wait());
        assert_eq!(sem.available(), 0);
        assert!(!sem.try_wait(), "no unit left to take");
    }

    #[test]
    fn signal_past_max_saturates_instead_of_overflowing() {
        let sem = Semaphore::new(2, 2);
        assert_eq!(sem.signal(3), Err(SchedError::Saturated));
        assert_eq!(sem.available(), 2, "count must not exceed max");
    }

    #[test]
    fn signal_then_try_wait_round_trips_exactly_n_units() {
        let sem = Semaphore::new(0, 4);
        assert_eq!(sem.signal(3), Ok(()));
        assert_eq!(sem.available(), 3);
        for _ in 0..3 {
            assert!(sem.try_wait());
        }
        assert!(!sem.try_wait());
    }
}
