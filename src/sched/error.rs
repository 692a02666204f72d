/*
 * Scheduler core error type
 *
 * Fallible scheduler-core operations return this instead of panicking;
 * internal invariant violations (a handle the slab has no record of, a
 * queue that doesn't agree with the object it's supposed to belong to)
 * still panic, the way the teacher's code asserts on "can't happen" kernel
 * state rather than threading a Result through it.
 */

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// Operation not permitted for the object's current state.
    InvalidState,
    /// Referenced thread id does not exist.
    NotFound,
    /// Signal masked by target; enqueued but not delivered immediately.
    Blocked,
    /// Wait expired without fulfillment.
    TimedOut,
    /// Precondition changed before the caller could sleep.
    WouldBlock,
    /// Wait cancelled by expedite rather than fulfilled or timed out.
    Interrupted,
    /// Semaphore already at `max`; partial progress still applied.
    Saturated,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            SchedError::InvalidState => "operation not permitted for current object state",
            SchedError::NotFound => "referenced thread id does not exist",
            SchedError::Blocked => "signal masked by target",
            SchedError::TimedOut => "wait expired without fulfillment",
            SchedError::WouldBlock => "precondition changed before sleep",
            SchedError::Interrupted => "wait cancelled by expedite",
            SchedError::Saturated => "semaphore already at max",
        };
        f.write_str(msg)
    }
}
