/*
 * Scheduler tunables
 *
 * A kernel has no config file at this layer; these are the compile-time
 * constants the multilevel-feedback scheduler is parameterized by, collected
 * in one place the way the teacher's scheduler::types module collects its
 * TimeSliceTicks/Priority constants.
 */

/// Number of feedback levels. Level 0 is the highest priority (newly created
/// and recently-woken threads start here); `LEVEL_LOW` is the lowest and is
/// reserved for the idle object.
pub const LEVEL_COUNT: usize = 6;

/// The highest-priority queue level; boost moves everything back here.
pub const LEVEL_CRITICAL: u8 = 0;

/// The lowest-priority queue level, reserved for idle/background work and
/// excluded from the periodic boost.
pub const LEVEL_LOW: u8 = (LEVEL_COUNT - 1) as u8;

/// Base time slice, in scheduler ticks, granted at level 0.
pub const INITIAL_SLICE_TICKS: u32 = 10;

/// Additional ticks granted per feedback level below 0, per the original
/// formula `slice = INITIAL + level * STEP`.
pub const SLICE_STEP_TICKS: u32 = 2;

/// How often (in ticks) the scheduler boosts every non-idle object back to
/// level 0, preventing starvation of threads demoted by heavy CPU use.
pub const BOOST_INTERVAL_TICKS: u64 = 200;

/// Upper bound on cores this build supports. Only the bootstrap processor is
/// ever actually driven by the concrete x86_64 platform; the rest of the
/// array exists so the scheduler core itself is written generically over
/// more than one core and can be exercised that way in tests.
pub const MAX_CORES: usize = 8;

/// Capacity of a thread's pending-signal ring.
pub const SIGNAL_RING_CAPACITY: usize = 32;

/// Per-thread kernel stack size.
pub const THREAD_STACK_SIZE: usize = 64 * 1024;

/// Per-thread alternate signal stack size, used when a pending signal
/// carries the `SEPARATE_STACK` flag (and always for `execute_local_trap`).
pub const SIGNAL_ALTSTACK_SIZE: usize = 16 * 1024;

pub fn time_slice_for_level(level: u8) -> u32 {
    INITIAL_SLICE_TICKS + (level as u32) * SLICE_STEP_TICKS
}
