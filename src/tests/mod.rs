/*
 * In-kernel test suite
 *
 * Exercises the scheduler, futex, semaphore and signal subsystems from
 * threads spawned at boot. There's no host to report results back to, so
 * pass/fail goes through `log` the same as everything else in this kernel.
 */

pub mod comprehensive;
