/*
 * System Timer and Uptime Management
 *
 * Global uptime tracking in milliseconds and scheduler tick counting, driven
 * entirely from the IRQ0 PIT interrupt handler. `sched::mod` reads
 * `uptime_ms`/`scheduler_ticks` from here to drive time-slice accounting and
 * sleep deadlines; this module has no scheduling policy of its own.
 *
 * - PIT frequency: 100Hz (10ms per interrupt)
 * - One scheduler tick per timer interrupt (`TIMER_INTERRUPTS_PER_SCHEDULER_TICK = 1`)
 */

use spin::Mutex;

/// Global uptime counter in milliseconds since boot
static UPTIME_MS: Mutex<u64> = Mutex::new(0);

/// Scheduler tick counter - increments every scheduler quantum
static SCHEDULER_TICKS: Mutex<u64> = Mutex::new(0);

/// How many timer interrupts equal one scheduler tick
/// With 100Hz timer, this gives us ~10ms scheduler quantum
const TIMER_INTERRUPTS_PER_SCHEDULER_TICK: u64 = 1;

/// Internal counter for timer interrupts
static TIMER_INTERRUPT_COUNT: Mutex<u64> = Mutex::new(0);

/// Called from the timer interrupt handler (IRQ0)
/// This should be called exactly once per timer interrupt
pub fn on_timer_interrupt() {
    let mut interrupt_count = TIMER_INTERRUPT_COUNT.lock();
    let mut uptime = UPTIME_MS.lock();

    *interrupt_count += 1;

    // With 100Hz timer, each interrupt represents 10ms
    *uptime += 10;

    // Check if we should trigger a scheduler tick
    if *interrupt_count % TIMER_INTERRUPTS_PER_SCHEDULER_TICK == 0 {
        let mut scheduler_ticks = SCHEDULER_TICKS.lock();
        *scheduler_ticks += 1;

        // Log every 100 scheduler ticks (1 second with current settings)
        if *scheduler_ticks % 100 == 0 {
            log::info!(
                "Scheduler tick: {}, Uptime: {}ms",
                *scheduler_ticks,
                *uptime
            );
        }
    }
}

/// Get current system uptime in milliseconds
pub fn uptime_ms() -> u64 {
    *UPTIME_MS.lock()
}

/// Get current scheduler tick count
pub fn scheduler_ticks() -> u64 {
    *SCHEDULER_TICKS.lock()
}

/// Get total timer interrupt count
pub fn timer_interrupt_count() -> u64 {
    *TIMER_INTERRUPT_COUNT.lock()
}
