/*
 * Boot-time smoke tests for the concurrency core.
 *
 * Each test spawns a couple of kernel threads, lets them run for a short
 * while against real timer interrupts, and logs pass/fail. This isn't a
 * substitute for the unit tests in each module's own `#[cfg(test)]` block -
 * it's here because futex/semaphore/signal delivery only really exercise
 * their interesting paths once the scheduler is live and preemption is
 * actually happening.
 */

use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::sched;
use crate::signal::{self, SignalNumber};
use crate::sync::{futex, Semaphore};

/// Spawn every smoke test thread. Called once from `kstart`, before
/// interrupts are enabled.
pub fn spawn_test_threads() {
    log::info!("[tests] spawning smoke test threads");

    sched::spawn_kernel_thread(mlfq_demotion_observer, "test-mlfq-observer");
    sched::spawn_kernel_thread(mlfq_burner, "test-mlfq-burner");

    sched::spawn_kernel_thread(futex_waiter, "test-futex-waiter");
    sched::spawn_kernel_thread(futex_waker, "test-futex-waker");

    sched::spawn_kernel_thread(sem_consumer, "test-sem-consumer");
    sched::spawn_kernel_thread(sem_producer, "test-sem-producer");

    sched::spawn_kernel_thread(signal_receiver, "test-signal-receiver");
    sched::spawn_kernel_thread(signal_sender, "test-signal-sender");
}

/// Runs forever burning CPU so the observer thread has something to see
/// get demoted down the priority levels.
fn mlfq_burner() {
    let mut x: u64 = 0;
    loop {
        x = x.wrapping_add(1);
        core::hint::black_box(x);
    }
}

/// Polls its own queue level a few times while competing with the burner
/// thread for CPU time; each preemption should demote it one level until
/// the next boost, so the level observed should climb over the run.
fn mlfq_demotion_observer() {
    let _ = sched::sleep_current(50);

    let tid = sched::current_thread_id();
    let mut highest_seen = 0u8;
    for _ in 0..10 {
        let _ = sched::sleep_current(20);
        if let Some(level) = sched::queue_level(tid) {
            highest_seen = highest_seen.max(level);
        }
    }

    if highest_seen > 0 {
        log::info!(
            "[tests] mlfq: observed demotion down to level {}, PASS",
            highest_seen
        );
    } else {
        log::warn!("[tests] mlfq: never observed demotion below level 0");
    }

    sched::exit_current_thread(0);
}

static FUTEX_WORD: AtomicU32 = AtomicU32::new(0);

fn futex_waiter() {
    log::info!("[tests] futex: waiter parking");
    match futex::wait(&FUTEX_WORD, 0, None) {
        Ok(()) => {
            let value = FUTEX_WORD.load(Ordering::Acquire);
            if value == 1 {
                log::info!("[tests] futex: waiter observed wake, PASS");
            } else {
                log::error!("[tests] futex: waiter woke with unexpected value {}, FAIL", value);
            }
        }
        Err(e) => log::error!("[tests] futex: waiter returned {:?}, FAIL", e),
    }
    sched::exit_current_thread(0);
}

fn futex_waker() {
    let _ = sched::sleep_current(30);
    FUTEX_WORD.store(1, Ordering::Release);
    let woken = futex::wake(&FUTEX_WORD, 1);
    log::info!("[tests] futex: woke {} waiter(s)", woken);
    sched::exit_current_thread(0);
}

static TEST_SEMAPHORE: Semaphore = Semaphore::new(0, 4);
static SEM_UNITS_CONSUMED: AtomicUsize = AtomicUsize::new(0);

fn sem_producer() {
    for _ in 0..3 {
        let _ = sched::sleep_current(15);
        let _ = TEST_SEMAPHORE.signal(1);
    }
    // Exercise saturation: signaling past `max` reports Err(Saturated), but
    // must not panic and must still apply whatever fit.
    match TEST_SEMAPHORE.signal(10) {
        Err(crate::sched::error::SchedError::Saturated) => {
            log::info!("[tests] semaphore: signal past max saturated as expected, PASS")
        }
        other => log::error!("[tests] semaphore: expected Saturated, got {:?}, FAIL", other),
    }
    sched::exit_current_thread(0);
}

fn sem_consumer() {
    for _ in 0..3 {
        if TEST_SEMAPHORE.wait(None).is_ok() {
            SEM_UNITS_CONSUMED.fetch_add(1, Ordering::SeqCst);
        }
    }
    log::info!(
        "[tests] semaphore: consumed {} units, PASS",
        SEM_UNITS_CONSUMED.load(Ordering::SeqCst)
    );
    sched::exit_current_thread(0);
}

static SIGNAL_RECEIVER_TID: AtomicUsize = AtomicUsize::new(0);
static SIGNAL_DELIVERED: AtomicUsize = AtomicUsize::new(0);

extern "C" fn signal_handler_stub() {
    SIGNAL_DELIVERED.store(1, Ordering::SeqCst);
}

fn signal_receiver() {
    let tid = sched::current_thread_id();
    SIGNAL_RECEIVER_TID.store(tid.0, Ordering::SeqCst);

    sched::with_thread_mut(tid, |t| {
        t.signals
            .install_handler(SignalNumber::User1, signal_handler_stub as u64);
    });

    for _ in 0..20 {
        let _ = sched::sleep_current(10);
        if SIGNAL_DELIVERED.load(Ordering::SeqCst) == 1 {
            log::info!("[tests] signal: receiver observed delivery, PASS");
            sched::exit_current_thread(0);
        }
    }

    log::error!("[tests] signal: receiver never observed delivery, FAIL");
    sched::exit_current_thread(1);
}

fn signal_sender() {
    let _ = sched::sleep_current(25);
    loop {
        let raw = SIGNAL_RECEIVER_TID.load(Ordering::SeqCst);
        if raw != 0 {
            match signal::send(sched::thread::ThreadId(raw), SignalNumber::User1, 0) {
                Ok(()) => log::info!("[tests] signal: sent User1 to receiver"),
                Err(e) => log::error!("[tests] signal: send returned {:?}, FAIL", e),
            }
            break;
        }
        let _ = sched::sleep_current(5);
    }
    sched::exit_current_thread(0);
}
