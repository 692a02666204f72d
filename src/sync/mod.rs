/*
 * Kernel Synchronization Primitives
 *
 * Low-level primitives the scheduler core and the rest of the kernel build
 * blocking behavior on top of: an IRQ-safe spinlock, a futex-style wait word,
 * and a counting semaphore layered on the futex.
 */

pub mod futex;
pub mod semaphore;
pub mod spinlock;

pub use semaphore::Semaphore;
pub use spinlock::IrqSpinlock;

pub fn init() {
    futex::init();
}
