/*
 * IRQ-disabling Spinlock
 *
 * A spinlock that also saves and restores the interrupt-enable state of the
 * core across the critical section. Ordinary spinlocks are not safe to take
 * from an interrupt handler that might itself be invoked while the same lock
 * is held by non-interrupt code on the same core - that's a self-deadlock.
 * Disabling interrupts for the duration of the critical section closes that
 * window.
 */

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::x86_64::interrupts;

/// Mutual exclusion primitive safe to acquire from both thread context and
/// interrupt handlers on the same core.
pub struct IrqSpinlock<T: ?Sized> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Sync for IrqSpinlock<T> {}
unsafe impl<T: ?Sized + Send> Send for IrqSpinlock<T> {}

pub struct IrqSpinlockGuard<'a, T: ?Sized> {
    lock: &'a IrqSpinlock<T>,
    were_enabled: bool,
}

impl<T> IrqSpinlock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> IrqSpinlock<T> {
    pub fn lock(&self) -> IrqSpinlockGuard<'_, T> {
        let were_enabled = interrupts::are_enabled();
        if were_enabled {
            interrupts::disable();
        }
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        IrqSpinlockGuard {
            lock: self,
            were_enabled,
        }
    }

    pub fn try_lock(&self) -> Option<IrqSpinlockGuard<'_, T>> {
        let were_enabled = interrupts::are_enabled();
        if were_enabled {
            interrupts::disable();
        }
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(IrqSpinlockGuard {
                lock: self,
                were_enabled,
            })
        } else {
            if were_enabled {
                interrupts::enable();
            }
            None
        }
    }
}

impl<'a, T: ?Sized> Deref for IrqSpinlockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T: ?Sized> DerefMut for IrqSpinlockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T: ?Sized> Drop for IrqSpinlockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        if self.were_enabled {
            interrupts::enable();
        }
    }
}
