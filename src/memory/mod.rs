/*
 * Memory management
 *
 * Paging and per-process address spaces are out of scope for this build -
 * every thread runs kernel-mode against the identity mapping BOOTBOOT
 * already set up, so the only thing left at this layer is the heap.
 */

pub mod heap;

pub fn init() {
    heap::init();
}
