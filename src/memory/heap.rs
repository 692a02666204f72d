/*
 * Kernel heap allocator
 *
 * Backed by a fixed-size BSS array rather than a dynamically mapped virtual
 * range: BOOTBOOT identity maps all RAM before jumping into the kernel, so
 * kernel statics (this array included) are already mapped and need no
 * paging code of our own to back them.
 */

use linked_list_allocator::LockedHeap;

/// 8 MiB: each thread needs a 64 KiB stack, so this supports roughly a
/// hundred concurrent threads plus the scheduler's own bookkeeping.
pub const HEAP_SIZE: usize = 8 * 1024 * 1024;

static mut HEAP: [u8; HEAP_SIZE] = [0; HEAP_SIZE];

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Must run exactly once, before the first heap allocation.
pub fn init() {
    unsafe {
        #[allow(static_mut_refs)]
        let heap_ptr = HEAP.as_mut_ptr();
        ALLOCATOR.lock().init(heap_ptr, HEAP_SIZE);
    }
    log::info!("kernel heap initialized ({} KiB)", HEAP_SIZE / 1024);
}

#[alloc_error_handler]
fn alloc_error(layout: core::alloc::Layout) -> ! {
    panic!("kernel heap allocation failed: {:?}", layout);
}
