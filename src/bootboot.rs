/*
 * BOOTBOOT loader handoff structure
 *
 * The bootloader places this at a fixed address before jumping to `_start`
 * on every core. Only the fields `_start` actually reads (bspid, to tell
 * the bootstrap processor apart from application processors) are needed
 * here - this build has no frame allocator or memory map walk left to
 * ground a fuller reconstruction on, since paging and physical memory
 * management are out of scope.
 */

#[repr(C)]
pub struct BOOTBOOT {
    pub magic: [u8; 4],
    pub size: u32,
    pub protocol: u8,
    pub fb_type: u8,
    pub numcores: u16,
    pub bspid: u16,
    pub timezone: i16,
    pub datetime: [u8; 8],
    pub initrd_ptr: u64,
    pub initrd_size: u64,
    pub fb_ptr: u64,
    pub fb_size: u32,
    pub fb_width: u32,
    pub fb_height: u32,
    pub fb_scanline: u32,
}

unsafe extern "C" {
    #[link_name = "bootboot"]
    pub static bootboot: BOOTBOOT;
}
