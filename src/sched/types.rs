/*
 * Small value types shared across the scheduler core.
 */

/// Identifies a logical core. `CpuId::BSP` is the bootstrap processor, the
/// only core the concrete x86_64 platform ever actually drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuId(pub u32);

impl CpuId {
    pub const BSP: CpuId = CpuId(0);

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Handle into a per-core scheduler object slab. Never reused for a
/// different object while any reference to the old one could still be
/// outstanding - the slab generation-tags handles to catch that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchedObjHandle {
    pub index: u32,
    pub generation: u32,
}
