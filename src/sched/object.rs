/*
 * Scheduler objects and the slab that owns them
 *
 * The original implementation threads SchedulerObject_t through intrusive
 * linked lists via raw pointers. We keep the same fields but address objects
 * by a generation-tagged handle into a per-core slab instead, so the run
 * queues can be plain index-based FIFOs (VecDeque<SchedObjHandle>) with no
 * unsafe aliasing between the "owns the object" and "is queued" views of it.
 */

use alloc::vec::Vec;

use crate::sched::config::{time_slice_for_level, LEVEL_LOW};
use crate::sched::thread::ThreadId;
use crate::sched::types::{CpuId, SchedObjHandle};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ObjectFlags: u8 {
        /// Pinned to a specific core; never considered by load placement.
        const BOUND = 1 << 0;
        /// The per-core idle object. Never boosted, never counted toward
        /// bandwidth pressure.
        const IDLE  = 1 << 1;
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerObject {
    pub handle: SchedObjHandle,
    pub payload: ThreadId,
    pub affinity: CpuId,
    pub flags: ObjectFlags,
    /// Current feedback level, 0 = highest priority.
    pub queue: u8,
    /// Ticks remaining in the current time slice.
    pub time_slice: u32,
    /// Set while the object sits in the per-core sleep list; milliseconds of
    /// kernel uptime at which it should be requeued.
    pub sleep_until_ms: Option<u64>,
    /// Tick at which the object was last removed from a wait list via
    /// expedite (cancellation) rather than a normal wake, so the caller can
    /// distinguish "woke up because the condition was met" from "woke up
    /// because I was cancelled/timed out".
    pub interrupted_at: Option<u64>,
    /// Set when the object's most recent wait left the waiting list because
    /// its deadline elapsed rather than an ordinary wake or an `expedite`.
    /// Cleared whenever a new sleep/block begins. Backs the scheduler's
    /// `is_timeout` downcall.
    pub woke_by_timeout: bool,
    /// True while the object is linked into one of the per-core run queues.
    pub queued: bool,
}

impl SchedulerObject {
    fn new(handle: SchedObjHandle, payload: ThreadId, affinity: CpuId, flags: ObjectFlags) -> Self {
        let queue = if flags.contains(ObjectFlags::IDLE) {
            LEVEL_LOW
        } else {
            0
        };
        Self {
            handle,
            payload,
            affinity,
            flags,
            queue,
            time_slice: time_slice_for_level(queue),
            sleep_until_ms: None,
            interrupted_at: None,
            woke_by_timeout: false,
            queued: false,
        }
    }

    /// Demote one feedback level (saturating at the idle level) and refresh
    /// the time slice for the new level. Called when a time slice is
    /// exhausted by preemption rather than a voluntary yield or block.
    pub fn demote(&mut self) {
        if self.queue < LEVEL_LOW {
            self.queue += 1;
        }
        self.time_slice = time_slice_for_level(self.queue);
    }

    /// Reset to the highest feedback level. Used by the periodic boost and
    /// when an object becomes runnable again after blocking.
    pub fn boost_to_top(&mut self) {
        if !self.flags.contains(ObjectFlags::IDLE) {
            self.queue = 0;
            self.time_slice = time_slice_for_level(0);
        }
    }
}

struct Slot {
    object: Option<SchedulerObject>,
    generation: u32,
}

/// Handle-indexed storage for a core's scheduler objects.
pub struct ObjectPool {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl ObjectPool {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, payload: ThreadId, affinity: CpuId, flags: ObjectFlags) -> SchedObjHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            let handle = SchedObjHandle {
                index,
                generation: slot.generation,
            };
            slot.object = Some(SchedulerObject::new(handle, payload, affinity, flags));
            handle
        } else {
            let index = self.slots.len() as u32;
            let handle = SchedObjHandle {
                index,
                generation: 0,
            };
            self.slots.push(Slot {
                object: Some(SchedulerObject::new(handle, payload, affinity, flags)),
                generation: 0,
            });
            handle
        }
    }

    pub fn remove(&mut self, handle: SchedObjHandle) -> Option<SchedulerObject> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let obj = slot.object.take();
        if obj.is_some() {
            self.free.push(handle.index);
        }
        obj
    }

    pub fn get(&self, handle: SchedObjHandle) -> Option<&SchedulerObject> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.object.as_ref()
    }

    pub fn get_mut(&mut self, handle: SchedObjHandle) -> Option<&mut SchedulerObject> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.object.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchedulerObject> {
        self.slots.iter().filter_map(|s| s.object.as_ref())
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}
