/*
 * Per-level run queues
 *
 * One FIFO per feedback level. Kept as plain VecDeques of handles rather than
 * the intrusive linked lists the original implementation threads through the
 * object itself - the slab already owns the objects, so the queues only need
 * to record membership and order.
 */

use alloc::collections::VecDeque;

use crate::sched::config::LEVEL_COUNT;
use crate::sched::types::SchedObjHandle;

pub struct LevelQueues {
    levels: [VecDeque<SchedObjHandle>; LEVEL_COUNT],
}

impl LevelQueues {
    pub const fn new() -> Self {
        Self {
            levels: [
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
            ],
        }
    }

    pub fn push_back(&mut self, level: u8, handle: SchedObjHandle) {
        self.levels[level as usize].push_back(handle);
    }

    pub fn push_front(&mut self, level: u8, handle: SchedObjHandle) {
        self.levels[level as usize].push_front(handle);
    }

    pub fn pop_front(&mut self, level: u8) -> Option<SchedObjHandle> {
        self.levels[level as usize].pop_front()
    }

    /// Remove a specific handle from wherever it's queued, if present.
    pub fn remove(&mut self, handle: SchedObjHandle) -> bool {
        for level in self.levels.iter_mut() {
            if let Some(pos) = level.iter().position(|h| *h == handle) {
                level.remove(pos);
                return true;
            }
        }
        false
    }

    /// First non-empty level, scanning from the highest priority down.
    pub fn highest_nonempty(&self) -> Option<u8> {
        self.levels
            .iter()
            .position(|q| !q.is_empty())
            .map(|i| i as u8)
    }

    /// Splice every handle from `from` onto the back of `to`, leaving `from`
    /// empty. Used by the periodic boost.
    pub fn drain_into(&mut self, from: u8, to: u8) {
        if from == to {
            return;
        }
        let mut taken = core::mem::take(&mut self.levels[from as usize]);
        self.levels[to as usize].append(&mut taken);
    }

    pub fn is_empty_at(&self, level: u8) -> bool {
        self.levels[level as usize].is_empty()
    }
}
