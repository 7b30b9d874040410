//! Pooled storage for the joints of one constraint group.
//!
//! Records are bump-allocated and never freed one by one. Emptying the arena
//! drops every record at once and advances its epoch; handles carry the epoch
//! they were issued under, so they stop resolving without any per-joint work.

use sim_types::{GroupId, Result, SimError};

use crate::joint::{JointData, JointRecord};

/// Bump arena of joint records with an epoch for O(1) invalidation.
#[derive(Debug, Clone)]
pub struct JointArena {
    group: GroupId,
    records: Vec<JointRecord>,
    used_bytes: usize,
    /// `None` grows without bound.
    capacity: Option<usize>,
    epoch: u32,
}

impl JointArena {
    /// An empty arena. `max_size_hint` is a byte budget; 0 means growable.
    #[must_use]
    pub fn new(group: GroupId, max_size_hint: usize) -> Self {
        Self {
            group,
            records: Vec::new(),
            used_bytes: 0,
            capacity: (max_size_hint > 0).then_some(max_size_hint),
            epoch: 0,
        }
    }

    /// Group this arena belongs to.
    #[must_use]
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Current epoch; handles from earlier epochs are stale.
    #[must_use]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bytes handed out since the last reset.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Bytes still available, `None` for a growable arena.
    #[must_use]
    pub fn available(&self) -> Option<usize> {
        self.capacity.map(|cap| cap.saturating_sub(self.used_bytes))
    }

    /// Allocate `record` and return its slot index.
    pub fn alloc(&mut self, record: JointRecord) -> Result<u32> {
        let needed = JointData::record_size(record.kind());
        if let Some(available) = self.available() {
            if needed > available {
                return Err(SimError::GroupFull {
                    group: self.group.raw(),
                    needed,
                    available,
                });
            }
        }
        let index = u32::try_from(self.records.len())
            .map_err(|_| SimError::invalid_config("group arena index overflow"))?;
        self.records.push(record);
        self.used_bytes += needed;
        Ok(index)
    }

    /// Record at `index` if `epoch` is current.
    #[must_use]
    pub fn get(&self, index: u32, epoch: u32) -> Option<&JointRecord> {
        if epoch != self.epoch {
            return None;
        }
        self.records.get(index as usize)
    }

    /// Mutable record at `index` if `epoch` is current.
    pub fn get_mut(&mut self, index: u32, epoch: u32) -> Option<&mut JointRecord> {
        if epoch != self.epoch {
            return None;
        }
        self.records.get_mut(index as usize)
    }

    /// Live records with their slot indices.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &JointRecord)> {
        (0u32..).zip(self.records.iter())
    }

    /// Mutable access to every live record.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut JointRecord)> {
        (0u32..).zip(self.records.iter_mut())
    }

    /// Drop every record and start a new epoch. Records are `Copy`, so
    /// nothing runs per joint.
    pub fn reset(&mut self) {
        self.records.clear();
        self.used_bytes = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }
}
