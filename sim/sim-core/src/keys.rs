//! Slot-map keys behind the public handles.
//!
//! Bodies, persistent joints and groups live in [`SlotMap`]s. A public
//! handle is the key's index and version, so converting either way is a
//! repacking and a destroyed object's handle fails the version check.

use sim_types::{BodyId, GroupId, JointId};
use slotmap::{new_key_type, Key as SlotKey, KeyData};

pub(crate) use slotmap::SlotMap;

new_key_type! {
    /// Body storage key.
    pub(crate) struct BodyKey;
    /// Persistent joint storage key.
    pub(crate) struct JointKey;
    /// Group storage key.
    pub(crate) struct GroupKey;
}

/// Conversion between a public handle and its storage key.
pub(crate) trait Handle: Copy {
    type Key: SlotKey;

    fn key(self) -> Self::Key;

    fn from_key(key: Self::Key) -> Self;
}

fn pack(index: u32, version: u32) -> KeyData {
    KeyData::from_ffi((u64::from(version) << 32) | u64::from(index))
}

#[allow(clippy::cast_possible_truncation)]
fn unpack(data: KeyData) -> (u32, u32) {
    let raw = data.as_ffi();
    (raw as u32, (raw >> 32) as u32)
}

impl Handle for BodyId {
    type Key = BodyKey;

    fn key(self) -> BodyKey {
        pack(self.index(), self.generation()).into()
    }

    fn from_key(key: BodyKey) -> Self {
        let (index, version) = unpack(key.data());
        Self::new(index, version)
    }
}

impl Handle for GroupId {
    type Key = GroupKey;

    fn key(self) -> GroupKey {
        pack(self.index(), self.generation()).into()
    }

    fn from_key(key: GroupKey) -> Self {
        let (index, version) = unpack(key.data());
        Self::new(index, version)
    }
}

/// Only meaningful for persistent joints; group joints resolve through
/// their arena.
impl Handle for JointId {
    type Key = JointKey;

    fn key(self) -> JointKey {
        pack(self.index(), self.generation()).into()
    }

    fn from_key(key: JointKey) -> Self {
        let (index, version) = unpack(key.data());
        Self::persistent(index, version)
    }
}
