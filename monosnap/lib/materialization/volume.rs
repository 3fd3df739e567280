use std::path::PathBuf;

use crate::{materialization::NewSnapshot, MonosnapResult};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A snapshot-capable storage backend that hands out writable volumes.
pub trait VolumeManager {
    /// Allocates an empty volume able to hold at least `min_size` bytes.
    fn allocate_volume(&self, min_size: u64) -> MonosnapResult<Box<dyn VolumeHandle>>;

    /// Opens a new volume seeded with the content of an existing snapshot.
    ///
    /// The returned handle is positioned at `snapshot_id`, so it can be resumed from it directly.
    fn restore_from(&self, snapshot_id: &str) -> MonosnapResult<Box<dyn VolumeHandle>>;
}

/// A writable volume owned by one materialization run.
///
/// ```text
/// allocate/restore ──► writable ──snapshot()──► sealed ──resume_from(id)──► writable
///                          │                                                  │
///                          └──────────────────── destroy() ◄──────────────────┘
/// ```
pub trait VolumeHandle {
    /// Captures the current content as a snapshot tagged with `node`'s rolling hash and returns
    /// the snapshot id. The volume is sealed until it is resumed.
    fn snapshot(&mut self, node: &NewSnapshot) -> MonosnapResult<String>;

    /// Makes the volume writable again on top of `snapshot_id`.
    ///
    /// `snapshot_id` must be the snapshot the volume is currently positioned at; anything else is
    /// rejected with [`MonosnapError::SnapshotMismatch`](crate::MonosnapError::SnapshotMismatch).
    fn resume_from(&mut self, snapshot_id: &str) -> MonosnapResult<()>;

    /// The directory that layers are applied to.
    fn current_path(&self) -> MonosnapResult<PathBuf>;

    /// Releases the volume and everything written to it since the last snapshot.
    fn destroy(&mut self) -> MonosnapResult<()>;
}
