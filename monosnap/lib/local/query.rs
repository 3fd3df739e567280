use std::collections::HashMap;

use crate::{
    local::LocalDirectoryVolumeManager, materialization::SnapshotQueryProvider, oci::Digest,
    MonosnapResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Answers snapshot lookups from the snapshots a [`LocalDirectoryVolumeManager`] has on disk.
#[derive(Debug, Clone)]
pub struct LocalSnapshotQueryProvider {
    volumes: LocalDirectoryVolumeManager,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LocalSnapshotQueryProvider {
    /// Creates a provider probing the snapshots of `volumes`.
    pub fn new(volumes: LocalDirectoryVolumeManager) -> Self {
        Self { volumes }
    }

    /// The volume manager being probed.
    pub fn volumes(&self) -> &LocalDirectoryVolumeManager {
        &self.volumes
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl SnapshotQueryProvider for LocalSnapshotQueryProvider {
    fn lookup(&self, digests: &[Digest]) -> MonosnapResult<HashMap<Digest, String>> {
        let found: HashMap<Digest, String> = digests
            .iter()
            .filter_map(|digest| Some((digest.clone(), self.volumes.snapshot_for(digest)?)))
            .collect();

        tracing::debug!(
            "found {} of {} snapshots in {}",
            found.len(),
            digests.len(),
            self.volumes.root().display()
        );

        Ok(found)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
