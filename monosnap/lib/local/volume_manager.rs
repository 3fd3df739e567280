use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    local::copy_tree,
    materialization::{NewSnapshot, VolumeHandle, VolumeManager},
    oci::Digest,
    utils, MonosnapError, MonosnapResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The directory name prefix of working volumes.
pub const VOLUME_PREFIX: &str = "vol-";

/// The directory name prefix of snapshots.
pub const SNAPSHOT_PREFIX: &str = "snap-";

/// The directory name prefix of snapshots that are still being written.
const PARTIAL_PREFIX: &str = ".partial-";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A volume manager that keeps volumes and snapshots as plain directories.
///
/// Snapshots are full copies of the volume, named after the rolling hash of the layer stack they
/// hold, so a snapshot taken once is found again by any later image sharing that stack.
///
/// ```text
/// volumes/
/// ├── snap-4f2a...e1   (snapshot of layers 1..n)
/// ├── snap-9c03...7b   (snapshot of layers 1..m)
/// └── vol-3fa94c1b2d7e8a60  (working volume, removed when the run ends)
/// ```
#[derive(Debug, Clone)]
pub struct LocalDirectoryVolumeManager {
    root: PathBuf,
}

/// A working volume of a [`LocalDirectoryVolumeManager`].
#[derive(Debug)]
pub struct LocalVolume {
    root: PathBuf,
    path: PathBuf,
    position: Option<String>,
    sealed: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LocalDirectoryVolumeManager {
    /// Opens the volume directory at `root`, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> MonosnapResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The directory holding volumes and snapshots.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The snapshot id used for the layer stack with this rolling hash.
    pub fn snapshot_id(rolling_hash: &Digest) -> String {
        format!("{}{}", SNAPSHOT_PREFIX, rolling_hash.hex())
    }

    /// The directory a snapshot is stored in.
    pub fn snapshot_path(&self, snapshot_id: &str) -> PathBuf {
        self.root.join(snapshot_id)
    }

    /// Returns the id of the snapshot holding the layer stack with this rolling hash, if one
    /// exists.
    pub fn snapshot_for(&self, rolling_hash: &Digest) -> Option<String> {
        let snapshot_id = Self::snapshot_id(rolling_hash);
        self.snapshot_path(&snapshot_id)
            .is_dir()
            .then_some(snapshot_id)
    }

    fn create_volume_dir(&self) -> MonosnapResult<PathBuf> {
        loop {
            let path = self.root.join(random_name(VOLUME_PREFIX));
            match fs::create_dir(&path) {
                Ok(()) => return Ok(path),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl LocalVolume {
    /// The volume directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The snapshot the volume is positioned at, if any.
    pub fn position(&self) -> Option<&str> {
        self.position.as_deref()
    }

    /// Whether the volume has been snapshotted and not resumed yet.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn random_name(prefix: &str) -> String {
    format!("{}{}", prefix, hex::encode(rand::random::<[u8; 8]>()))
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl VolumeManager for LocalDirectoryVolumeManager {
    fn allocate_volume(&self, min_size: u64) -> MonosnapResult<Box<dyn VolumeHandle>> {
        let path = self.create_volume_dir()?;
        tracing::debug!(
            "allocated volume {} ({} requested)",
            path.display(),
            utils::human_size(min_size)
        );

        Ok(Box::new(LocalVolume {
            root: self.root.clone(),
            path,
            position: None,
            sealed: false,
        }))
    }

    fn restore_from(&self, snapshot_id: &str) -> MonosnapResult<Box<dyn VolumeHandle>> {
        let snapshot = self.snapshot_path(snapshot_id);
        if !snapshot.is_dir() {
            return Err(MonosnapError::SnapshotNotFound(snapshot_id.to_string()));
        }

        let path = self.create_volume_dir()?;
        if let Err(e) = copy_tree(&snapshot, &path) {
            if let Err(cleanup) = utils::remove_tree(&path) {
                tracing::warn!("failed to remove {}: {}", path.display(), cleanup);
            }
            return Err(e);
        }

        tracing::debug!("restored volume {} from {}", path.display(), snapshot_id);
        Ok(Box::new(LocalVolume {
            root: self.root.clone(),
            path,
            position: Some(snapshot_id.to_string()),
            sealed: false,
        }))
    }
}

impl VolumeHandle for LocalVolume {
    fn snapshot(&mut self, node: &NewSnapshot) -> MonosnapResult<String> {
        if self.sealed {
            return Err(MonosnapError::VolumeSealed(self.path.display().to_string()));
        }

        let snapshot_id = LocalDirectoryVolumeManager::snapshot_id(node.rolling_hash());
        let target = self.root.join(&snapshot_id);
        if target.exists() {
            return Err(MonosnapError::SnapshotExists(snapshot_id));
        }

        // Copied under a hidden name first so a half-written snapshot is never found.
        let partial = self.root.join(random_name(PARTIAL_PREFIX));
        let result = copy_tree(&self.path, &partial).and_then(|_| Ok(fs::rename(&partial, &target)?));
        if let Err(e) = result {
            if let Err(cleanup) = utils::remove_tree(&partial) {
                tracing::warn!("failed to remove {}: {}", partial.display(), cleanup);
            }
            return Err(e);
        }

        tracing::debug!("snapshotted {} as {}", self.path.display(), snapshot_id);
        self.position = Some(snapshot_id.clone());
        self.sealed = true;
        Ok(snapshot_id)
    }

    fn resume_from(&mut self, snapshot_id: &str) -> MonosnapResult<()> {
        if self.position.as_deref() != Some(snapshot_id) {
            return Err(MonosnapError::SnapshotMismatch {
                expected: snapshot_id.to_string(),
                actual: self
                    .position
                    .clone()
                    .unwrap_or_else(|| "<none>".to_string()),
            });
        }

        self.sealed = false;
        tracing::debug!("resumed {} from {}", self.path.display(), snapshot_id);
        Ok(())
    }

    fn current_path(&self) -> MonosnapResult<PathBuf> {
        if self.sealed {
            return Err(MonosnapError::VolumeSealed(self.path.display().to_string()));
        }

        Ok(self.path.clone())
    }

    fn destroy(&mut self) -> MonosnapResult<()> {
        utils::remove_tree(&self.path)?;
        self.sealed = true;
        tracing::debug!("destroyed volume {}", self.path.display());
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::tempdir;

    use crate::{
        materialization::Layer,
        oci::{LayerConfig, MEDIA_TYPE_TAR},
    };

    use super::*;

    fn node(name: &str) -> anyhow::Result<NewSnapshot> {
        let config = LayerConfig::new(Digest::sha256(name.as_bytes()), 1, MEDIA_TYPE_TAR);
        Ok(NewSnapshot::new(None, Arc::new(Layer::new(config, None)?)))
    }

    #[test_log::test]
    fn test_local_volume_lifecycle() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let manager = LocalDirectoryVolumeManager::new(temp.path().join("volumes"))?;
        let node = node("base")?;

        let mut volume = manager.allocate_volume(1024)?;
        let path = volume.current_path()?;
        assert!(path.is_dir());
        fs::write(path.join("hello.txt"), "hello")?;

        let snapshot_id = volume.snapshot(&node)?;
        assert_eq!(
            snapshot_id,
            format!("snap-{}", node.rolling_hash().hex())
        );
        assert_eq!(manager.snapshot_for(node.rolling_hash()), Some(snapshot_id.clone()));
        assert!(matches!(
            volume.current_path(),
            Err(MonosnapError::VolumeSealed(_))
        ));

        volume.resume_from(&snapshot_id)?;
        fs::write(volume.current_path()?.join("scratch.txt"), "scratch")?;
        volume.destroy()?;
        assert!(!path.exists());

        let snapshot = manager.snapshot_path(&snapshot_id);
        assert_eq!(fs::read_to_string(snapshot.join("hello.txt"))?, "hello");
        assert!(!snapshot.join("scratch.txt").exists());

        Ok(())
    }

    #[test_log::test]
    fn test_local_volume_restore_and_resume() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let manager = LocalDirectoryVolumeManager::new(temp.path())?;
        let node = node("base")?;

        let mut volume = manager.allocate_volume(0)?;
        fs::write(volume.current_path()?.join("a"), "a")?;
        let snapshot_id = volume.snapshot(&node)?;
        volume.destroy()?;

        let mut restored = manager.restore_from(&snapshot_id)?;
        assert_eq!(
            fs::read_to_string(restored.current_path()?.join("a"))?,
            "a"
        );

        assert!(matches!(
            restored.resume_from("snap-other"),
            Err(MonosnapError::SnapshotMismatch { .. })
        ));
        restored.resume_from(&snapshot_id)?;

        // The same layer stack can't be snapshotted twice.
        assert!(matches!(
            restored.snapshot(&node),
            Err(MonosnapError::SnapshotExists(_))
        ));
        restored.destroy()?;

        Ok(())
    }

    #[test_log::test]
    fn test_local_volume_rejects_unknown_snapshots() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let manager = LocalDirectoryVolumeManager::new(temp.path())?;

        assert!(matches!(
            manager.restore_from("snap-missing"),
            Err(MonosnapError::SnapshotNotFound(_))
        ));
        assert_eq!(manager.snapshot_for(&Digest::sha256(b"nothing")), None);

        let mut volume = manager.allocate_volume(0)?;
        assert!(matches!(
            volume.resume_from("snap-anything"),
            Err(MonosnapError::SnapshotMismatch { .. })
        ));
        volume.destroy()?;

        Ok(())
    }
}
