use std::{
    collections::HashMap,
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use crate::{utils, MonosnapResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Owner read, write and execute bits.
const OWNER_RWX: u32 = 0o700;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Tracks temporary permission changes made to directories while a layer is applied.
///
/// A layer can declare a directory read-only and then carry entries inside it, and a restored
/// snapshot can contain read-only directories that a later layer writes into. The guard opens such
/// directories up for the owner and puts the recorded modes back, newest first, when it is dropped.
#[derive(Debug, Default)]
pub struct PermissionGuard {
    /// Maps paths to the mode they get back on restore.
    original_modes: HashMap<PathBuf, u32>,

    /// Paths in the order they were modified.
    modified_paths: Vec<PathBuf>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PermissionGuard {
    /// Creates a guard that tracks nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes an existing directory readable, writable and searchable by its owner until the guard
    /// drops.
    ///
    /// Missing paths, symlinks and directories that are already writable are left alone.
    pub fn make_writable(&mut self, path: impl AsRef<Path>) -> MonosnapResult<()> {
        let path = path.as_ref();
        if self.original_modes.contains_key(path) {
            return Ok(());
        }

        let Ok(metadata) = fs::symlink_metadata(path) else {
            return Ok(());
        };

        if metadata.file_type().is_symlink() {
            tracing::debug!(
                "skipping permission change for symlink: {}",
                path.display()
            );
            return Ok(());
        }

        let mode = metadata.permissions().mode();
        if mode & OWNER_RWX == OWNER_RWX {
            return Ok(());
        }

        self.open_up(path, mode, mode | OWNER_RWX)
    }

    /// Applies `mode` to a directory the layer is about to fill.
    ///
    /// When `mode` denies the owner access, the directory stays fully accessible for now and gets
    /// `mode` on restore. If the directory is already tracked, `mode` replaces the recorded one.
    pub fn set_directory_mode(&mut self, path: impl AsRef<Path>, mode: u32) -> MonosnapResult<()> {
        let path = path.as_ref();
        if let Some(original) = self.original_modes.get_mut(path) {
            *original = mode;
            return Ok(());
        }

        if mode & OWNER_RWX == OWNER_RWX {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
            return Ok(());
        }

        self.open_up(path, mode, mode | OWNER_RWX)
    }

    /// The mode `path` had before the guard changed it, if the guard changed it.
    pub fn original_mode(&self, path: impl AsRef<Path>) -> Option<u32> {
        self.original_modes.get(path.as_ref()).copied()
    }

    /// Whether any path is waiting to be restored.
    pub fn is_empty(&self) -> bool {
        self.modified_paths.is_empty()
    }

    /// Restores every tracked path, newest first.
    pub fn restore_all(&mut self) -> MonosnapResult<()> {
        while let Some(path) = self.modified_paths.pop() {
            let Some(original_mode) = self.original_modes.remove(&path) else {
                continue;
            };

            // Deleted by a later whiteout.
            let Ok(metadata) = fs::symlink_metadata(&path) else {
                tracing::debug!(
                    "skipping permission restore for deleted path: {}",
                    path.display()
                );
                continue;
            };

            if metadata.file_type().is_symlink() {
                continue;
            }

            if let Err(e) = fs::set_permissions(&path, fs::Permissions::from_mode(original_mode)) {
                tracing::warn!("failed to restore permissions for {}: {}", path.display(), e);
                return Err(e.into());
            }

            tracing::debug!(
                "restored permissions for {}: {} ({:#o})",
                path.display(),
                utils::format_mode(original_mode),
                original_mode
            );
        }

        self.original_modes.clear();
        Ok(())
    }

    fn open_up(&mut self, path: &Path, original: u32, temporary: u32) -> MonosnapResult<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(temporary))?;
        self.original_modes.insert(path.to_path_buf(), original);
        self.modified_paths.push(path.to_path_buf());

        tracing::debug!(
            "opened up {}: {} -> {} ({:#o} -> {:#o})",
            path.display(),
            utils::format_mode(original),
            utils::format_mode(temporary),
            original,
            temporary
        );

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for PermissionGuard {
    fn drop(&mut self) {
        if !self.is_empty() {
            // Errors can't be propagated out of drop.
            if let Err(e) = self.restore_all() {
                tracing::debug!("error during permission restore in drop: {}", e);
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
