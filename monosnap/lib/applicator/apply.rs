use std::{
    fmt,
    fs::{self, File, Permissions},
    io::{self, BufReader, Read},
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use flate2::read::GzDecoder;
use getset::CopyGetters;
use tar::{EntryType, Header};

use crate::{
    applicator::{PermissionGuard, Whiteout},
    materialization::{Layer, NewSnapshot, VolumeHandle},
    oci::{LayerContentProvider, LayerMediaType},
    utils, MonosnapError, MonosnapResult,
};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Writes one layer of a pending snapshot onto a volume.
pub trait LayerApplicator {
    /// Applies `layer`, one of `snapshot`'s included layers, onto the volume's current path.
    fn apply(
        &self,
        snapshot: &NewSnapshot,
        layer: &Layer,
        volume: &dyn VolumeHandle,
    ) -> MonosnapResult<()>;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Applies docker layer diffs (plain or gzip-compressed tar streams) with union-filesystem
/// whiteout handling.
///
/// Layer blobs are looked up through a [`LayerContentProvider`].
#[derive(Debug, Clone)]
pub struct DefaultLayerApplicator<P> {
    content: P,
}

/// Totals for one applied layer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub with_prefix")]
pub struct ApplyStats {
    /// Bytes of regular file content written.
    bytes: u64,

    /// Entries merged into the filesystem.
    merged: u64,

    /// Whiteouts that removed something.
    deletes: u64,
}

/// The state of one layer being applied to a root directory.
struct Application<'a> {
    root: &'a Path,
    layer: String,
    stats: ApplyStats,
    guard: PermissionGuard,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<P> DefaultLayerApplicator<P>
where
    P: LayerContentProvider,
{
    /// Creates an applicator reading layer blobs from `content`.
    pub fn new(content: P) -> Self {
        Self { content }
    }

    /// The layer content provider.
    pub fn content(&self) -> &P {
        &self.content
    }

    /// Applies `layer` onto `root`, creating `root` if it does not exist yet.
    pub fn apply_layer(&self, layer: &Layer, root: &Path) -> MonosnapResult<ApplyStats> {
        let digest = layer.config().get_digest();
        let blob = self.content.resolve(digest)?;
        let file = File::open(&blob).map_err(|e| MonosnapError::layer_handling(e, digest))?;
        let reader = BufReader::new(file);

        let stats = match layer.media_type() {
            LayerMediaType::Tar => apply_archive(reader, root, digest)?,
            LayerMediaType::TarGzip => apply_archive(GzDecoder::new(reader), root, digest)?,
        };

        tracing::info!(
            "{}: wrote {} bytes ({} entries, {} deletes)",
            blob.display(),
            stats.bytes,
            stats.merged,
            stats.deletes
        );

        Ok(stats)
    }
}

impl<'a> Application<'a> {
    fn new(root: &'a Path, layer: String) -> Self {
        Self {
            root,
            layer,
            stats: ApplyStats::default(),
            guard: PermissionGuard::new(),
        }
    }

    fn apply_entry<R: Read>(&mut self, entry: &mut tar::Entry<'_, R>) -> MonosnapResult<()> {
        let raw_path = entry
            .path()
            .map_err(|e| MonosnapError::layer_handling(e, &self.layer))?
            .into_owned();
        let entry_type = entry.header().entry_type();

        if entry_type == EntryType::XGlobalHeader {
            tracing::debug!("skipping pax global header {}", raw_path.display());
            return Ok(());
        }

        let path = utils::normalize_entry_path(&raw_path)?;
        let parent = path.parent().unwrap_or_else(|| Path::new(""));

        match Whiteout::classify(&path) {
            Some(Whiteout::Opaque) => self.delete_children(parent),
            Some(Whiteout::Entry(name)) if name.is_empty() => {
                tracing::debug!("ignoring whiteout without a name: {}", path.display());
                Ok(())
            }
            Some(Whiteout::Entry(name)) => self.delete_entry(&parent.join(name)),
            None => self.merge(entry, &path, entry_type),
        }
    }

    fn merge<R: Read>(
        &mut self,
        entry: &mut tar::Entry<'_, R>,
        path: &Path,
        entry_type: EntryType,
    ) -> MonosnapResult<()> {
        self.stats.merged += 1;

        match entry_type {
            EntryType::Directory => self.merge_directory(entry.header(), path),
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                self.merge_file(entry, path)
            }
            EntryType::Symlink => self.merge_symlink(entry, path),
            EntryType::Link => {
                tracing::debug!("ignoring hard link {}", path.display());
                Ok(())
            }
            EntryType::Block | EntryType::Char => {
                tracing::debug!("skipping device node {}", path.display());
                Ok(())
            }
            EntryType::Fifo => Err(MonosnapError::UnsupportedEntry {
                kind: "fifo".to_string(),
                path: path.to_path_buf(),
            }),
            other => Err(MonosnapError::UnexpectedEntry {
                kind: format!("{:?}", other),
                path: path.to_path_buf(),
            }),
        }
    }

    fn merge_directory(&mut self, header: &Header, path: &Path) -> MonosnapResult<()> {
        let dest = self.resolve(path)?;

        match fs::symlink_metadata(&dest) {
            Ok(metadata) if metadata.is_dir() => self.guard.make_writable(&dest)?,
            Ok(_) => {
                self.open_parent(&dest)?;
                fs::remove_file(&dest)?;
                fs::create_dir(&dest)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.open_parent(&dest)?;
                fs::create_dir(&dest)?;
            }
            Err(e) => return Err(e.into()),
        }

        File::open(&dest)?.set_modified(header_mtime(header, &self.layer)?)?;
        self.guard
            .set_directory_mode(&dest, header_mode(header, &self.layer)?)?;

        tracing::debug!("merged directory {}", path.display());
        Ok(())
    }

    fn merge_file<R: Read>(
        &mut self,
        entry: &mut tar::Entry<'_, R>,
        path: &Path,
    ) -> MonosnapResult<()> {
        let dest = self.resolve(path)?;
        self.ensure_parent(&dest)?;
        self.replace_non_directory(&dest)?;

        let expected = entry.size();
        let mtime = header_mtime(entry.header(), &self.layer)?;
        let mode = header_mode(entry.header(), &self.layer)?;

        let mut file = File::create(&dest)?;
        let copied =
            io::copy(entry, &mut file).map_err(|e| MonosnapError::layer_handling(e, &self.layer))?;
        if copied != expected {
            return Err(MonosnapError::SizeMismatch {
                path: dest,
                expected,
                actual: copied,
            });
        }

        self.stats.bytes += copied;
        file.set_modified(mtime)?;
        file.set_permissions(Permissions::from_mode(mode))?;

        tracing::debug!("merged file {} ({} bytes)", path.display(), copied);
        Ok(())
    }

    fn merge_symlink<R: Read>(
        &mut self,
        entry: &mut tar::Entry<'_, R>,
        path: &Path,
    ) -> MonosnapResult<()> {
        let target = entry
            .link_name()
            .map_err(|e| MonosnapError::layer_handling(e, &self.layer))?
            .ok_or_else(|| MonosnapError::UnexpectedEntry {
                kind: "symlink without target".to_string(),
                path: path.to_path_buf(),
            })?
            .into_owned();

        let dest = self.resolve(path)?;
        self.ensure_parent(&dest)?;
        self.replace_non_directory(&dest)?;
        std::os::unix::fs::symlink(&target, &dest)?;

        tracing::debug!("merged symlink {} -> {}", path.display(), target.display());
        Ok(())
    }

    fn delete_children(&mut self, dir: &Path) -> MonosnapResult<()> {
        let dir = self.resolve_dir(dir)?;
        match fs::symlink_metadata(&dir) {
            Ok(metadata) if metadata.is_dir() => {
                self.guard.make_writable(&dir)?;
                utils::remove_children(&dir)?;
                self.stats.deletes += 1;
                tracing::debug!("cleared opaque directory {}", dir.display());
            }
            _ => tracing::debug!("opaque directory {} does not exist", dir.display()),
        }

        Ok(())
    }

    fn delete_entry(&mut self, path: &Path) -> MonosnapResult<()> {
        let target = self.resolve(path)?;
        self.open_parent(&target)?;

        if utils::remove_tree(&target)? {
            self.stats.deletes += 1;
            tracing::debug!("whited out {}", path.display());
        }

        Ok(())
    }

    /// Joins `path` onto the root, refusing to go through a symlink on the way.
    fn resolve(&self, path: &Path) -> MonosnapResult<PathBuf> {
        let mut current = self.root.to_path_buf();
        let mut components = path.components().peekable();

        while let Some(component) = components.next() {
            current.push(component);
            if components.peek().is_none() {
                break;
            }

            match fs::symlink_metadata(&current) {
                Ok(metadata) if metadata.file_type().is_symlink() => {
                    return Err(MonosnapError::PathEscapesRoot(path.to_path_buf()));
                }
                Ok(_) => {}
                Err(_) => {
                    // Nothing below a missing component can be a symlink.
                    current.extend(components);
                    break;
                }
            }
        }

        Ok(current)
    }

    /// Like [`resolve`](Self::resolve), but the last component may not be a symlink either.
    fn resolve_dir(&self, path: &Path) -> MonosnapResult<PathBuf> {
        let dir = self.resolve(path)?;
        if fs::symlink_metadata(&dir).is_ok_and(|m| m.file_type().is_symlink()) {
            return Err(MonosnapError::PathEscapesRoot(path.to_path_buf()));
        }

        Ok(dir)
    }

    /// Creates the parent of `dest` if it is missing. Only one level is created.
    fn ensure_parent(&mut self, dest: &Path) -> MonosnapResult<()> {
        let Some(parent) = dest.parent() else {
            return Ok(());
        };

        if !fs::symlink_metadata(parent).is_ok_and(|m| m.is_dir()) {
            self.open_parent(parent)?;
            fs::create_dir(parent)?;
        }

        self.guard.make_writable(parent)
    }

    fn open_parent(&mut self, path: &Path) -> MonosnapResult<()> {
        match path.parent() {
            Some(parent) => self.guard.make_writable(parent),
            None => Ok(()),
        }
    }

    fn replace_non_directory(&self, dest: &Path) -> MonosnapResult<()> {
        match fs::symlink_metadata(dest) {
            Ok(metadata) if !metadata.is_dir() => Ok(fs::remove_file(dest)?),
            _ => Ok(()),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Applies an uncompressed tar stream onto `root`, entry by entry in stream order.
///
/// `layer` names the layer in errors and log lines. Directory modes that lock the owner out are
/// deferred until the whole stream has been applied.
pub fn apply_archive(
    reader: impl Read,
    root: &Path,
    layer: impl fmt::Display,
) -> MonosnapResult<ApplyStats> {
    let layer = layer.to_string();
    if !root.exists() {
        fs::create_dir_all(root)?;
    }

    let mut archive = tar::Archive::new(reader);
    let mut application = Application::new(root, layer);

    let entries = archive
        .entries()
        .map_err(|e| MonosnapError::layer_handling(e, &application.layer))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| MonosnapError::layer_handling(e, &application.layer))?;
        application.apply_entry(&mut entry)?;
    }

    application.guard.restore_all()?;
    Ok(application.stats)
}

fn header_mtime(header: &Header, layer: &str) -> MonosnapResult<SystemTime> {
    let secs = header
        .mtime()
        .map_err(|e| MonosnapError::layer_handling(e, layer))?;
    Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
}

fn header_mode(header: &Header, layer: &str) -> MonosnapResult<u32> {
    let mode = header
        .mode()
        .map_err(|e| MonosnapError::layer_handling(e, layer))?;
    Ok(mode & 0o7777)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl<P> LayerApplicator for DefaultLayerApplicator<P>
where
    P: LayerContentProvider,
{
    fn apply(
        &self,
        snapshot: &NewSnapshot,
        layer: &Layer,
        volume: &dyn VolumeHandle,
    ) -> MonosnapResult<()> {
        let root = volume.current_path()?;
        tracing::debug!(
            "applying {} onto {} for {}",
            layer,
            root.display(),
            snapshot.rolling_hash()
        );

        self.apply_layer(layer, &root)?;
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
