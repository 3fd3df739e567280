use std::{
    fs::{self, File, Metadata, Permissions},
    io,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::{applicator::PermissionGuard, MonosnapError, MonosnapResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Copies the directory tree at `source` into `dest`.
///
/// Directories, regular files and symlinks (as links) are copied with their permission modes and
/// modification times. Other file types are skipped. Source directories and files the owner cannot
/// read are opened up for the duration of the copy and restored afterwards.
pub fn copy_tree(source: &Path, dest: &Path) -> MonosnapResult<()> {
    let mut guard = PermissionGuard::new();
    open_tree(source, &mut guard)?;

    let mut directories: Vec<(PathBuf, Metadata, u32)> = Vec::new();

    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(MonosnapError::custom)?;
        let target = dest.join(relative);

        let metadata = entry.metadata().map_err(io::Error::from)?;
        let mode = guard
            .original_mode(entry.path())
            .unwrap_or_else(|| metadata.permissions().mode());
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            directories.push((target, metadata, mode));
        } else if file_type.is_symlink() {
            std::os::unix::fs::symlink(fs::read_link(entry.path())?, &target)?;
        } else if file_type.is_file() {
            let mut reader = File::open(entry.path())?;
            let mut writer = File::create(&target)?;
            io::copy(&mut reader, &mut writer)?;
            writer.set_modified(metadata.modified()?)?;
            writer.set_permissions(Permissions::from_mode(mode))?;
        } else {
            tracing::debug!("skipping special file {}", entry.path().display());
        }
    }

    // Children first, so a locked directory is only locked once nothing else goes into it.
    for (target, metadata, mode) in directories.iter().rev() {
        File::open(target)?.set_modified(metadata.modified()?)?;
        fs::set_permissions(target, Permissions::from_mode(*mode))?;
    }

    guard.restore_all()?;
    Ok(())
}

/// Makes every directory and file below `root` readable by the owner, recording the changes in
/// `guard`.
fn open_tree(root: &Path, guard: &mut PermissionGuard) -> MonosnapResult<()> {
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        guard.make_writable(&dir)?;

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() && entry.metadata()?.permissions().mode() & 0o400 == 0 {
                guard.make_writable(entry.path())?;
            }
        }
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use tempfile::tempdir;

    use crate::utils;

    use super::*;

    fn mode_of(path: &Path) -> anyhow::Result<u32> {
        Ok(fs::symlink_metadata(path)?.permissions().mode() & 0o777)
    }

    #[test_log::test]
    fn test_copy_tree_preserves_structure_and_metadata() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let source = temp.path().join("source");
        let dest = temp.path().join("dest");

        fs::create_dir_all(source.join("etc/conf.d"))?;
        fs::write(source.join("etc/hosts"), "127.0.0.1 localhost")?;
        fs::write(source.join("etc/conf.d/app.conf"), "key=value")?;
        std::os::unix::fs::symlink("etc/hosts", source.join("hosts"))?;

        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_500_000_000);
        File::options()
            .write(true)
            .open(source.join("etc/hosts"))?
            .set_modified(stamp)?;
        fs::set_permissions(source.join("etc/hosts"), Permissions::from_mode(0o600))?;

        copy_tree(&source, &dest)?;

        assert_eq!(fs::read_to_string(dest.join("etc/hosts"))?, "127.0.0.1 localhost");
        assert_eq!(fs::read_to_string(dest.join("etc/conf.d/app.conf"))?, "key=value");
        assert_eq!(fs::read_link(dest.join("hosts"))?, PathBuf::from("etc/hosts"));
        assert_eq!(mode_of(&dest.join("etc/hosts"))?, 0o600);
        assert_eq!(fs::metadata(dest.join("etc/hosts"))?.modified()?, stamp);

        Ok(())
    }

    #[test_log::test]
    fn test_copy_tree_handles_locked_entries() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let source = temp.path().join("source");
        let dest = temp.path().join("dest");

        fs::create_dir_all(source.join("locked"))?;
        fs::create_dir_all(source.join("ro"))?;
        fs::write(source.join("locked/secret"), "secret")?;
        fs::write(source.join("ro/file"), "ro")?;
        fs::write(source.join("write_only"), "w")?;
        fs::set_permissions(source.join("write_only"), Permissions::from_mode(0o200))?;
        fs::set_permissions(source.join("ro"), Permissions::from_mode(0o555))?;
        fs::set_permissions(source.join("locked"), Permissions::from_mode(0o000))?;

        copy_tree(&source, &dest)?;

        for root in [&source, &dest] {
            assert_eq!(mode_of(&root.join("locked"))?, 0o000);
            assert_eq!(mode_of(&root.join("ro"))?, 0o555);
            assert_eq!(mode_of(&root.join("write_only"))?, 0o200);
        }

        utils::remove_tree(&dest.join("locked"))?;
        utils::remove_tree(&source.join("locked"))?;
        assert_eq!(fs::read_to_string(dest.join("ro/file"))?, "ro");

        utils::remove_tree(&source)?;
        utils::remove_tree(&dest)?;
        Ok(())
    }
}
