use std::{
    fs::{self, File},
    io,
    os::unix::fs::PermissionsExt,
    path::Path,
};

use sha2::{Sha256, Sha384, Sha512};

use crate::{MonosnapError, MonosnapResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Gets the hash of a file using the named digest algorithm.
///
/// Supported algorithms are `sha256`, `sha384` and `sha512`.
pub fn get_file_hash(path: &Path, algorithm: &str) -> MonosnapResult<Vec<u8>> {
    let mut file = File::open(path)?;

    let hash = match algorithm {
        "sha256" => hash_reader::<Sha256>(&mut file)?,
        "sha384" => hash_reader::<Sha384>(&mut file)?,
        "sha512" => hash_reader::<Sha512>(&mut file)?,
        _ => {
            return Err(MonosnapError::InvalidDigest {
                digest: path.display().to_string(),
                reason: format!("unsupported algorithm: {algorithm}"),
            });
        }
    };

    Ok(hash)
}

/// Removes a file, symlink or directory tree without following symlinks.
///
/// Directories inside the tree are made owner-accessible first, so trees holding read-only
/// directories can be removed without elevated privileges. Returns whether anything was removed.
pub fn remove_tree(path: &Path) -> MonosnapResult<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_dir() {
        fs::remove_file(path)?;
        return Ok(true);
    }

    make_tree_accessible(path)?;
    fs::remove_dir_all(path)?;
    Ok(true)
}

/// Removes everything inside `dir` but keeps `dir` itself.
///
/// `dir` has to be readable and writable by the caller.
pub fn remove_children(dir: &Path) -> MonosnapResult<()> {
    for entry in fs::read_dir(dir)? {
        remove_tree(&entry?.path())?;
    }

    Ok(())
}

fn make_tree_accessible(root: &Path) -> MonosnapResult<()> {
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mode = fs::symlink_metadata(&dir)?.permissions().mode();
        if mode & 0o700 != 0o700 {
            fs::set_permissions(&dir, fs::Permissions::from_mode(mode | 0o700))?;
        }

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                stack.push(entry.path());
            }
        }
    }

    Ok(())
}

fn hash_reader<D>(reader: &mut impl io::Read) -> io::Result<Vec<u8>>
where
    D: sha2::Digest + io::Write,
{
    let mut hasher = D::new();
    io::copy(reader, &mut hasher)?;
    Ok(hasher.finalize().to_vec())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
