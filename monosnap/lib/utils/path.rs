use std::path::{Component, Path, PathBuf};

use crate::{MonosnapError, MonosnapResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Normalizes a tar entry path into a path relative to the volume root.
///
/// Leading `/` and `.` components are dropped. A `..` component anywhere in the path is rejected
/// so an entry can never resolve outside the root. The root itself normalizes to an empty path.
///
/// ## Examples
///
/// ```
/// use std::path::{Path, PathBuf};
/// use monosnap::utils::normalize_entry_path;
///
/// assert_eq!(normalize_entry_path(Path::new("./usr/bin/")).unwrap(), PathBuf::from("usr/bin"));
/// assert_eq!(normalize_entry_path(Path::new("/etc/hosts")).unwrap(), PathBuf::from("etc/hosts"));
/// assert!(normalize_entry_path(Path::new("a/../../etc")).is_err());
/// ```
pub fn normalize_entry_path(path: &Path) -> MonosnapResult<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(MonosnapError::PathEscapesRoot(path.to_path_buf()));
            }
        }
    }

    Ok(normalized)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_entry_path_strips_root_markers() -> anyhow::Result<()> {
        assert_eq!(normalize_entry_path(Path::new("./"))?, PathBuf::new());
        assert_eq!(normalize_entry_path(Path::new("/"))?, PathBuf::new());
        assert_eq!(
            normalize_entry_path(Path::new("./a/./b/.wh.c"))?,
            PathBuf::from("a/b/.wh.c")
        );
        Ok(())
    }

    #[test]
    fn test_normalize_entry_path_rejects_parent_components() {
        for path in ["..", "../etc/passwd", "a/../b", "/a/b/.."] {
            assert!(
                matches!(
                    normalize_entry_path(Path::new(path)),
                    Err(MonosnapError::PathEscapesRoot(_))
                ),
                "{path} should be rejected"
            );
        }
    }
}
