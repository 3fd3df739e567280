use std::{ffi::OsStr, os::unix::ffi::OsStrExt, path::Path};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The prefix marking a whiteout entry.
pub const WHITEOUT_PREFIX: &str = ".wh.";

/// The entry name marking its parent directory as opaque.
pub const WHITEOUT_OPAQUE: &str = ".wh..wh..opq";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A deletion marker found in a layer diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whiteout<'a> {
    /// Everything already inside the parent directory is removed.
    Opaque,

    /// The named sibling is removed.
    Entry(&'a OsStr),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<'a> Whiteout<'a> {
    /// Classifies an entry path by its last component.
    ///
    /// Returns `None` for ordinary entries. The opaque marker takes precedence over the plain
    /// whiteout prefix it also starts with.
    pub fn classify(path: &'a Path) -> Option<Self> {
        let name = path.file_name()?;
        let bytes = name.as_bytes();

        if bytes == WHITEOUT_OPAQUE.as_bytes() {
            return Some(Whiteout::Opaque);
        }

        let hidden = bytes.strip_prefix(WHITEOUT_PREFIX.as_bytes())?;
        Some(Whiteout::Entry(OsStr::from_bytes(hidden)))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
