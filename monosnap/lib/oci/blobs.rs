use std::path::{Path, PathBuf};

use typed_builder::TypedBuilder;

use crate::{oci::Digest, utils, MonosnapError, MonosnapResult};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Resolves a layer digest to the blob holding its raw (possibly compressed) tar stream.
pub trait LayerContentProvider {
    /// Returns the path of the blob whose bytes hash to `digest`.
    fn resolve(&self, digest: &Digest) -> MonosnapResult<PathBuf>;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A directory of blobs named by their full digest (`<root>/sha256:<hex>`).
///
/// ```text
/// blobs/
/// ├── sha256:4abcf206...  (layer tar.gz)
/// └── sha256:9f86d081...  (layer tar)
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct BlobDirectory {
    /// The directory holding the blobs.
    #[builder(setter(into))]
    root: PathBuf,

    /// Whether every resolved blob is hashed and checked against its digest.
    #[builder(default)]
    verify: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl BlobDirectory {
    /// Creates a blob directory that trusts its content.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            verify: false,
        }
    }

    /// The directory holding the blobs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path a blob with this digest is stored at.
    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.root.join(digest.to_string())
    }

    fn verify_blob(&self, path: &Path, digest: &Digest) -> MonosnapResult<()> {
        let actual = utils::get_file_hash(path, digest.algorithm())?;
        if actual != digest.bytes() {
            return Err(MonosnapError::DigestMismatch {
                path: path.to_path_buf(),
                expected: digest.to_string(),
                actual: Digest::new(digest.algorithm(), actual).to_string(),
            });
        }

        tracing::debug!("verified blob {}", digest);
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl LayerContentProvider for BlobDirectory {
    fn resolve(&self, digest: &Digest) -> MonosnapResult<PathBuf> {
        let path = self.blob_path(digest);
        if !path.is_file() {
            return Err(MonosnapError::BlobNotFound(digest.to_string()));
        }

        if self.verify {
            self.verify_blob(&path, digest)?;
        }

        Ok(path)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
