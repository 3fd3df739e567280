use std::{
    error::Error,
    fmt::{self, Display},
    path::PathBuf,
};
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a monosnap-related operation.
pub type MonosnapResult<T> = Result<T, MonosnapError>;

/// An error that occurred while planning or materializing a layer chain.
#[derive(pretty_error_debug::Debug, Error)]
pub enum MonosnapError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that can represent any error.
    #[error(transparent)]
    Custom(#[from] AnyError),

    /// An I/O error raised while reading or applying a specific layer.
    #[error("failed to handle layer {layer}: {source}")]
    LayerHandling {
        /// The underlying I/O error.
        source: std::io::Error,

        /// The layer digest (or path) being handled.
        layer: String,
    },

    /// A layer declared a media type that is not a docker rootfs tar diff.
    #[error("unsupported layer type: {0}")]
    UnsupportedMediaType(String),

    /// The image has no layers to materialize.
    #[error("layer chain is empty")]
    EmptyLayerChain,

    /// A digest string could not be parsed.
    #[error("invalid digest {digest:?}: {reason}")]
    InvalidDigest {
        /// The offending digest text.
        digest: String,

        /// Why it was rejected.
        reason: String,
    },

    /// The number of bytes copied for a file entry differs from its tar header.
    #[error("size mismatch for {path}: header declares {expected} bytes, copied {actual}")]
    SizeMismatch {
        /// The destination path.
        path: PathBuf,

        /// The size declared by the tar header.
        expected: u64,

        /// The number of bytes actually copied.
        actual: u64,
    },

    /// A tar entry type that is recognised but cannot be applied.
    #[error("unsupported tar entry {kind} at {path}")]
    UnsupportedEntry {
        /// The entry kind.
        kind: String,

        /// The entry path inside the layer.
        path: PathBuf,
    },

    /// A tar entry type that should never appear in a layer diff.
    #[error("unexpected tar entry type {kind} at {path}")]
    UnexpectedEntry {
        /// The raw entry kind.
        kind: String,

        /// The entry path inside the layer.
        path: PathBuf,
    },

    /// A tar entry path that would resolve outside the volume root.
    #[error("entry path escapes the volume root: {0}")]
    PathEscapesRoot(PathBuf),

    /// A blob's content does not hash to its digest.
    #[error("digest mismatch for {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        /// The blob path.
        path: PathBuf,

        /// The expected digest.
        expected: String,

        /// The computed digest.
        actual: String,
    },

    /// A blob could not be found in the layer store.
    #[error("blob not found: {0}")]
    BlobNotFound(String),

    /// A snapshot could not be found by the volume manager.
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    /// A snapshot with the same identifier already exists.
    #[error("snapshot {0} already exists")]
    SnapshotExists(String),

    /// A volume was resumed from a snapshot other than the one it is positioned at.
    #[error("needed snapshot {expected} but volume is at {actual}")]
    SnapshotMismatch {
        /// The snapshot the caller asked to resume from.
        expected: String,

        /// The snapshot the volume is actually positioned at.
        actual: String,
    },

    /// The volume has been snapshotted and must be resumed before it can be written.
    #[error("volume {0} is sealed until it is resumed")]
    VolumeSealed(String),

    /// A manifest could not be parsed.
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// A configuration file could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// A blocking task could not be joined.
    #[error("join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MonosnapError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> MonosnapError {
        MonosnapError::Custom(AnyError {
            error: error.into(),
        })
    }

    /// Wraps an I/O error with the layer it happened on.
    pub fn layer_handling(source: std::io::Error, layer: impl Display) -> MonosnapError {
        MonosnapError::LayerHandling {
            source,
            layer: layer.to_string(),
        }
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `MonosnapResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> MonosnapResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}
