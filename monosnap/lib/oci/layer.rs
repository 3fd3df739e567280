use std::fmt;

use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};

use crate::{oci::Digest, MonosnapError, MonosnapResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Media type of an uncompressed docker rootfs diff.
pub const MEDIA_TYPE_TAR: &str = "application/vnd.docker.image.rootfs.diff.tar";

/// Media type of a gzip-compressed docker rootfs diff.
pub const MEDIA_TYPE_TAR_GZIP: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The layer encodings that can be applied to a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerMediaType {
    /// A plain tar stream.
    Tar,

    /// A gzip-compressed tar stream.
    TarGzip,
}

/// Describes one raw layer blob as listed by an image manifest.
///
/// The media type is kept verbatim so that unsupported values survive manifest parsing and are
/// rejected when the layer chain is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, CopyGetters)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    /// The media type string.
    #[getset(get = "pub with_prefix")]
    media_type: String,

    /// The declared size of the blob in bytes.
    #[getset(get_copy = "pub with_prefix")]
    size: u64,

    /// The content digest of the blob.
    #[getset(get = "pub with_prefix")]
    digest: Digest,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LayerMediaType {
    /// Maps a media type string to a supported layer encoding.
    pub fn parse(media_type: &str) -> MonosnapResult<Self> {
        match media_type {
            MEDIA_TYPE_TAR_GZIP => Ok(LayerMediaType::TarGzip),
            MEDIA_TYPE_TAR => Ok(LayerMediaType::Tar),
            other => Err(MonosnapError::UnsupportedMediaType(other.to_string())),
        }
    }

    /// The canonical media type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerMediaType::Tar => MEDIA_TYPE_TAR,
            LayerMediaType::TarGzip => MEDIA_TYPE_TAR_GZIP,
        }
    }
}

impl LayerConfig {
    /// Creates a new layer config.
    pub fn new(digest: Digest, size: u64, media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            size,
            digest,
        }
    }

    /// The supported encoding of this layer, or `UnsupportedMediaType`.
    pub fn layer_media_type(&self) -> MonosnapResult<LayerMediaType> {
        LayerMediaType::parse(&self.media_type)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for LayerMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for LayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.digest, self.size)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
