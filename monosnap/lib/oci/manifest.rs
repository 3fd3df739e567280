use std::path::Path;

use getset::Getters;
use serde::{Deserialize, Serialize};

use crate::{
    oci::{Digest, LayerConfig},
    MonosnapResult,
};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Something that can list the layers of an image, base layer first.
pub trait ImageBundle {
    /// The image layers in manifest order (oldest first).
    fn layers(&self) -> Vec<LayerConfig>;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A docker v2 (schema 2) image manifest.
///
/// Only the fields needed to build a layer chain are modelled; unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
#[getset(get = "pub with_prefix")]
pub struct ImageManifest {
    /// The manifest schema version, `2` for docker v2 manifests.
    schema_version: u32,

    /// The manifest media type.
    #[serde(default)]
    media_type: Option<String>,

    /// The image configuration blob.
    config: ConfigDescriptor,

    /// The layer blobs, base layer first.
    layers: Vec<LayerConfig>,
}

/// Descriptor of the image configuration blob.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
#[getset(get = "pub with_prefix")]
pub struct ConfigDescriptor {
    /// The config media type.
    media_type: String,

    /// The config blob size.
    size: u64,

    /// The config blob digest.
    digest: Digest,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ImageManifest {
    /// Parses a manifest from JSON text.
    pub fn from_json(json: &str) -> MonosnapResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a manifest file.
    pub fn from_file(path: impl AsRef<Path>) -> MonosnapResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl ImageBundle for ImageManifest {
    fn layers(&self) -> Vec<LayerConfig> {
        self.layers.clone()
    }
}

impl ImageBundle for Vec<LayerConfig> {
    fn layers(&self) -> Vec<LayerConfig> {
        self.clone()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
