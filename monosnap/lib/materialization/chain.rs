use std::{fmt, sync::Arc};

use crate::{
    oci::{Digest, LayerConfig, LayerMediaType},
    MonosnapError, MonosnapResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// One node of a layer chain.
///
/// A layer knows its parent (the layer below it in the manifest) and carries the rolling hash and
/// rolling size of itself plus every ancestor, so the identity of "this exact stack of layers" is
/// available without walking the chain again.
#[derive(Debug)]
pub struct Layer {
    config: LayerConfig,
    media_type: LayerMediaType,
    parent: Option<Arc<Layer>>,
    rolling_hash: Digest,
    rolling_size: u64,
}

/// A layer chain built from a manifest's layer list, base layer first.
#[derive(Debug, Clone)]
pub struct LayerChain {
    layers: Vec<Arc<Layer>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Layer {
    /// Creates a layer on top of `parent`, rejecting unsupported media types.
    ///
    /// The rolling hash of a base layer is its own digest; every other layer chains its digest
    /// onto the parent's rolling hash.
    pub fn new(config: LayerConfig, parent: Option<Arc<Layer>>) -> MonosnapResult<Self> {
        let media_type = config.layer_media_type()?;

        let (rolling_hash, rolling_size) = match &parent {
            Some(parent) => (
                parent.rolling_hash.chain(config.get_digest()),
                parent.rolling_size + config.get_size(),
            ),
            None => (config.get_digest().clone(), config.get_size()),
        };

        Ok(Self {
            config,
            media_type,
            parent,
            rolling_hash,
            rolling_size,
        })
    }

    /// The manifest descriptor of this layer.
    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// The parsed media type of this layer.
    pub fn media_type(&self) -> LayerMediaType {
        self.media_type
    }

    /// The layer directly below this one, if any.
    pub fn parent(&self) -> Option<&Arc<Layer>> {
        self.parent.as_ref()
    }

    /// The chained hash of this layer and all its ancestors.
    pub fn rolling_hash(&self) -> &Digest {
        &self.rolling_hash
    }

    /// The declared size of this layer plus all its ancestors.
    pub fn rolling_size(&self) -> u64 {
        self.rolling_size
    }

    /// The declared size of this layer alone.
    pub fn size(&self) -> u64 {
        self.config.get_size()
    }
}

impl LayerChain {
    /// Builds the chain in manifest order.
    ///
    /// Fails on the first layer with an unsupported media type, and on an empty layer list.
    pub fn build(configs: impl IntoIterator<Item = LayerConfig>) -> MonosnapResult<Self> {
        let mut layers: Vec<Arc<Layer>> = Vec::new();
        for config in configs {
            let parent = layers.last().cloned();
            layers.push(Arc::new(Layer::new(config, parent)?));
        }

        if layers.is_empty() {
            return Err(MonosnapError::EmptyLayerChain);
        }

        Ok(Self { layers })
    }

    /// The layers, base first.
    pub fn layers(&self) -> &[Arc<Layer>] {
        &self.layers
    }

    /// The newest layer.
    pub fn top(&self) -> &Arc<Layer> {
        // `build` rejects empty chains.
        &self.layers[self.layers.len() - 1]
    }

    /// The rolling hash of every layer, base first.
    pub fn rolling_hashes(&self) -> Vec<Digest> {
        self.layers
            .iter()
            .map(|layer| layer.rolling_hash().clone())
            .collect()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::oci::{MEDIA_TYPE_TAR, MEDIA_TYPE_TAR_GZIP};

    use super::*;

    #[test]
    fn test_layer_chain_rolling_hash_is_left_fold() -> anyhow::Result<()> {
        let digests: Vec<Digest> = ["a", "b", "c", "d"]
            .iter()
            .map(|s| Digest::sha256(s.as_bytes()))
            .collect();

        let chain = LayerChain::build(
            digests
                .iter()
                .map(|d| LayerConfig::new(d.clone(), 1, MEDIA_TYPE_TAR_GZIP)),
        )?;

        let expected = digests[1..]
            .iter()
            .fold(digests[0].clone(), |acc, d| acc.chain(d));

        assert_eq!(chain.top().rolling_hash(), &expected);
        assert_eq!(chain.layers()[0].rolling_hash(), &digests[0]);
        assert_eq!(chain.top().rolling_size(), 4);

        Ok(())
    }

    #[test]
    fn test_layer_chain_same_content_different_history() -> anyhow::Result<()> {
        let a = Digest::sha256(b"a");
        let b = Digest::sha256(b"b");
        let c = Digest::sha256(b"c");

        let abc = LayerChain::build([
            LayerConfig::new(a.clone(), 1, MEDIA_TYPE_TAR),
            LayerConfig::new(b.clone(), 1, MEDIA_TYPE_TAR),
            LayerConfig::new(c.clone(), 1, MEDIA_TYPE_TAR),
        ])?;
        let bac = LayerChain::build([
            LayerConfig::new(b, 1, MEDIA_TYPE_TAR),
            LayerConfig::new(a, 1, MEDIA_TYPE_TAR),
            LayerConfig::new(c, 1, MEDIA_TYPE_TAR),
        ])?;

        assert_ne!(abc.top().rolling_hash(), bac.top().rolling_hash());
        Ok(())
    }

    #[test]
    fn test_layer_chain_rejects_bad_input() {
        assert!(matches!(
            LayerChain::build(Vec::new()),
            Err(MonosnapError::EmptyLayerChain)
        ));

        let result = LayerChain::build([
            LayerConfig::new(Digest::sha256(b"a"), 1, MEDIA_TYPE_TAR),
            LayerConfig::new(
                Digest::sha256(b"b"),
                1,
                "application/vnd.oci.image.layer.v1.tar+zstd",
            ),
        ]);
        assert!(matches!(
            result,
            Err(MonosnapError::UnsupportedMediaType(_))
        ));
    }
}
