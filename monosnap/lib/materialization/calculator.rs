use std::{collections::HashMap, sync::Arc};

use crate::{
    config::DEFAULT_MERGE_THRESHOLD,
    materialization::{ExistingSnapshot, Layer, LayerChain, Materialization, NewSnapshot},
    oci::{Digest, ImageBundle, LayerConfig},
    MonosnapResult,
};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Answers which layer stacks already have a snapshot.
pub trait SnapshotQueryProvider {
    /// Looks up snapshots for a batch of rolling hashes.
    ///
    /// Returns the snapshot id for every hash that has one. Hashes without a snapshot are simply
    /// absent from the map.
    fn lookup(&self, digests: &[Digest]) -> MonosnapResult<HashMap<Digest, String>>;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Plans how a layer chain gets materialized.
///
/// Consecutive layers are grouped into one snapshot while the group is still smaller than the
/// merge threshold, and the newest layer stack that already has a snapshot is reused as is.
#[derive(Debug, Clone, Copy)]
pub struct LayerMergeCalculator {
    merge_threshold: u64,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl LayerMergeCalculator {
    /// Creates a calculator with the given merge threshold in bytes.
    pub fn new(merge_threshold: u64) -> Self {
        Self { merge_threshold }
    }

    /// The merge threshold in bytes.
    pub fn merge_threshold(&self) -> u64 {
        self.merge_threshold
    }

    /// Computes the materialization plan for `layers`, listed base layer first.
    ///
    /// The oracle is queried exactly once, with the rolling hash of every layer in the chain.
    pub fn calculate<Q>(
        &self,
        layers: impl IntoIterator<Item = LayerConfig>,
        oracle: &Q,
    ) -> MonosnapResult<Materialization>
    where
        Q: SnapshotQueryProvider + ?Sized,
    {
        let chain = LayerChain::build(layers)?;
        let wanted = chain.rolling_hashes();

        let mut found = oracle.lookup(&wanted)?;
        found.retain(|digest, _| wanted.contains(digest));
        tracing::debug!(
            "{} of {} layer stacks already have a snapshot",
            found.len(),
            wanted.len()
        );

        let plan = self.materialize(chain.top(), &found);
        tracing::info!(
            "planned {} into {} step(s), rolling size {}",
            plan.rolling_hash(),
            plan.steps().len(),
            plan.rolling_size()
        );

        Ok(plan)
    }

    /// Computes the materialization plan for every layer of `bundle`.
    pub fn calculate_bundle<B, Q>(&self, bundle: &B, oracle: &Q) -> MonosnapResult<Materialization>
    where
        B: ImageBundle + ?Sized,
        Q: SnapshotQueryProvider + ?Sized,
    {
        self.calculate(bundle.layers(), oracle)
    }

    fn materialize(&self, layer: &Arc<Layer>, found: &HashMap<Digest, String>) -> Materialization {
        if let Some(snapshot_id) = found.get(layer.rolling_hash()) {
            return ExistingSnapshot::new(
                snapshot_id.clone(),
                layer.rolling_hash().clone(),
                layer.rolling_size(),
            )
            .into();
        }

        let Some(parent) = layer.parent() else {
            return NewSnapshot::new(None, layer.clone()).into();
        };

        match self.materialize(parent, found) {
            Materialization::New(base) if base.incremental_size() < self.merge_threshold => {
                base.with_layer(layer.clone()).into()
            }
            base => NewSnapshot::new(Some(base), layer.clone()).into(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for LayerMergeCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_MERGE_THRESHOLD)
    }
}

impl SnapshotQueryProvider for HashMap<Digest, String> {
    fn lookup(&self, digests: &[Digest]) -> MonosnapResult<HashMap<Digest, String>> {
        Ok(digests
            .iter()
            .filter_map(|digest| Some((digest.clone(), self.get(digest)?.clone())))
            .collect())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
