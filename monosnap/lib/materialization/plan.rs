use std::{fmt, sync::Arc};

use getset::Getters;

use crate::{materialization::Layer, oci::Digest, utils};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A materialization plan.
///
/// Either a snapshot that already exists for some prefix of the layer chain, or a pending group of
/// layers that still has to be written on top of a basis.
#[derive(Debug, Clone)]
pub enum Materialization {
    /// A snapshot that already exists; no work required.
    Existing(ExistingSnapshot),

    /// A group of layers that still needs to be applied and snapshotted.
    New(NewSnapshot),
}

/// A snapshot that already exists for a layer chain prefix.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct ExistingSnapshot {
    /// The backend snapshot identifier.
    #[getset(get = "pub with_prefix")]
    snapshot_id: String,

    /// The rolling hash of the chain prefix this snapshot holds.
    #[getset(get = "pub with_prefix")]
    rolling_hash: Digest,

    /// The cumulative declared size of the chain prefix.
    rolling_size: u64,
}

/// A pending merge group: consecutive layers applied together and captured in one snapshot.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    basis: Option<Box<Materialization>>,
    includes: Vec<Arc<Layer>>,
}

/// One step of a plan, as listed by [`Materialization::steps`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    /// Reuse an existing snapshot.
    Reuse {
        /// The snapshot to start from.
        snapshot_id: String,
    },

    /// Apply a group of layers and snapshot the result.
    Create {
        /// The rolling hash the new snapshot is tagged with.
        rolling_hash: Digest,

        /// The summed size of the layers in the group.
        incremental_size: u64,

        /// The digests and sizes of the layers in the group, oldest first.
        layers: Vec<(Digest, u64)>,
    },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Materialization {
    /// The cumulative size of the image up to and including this plan node.
    pub fn rolling_size(&self) -> u64 {
        match self {
            Materialization::Existing(existing) => existing.rolling_size(),
            Materialization::New(new) => new.rolling_size(),
        }
    }

    /// The rolling hash identifying the layer stack this plan node produces.
    pub fn rolling_hash(&self) -> &Digest {
        match self {
            Materialization::Existing(existing) => existing.get_rolling_hash(),
            Materialization::New(new) => new.rolling_hash(),
        }
    }

    /// Whether the plan needs no work.
    pub fn is_existing(&self) -> bool {
        matches!(self, Materialization::Existing(_))
    }

    /// Lists the plan steps in execution order, oldest group first.
    pub fn steps(&self) -> Vec<PlanStep> {
        let mut steps = Vec::new();
        self.collect_steps(&mut steps);
        steps
    }

    fn collect_steps(&self, steps: &mut Vec<PlanStep>) {
        match self {
            Materialization::Existing(existing) => steps.push(PlanStep::Reuse {
                snapshot_id: existing.snapshot_id.clone(),
            }),
            Materialization::New(new) => {
                if let Some(basis) = new.basis() {
                    basis.collect_steps(steps);
                }

                steps.push(PlanStep::Create {
                    rolling_hash: new.rolling_hash().clone(),
                    incremental_size: new.incremental_size(),
                    layers: new
                        .includes
                        .iter()
                        .map(|layer| (layer.config().get_digest().clone(), layer.size()))
                        .collect(),
                });
            }
        }
    }
}

impl ExistingSnapshot {
    /// Creates a reference to an existing snapshot.
    pub fn new(snapshot_id: impl Into<String>, rolling_hash: Digest, rolling_size: u64) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            rolling_hash,
            rolling_size,
        }
    }

    /// The cumulative declared size of the chain prefix.
    pub fn rolling_size(&self) -> u64 {
        self.rolling_size
    }
}

impl NewSnapshot {
    /// Starts a merge group with a single layer on top of `basis`.
    pub fn new(basis: Option<Materialization>, layer: Arc<Layer>) -> Self {
        Self {
            basis: basis.map(Box::new),
            includes: vec![layer],
        }
    }

    /// Appends a layer to this group, keeping the same basis.
    pub fn with_layer(mut self, layer: Arc<Layer>) -> Self {
        self.includes.push(layer);
        self
    }

    /// The plan node this group is built on, if any.
    pub fn basis(&self) -> Option<&Materialization> {
        self.basis.as_deref()
    }

    /// The layers in this group, oldest first. Never empty.
    pub fn includes(&self) -> &[Arc<Layer>] {
        &self.includes
    }

    /// The summed declared size of the layers in this group.
    pub fn incremental_size(&self) -> u64 {
        self.includes.iter().map(|layer| layer.size()).sum()
    }

    /// The basis size plus the incremental size.
    pub fn rolling_size(&self) -> u64 {
        self.basis().map_or(0, Materialization::rolling_size) + self.incremental_size()
    }

    /// The rolling hash of the chain through the last layer of this group.
    pub fn rolling_hash(&self) -> &Digest {
        // Every group is created with one layer and only ever grows.
        self.includes[self.includes.len() - 1].rolling_hash()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<ExistingSnapshot> for Materialization {
    fn from(existing: ExistingSnapshot) -> Self {
        Materialization::Existing(existing)
    }
}

impl From<NewSnapshot> for Materialization {
    fn from(new: NewSnapshot) -> Self {
        Materialization::New(new)
    }
}

impl fmt::Display for ExistingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [tag={}] {}",
            self.snapshot_id,
            self.rolling_hash,
            utils::human_size(self.rolling_size)
        )
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::Reuse { snapshot_id } => write!(f, "MATERIALIZE {snapshot_id}"),
            PlanStep::Create {
                rolling_hash,
                incremental_size,
                layers,
            } => {
                let layers = layers
                    .iter()
                    .map(|(digest, size)| {
                        format!("{}[{}]", digest.short(8), utils::human_size(*size))
                    })
                    .collect::<Vec<_>>()
                    .join(", ");

                write!(
                    f,
                    "CREATE NEW [tag={}] {} = {}",
                    rolling_hash,
                    utils::human_size(*incremental_size),
                    layers
                )
            }
        }
    }
}

impl fmt::Display for Materialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in self.steps() {
            writeln!(f, " -> {step}")?;
        }
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::oci::{LayerConfig, MEDIA_TYPE_TAR};

    use super::*;

    fn layer(name: &str, size: u64, parent: Option<&Arc<Layer>>) -> anyhow::Result<Arc<Layer>> {
        let config = LayerConfig::new(Digest::sha256(name.as_bytes()), size, MEDIA_TYPE_TAR);
        Ok(Arc::new(Layer::new(config, parent.cloned())?))
    }

    #[test]
    fn test_plan_sizes_and_steps() -> anyhow::Result<()> {
        let a = layer("A", 100, None)?;
        let b = layer("B", 20, Some(&a))?;
        let c = layer("C", 3, Some(&b))?;

        let basis = ExistingSnapshot::new("snap-a", a.rolling_hash().clone(), 100);
        let group = NewSnapshot::new(Some(basis.into()), b.clone()).with_layer(c.clone());
        let plan: Materialization = group.into();

        assert!(!plan.is_existing());
        assert_eq!(plan.rolling_size(), 123);
        assert_eq!(plan.rolling_hash(), c.rolling_hash());

        let steps = plan.steps();
        assert_eq!(
            steps,
            vec![
                PlanStep::Reuse {
                    snapshot_id: "snap-a".to_string()
                },
                PlanStep::Create {
                    rolling_hash: c.rolling_hash().clone(),
                    incremental_size: 23,
                    layers: vec![
                        (b.config().get_digest().clone(), 20),
                        (c.config().get_digest().clone(), 3),
                    ],
                },
            ]
        );

        Ok(())
    }

    #[test]
    fn test_plan_display_lists_steps_oldest_first() -> anyhow::Result<()> {
        let a = layer("A", 2_000_000, None)?;
        let b = layer("B", 500, Some(&a))?;

        let plan: Materialization =
            NewSnapshot::new(Some(NewSnapshot::new(None, a.clone()).into()), b.clone()).into();
        let text = plan.to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(" -> CREATE NEW"));
        assert!(lines[0].contains(&format!("{}[2 MB]", a.config().get_digest().short(8))));
        assert!(lines[1].contains(&format!("[tag={}]", b.rolling_hash())));
        assert!(lines[1].ends_with(&format!("{}[500 B]", b.config().get_digest().short(8))));

        Ok(())
    }
}
