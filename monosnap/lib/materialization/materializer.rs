use scopeguard::ScopeGuard;

use crate::{
    applicator::LayerApplicator,
    materialization::{
        ExistingSnapshot, Materialization, NewSnapshot, VolumeHandle, VolumeManager,
    },
    MonosnapResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Executes materialization plans against a volume backend.
///
/// A whole plan is written through a single working volume: the oldest pending group is applied
/// on a freshly allocated (or restored) volume, snapshotted, and every later group resumes the
/// same volume from the snapshot just taken. The working volume is destroyed once the plan is
/// done, whether it succeeded or not; only the snapshots survive.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotMaterializer;

/// The working volume shared by the nested runs of one materialization.
#[derive(Default)]
struct VolumeContext {
    volume: Option<Box<dyn VolumeHandle>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SnapshotMaterializer {
    /// Materializes `plan` and returns the snapshot holding its full layer stack.
    ///
    /// An existing snapshot is returned unchanged without touching the backend.
    pub fn materialize<V, A>(
        plan: &Materialization,
        volumes: &V,
        applicator: &A,
    ) -> MonosnapResult<ExistingSnapshot>
    where
        V: VolumeManager + ?Sized,
        A: LayerApplicator + ?Sized,
    {
        let node = match plan {
            Materialization::Existing(existing) => return Ok(existing.clone()),
            Materialization::New(node) => node,
        };

        let mut ctx = scopeguard::guard(VolumeContext::default(), |mut ctx| {
            if let Some(mut volume) = ctx.volume.take() {
                if let Err(e) = volume.destroy() {
                    tracing::error!("failed to destroy working volume after error: {}", e);
                }
            }
        });

        let snapshot = Self::materialize_new(node, volumes, applicator, &mut ctx)?;

        let mut ctx = ScopeGuard::into_inner(ctx);
        if let Some(mut volume) = ctx.volume.take() {
            volume.destroy()?;
            tracing::debug!("destroyed working volume");
        }

        Ok(snapshot)
    }

    fn materialize_new<V, A>(
        node: &NewSnapshot,
        volumes: &V,
        applicator: &A,
        ctx: &mut VolumeContext,
    ) -> MonosnapResult<ExistingSnapshot>
    where
        V: VolumeManager + ?Sized,
        A: LayerApplicator + ?Sized,
    {
        let volume = match node.basis() {
            None => ctx.allocate(volumes, node.rolling_size())?,
            Some(Materialization::Existing(basis)) => {
                ctx.resume(volumes, basis.get_snapshot_id())?
            }
            Some(Materialization::New(basis)) => {
                let basis = Self::materialize_new(basis, volumes, applicator, ctx)?;
                ctx.resume(volumes, basis.get_snapshot_id())?
            }
        };

        for layer in node.includes() {
            applicator.apply(node, layer, volume.as_ref())?;
        }

        let snapshot_id = volume.snapshot(node)?;
        tracing::info!(
            "created snapshot {} for {} ({} layer(s))",
            snapshot_id,
            node.rolling_hash(),
            node.includes().len()
        );

        Ok(ExistingSnapshot::new(
            snapshot_id,
            node.rolling_hash().clone(),
            node.rolling_size(),
        ))
    }
}

impl VolumeContext {
    fn allocate<V>(
        &mut self,
        volumes: &V,
        min_size: u64,
    ) -> MonosnapResult<&mut Box<dyn VolumeHandle>>
    where
        V: VolumeManager + ?Sized,
    {
        let volume = volumes.allocate_volume(min_size)?;
        tracing::debug!("allocated working volume for {} bytes", min_size);
        Ok(self.volume.insert(volume))
    }

    /// Continues from `snapshot_id`, reusing the open volume if there is one.
    fn resume<V>(
        &mut self,
        volumes: &V,
        snapshot_id: &str,
    ) -> MonosnapResult<&mut Box<dyn VolumeHandle>>
    where
        V: VolumeManager + ?Sized,
    {
        let volume = match self.volume.take() {
            Some(volume) => volume,
            None => {
                tracing::debug!("restoring working volume from {}", snapshot_id);
                volumes.restore_from(snapshot_id)?
            }
        };

        let volume = self.volume.insert(volume);
        volume.resume_from(snapshot_id)?;
        Ok(volume)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
