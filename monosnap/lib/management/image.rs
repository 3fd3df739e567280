//! Planning and materializing images with the local directory backend.

use std::path::{Path, PathBuf};

use crate::{
    applicator::DefaultLayerApplicator,
    config::MonosnapConfig,
    local::{LocalDirectoryVolumeManager, LocalSnapshotQueryProvider},
    materialization::{ExistingSnapshot, LayerMergeCalculator, Materialization, SnapshotMaterializer},
    oci::{BlobDirectory, ImageManifest},
    MonosnapResult,
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Calculates the materialization plan for the image described by `manifest`.
///
/// Snapshots already present in the configured volumes directory are reused. Nothing is written.
pub async fn plan_image(
    config: &MonosnapConfig,
    manifest: impl Into<PathBuf>,
) -> MonosnapResult<Materialization> {
    let config = config.clone();
    let manifest = manifest.into();
    tokio::task::spawn_blocking(move || plan_image_blocking(&config, &manifest)).await?
}

/// Materializes the image described by `manifest` and returns the snapshot holding all of its
/// layers.
///
/// Layer blobs are read from the configured blobs directory and snapshots are written to the
/// configured volumes directory.
pub async fn materialize_image(
    config: &MonosnapConfig,
    manifest: impl Into<PathBuf>,
) -> MonosnapResult<ExistingSnapshot> {
    let config = config.clone();
    let manifest = manifest.into();
    tokio::task::spawn_blocking(move || materialize_image_blocking(&config, &manifest)).await?
}

fn plan_image_blocking(config: &MonosnapConfig, manifest: &Path) -> MonosnapResult<Materialization> {
    let image = ImageManifest::from_file(manifest)?;
    let volumes = LocalDirectoryVolumeManager::new(config.volumes_path())?;
    let oracle = LocalSnapshotQueryProvider::new(volumes);

    LayerMergeCalculator::new(config.get_merge_threshold()).calculate_bundle(&image, &oracle)
}

fn materialize_image_blocking(
    config: &MonosnapConfig,
    manifest: &Path,
) -> MonosnapResult<ExistingSnapshot> {
    let plan = plan_image_blocking(config, manifest)?;
    tracing::debug!("materialization plan for {}:\n{}", manifest.display(), plan);

    let volumes = LocalDirectoryVolumeManager::new(config.volumes_path())?;
    let blobs = BlobDirectory::builder()
        .root(config.blobs_path())
        .verify(config.get_verify_blobs())
        .build();
    let applicator = DefaultLayerApplicator::new(blobs);

    SnapshotMaterializer::materialize(&plan, &volumes, &applicator)
}
