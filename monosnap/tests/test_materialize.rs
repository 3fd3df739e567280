use std::{
    fs, io,
    path::{Path, PathBuf},
};

use flate2::{write::GzEncoder, Compression};
use serde_json::json;
use tar::{EntryType, Header};
use tempfile::tempdir;

use monosnap::{
    config::MonosnapConfig,
    local::{LocalDirectoryVolumeManager, VOLUME_PREFIX},
    management,
    materialization::{Materialization, PlanStep},
    oci::{Digest, MEDIA_TYPE_TAR_GZIP},
    MonosnapError,
};

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn test_materialize_image_end_to_end() -> anyhow::Result<()> {
    let temp = tempdir()?;
    let config = MonosnapConfig::builder()
        .home_dir(temp.path())
        .merge_threshold(1)
        .build();
    fs::create_dir_all(config.blobs_path())?;

    let base = helper::base_layer(&config)?;
    let whiteout = helper::whiteout_layer(&config)?;
    let opaque = helper::opaque_layer(&config)?;
    let manifest = helper::write_manifest(temp.path(), "image", &[&base, &whiteout, &opaque])?;

    // A threshold of one byte puts every layer into its own snapshot.
    let plan = management::plan_image(&config, &manifest).await?;
    let steps = plan.steps();
    assert_eq!(steps.len(), 3);
    assert!(steps
        .iter()
        .all(|step| matches!(step, PlanStep::Create { layers, .. } if layers.len() == 1)));

    let snapshot = management::materialize_image(&config, &manifest).await?;
    assert_eq!(snapshot.get_rolling_hash(), plan.rolling_hash());
    assert_eq!(snapshot.rolling_size(), plan.rolling_size());

    let root = config.volumes_path().join(snapshot.get_snapshot_id());
    assert!(!root.join("etc/hosts").exists());
    assert_eq!(fs::read_to_string(root.join("etc/motd"))?, "welcome\n");
    assert_eq!(fs::read_to_string(root.join("etc/issue"))?, "monosnap\n");
    assert!(!root.join("usr/bin/tool").exists());
    assert_eq!(fs::read_to_string(root.join("usr/bin/app"))?, "#!/bin/sh\n");
    assert!(root.join("usr/bin").is_dir());

    // The base snapshot still holds what the later layers deleted.
    let base_snapshot = LocalDirectoryVolumeManager::snapshot_id(&helper::digest_of(&base));
    let base_root = config.volumes_path().join(base_snapshot);
    assert_eq!(fs::read_to_string(base_root.join("etc/hosts"))?, "127.0.0.1 localhost\n");
    assert!(base_root.join("usr/bin/tool").exists());

    assert_eq!(helper::snapshot_count(&config)?, 3);
    assert_eq!(helper::working_volume_count(&config)?, 0);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_materialize_image_twice_reuses_snapshot() -> anyhow::Result<()> {
    let temp = tempdir()?;
    let config = MonosnapConfig::builder().home_dir(temp.path()).build();
    fs::create_dir_all(config.blobs_path())?;

    let base = helper::base_layer(&config)?;
    let whiteout = helper::whiteout_layer(&config)?;
    let manifest = helper::write_manifest(temp.path(), "image", &[&base, &whiteout])?;

    let first = management::materialize_image(&config, &manifest).await?;
    assert_eq!(helper::snapshot_count(&config)?, 1);

    let plan = management::plan_image(&config, &manifest).await?;
    assert!(matches!(plan, Materialization::Existing(ref existing) if existing == &first));

    let second = management::materialize_image(&config, &manifest).await?;
    assert_eq!(second, first);
    assert_eq!(helper::snapshot_count(&config)?, 1);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_materialize_image_builds_on_shared_prefix() -> anyhow::Result<()> {
    let temp = tempdir()?;
    let config = MonosnapConfig::builder().home_dir(temp.path()).build();
    fs::create_dir_all(config.blobs_path())?;

    let base = helper::base_layer(&config)?;
    let whiteout = helper::whiteout_layer(&config)?;
    let opaque = helper::opaque_layer(&config)?;

    let short = helper::write_manifest(temp.path(), "short", &[&base, &whiteout])?;
    let long = helper::write_manifest(temp.path(), "long", &[&base, &whiteout, &opaque])?;

    let prefix = management::materialize_image(&config, &short).await?;

    let plan = management::plan_image(&config, &long).await?;
    let steps = plan.steps();
    assert_eq!(steps.len(), 2);
    assert_eq!(
        steps[0],
        PlanStep::Reuse {
            snapshot_id: prefix.get_snapshot_id().clone()
        }
    );
    assert!(matches!(&steps[1], PlanStep::Create { layers, .. } if layers.len() == 1));

    let snapshot = management::materialize_image(&config, &long).await?;
    let root = config.volumes_path().join(snapshot.get_snapshot_id());
    assert_eq!(fs::read_to_string(root.join("etc/issue"))?, "monosnap\n");
    assert!(!root.join("usr/bin/tool").exists());
    assert!(root.join("usr/bin/app").exists());

    assert_eq!(helper::snapshot_count(&config)?, 2);
    assert_eq!(helper::working_volume_count(&config)?, 0);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_materialize_image_failure_cleans_up_volume() -> anyhow::Result<()> {
    let temp = tempdir()?;
    let config = MonosnapConfig::builder()
        .home_dir(temp.path())
        .merge_threshold(1)
        .build();
    fs::create_dir_all(config.blobs_path())?;

    let base = helper::base_layer(&config)?;
    let whiteout = helper::whiteout_layer(&config)?;
    fs::remove_file(config.blobs_path().join(helper::digest_of(&whiteout).to_string()))?;
    let manifest = helper::write_manifest(temp.path(), "image", &[&base, &whiteout])?;

    let result = management::materialize_image(&config, &manifest).await;
    assert!(matches!(result, Err(MonosnapError::BlobNotFound(_))));

    // The base group was snapshotted before the missing blob was reached.
    assert_eq!(helper::snapshot_count(&config)?, 1);
    assert_eq!(helper::working_volume_count(&config)?, 0);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_materialize_image_rejects_unsupported_media_type() -> anyhow::Result<()> {
    let temp = tempdir()?;
    let config = MonosnapConfig::builder().home_dir(temp.path()).build();
    fs::create_dir_all(config.blobs_path())?;

    let mut base = helper::base_layer(&config)?;
    base["mediaType"] = json!("application/vnd.oci.image.layer.v1.tar+zstd");
    let manifest = helper::write_manifest(temp.path(), "image", &[&base])?;

    let result = management::materialize_image(&config, &manifest).await;
    assert!(matches!(result, Err(MonosnapError::UnsupportedMediaType(_))));
    assert_eq!(helper::snapshot_count(&config)?, 0);

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Helpers
//--------------------------------------------------------------------------------------------------

mod helper {
    use super::*;

    const MTIME: u64 = 1_600_000_000;

    /// Writes a gzip layer blob into the configured blobs directory and returns its descriptor.
    fn write_layer(
        config: &MonosnapConfig,
        build: impl FnOnce(&mut tar::Builder<GzEncoder<Vec<u8>>>) -> io::Result<()>,
    ) -> anyhow::Result<serde_json::Value> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        build(&mut builder)?;
        let blob = builder.into_inner()?.finish()?;

        let digest = Digest::sha256(&blob);
        fs::write(config.blobs_path().join(digest.to_string()), &blob)?;

        Ok(json!({
            "mediaType": MEDIA_TYPE_TAR_GZIP,
            "size": blob.len(),
            "digest": digest.to_string(),
        }))
    }

    fn dir<W: io::Write>(builder: &mut tar::Builder<W>, path: &str) -> io::Result<()> {
        let mut header = header(EntryType::Directory, 0o755, 0);
        builder.append_data(&mut header, path, io::empty())
    }

    fn file<W: io::Write>(builder: &mut tar::Builder<W>, path: &str, content: &str) -> io::Result<()> {
        let mut header = header(EntryType::Regular, 0o644, content.len() as u64);
        builder.append_data(&mut header, path, content.as_bytes())
    }

    fn header(entry_type: EntryType, mode: u32, size: u64) -> Header {
        let mut header = Header::new_gnu();
        header.set_entry_type(entry_type);
        header.set_mode(mode);
        header.set_mtime(MTIME);
        header.set_size(size);
        header
    }

    pub(super) fn base_layer(config: &MonosnapConfig) -> anyhow::Result<serde_json::Value> {
        write_layer(config, |b| {
            dir(b, "etc")?;
            file(b, "etc/hosts", "127.0.0.1 localhost\n")?;
            file(b, "etc/motd", "welcome\n")?;
            dir(b, "usr")?;
            dir(b, "usr/bin")?;
            file(b, "usr/bin/tool", "#!/bin/true\n")
        })
    }

    pub(super) fn whiteout_layer(config: &MonosnapConfig) -> anyhow::Result<serde_json::Value> {
        write_layer(config, |b| {
            dir(b, "etc")?;
            file(b, "etc/.wh.hosts", "")?;
            file(b, "etc/issue", "monosnap\n")
        })
    }

    pub(super) fn opaque_layer(config: &MonosnapConfig) -> anyhow::Result<serde_json::Value> {
        write_layer(config, |b| {
            dir(b, "usr/bin")?;
            file(b, "usr/bin/.wh..wh..opq", "")?;
            file(b, "usr/bin/app", "#!/bin/sh\n")
        })
    }

    pub(super) fn write_manifest(
        dir: &Path,
        name: &str,
        layers: &[&serde_json::Value],
    ) -> anyhow::Result<PathBuf> {
        let manifest = json!({
            "schemaVersion": 2,
            "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
            "config": {
                "mediaType": "application/vnd.docker.container.image.v1+json",
                "size": 2,
                "digest": Digest::sha256(name).to_string(),
            },
            "layers": layers,
        });

        let path = dir.join(format!("{name}.json"));
        fs::write(&path, serde_json::to_vec_pretty(&manifest)?)?;
        Ok(path)
    }

    pub(super) fn digest_of(layer: &serde_json::Value) -> Digest {
        serde_json::from_value(layer["digest"].clone()).unwrap()
    }

    pub(super) fn snapshot_count(config: &MonosnapConfig) -> anyhow::Result<usize> {
        count_prefixed(&config.volumes_path(), "snap-")
    }

    pub(super) fn working_volume_count(config: &MonosnapConfig) -> anyhow::Result<usize> {
        count_prefixed(&config.volumes_path(), VOLUME_PREFIX)
    }

    fn count_prefixed(dir: &Path, prefix: &str) -> anyhow::Result<usize> {
        if !dir.exists() {
            return Ok(0);
        }

        let mut count = 0;
        for entry in fs::read_dir(dir)? {
            if entry?.file_name().to_string_lossy().starts_with(prefix) {
                count += 1;
            }
        }

        Ok(count)
    }
}
