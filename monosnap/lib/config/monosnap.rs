use std::path::{Path, PathBuf};

use getset::{CopyGetters, Getters, Setters};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::{
    BLOBS_SUBDIR, DEFAULT_MERGE_THRESHOLD, DEFAULT_MONOSNAP_HOME, MONOSNAP_CONFIG_FILENAME,
    VOLUMES_SUBDIR,
};
use crate::MonosnapResult;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The monosnap configuration.
///
/// Every field is optional in the TOML form:
///
/// ```toml
/// home_dir = "/var/lib/monosnap"
/// volumes_dir = "/mnt/fast/volumes"
/// merge_threshold = 67108864
/// verify_blobs = true
/// ```
#[derive(
    Debug, Clone, Serialize, Deserialize, TypedBuilder, PartialEq, Getters, CopyGetters, Setters,
)]
pub struct MonosnapConfig {
    /// The directory the other paths default to living in.
    #[serde(default = "MonosnapConfig::default_home_dir")]
    #[builder(default = MonosnapConfig::default_home_dir(), setter(into))]
    #[getset(get = "pub with_prefix", set = "pub")]
    home_dir: PathBuf,

    /// Where volumes and snapshots are kept. Defaults to `<home>/volumes`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default, setter(strip_option, into))]
    #[getset(get = "pub with_prefix", set = "pub")]
    volumes_dir: Option<PathBuf>,

    /// Where layer blobs are read from. Defaults to `<home>/blobs`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default, setter(strip_option, into))]
    #[getset(get = "pub with_prefix", set = "pub")]
    blobs_dir: Option<PathBuf>,

    /// The merge threshold in bytes.
    #[serde(default = "MonosnapConfig::default_merge_threshold")]
    #[builder(default = DEFAULT_MERGE_THRESHOLD)]
    #[getset(get_copy = "pub with_prefix", set = "pub")]
    merge_threshold: u64,

    /// Whether blobs are hashed and checked against their digest before being applied.
    #[serde(default)]
    #[builder(default)]
    #[getset(get_copy = "pub with_prefix", set = "pub")]
    verify_blobs: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MonosnapConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml(text: &str) -> MonosnapResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads a configuration file.
    pub fn load(path: impl AsRef<Path>) -> MonosnapResult<Self> {
        let path = path.as_ref();
        let config = Self::from_toml(&std::fs::read_to_string(path)?)?;
        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Reads `path` if given, else `<default home>/config.toml` if it exists, else returns the
    /// defaults.
    pub fn load_or_default(path: Option<&Path>) -> MonosnapResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = DEFAULT_MONOSNAP_HOME.join(MONOSNAP_CONFIG_FILENAME);
        if default_path.is_file() {
            return Self::load(default_path);
        }

        Ok(Self::default())
    }

    /// The directory holding volumes and snapshots.
    pub fn volumes_path(&self) -> PathBuf {
        self.volumes_dir
            .clone()
            .unwrap_or_else(|| self.home_dir.join(VOLUMES_SUBDIR))
    }

    /// The directory holding layer blobs.
    pub fn blobs_path(&self) -> PathBuf {
        self.blobs_dir
            .clone()
            .unwrap_or_else(|| self.home_dir.join(BLOBS_SUBDIR))
    }

    fn default_home_dir() -> PathBuf {
        DEFAULT_MONOSNAP_HOME.clone()
    }

    fn default_merge_threshold() -> u64 {
        DEFAULT_MERGE_THRESHOLD
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for MonosnapConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::MonosnapError;

    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MonosnapConfig::default();
        assert_eq!(config.get_merge_threshold(), 33_554_432);
        assert!(!config.get_verify_blobs());
        assert_eq!(config.get_home_dir(), &*DEFAULT_MONOSNAP_HOME);
        assert_eq!(config.volumes_path(), DEFAULT_MONOSNAP_HOME.join("volumes"));
        assert_eq!(config.blobs_path(), DEFAULT_MONOSNAP_HOME.join("blobs"));
    }

    #[test]
    fn test_config_from_partial_toml() -> anyhow::Result<()> {
        let config = MonosnapConfig::from_toml(
            r#"
            home_dir = "/srv/monosnap"
            blobs_dir = "/mnt/blobs"
            verify_blobs = true
            "#,
        )?;

        assert_eq!(config.volumes_path(), PathBuf::from("/srv/monosnap/volumes"));
        assert_eq!(config.blobs_path(), PathBuf::from("/mnt/blobs"));
        assert_eq!(config.get_merge_threshold(), DEFAULT_MERGE_THRESHOLD);
        assert!(config.get_verify_blobs());

        Ok(())
    }

    #[test]
    fn test_config_builder_and_setters() {
        let mut config = MonosnapConfig::builder()
            .home_dir("/tmp/home")
            .merge_threshold(1024)
            .build();
        config.set_volumes_dir(Some(PathBuf::from("/tmp/volumes")));

        assert_eq!(config.get_merge_threshold(), 1024);
        assert_eq!(config.volumes_path(), PathBuf::from("/tmp/volumes"));
        assert_eq!(config.blobs_path(), PathBuf::from("/tmp/home/blobs"));
    }

    #[test]
    fn test_config_load_file_and_errors() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("config.toml");

        std::fs::write(&path, "merge_threshold = 42\n")?;
        let config = MonosnapConfig::load_or_default(Some(&path))?;
        assert_eq!(config.get_merge_threshold(), 42);

        std::fs::write(&path, "merge_threshold = \"big\"\n")?;
        assert!(matches!(
            MonosnapConfig::load(&path),
            Err(MonosnapError::Config(_))
        ));

        assert!(matches!(
            MonosnapConfig::load(temp.path().join("missing.toml")),
            Err(MonosnapError::Io(_))
        ));

        Ok(())
    }
}
