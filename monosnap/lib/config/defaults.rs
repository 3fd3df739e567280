use std::{path::PathBuf, sync::LazyLock};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The directory under the user's home where monosnap keeps its data.
pub const MONOSNAP_HOME_DIR: &str = ".monosnap";

/// The sub directory of the home holding volumes and snapshots.
pub const VOLUMES_SUBDIR: &str = "volumes";

/// The sub directory of the home holding layer blobs.
pub const BLOBS_SUBDIR: &str = "blobs";

/// The configuration file looked up in the home when none is given.
pub const MONOSNAP_CONFIG_FILENAME: &str = "config.toml";

/// The default merge threshold: layers keep being grouped into one snapshot while the group is
/// smaller than this many bytes (32 MiB).
pub const DEFAULT_MERGE_THRESHOLD: u64 = 32 * 1024 * 1024;

/// The path where all monosnap data is stored by default.
pub static DEFAULT_MONOSNAP_HOME: LazyLock<PathBuf> =
    LazyLock::new(|| dirs::home_dir().unwrap_or_default().join(MONOSNAP_HOME_DIR));
