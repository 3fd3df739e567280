use std::path::PathBuf;

use super::styles;
use clap::Parser;

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// Monosnap CLI - Materializes OCI image layers into reusable volume snapshots
#[derive(Debug, Parser)]
#[command(name = "monosnap", author, about, version, styles=styles::styles())]
pub struct MonosnapArgs {
    /// The subcommand to run
    #[command(subcommand)]
    pub subcommand: Option<MonosnapSubcommand>,

    /// Configuration file (defaults to ~/.monosnap/config.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding volumes and snapshots
    #[arg(long, global = true, value_name = "DIR")]
    pub volumes: Option<PathBuf>,

    /// Directory holding layer blobs
    #[arg(long, global = true, value_name = "DIR")]
    pub blobs: Option<PathBuf>,

    /// Group layers into one snapshot while the group is smaller than this
    #[arg(long, global = true, value_name = "BYTES")]
    pub merge_threshold: Option<u64>,

    /// Check every blob against its digest before applying it
    #[arg(long, global = true)]
    pub verify: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Debug, Parser)]
pub enum MonosnapSubcommand {
    /// Print the materialization plan of an image without touching any volume
    #[command(name = "plan")]
    Plan {
        /// Path to the image manifest
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
    },

    /// Materialize an image into a snapshot and print its id
    #[command(name = "materialize")]
    Materialize {
        /// Path to the image manifest
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
    },
}

//-------------------------------------------------------------------------------------------------
// Tests
//-------------------------------------------------------------------------------------------------
