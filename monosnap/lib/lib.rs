//! `monosnap` materializes OCI image layer chains into reusable volume snapshots.
//!
//! # Overview
//!
//! Container images are stacks of layer diffs. Many images share their lower layers, so once a
//! stack of layers has been written to a volume it is worth keeping as a snapshot that later
//! images can start from. monosnap handles:
//! - Identifying every layer stack by a rolling hash of its digests
//! - Grouping consecutive layers into snapshots of a useful size
//! - Reusing the newest snapshot that already exists for an image
//! - Applying tar layer diffs, whiteouts included, onto a working volume
//!
//! # Architecture
//!
//! - **Merge calculator**: turns a layer list and a snapshot lookup into a plan
//! - **Materializer**: walks the plan, driving a volume manager and a layer applicator
//! - **Layer applicator**: writes one docker rootfs diff onto a directory
//! - **Volume manager**: allocates working volumes and takes and restores snapshots
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use monosnap::{
//!     applicator::DefaultLayerApplicator,
//!     local::{LocalDirectoryVolumeManager, LocalSnapshotQueryProvider},
//!     materialization::{LayerMergeCalculator, SnapshotMaterializer},
//!     oci::{BlobDirectory, ImageManifest},
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let image = ImageManifest::from_file("image/manifest.json")?;
//!     let volumes = LocalDirectoryVolumeManager::new("/var/lib/monosnap/volumes")?;
//!     let oracle = LocalSnapshotQueryProvider::new(volumes.clone());
//!
//!     let plan = LayerMergeCalculator::default().calculate_bundle(&image, &oracle)?;
//!     println!("{plan}");
//!
//!     let applicator = DefaultLayerApplicator::new(BlobDirectory::new("image/blobs"));
//!     let snapshot = SnapshotMaterializer::materialize(&plan, &volumes, &applicator)?;
//!     println!("materialized {}", snapshot.get_snapshot_id());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`applicator`] - Layer diff application and whiteouts
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration types and defaults
//! - [`local`] - Directory-backed volume manager and snapshot lookup
//! - [`management`] - High level plan and materialize operations
//! - [`materialization`] - Layer chains, plans, the merge calculator and the materializer
//! - [`oci`] - Digests, layer descriptors, manifests and blobs
//! - [`utils`] - Common utilities and helpers
//!
//! # Platform Support
//!
//! - Linux and macOS: supported
//! - Windows: not supported, layers carry unix permissions and symlinks

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod applicator;
pub mod cli;
pub mod config;
pub mod local;
pub mod management;
pub mod materialization;
pub mod oci;
pub mod utils;

pub use error::*;
