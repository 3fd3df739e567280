//! OCI image model: digests, layer descriptors, manifests and blob lookup.
//!
//! This module provides the value types the merge planner works on:
//! - [`Digest`] for algorithm-tagged content hashes
//! - [`LayerConfig`] and [`LayerMediaType`] for the layers listed by a manifest
//! - [`ImageManifest`] for reading a docker v2 manifest from disk
//! - [`BlobDirectory`] for resolving layer digests to blob files

mod blobs;
mod digest;
mod layer;
mod manifest;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use blobs::*;
pub use digest::*;
pub use layer::*;
pub use manifest::*;
