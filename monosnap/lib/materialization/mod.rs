//! Planning and executing the materialization of a layer chain.
//!
//! A [`LayerChain`] is built from an image's layer list. The [`LayerMergeCalculator`] asks a
//! [`SnapshotQueryProvider`] which layer stacks already have snapshots and groups the remaining
//! layers into a [`Materialization`] plan, which the [`SnapshotMaterializer`] then writes through a
//! [`VolumeManager`].

mod calculator;
mod chain;
mod materializer;
mod plan;
mod volume;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use calculator::*;
pub use chain::*;
pub use materializer::*;
pub use plan::*;
pub use volume::*;
