//! Directory-backed implementations of the storage collaborators.
//!
//! These keep every volume and snapshot as a plain directory tree. Snapshots are full copies, so
//! they are meant for development, tests and small images rather than as a storage engine.

mod copy;
mod query;
mod volume_manager;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use copy::*;
pub use query::*;
pub use volume_manager::*;
