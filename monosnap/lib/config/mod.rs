//! Configuration types and defaults.

mod defaults;
mod monosnap;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use monosnap::*;
