//! Utility functions and types.

mod file;
mod format;
mod path;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use file::*;
pub use format::*;
pub use path::*;
