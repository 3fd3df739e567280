//! High level operations tying the configuration to the local backend.

mod image;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use image::*;
