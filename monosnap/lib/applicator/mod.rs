//! Applying layer diffs onto a volume.
//!
//! Layers are tar streams in the docker rootfs diff format. Besides regular entries they carry
//! whiteouts, which delete content contributed by lower layers:
//! - `.wh.<name>` removes the sibling `<name>`
//! - `.wh..wh..opq` removes everything already inside its directory

mod apply;
mod perm_guard;
mod whiteout;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use apply::*;
pub use perm_guard::*;
pub use whiteout::*;
