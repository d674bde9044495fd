//! Frame manifest: the exposure table of a `data` block.

pub mod row;
pub(crate) mod table;

pub use row::{FrameManifest, FrameRow};
