//! Output formats for a loaded configuration.

pub mod canonical;
pub mod json;

pub use canonical::to_string as render_canonical;
pub use json::{render_json, summary};
