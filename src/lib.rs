//! Loader for the plain-text input files of a spectroscopic reduction pipeline.
//!
//! A reduction file mixes instrument settings (flat `run ncpus 1` commands or
//! `[section]` / `key = value` blocks), a `data` block of raw-file globs and an
//! optional exposure table, and a `setup` block of detector metadata. This
//! crate turns one such text into an immutable [`Config`], or a [`ParseError`]
//! naming the line, the offending token and what was expected.
//!
//! ```
//! let cfg = reduxfile::parse("out overwrite True\npixflat rej_level [10.0,10.0]\n").unwrap();
//! assert_eq!(cfg.get("out.overwrite").and_then(|v| v.as_bool()), Some(true));
//! assert_eq!(cfg.get("pixflat.rej_level").and_then(|v| v.as_f64_list()), Some(vec![10.0, 10.0]));
//! ```

pub mod config;
pub mod logging;
pub mod manifest;
pub mod parse;
pub mod render;
pub mod setup;

pub use config::{Config, FileSpec, Schema, SettingPath, Settings, Value};
pub use manifest::{FrameManifest, FrameRow};
pub use parse::{ErrorKind, ParseError, ParseOptions, parse, parse_with};
pub use setup::{DetectorInfo, InstrumentBlock, Meta};

use anyhow::Context;
use std::fs;
use std::path::Path;

pub type Result<T> = anyhow::Result<T>;

/// Read and parse a reduction file. The path is attached to any error; the
/// underlying [`ParseError`] stays reachable through `downcast_ref`.
pub fn load(path: impl AsRef<Path>, opts: &ParseOptions) -> Result<Config> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("read reduction file {}", path.display()))?;
    let config = parse_with(&text, opts).with_context(|| format!("parse {}", path.display()))?;
    Ok(config)
}
