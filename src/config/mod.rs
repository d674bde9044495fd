//! Loaded configuration: settings, input files, frame manifest, setups.
//!
//! A `Config` is built once by the parser and never mutated afterwards;
//! [`Config::relocated`] returns a new value.

pub mod path;
pub mod schema;
pub mod settings;
pub mod value;

pub use path::SettingPath;
pub use schema::Schema;
pub use settings::Settings;
pub use value::Value;

use crate::manifest::{FrameManifest, FrameRow};
use crate::setup::InstrumentBlock;

use serde::Serialize;
use std::path::Path;

/// Raw input designation from the `data` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileSpec {
    /// `path <dir>` lines, in order.
    pub paths: Vec<String>,
    /// Glob lines, in order. Never expanded here.
    pub globs: Vec<String>,
}

impl FileSpec {
    pub fn len(&self) -> usize {
        self.globs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Config {
    pub(crate) settings: Settings,
    pub(crate) files: Option<FileSpec>,
    pub(crate) manifest: Option<FrameManifest>,
    pub(crate) setups: Option<InstrumentBlock>,
}

impl Config {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Shorthand for `settings().get(..)`.
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        self.settings.get(dotted)
    }

    /// `None` when the file has no `data` block.
    pub fn files(&self) -> Option<&FileSpec> {
        self.files.as_ref()
    }

    pub fn globs(&self) -> &[String] {
        self.files.as_ref().map(|f| f.globs.as_slice()).unwrap_or(&[])
    }

    pub fn manifest(&self) -> Option<&FrameManifest> {
        self.manifest.as_ref()
    }

    pub fn setups(&self) -> Option<&InstrumentBlock> {
        self.setups.as_ref()
    }

    /// Manifest rows labelled with `frametype`, in table order.
    pub fn frames_of_type<'a>(&'a self, frametype: &'a str) -> Vec<&'a FrameRow> {
        self.manifest
            .iter()
            .flat_map(|m| m.of_type(frametype))
            .collect()
    }

    /// Everything the pipeline should look for: globs first, then each
    /// manifest filename joined to every data `path` (bare when none).
    pub fn input_patterns(&self) -> Vec<String> {
        let mut out: Vec<String> = self.globs().to_vec();
        let paths = self.files.as_ref().map(|f| f.paths.as_slice()).unwrap_or(&[]);
        for row in self.manifest.iter().flat_map(|m| m.rows()) {
            if paths.is_empty() {
                out.push(row.filename.clone());
            }
            for dir in paths {
                out.push(Path::new(dir).join(&row.filename).to_string_lossy().into_owned());
            }
        }
        out
    }

    /// Point the configuration at a local directory layout.
    ///
    /// Every data `path` is replaced by `raw_dir` and every glob keeps its
    /// file pattern under `raw_dir`. With `calib_dir`, string settings under
    /// `calibrations` whose key ends in `_file` keep their file name under
    /// `calib_dir`.
    pub fn relocated(&self, raw_dir: &str, calib_dir: Option<&str>) -> Config {
        let mut out = self.clone();

        if let Some(files) = out.files.as_mut() {
            if !files.paths.is_empty() {
                files.paths = vec![raw_dir.to_string()];
            }
            for glob in files.globs.iter_mut() {
                *glob = rebase(glob, raw_dir);
            }
        }

        if let Some(calib_dir) = calib_dir {
            let calibrations = SettingPath::parse("calibrations");
            for (path, value) in out.settings.iter_mut() {
                let is_file_key = path.leaf().is_some_and(|l| l.ends_with("_file"));
                if !path.starts_with(&calibrations) || !is_file_key {
                    continue;
                }
                if let Value::Str(s) = value {
                    *s = rebase(s, calib_dir);
                }
            }
        }

        out
    }
}

fn rebase(file: &str, dir: &str) -> String {
    let name = Path::new(file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string());
    Path::new(dir).join(name).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn relocation_rewrites_data_and_calibration_paths() {
        let cfg = crate::parse(
            "[calibrations]\n  [[flatfield]]\n    pixelflat_file = /old/CALIBS/pixelflat_b.fits.gz\n    method = bspline\n\
             data read\n path /old/raw\n /old/raw/b*.fits.gz\n| filename | frametype |\n| b1.fits.gz | arc |\ndata end\n",
        )
        .unwrap();

        let moved = cfg.relocated("/local/raw", Some("/local/CALIBS"));
        let files = moved.files().unwrap();
        assert_eq!(files.paths, vec!["/local/raw"]);
        assert_eq!(files.globs, vec!["/local/raw/b*.fits.gz"]);
        assert_eq!(
            moved.get("calibrations.flatfield.pixelflat_file"),
            Some(&Value::Str("/local/CALIBS/pixelflat_b.fits.gz".into()))
        );
        assert_eq!(
            moved.get("calibrations.flatfield.method"),
            Some(&Value::Str("bspline".into()))
        );
        assert_eq!(moved.input_patterns(), vec!["/local/raw/b*.fits.gz", "/local/raw/b1.fits.gz"]);
        // The source value is untouched.
        assert_eq!(cfg.files().unwrap().paths, vec!["/old/raw"]);
    }

    #[test]
    fn frames_of_type_without_manifest_is_empty() {
        let cfg = crate::parse("run ncpus 1\n").unwrap();
        assert!(cfg.frames_of_type("arc").is_empty());
        assert!(cfg.input_patterns().is_empty());
        assert!(cfg.globs().is_empty());
    }
}
