//! Known-setting schema used by strict mode.
//!
//! Patterns are dotted globs: `*` matches exactly one segment and `**` any
//! number of segments, e.g. `reduce.**` or `run.ncpus`. Internally the dots
//! become `/` so `globset` can treat segments as path components.

use crate::config::path::SettingPath;
use crate::Result;

use anyhow::Context;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Namespaces used by reduction files of either syntax.
pub const DEFAULT_PATTERNS: &[&str] = &[
    // bracketed-section syntax
    "rdx.**",
    "calibrations.**",
    "scienceframe.**",
    "reduce.**",
    "flexure.**",
    "fluxcalib.**",
    "sensfunc.**",
    "coadd1d.**",
    "coadd2d.**",
    "telluric.**",
    "collate1d.**",
    // flat-command syntax
    "run.*",
    "out.*",
    "output.**",
    "bias.**",
    "pixflat.**",
    "trace.**",
    "arc.**",
    "flat.**",
    "science.**",
    "skysub.**",
    "manual.**",
    // settings blocks
    "spect.**",
];

static BUILTIN: LazyLock<Schema> = LazyLock::new(|| {
    Schema::from_patterns(DEFAULT_PATTERNS.iter().copied())
        .expect("built-in schema patterns are valid globs")
});

#[derive(Debug, Clone)]
pub struct Schema {
    patterns: Vec<String>,
    set: GlobSet,
}

impl Schema {
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            let glob = GlobBuilder::new(&pattern.replace('.', "/"))
                .literal_separator(true)
                .build()
                .with_context(|| format!("bad schema pattern {:?}", pattern))?;
            builder.add(glob);
            kept.push(pattern.to_string());
        }
        Ok(Self {
            patterns: kept,
            set: builder.build()?,
        })
    }

    /// Load a schema file: one pattern per line, `#` starts a comment line.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read schema file {}", path.display()))?;
        let patterns = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'));
        Self::from_patterns(patterns).with_context(|| format!("load schema {}", path.display()))
    }

    pub fn allows(&self, path: &SettingPath) -> bool {
        self.set.is_match(path.as_glob_subject())
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for Schema {
    fn default() -> Self {
        BUILTIN.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_covers_both_syntaxes() {
        let schema = Schema::default();
        assert!(schema.allows(&SettingPath::parse("run.ncpus")));
        assert!(schema.allows(&SettingPath::parse("reduce.bgsubtraction.method")));
        assert!(schema.allows(&SettingPath::parse("calibrations.pixelflatframe.process.combine")));
        assert!(schema.allows(&SettingPath::parse("spect.pixelflat.number")));
        assert!(!schema.allows(&SettingPath::parse("colour.scheme")));
    }

    #[test]
    fn single_star_is_one_segment() {
        let schema = Schema::from_patterns(["run.*"]).unwrap();
        assert!(schema.allows(&SettingPath::parse("run.ncpus")));
        assert!(!schema.allows(&SettingPath::parse("run.a.b")));
        assert!(!schema.allows(&SettingPath::parse("runx.a")));
    }

    #[test]
    fn loads_pattern_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "# site schema\nrdx.spectrograph\n\nout.*").unwrap();
        let schema = Schema::load(f.path()).unwrap();
        assert_eq!(schema.patterns(), &["rdx.spectrograph", "out.*"]);
        assert!(schema.allows(&SettingPath::parse("out.overwrite")));
        assert!(!schema.allows(&SettingPath::parse("rdx.detnum")));
    }

    #[test]
    fn rejects_invalid_glob() {
        assert!(Schema::from_patterns(["reduce.[a"]).is_err());
    }
}
