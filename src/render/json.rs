use crate::config::Config;
use crate::Result;

/// Pretty JSON dump of the whole configuration.
///
/// Settings are keyed by dotted path; `files`, `manifest` and `setups` are
/// `null` when the file has no such block.
pub fn render_json(config: &Config) -> Result<String> {
    let json = serde_json::to_string_pretty(config)?;
    Ok(json)
}

/// One-line overview, e.g. `12 settings, 3 globs, 0 paths, 14 frames, 1 setup`.
pub fn summary(config: &Config) -> String {
    let plural = |n: usize, word: &str| {
        if n == 1 {
            format!("{} {}", n, word)
        } else {
            format!("{} {}s", n, word)
        }
    };
    let paths = config.files().map_or(0, |f| f.paths.len());
    let frames = config.manifest().map_or(0, |m| m.len());
    let setups = config.setups().map_or(0, |s| s.len());
    [
        plural(config.settings().len(), "setting"),
        plural(config.globs().len(), "glob"),
        plural(paths, "path"),
        plural(frames, "frame"),
        plural(setups, "setup"),
    ]
    .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_uses_dotted_keys_and_typed_values() {
        let cfg = crate::parse("out overwrite True\npixflat rej_level [10.0,10.0]\nrun ncpus 1\n").unwrap();
        let v: serde_json::Value = serde_json::from_str(&render_json(&cfg).unwrap()).unwrap();
        assert_eq!(v["settings"]["out.overwrite"], serde_json::json!(true));
        assert_eq!(v["settings"]["pixflat.rej_level"], serde_json::json!([10.0, 10.0]));
        assert_eq!(v["settings"]["run.ncpus"], serde_json::json!(1));
        assert_eq!(v["files"], serde_json::Value::Null);
    }

    #[test]
    fn summary_counts() {
        let cfg = crate::parse("run ncpus 1\ndata read\n /raw/b*.fits\ndata end\n").unwrap();
        assert_eq!(summary(&cfg), "1 setting, 1 glob, 0 paths, 0 frames, 0 setups");
    }
}
