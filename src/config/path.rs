//! Dotted setting path.
//!
//! Example: `reduce.bgsubtraction.method`  =>  SettingPath(vec!["reduce", "bgsubtraction", "method"])
//!
//! We store it as a Vec<String> and derive ordering so it can key a BTreeMap.
//! With segment-wise ordering a path sorts directly before its descendants.

use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SettingPath(pub Vec<String>);

impl SettingPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Split a dotted string into segments. Empty segments are dropped.
    pub fn parse(dotted: &str) -> Self {
        Self(
            dotted
                .split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment (the key name inside its section).
    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Everything but the last segment.
    pub fn parent(&self) -> SettingPath {
        match self.0.split_last() {
            Some((_, rest)) => Self(rest.to_vec()),
            None => Self::default(),
        }
    }

    pub fn join(&self, other: &SettingPath) -> SettingPath {
        let mut v = self.0.clone();
        v.extend(other.0.iter().cloned());
        Self(v)
    }

    pub fn starts_with(&self, prefix: &SettingPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn strip_prefix(&self, prefix: &SettingPath) -> Option<SettingPath> {
        self.0.strip_prefix(prefix.0.as_slice()).map(|rest| Self(rest.to_vec()))
    }

    /// Slash-joined form used for schema glob matching.
    pub(crate) fn as_glob_subject(&self) -> String {
        self.0.join("/")
    }
}

impl fmt::Display for SettingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for SettingPath {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

impl Serialize for SettingPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A key segment must survive re-emission as a section header or key name.
pub(crate) fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '[' | ']' | '=' | ',' | '#' | '|' | '/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_dotted_and_drops_empty_segments() {
        let p = SettingPath::parse("reduce..bgsubtraction.method.");
        assert_eq!(p.segments(), &["reduce", "bgsubtraction", "method"]);
        assert_eq!(p.to_string(), "reduce.bgsubtraction.method");
        assert_eq!(p.leaf(), Some("method"));
        assert_eq!(p.parent().to_string(), "reduce.bgsubtraction");
    }

    #[test]
    fn descendants_sort_right_after_their_prefix() {
        let mut v = vec![
            SettingPath::parse("a0"),
            SettingPath::parse("a.x"),
            SettingPath::parse("a"),
            SettingPath::parse("a.b.c"),
        ];
        v.sort();
        let names: Vec<String> = v.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["a", "a.b.c", "a.x", "a0"]);
    }

    #[test]
    fn strip_prefix_only_on_segment_boundaries() {
        let p = SettingPath::parse("calibrations.arcframe.number");
        assert_eq!(
            p.strip_prefix(&SettingPath::parse("calibrations")),
            Some(SettingPath::parse("arcframe.number"))
        );
        assert_eq!(p.strip_prefix(&SettingPath::parse("calib")), None);
    }

    #[test]
    fn segment_validation() {
        assert!(is_valid_segment("rej_level"));
        assert!(is_valid_segment("--"));
        assert!(!is_valid_segment("b[1]"));
        assert!(!is_valid_segment("a,b"));
        assert!(!is_valid_segment("#note"));
        assert!(!is_valid_segment("a|b"));
        assert!(!is_valid_segment("a/y"));
        assert!(!is_valid_segment(""));
    }
}
