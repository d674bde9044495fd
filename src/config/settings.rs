//! Flat settings map keyed by dotted path.

use crate::config::path::SettingPath;
use crate::config::value::Value;

use serde::Serialize;
use std::collections::BTreeMap;

/// All settings of a loaded file. Paths always form a tree: no path is both
/// a value and the prefix of another value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<SettingPath, Value>,
}

/// Returned by [`Settings::insert`] when the new path would turn a value into
/// a section or the other way round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConflict {
    pub existing: SettingPath,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or override. Returns the replaced value, if any.
    pub(crate) fn insert(
        &mut self,
        path: SettingPath,
        value: Value,
    ) -> Result<Option<Value>, PathConflict> {
        // An ancestor already holds a value.
        for n in 1..path.len() {
            let ancestor = SettingPath::new(path.segments()[..n].to_vec());
            if self.values.contains_key(&ancestor) {
                return Err(PathConflict { existing: ancestor });
            }
        }
        // A descendant already holds a value. Descendants sort right after the path.
        if let Some((next, _)) = self.values.range(path.clone()..).find(|(k, _)| **k != path) {
            if next.starts_with(&path) {
                return Err(PathConflict {
                    existing: next.clone(),
                });
            }
        }
        Ok(self.values.insert(path, value))
    }

    pub fn get(&self, dotted: &str) -> Option<&Value> {
        self.values.get(&SettingPath::parse(dotted))
    }

    pub fn get_path(&self, path: &SettingPath) -> Option<&Value> {
        self.values.get(path)
    }

    pub fn contains(&self, dotted: &str) -> bool {
        self.get(dotted).is_some()
    }

    /// Sub-tree under `prefix`, with the prefix stripped from every key.
    pub fn section(&self, prefix: &str) -> Settings {
        let prefix = SettingPath::parse(prefix);
        let values = self
            .values
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(k, v)| {
                k.strip_prefix(&prefix)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest, v.clone()))
            })
            .collect();
        Settings { values }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SettingPath, &Value)> {
        self.values.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &SettingPath> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&SettingPath, &mut Value)> {
        self.values.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn put(s: &mut Settings, k: &str, v: Value) -> Result<Option<Value>, PathConflict> {
        s.insert(SettingPath::parse(k), v)
    }

    #[test]
    fn later_definition_overrides() {
        let mut s = Settings::new();
        assert_eq!(put(&mut s, "run.ncpus", Value::Int(1)), Ok(None));
        assert_eq!(
            put(&mut s, "run.ncpus", Value::Int(4)),
            Ok(Some(Value::Int(1)))
        );
        assert_eq!(s.get("run.ncpus"), Some(&Value::Int(4)));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn leaf_and_section_cannot_share_a_path() {
        let mut s = Settings::new();
        put(&mut s, "reduce.skysub", Value::Bool(true)).unwrap();
        assert_eq!(
            put(&mut s, "reduce.skysub.method", Value::Str("bspline".into())),
            Err(PathConflict {
                existing: SettingPath::parse("reduce.skysub")
            })
        );

        put(&mut s, "arc.lamps.names", Value::None).unwrap();
        assert_eq!(
            put(&mut s, "arc.lamps", Value::None),
            Err(PathConflict {
                existing: SettingPath::parse("arc.lamps.names")
            })
        );
        // Sibling with a shared string prefix is fine.
        assert_eq!(put(&mut s, "arc.lamps0", Value::Int(1)), Ok(None));
    }

    #[test]
    fn section_strips_prefix() {
        let mut s = Settings::new();
        put(&mut s, "calibrations.pixelflatframe.number", Value::Int(3)).unwrap();
        put(&mut s, "calibrations.arcframe.number", Value::Int(1)).unwrap();
        put(&mut s, "calibrationsx.other", Value::Int(9)).unwrap();
        put(&mut s, "rdx.spectrograph", Value::Str("shane_kast_blue".into())).unwrap();

        let cal = s.section("calibrations");
        assert_eq!(cal.len(), 2);
        assert_eq!(cal.get("arcframe.number"), Some(&Value::Int(1)));
        assert_eq!(s.section("calibrations.pixelflatframe").get("number"), Some(&Value::Int(3)));
        assert!(s.section("nothing").is_empty());
    }
}
