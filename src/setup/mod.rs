//! Instrument setup block.
//!
//! Two layouts are accepted between `setup read` and `setup end`:
//!
//! ```text
//!  Setup A:                      Setup A
//!    --:                         --:
//!      dichroic: d55               dichroic: d55
//!    '01':                       '01': {binning: '1,1', det: 1, namp: 2}
//!      binning: 1,1
//!      det: 1
//! ```
//!
//! Each `Setup <id>` header starts a setup whose body is a YAML mapping.
//! A body without any `key:` line is read as flat assignments instead
//! (`binning 1,1`, `det = 1`, `amp.count 2`).
//! Lines before any header are read as YAML whose top-level keys are the
//! setup ids (a leading `Setup ` is stripped from such keys).

use crate::config::{SettingPath, Value};
use crate::parse::error::{ErrorKind, ParseError, Result};
use crate::parse::line::{Line, classify, split_command};

use regex::Regex;
use serde::Serialize;
use serde_yaml::{Mapping, Value as Yaml};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

static SETUP_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Setup\s+([^\s:]+)\s*:?\s*$").expect("setup header regex"));

// Lines with YAML structure (`key:` entry, `-` item, `{` flow map).
static YAML_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:[-{]|(?:'[^']*'|"[^"]*"|[^\s:'"]+)\s*:(?:\s|$))"#)
        .expect("yaml line regex")
});

/// Nested setup metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Meta {
    Scalar(Value),
    Seq(Vec<Meta>),
    Map(BTreeMap<String, Meta>),
}

/// Per-detector fields most consumers need.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectorInfo {
    pub binning: Option<String>,
    pub det: Option<i64>,
    pub namp: Option<i64>,
}

impl Meta {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Meta::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Meta>> {
        match self {
            Meta::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Walk nested mappings by dotted key, e.g. `01.binning`.
    pub fn lookup(&self, dotted: &str) -> Option<&Meta> {
        dotted
            .split('.')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, key| node.as_map()?.get(key))
    }

    /// Leaves as dotted settings. A sequence of scalars becomes one list value.
    pub fn flatten(&self) -> Vec<(SettingPath, Value)> {
        let mut out = Vec::new();
        flatten_into(self, &mut Vec::new(), &mut out);
        out
    }

    fn detector_info(&self) -> Option<DetectorInfo> {
        let map = self.as_map()?;
        let binning = map.get("binning").and_then(Meta::as_value).map(|v| match v {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        });
        let det = map.get("det").and_then(Meta::as_value).and_then(Value::as_i64);
        let namp = map.get("namp").and_then(Meta::as_value).and_then(Value::as_i64);
        if binning.is_none() && det.is_none() && namp.is_none() {
            return None;
        }
        Some(DetectorInfo { binning, det, namp })
    }

    fn from_yaml(y: Yaml) -> std::result::Result<Meta, String> {
        Ok(match y {
            Yaml::Null => Meta::Scalar(Value::None),
            Yaml::Bool(b) => Meta::Scalar(Value::Bool(b)),
            Yaml::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Meta::Scalar(Value::Int(i)),
                (None, Some(f)) if f.is_finite() => Meta::Scalar(Value::Float(f)),
                // `.nan` / `.inf` keep their YAML spelling, as in settings.
                _ => Meta::Scalar(Value::Str(n.to_string())),
            },
            Yaml::String(s) => Meta::Scalar(Value::Str(s)),
            Yaml::Sequence(items) => Meta::Seq(
                items
                    .into_iter()
                    .map(Meta::from_yaml)
                    .collect::<std::result::Result<_, _>>()?,
            ),
            Yaml::Mapping(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    out.insert(yaml_key(k)?, Meta::from_yaml(v)?);
                }
                Meta::Map(out)
            }
            Yaml::Tagged(tagged) => Meta::from_yaml(tagged.value)?,
        })
    }

    pub(crate) fn to_yaml(&self) -> Yaml {
        match self {
            Meta::Scalar(v) => value_to_yaml(v),
            Meta::Seq(items) => Yaml::Sequence(items.iter().map(Meta::to_yaml).collect()),
            Meta::Map(map) => {
                let mut m = Mapping::new();
                for (k, v) in map {
                    m.insert(Yaml::String(k.clone()), v.to_yaml());
                }
                Yaml::Mapping(m)
            }
        }
    }
}

fn value_to_yaml(v: &Value) -> Yaml {
    match v {
        Value::None => Yaml::Null,
        Value::Bool(b) => Yaml::Bool(*b),
        Value::Int(i) => Yaml::Number((*i).into()),
        Value::Float(f) => Yaml::Number((*f).into()),
        Value::Str(s) => Yaml::String(s.clone()),
        Value::List(items) => Yaml::Sequence(items.iter().map(value_to_yaml).collect()),
    }
}

fn yaml_key(k: Yaml) -> std::result::Result<String, String> {
    match k {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        other => Err(format!("unsupported mapping key {:?}", other)),
    }
}

fn flatten_into(node: &Meta, prefix: &mut Vec<String>, out: &mut Vec<(SettingPath, Value)>) {
    match node {
        Meta::Scalar(v) => out.push((SettingPath::new(prefix.clone()), v.clone())),
        Meta::Map(map) => {
            for (k, v) in map {
                prefix.push(k.clone());
                flatten_into(v, prefix, out);
                prefix.pop();
            }
        }
        Meta::Seq(items) => {
            let scalars: Option<Vec<Value>> =
                items.iter().map(|m| m.as_value().cloned()).collect();
            match scalars {
                Some(values) => out.push((SettingPath::new(prefix.clone()), Value::List(values))),
                None => {
                    for (i, item) in items.iter().enumerate() {
                        prefix.push(i.to_string());
                        flatten_into(item, prefix, out);
                        prefix.pop();
                    }
                }
            }
        }
    }
}

/// Setup metadata keyed by setup id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InstrumentBlock {
    setups: BTreeMap<String, Meta>,
}

impl InstrumentBlock {
    pub fn get(&self, id: &str) -> Option<&Meta> {
        self.setups.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.setups.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Meta)> {
        self.setups.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.setups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.setups.is_empty()
    }

    /// Entries of setup `id` that carry binning/det/namp, keyed by entry name.
    pub fn detectors(&self, id: &str) -> Vec<(String, DetectorInfo)> {
        let Some(map) = self.get(id).and_then(Meta::as_map) else {
            return Vec::new();
        };
        map.iter()
            .filter_map(|(k, v)| v.detector_info().map(|d| (k.clone(), d)))
            .collect()
    }

    /// Dotted view with the setup id as the first segment.
    pub fn flatten(&self) -> Vec<(SettingPath, Value)> {
        self.setups
            .iter()
            .flat_map(|(id, meta)| {
                let head = SettingPath::new(vec![id.clone()]);
                meta.flatten()
                    .into_iter()
                    .map(move |(p, v)| (head.join(&p), v))
            })
            .collect()
    }
}

/// Collects the raw lines of a `setup` block until `setup end`.
#[derive(Debug)]
pub(crate) struct SetupBuilder {
    open_line: usize,
    lines: Vec<(usize, String)>,
}

impl SetupBuilder {
    pub fn new(open_line: usize) -> Self {
        Self {
            open_line,
            lines: Vec::new(),
        }
    }

    pub fn push_line(&mut self, lno: usize, raw: &str) {
        self.lines.push((lno, raw.trim_end().to_string()));
    }

    pub fn finish(self) -> Result<InstrumentBlock> {
        let mut block = InstrumentBlock::default();
        let mut header: Option<(String, usize)> = None;
        let mut chunk: Vec<(usize, String)> = Vec::new();

        for (lno, raw) in self.lines {
            if let Some(caps) = SETUP_HEADER_RE.captures(raw.trim()) {
                let prev = header.replace((caps[1].to_string(), lno));
                flush(&mut block, prev, std::mem::take(&mut chunk), self.open_line)?;
            } else {
                chunk.push((lno, raw));
            }
        }
        flush(&mut block, header, chunk, self.open_line)?;

        debug!(setups = block.len(), "setup block parsed");
        Ok(block)
    }
}

fn flush(
    block: &mut InstrumentBlock,
    header: Option<(String, usize)>,
    chunk: Vec<(usize, String)>,
    open_line: usize,
) -> Result<()> {
    if header.is_none() && chunk.is_empty() {
        return Ok(());
    }
    let anchor = header.as_ref().map(|(_, l)| *l).unwrap_or(open_line);
    let meta = parse_chunk(&chunk, anchor)?;

    let first = chunk.first().map(|(l, raw)| (*l, raw.trim().to_string()));
    let (err_line, err_token) = first.unwrap_or((anchor, String::new()));
    let not_a_map = || {
        ParseError::new(
            ErrorKind::MalformedSetup,
            err_line,
            err_token.clone(),
            "a mapping of setup metadata",
        )
    };

    let entries: Vec<(String, Meta, usize)> = match header {
        Some((id, lno)) => match meta {
            Meta::Map(_) => vec![(id, meta, lno)],
            _ => return Err(not_a_map()),
        },
        None => match meta {
            Meta::Map(map) => map
                .into_iter()
                .map(|(key, m)| {
                    let id = key
                        .strip_prefix("Setup ")
                        .map(|s| s.trim().to_string())
                        .unwrap_or(key);
                    (id, m, err_line)
                })
                .collect(),
            _ => return Err(not_a_map()),
        },
    };

    for (id, meta, lno) in entries {
        if block.setups.contains_key(&id) {
            return Err(ParseError::new(
                ErrorKind::MalformedSetup,
                lno,
                format!("Setup {}", id),
                "each setup id to appear once",
            ));
        }
        block.setups.insert(id, meta);
    }
    Ok(())
}

/// Dedent and parse one chunk as YAML. Error lines map back to the file.
fn parse_chunk(chunk: &[(usize, String)], anchor: usize) -> Result<Meta> {
    if chunk.is_empty() {
        return Ok(Meta::Map(BTreeMap::new()));
    }
    if !chunk.iter().any(|(_, l)| YAML_LINE_RE.is_match(l)) {
        return parse_flat_chunk(chunk);
    }

    let indent = chunk
        .iter()
        .map(|(_, l)| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    let text = chunk
        .iter()
        .map(|(_, l)| &l[indent..])
        .collect::<Vec<_>>()
        .join("\n");

    let yaml: Yaml = serde_yaml::from_str(&text).map_err(|e| {
        let (lno, token) = e
            .location()
            .and_then(|loc| chunk.get(loc.line().saturating_sub(1)))
            .map(|(l, raw)| (*l, raw.trim().to_string()))
            .unwrap_or_else(|| (chunk[0].0, chunk[0].1.trim().to_string()));
        ParseError::new(
            ErrorKind::MalformedSetup,
            lno,
            token,
            format!("YAML setup metadata ({})", e),
        )
    })?;

    match yaml {
        Yaml::Null => Ok(Meta::Map(BTreeMap::new())),
        other => Meta::from_yaml(other).map_err(|msg| {
            ParseError::new(
                ErrorKind::MalformedSetup,
                chunk.first().map(|(l, _)| *l).unwrap_or(anchor),
                msg,
                "string, number or boolean mapping keys",
            )
        }),
    }
}

/// Flat `key value` / `key = value` lines. Keys may be dotted or space separated.
fn parse_flat_chunk(chunk: &[(usize, String)]) -> Result<Meta> {
    let mut root = Meta::Map(BTreeMap::new());
    for (lno, raw) in chunk {
        let bad = |expected: String| ParseError::new(ErrorKind::MalformedSetup, *lno, raw.trim(), expected);
        let (keys, value) = match classify(raw) {
            Line::Blank | Line::Comment => continue,
            Line::Assign { key, value } => (vec![key], Value::infer_assignment(value)),
            Line::Words(words) => match split_command(words) {
                Some(cmd) => (cmd.keys, Value::infer(cmd.value)),
                None => return Err(bad("`<key...> <value>` or a YAML mapping".into())),
            },
            _ => return Err(bad("`<key...> <value>` or a YAML mapping".into())),
        };
        let value = value.map_err(|e| bad(e.to_string()))?;
        let path: Vec<&str> = keys
            .iter()
            .flat_map(|k| k.split('.'))
            .filter(|s| !s.is_empty())
            .collect();
        if !insert_meta(&mut root, &path, value) {
            return Err(bad("each metadata key to be either a value or a mapping".into()));
        }
    }
    Ok(root)
}

fn insert_meta(node: &mut Meta, path: &[&str], value: Value) -> bool {
    let Meta::Map(map) = node else {
        return false;
    };
    match path {
        [] => false,
        [leaf] => {
            if matches!(map.get(*leaf), Some(Meta::Map(_))) {
                return false;
            }
            // Lists take the same shape a YAML sequence would.
            let meta = match value {
                Value::List(items) => Meta::Seq(items.into_iter().map(Meta::Scalar).collect()),
                v => Meta::Scalar(v),
            };
            map.insert(leaf.to_string(), meta);
            true
        }
        [head, rest @ ..] => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Meta::Map(BTreeMap::new()));
            insert_meta(child, rest, value)
        }
    }
}
