use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const FILENAME: &str = "filename";
pub const DATE: &str = "date";
pub const FRAMETYPE: &str = "frametype";
pub const TARGET: &str = "target";
pub const EXPTIME: &str = "exptime";
pub const DISPNAME: &str = "dispname";
pub const DECKER: &str = "decker";

/// A single exposure row from the data-block table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRow {
    pub filename: String,
    pub date: Option<String>,
    /// A frame may serve several roles (e.g. `pixelflat` and `trace`).
    pub frametype: BTreeSet<String>,
    pub target: Option<String>,
    pub exptime: Option<f64>,
    pub dispname: Option<String>,
    pub decker: Option<String>,
    /// Any other header column (ra, dec, binning, dichroic, ...).
    pub extra: BTreeMap<String, String>,
}

impl FrameRow {
    pub fn has_type(&self, label: &str) -> bool {
        self.frametype.contains(label)
    }

    /// Cell text for `column` as it would be written back into a table.
    pub fn cell(&self, column: &str) -> String {
        let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "None".to_string());
        match column {
            FILENAME => self.filename.clone(),
            DATE => opt(&self.date),
            TARGET => opt(&self.target),
            DISPNAME => opt(&self.dispname),
            DECKER => opt(&self.decker),
            FRAMETYPE if self.frametype.is_empty() => "None".to_string(),
            FRAMETYPE => self
                .frametype
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(","),
            EXPTIME => self
                .exptime
                .map(|e| e.to_string())
                .unwrap_or_else(|| "None".to_string()),
            other => self
                .extra
                .get(other)
                .cloned()
                .unwrap_or_else(|| "None".to_string()),
        }
    }
}

/// Ordered frame table plus its header columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameManifest {
    pub(crate) columns: Vec<String>,
    pub(crate) rows: Vec<FrameRow>,
}

impl FrameManifest {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FrameRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn of_type<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a FrameRow> + 'a {
        self.rows.iter().filter(move |r| r.has_type(label))
    }

    pub fn find(&self, filename: &str) -> Option<&FrameRow> {
        self.rows.iter().find(|r| r.filename == filename)
    }
}
