//! Pipe-delimited frame table found inside a `data` block.
//!
//! Expected shape (column widths are free, header first):
//! |   filename |       date | frametype | target | exptime | dispname | decker |
//! | b1.fits.gz | 2015-05-20 | arc,tilt  |   Arcs |      30 | 600/4310 | 0.5 arcsec |

use crate::manifest::row::{
    DATE, DECKER, DISPNAME, EXPTIME, FILENAME, FRAMETYPE, FrameManifest, FrameRow, TARGET,
};
use crate::parse::error::{ErrorKind, ParseError, Result};

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Accumulates table lines; the first non-separator row is the header.
#[derive(Debug, Default)]
pub(crate) struct TableBuilder {
    header: Option<(Vec<String>, usize)>,
    rows: Vec<FrameRow>,
}

impl TableBuilder {
    pub fn push_line(&mut self, line: &str, lno: usize) -> Result<()> {
        let cells = split_cells(line);
        if is_separator(&cells) {
            return Ok(());
        }

        let Some((columns, header_lno)) = &self.header else {
            let columns = validate_header(cells, line, lno)?;
            debug!(line = lno, columns = columns.len(), "frame table header");
            self.header = Some((columns, lno));
            return Ok(());
        };

        if cells.len() != columns.len() {
            return Err(ParseError::new(
                ErrorKind::MalformedRow,
                lno,
                line.trim(),
                format!(
                    "{} cells to match the header at line {} (found {})",
                    columns.len(),
                    header_lno,
                    cells.len()
                ),
            ));
        }

        let row = build_row(columns, cells, line, lno)?;
        self.rows.push(row);
        Ok(())
    }

    pub fn has_header(&self) -> bool {
        self.header.is_some()
    }

    pub fn finish(self) -> Option<FrameManifest> {
        self.header.map(|(columns, _)| FrameManifest {
            columns,
            rows: self.rows,
        })
    }
}

/// Split "| a | b |" into ["a", "b"]; outer pipes are optional on the right.
fn split_cells(line: &str) -> Vec<String> {
    let s = line.trim();
    let s = s.strip_prefix('|').unwrap_or(s);
    let s = s.strip_suffix('|').unwrap_or(s);
    s.split('|').map(|c| c.trim().to_string()).collect()
}

/// `|----|:---:|` style rule lines carry no data.
fn is_separator(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells
            .iter()
            .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | '=' | '+')))
}

fn validate_header(cells: Vec<String>, line: &str, lno: usize) -> Result<Vec<String>> {
    let mut seen = BTreeSet::new();
    for cell in &cells {
        if cell.is_empty() {
            return Err(ParseError::new(
                ErrorKind::MalformedTable,
                lno,
                line.trim(),
                "a non-empty name for every header column",
            ));
        }
        if !seen.insert(cell.as_str()) {
            return Err(ParseError::new(
                ErrorKind::MalformedTable,
                lno,
                cell.clone(),
                "unique header column names",
            ));
        }
    }
    if !seen.contains(FILENAME) {
        return Err(ParseError::new(
            ErrorKind::MalformedTable,
            lno,
            line.trim(),
            "a `filename` column in the table header",
        ));
    }
    Ok(cells)
}

fn optional(cell: &str) -> Option<String> {
    match cell {
        "" | "None" => None,
        s => Some(s.to_string()),
    }
}

fn build_row(columns: &[String], cells: Vec<String>, line: &str, lno: usize) -> Result<FrameRow> {
    let mut row = FrameRow {
        filename: String::new(),
        date: None,
        frametype: BTreeSet::new(),
        target: None,
        exptime: None,
        dispname: None,
        decker: None,
        extra: BTreeMap::new(),
    };

    for (column, cell) in columns.iter().zip(cells) {
        match column.as_str() {
            FILENAME => match optional(&cell) {
                Some(name) => row.filename = name,
                None => {
                    return Err(ParseError::new(
                        ErrorKind::MalformedRow,
                        lno,
                        line.trim(),
                        "a filename in every row",
                    ));
                }
            },
            DATE => row.date = optional(&cell),
            TARGET => row.target = optional(&cell),
            DISPNAME => row.dispname = optional(&cell),
            DECKER => row.decker = optional(&cell),
            FRAMETYPE => {
                row.frametype = cell
                    .split(',')
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && *l != "None")
                    .map(str::to_string)
                    .collect();
            }
            EXPTIME => {
                row.exptime = match optional(&cell) {
                    None => None,
                    Some(text) => Some(parse_exptime(&text).ok_or_else(|| {
                        ParseError::new(
                            ErrorKind::MalformedRow,
                            lno,
                            text.clone(),
                            "a numeric `exptime` or `None`",
                        )
                    })?),
                };
            }
            other => {
                row.extra.insert(other.to_string(), cell);
            }
        }
    }

    Ok(row)
}

fn parse_exptime(text: &str) -> Option<f64> {
    crate::config::Value::infer(text).ok()?.as_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "| filename | date | frametype | target | exptime | dispname | decker |";

    fn table(lines: &[&str]) -> Result<Option<FrameManifest>> {
        let mut t = TableBuilder::default();
        for (i, l) in lines.iter().enumerate() {
            t.push_line(l, i + 1)?;
        }
        Ok(t.finish())
    }

    #[test]
    fn frametype_cell_is_a_label_set() {
        let m = table(&[
            HEADER,
            "| b10.fits.gz | 2015-05-20 | pixelflat,trace | Dome Flat | 15 | 600/4310 | 2.0 arcsec |",
        ])
        .unwrap()
        .unwrap();
        assert_eq!(m.len(), 1);
        let row = &m.rows()[0];
        assert_eq!(
            row.frametype,
            BTreeSet::from(["pixelflat".to_string(), "trace".to_string()])
        );
        assert_eq!(row.filename, "b10.fits.gz");
        assert_eq!(row.target.as_deref(), Some("Dome Flat"));
        assert_eq!(row.exptime, Some(15.0));
        assert_eq!(row.decker.as_deref(), Some("2.0 arcsec"));
        assert!(row.extra.is_empty());
    }

    #[test]
    fn extra_columns_and_separator_rows() {
        let m = table(&[
            "| filename | frametype | binning | airmass |",
            "|----------|:---------:|---------|---------|",
            "| b1.fits  | arc       | 1,1     | 1.0     |",
            "| b2.fits  | None      | 2,2     | None    |",
        ])
        .unwrap()
        .unwrap();
        assert_eq!(m.columns(), &["filename", "frametype", "binning", "airmass"]);
        assert_eq!(m.rows()[0].extra.get("binning").map(String::as_str), Some("1,1"));
        assert!(m.rows()[1].frametype.is_empty());
        assert_eq!(m.rows()[1].cell("airmass"), "None");
        assert_eq!(m.of_type("arc").count(), 1);
    }

    #[test]
    fn row_cell_count_must_match_header() {
        let err = table(&[HEADER, "| b1.fits | 2015 | arc |"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedRow);
        assert_eq!(err.line, 2);
        assert!(err.expected.contains("7 cells"), "{}", err.expected);
    }

    #[test]
    fn header_needs_filename_and_unique_names() {
        let err = table(&["| file | frametype |"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedTable);

        let err = table(&["| filename | date | date |"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedTable);
        assert_eq!(err.token, "date");
    }

    #[test]
    fn bad_exptime_is_rejected() {
        let err = table(&["| filename | exptime |", "| b1.fits | long |"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedRow);
        assert_eq!(err.token, "long");
    }

    #[test]
    fn header_only_table_is_an_empty_manifest() {
        let m = table(&[HEADER]).unwrap().unwrap();
        assert!(m.is_empty());
        assert_eq!(m.columns().len(), 7);
        assert_eq!(table(&[]).unwrap(), None);
    }
}
