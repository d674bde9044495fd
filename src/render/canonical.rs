//! Canonical re-emission of a loaded configuration.
//!
//! Output layout: top-level keys, bracketed sections, the setup block, then
//! the data block (paths, globs, frame table). Parsing the output yields a
//! configuration equal to the input.

use crate::config::{Config, FileSpec, Settings};
use crate::manifest::FrameManifest;
use crate::setup::{InstrumentBlock, Meta};
use crate::Result;

use regex::Regex;
use std::fmt::Write;
use std::sync::LazyLock;

const INDENT: &str = "    ";

// Setup ids that can be written as a `Setup <id>:` header line.
static HEADER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s:]+$").expect("setup id regex"));

pub fn to_string(config: &Config) -> Result<String> {
    let mut out = String::new();
    write_settings(&mut out, config.settings())?;

    if let Some(setups) = config.setups() {
        if !out.is_empty() {
            out.push('\n');
        }
        write_setups(&mut out, setups)?;
    }

    if config.files().is_some() || config.manifest().is_some() {
        if !out.is_empty() {
            out.push('\n');
        }
        let files = config.files().cloned().unwrap_or_default();
        write_data(&mut out, &files, config.manifest())?;
    }

    Ok(out)
}

fn write_settings(out: &mut String, settings: &Settings) -> Result<()> {
    // Top-level keys must precede every section header.
    for (path, value) in settings.iter().filter(|(p, _)| p.len() == 1) {
        writeln!(out, "{} = {}", path, value)?;
    }

    let mut current: Vec<String> = Vec::new();
    for (path, value) in settings.iter().filter(|(p, _)| p.len() > 1) {
        let parent = path.parent();
        let parent = parent.segments();
        let common = current
            .iter()
            .zip(parent)
            .take_while(|(a, b)| a == b)
            .count();

        if common == parent.len() && common < current.len() {
            // Back up to an enclosing section: re-declare it.
            write_header(out, parent.len(), &parent[parent.len() - 1])?;
        } else {
            for depth in common..parent.len() {
                write_header(out, depth + 1, &parent[depth])?;
            }
        }
        current = parent.to_vec();

        let key = path.leaf().unwrap_or_default();
        writeln!(out, "{}{} = {}", INDENT.repeat(current.len()), key, value)?;
    }
    Ok(())
}

fn write_header(out: &mut String, depth: usize, name: &str) -> Result<()> {
    writeln!(
        out,
        "{}{}{}{}",
        INDENT.repeat(depth - 1),
        "[".repeat(depth),
        name,
        "]".repeat(depth)
    )?;
    Ok(())
}

fn write_setups(out: &mut String, setups: &InstrumentBlock) -> Result<()> {
    out.push_str("setup read\n");

    // Ids that cannot be a header line go first, as one YAML mapping.
    let (plain, headed): (Vec<_>, Vec<_>) = setups
        .iter()
        .partition(|(id, _)| !HEADER_ID_RE.is_match(id));
    if !plain.is_empty() {
        let mapping = Meta::Map(
            plain
                .iter()
                .map(|(id, meta)| (id.to_string(), (*meta).clone()))
                .collect(),
        );
        write_yaml(out, &mapping, 1)?;
    }
    for (id, meta) in headed {
        writeln!(out, " Setup {}:", id)?;
        write_yaml(out, meta, 3)?;
    }

    out.push_str("setup end\n");
    Ok(())
}

fn write_yaml(out: &mut String, meta: &Meta, indent: usize) -> Result<()> {
    if meta.as_map().is_some_and(|m| m.is_empty()) {
        return Ok(());
    }
    let text = serde_yaml::to_string(&meta.to_yaml())?;
    for line in text.lines() {
        writeln!(out, "{}{}", " ".repeat(indent), line)?;
    }
    Ok(())
}

fn write_data(out: &mut String, files: &FileSpec, manifest: Option<&FrameManifest>) -> Result<()> {
    out.push_str("data read\n");
    for dir in &files.paths {
        writeln!(out, " path {}", dir)?;
    }
    for glob in &files.globs {
        writeln!(out, " {}", glob)?;
    }
    if let Some(manifest) = manifest {
        write_table(out, manifest)?;
    }
    out.push_str("data end\n");
    Ok(())
}

/// Right-aligned pipe table, one column width per header.
fn write_table(out: &mut String, manifest: &FrameManifest) -> Result<()> {
    let columns = manifest.columns();
    let cells: Vec<Vec<String>> = manifest
        .rows()
        .iter()
        .map(|row| columns.iter().map(|c| row.cell(c)).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut write_row = |row: &[String]| -> Result<()> {
        out.push('|');
        for (cell, width) in row.iter().zip(&widths) {
            write!(out, " {:>width$} |", cell, width = width)?;
        }
        out.push('\n');
        Ok(())
    };

    write_row(columns)?;
    for row in &cells {
        write_row(row.as_slice())?;
    }
    Ok(())
}

/// Dotted `key = value` listing, one setting per line.
pub fn settings_listing(settings: &Settings) -> String {
    settings
        .iter()
        .map(|(p, v)| format!("{} = {}\n", p, v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sections_are_reopened_when_backing_up() {
        let cfg = crate::parse(
            "top = True\n[a]\n  x = 1\n  [[b]]\n    c = 2\n[a]\n  z = 3\n",
        )
        .unwrap();
        let text = to_string(&cfg).unwrap();
        assert_eq!(
            text,
            "top = True\n[a]\n    [[b]]\n        c = 2\n[a]\n    x = 1\n    z = 3\n"
        );
        assert_eq!(crate::parse(&text).unwrap(), cfg);
    }

    #[test]
    fn table_is_aligned() {
        let cfg = crate::parse(
            "data read\n path /raw\n| filename | frametype | exptime |\n| b1.fits.gz | arc,tilt | 30 |\ndata end\n",
        )
        .unwrap();
        let text = to_string(&cfg).unwrap();
        assert_eq!(
            text,
            "data read\n path /raw\n\
             |   filename | frametype | exptime |\n\
             | b1.fits.gz |  arc,tilt |      30 |\n\
             data end\n"
        );
    }

    #[test]
    fn listing_is_dotted() {
        let cfg = crate::parse("run ncpus 1\npixflat rej_level [10.0,10.0]\n").unwrap();
        assert_eq!(
            settings_listing(cfg.settings()),
            "pixflat.rej_level = [10.0,10.0]\nrun.ncpus = 1\n"
        );
    }
}
