//! Reduction-file parser.
//!
//! Lines are scanned top to bottom. Outside a block a line is a comment, a
//! blank, a block delimiter (`<name> read` / `<name> end`), a section header
//! (`[name]`, `[[name]]`, ...), a `key = value` assignment, or a flat command
//! (`<kw> <subkey...> <value>`). Inside a block the block kind decides:
//! `data` takes globs, `path` lines and a pipe table; `setup` takes YAML;
//! `spect` and `calibrations` take assignments prefixed with the block name.
//!
//! Nothing is returned unless the whole text parses.

pub mod error;
pub(crate) mod line;

pub use error::{ErrorKind, ParseError};

use crate::config::path::is_valid_segment;
use crate::config::{Config, FileSpec, Schema, SettingPath, Settings, Value};
use crate::manifest::table::TableBuilder;
use crate::setup::SetupBuilder;
use error::Result;
use line::{Line, classify, split_command};

use tracing::{debug, info, warn};

/// Caller-controlled validation.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Reject settings the schema does not cover.
    pub strict: bool,
    /// Require at least one input (glob or manifest row) in a `data` block.
    pub require_inputs: bool,
    pub schema: Schema,
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }
}

/// Parse with permissive defaults.
pub fn parse(text: &str) -> Result<Config> {
    parse_with(text, &ParseOptions::default())
}

pub fn parse_with(text: &str, opts: &ParseOptions) -> Result<Config> {
    let mut parser = Parser::new(opts);
    let mut last = 0;
    for (idx, raw) in text.lines().enumerate() {
        last = idx + 1;
        parser.line(last, raw)?;
    }
    let config = parser.finish(last)?;
    info!(
        settings = config.settings.len(),
        globs = config.globs().len(),
        frames = config.manifest.as_ref().map_or(0, |m| m.len()),
        setups = config.setups.as_ref().map_or(0, |s| s.len()),
        "reduction file parsed"
    );
    Ok(config)
}

const SETTINGS_BLOCKS: &[&str] = &["spect", "calibrations"];

#[derive(Debug)]
enum BlockState {
    Data { files: FileSpec, table: TableBuilder },
    Setup(SetupBuilder),
    /// Assignments are committed only when the block closes.
    Settings { pending: Vec<(usize, String, SettingPath, Value)> },
}

#[derive(Debug)]
struct OpenBlock {
    name: String,
    line: usize,
    state: BlockState,
}

struct Parser<'o> {
    opts: &'o ParseOptions,
    settings: Settings,
    sections: Vec<String>,
    open: Option<OpenBlock>,
    config: Config,
    data_line: Option<usize>,
    setup_line: Option<usize>,
}

impl<'o> Parser<'o> {
    fn new(opts: &'o ParseOptions) -> Self {
        Self {
            opts,
            settings: Settings::new(),
            sections: Vec::new(),
            open: None,
            config: Config::default(),
            data_line: None,
            setup_line: None,
        }
    }

    fn line(&mut self, lno: usize, raw: &str) -> Result<()> {
        let kind = classify(raw);
        match kind {
            Line::Blank | Line::Comment => return Ok(()),
            Line::Open(name) => return self.open_block(lno, name),
            Line::Close(name) => return self.close_block(lno, name),
            _ => {}
        }

        if self.open.is_some() {
            return self.block_line(lno, raw, kind);
        }

        match kind {
            Line::Section { depth, close, name } => self.section(lno, raw, depth, close, name),
            Line::Assign { key, value } => {
                let path = key_path(lno, &self.sections, &[key])?;
                let value = infer(lno, value, Value::infer_assignment)?;
                self.assign(lno, raw.trim(), path, value)
            }
            Line::Words(words) => {
                let Some(cmd) = split_command(words) else {
                    return Err(ParseError::new(
                        ErrorKind::UnknownKeyword,
                        lno,
                        words,
                        "a block (`<name> read`), a section header, `key = value`, or `<keyword> <subkey...> <value>`",
                    ));
                };
                let path = key_path(lno, &[], &cmd.keys)?;
                let value = infer(lno, cmd.value, Value::infer)?;
                self.assign(lno, words, path, value)
            }
            Line::Blank | Line::Comment | Line::Open(_) | Line::Close(_) => Ok(()),
        }
    }

    fn open_block(&mut self, lno: usize, name: &str) -> Result<()> {
        if let Some(open) = &self.open {
            return Err(ParseError::new(
                ErrorKind::UnbalancedBlock,
                lno,
                format!("{} read", name),
                format!(
                    "`{} end` to close `{}` block opened at line {}",
                    open.name, open.name, open.line
                ),
            ));
        }

        let state = match name {
            "data" => {
                if let Some(prev) = self.data_line {
                    return Err(duplicate(lno, name, prev));
                }
                self.data_line = Some(lno);
                BlockState::Data {
                    files: FileSpec::default(),
                    table: TableBuilder::default(),
                }
            }
            "setup" => {
                if let Some(prev) = self.setup_line {
                    return Err(duplicate(lno, name, prev));
                }
                self.setup_line = Some(lno);
                BlockState::Setup(SetupBuilder::new(lno))
            }
            n if SETTINGS_BLOCKS.contains(&n) => BlockState::Settings {
                pending: Vec::new(),
            },
            other => {
                return Err(ParseError::new(
                    ErrorKind::UnknownKeyword,
                    lno,
                    format!("{} read", other),
                    "one of `data read`, `setup read`, `spect read`, `calibrations read`",
                ));
            }
        };

        debug!(block = name, line = lno, "block opened");
        self.sections.clear();
        self.open = Some(OpenBlock {
            name: name.to_string(),
            line: lno,
            state,
        });
        Ok(())
    }

    fn close_block(&mut self, lno: usize, name: &str) -> Result<()> {
        let Some(open) = self.open.take() else {
            return Err(ParseError::new(
                ErrorKind::UnbalancedBlock,
                lno,
                format!("{} end", name),
                format!("a preceding `{} read`", name),
            ));
        };
        if open.name != name {
            return Err(ParseError::new(
                ErrorKind::UnbalancedBlock,
                lno,
                format!("{} end", name),
                format!(
                    "`{} end` to close `{}` block opened at line {}",
                    open.name, open.name, open.line
                ),
            ));
        }

        match open.state {
            BlockState::Data { files, table } => {
                let manifest = table.finish();
                let inputs = files.globs.len() + manifest.as_ref().map_or(0, |m| m.len());
                if inputs == 0 && self.opts.require_inputs {
                    return Err(ParseError::new(
                        ErrorKind::EmptyFileSpec,
                        open.line,
                        "data read",
                        "at least one file glob or frame row before `data end`",
                    ));
                }
                debug!(globs = files.globs.len(), paths = files.paths.len(), "data block closed");
                self.config.files = Some(files);
                self.config.manifest = manifest;
            }
            BlockState::Setup(builder) => {
                self.config.setups = Some(builder.finish()?);
            }
            BlockState::Settings { pending } => {
                if pending.is_empty() {
                    warn!(block = %open.name, line = open.line, "empty settings block");
                }
                for (line, token, path, value) in pending {
                    self.assign(line, &token, path, value)?;
                }
            }
        }
        Ok(())
    }

    fn block_line(&mut self, lno: usize, raw: &str, kind: Line<'_>) -> Result<()> {
        let Some(open) = self.open.as_mut() else {
            return Ok(());
        };

        match &mut open.state {
            BlockState::Data { files, table } => {
                let trimmed = raw.trim();
                if trimmed.starts_with('|') {
                    return table.push_line(trimmed, lno);
                }
                if let Some(rest) = trimmed.strip_prefix("path") {
                    if rest.starts_with(char::is_whitespace) {
                        files.paths.push(rest.trim().to_string());
                        return Ok(());
                    }
                    if rest.is_empty() {
                        return Err(ParseError::new(
                            ErrorKind::MalformedValue,
                            lno,
                            trimmed,
                            "`path <directory>`",
                        ));
                    }
                }
                if table.has_header() {
                    debug!(line = lno, "glob line after the frame table");
                }
                files.globs.push(trimmed.to_string());
                Ok(())
            }
            BlockState::Setup(builder) => {
                builder.push_line(lno, raw);
                Ok(())
            }
            BlockState::Settings { pending } => {
                let (path, value) = settings_line(lno, raw, kind, &open.name)?;
                pending.push((lno, raw.trim().to_string(), path, value));
                Ok(())
            }
        }
    }

    fn section(&mut self, lno: usize, raw: &str, depth: usize, close: usize, name: &str) -> Result<()> {
        let token = raw.trim();
        if depth != close {
            return Err(ParseError::new(
                ErrorKind::MalformedSection,
                lno,
                token,
                format!("{} closing brackets", depth),
            ));
        }
        if !is_valid_segment(name) {
            return Err(ParseError::new(
                ErrorKind::MalformedSection,
                lno,
                token,
                "a section name without spaces, brackets or any of `#`, `,`, `=`, `|`, `/`",
            ));
        }
        if depth > self.sections.len() + 1 {
            return Err(ParseError::new(
                ErrorKind::MalformedSection,
                lno,
                token,
                format!("section depth at most {}", self.sections.len() + 1),
            ));
        }
        self.sections.truncate(depth - 1);
        self.sections.push(name.to_string());
        Ok(())
    }

    fn assign(&mut self, lno: usize, token: &str, path: SettingPath, value: Value) -> Result<()> {
        if self.opts.strict && !self.opts.schema.allows(&path) {
            return Err(ParseError::new(
                ErrorKind::UnknownSetting,
                lno,
                path.to_string(),
                "a setting listed in the schema",
            ));
        }
        match self.settings.insert(path.clone(), value) {
            Ok(Some(prev)) => {
                debug!(path = %path, previous = %prev, line = lno, "setting overridden");
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(conflict) => Err(ParseError::new(
                ErrorKind::PathConflict,
                lno,
                token,
                format!(
                    "`{}` to be either a value or a section, not both (see `{}`)",
                    path, conflict.existing
                ),
            )),
        }
    }

    fn finish(mut self, last_line: usize) -> Result<Config> {
        if let Some(open) = &self.open {
            return Err(ParseError::new(
                ErrorKind::UnbalancedBlock,
                open.line,
                format!("{} read", open.name),
                format!(
                    "`{} end` to close `{}` block opened at line {}",
                    open.name, open.name, open.line
                ),
            ));
        }
        if self.opts.require_inputs && self.config.files.is_none() {
            return Err(ParseError::new(
                ErrorKind::EmptyFileSpec,
                last_line,
                "end of input",
                "a `data read` block listing input files",
            ));
        }
        self.config.settings = std::mem::take(&mut self.settings);
        Ok(self.config)
    }
}

/// One line of a `spect`/`calibrations` block, prefixed with the block name.
fn settings_line(lno: usize, raw: &str, kind: Line<'_>, block: &str) -> Result<(SettingPath, Value)> {
    let prefix = [block.to_string()];
    match kind {
        Line::Assign { key, value } => Ok((
            key_path(lno, &prefix, &[key])?,
            infer(lno, value, Value::infer_assignment)?,
        )),
        Line::Words(words) => {
            let Some(cmd) = split_command(words) else {
                return Err(ParseError::new(
                    ErrorKind::MalformedValue,
                    lno,
                    words,
                    format!("`<key...> <value>` inside the `{}` block", block),
                ));
            };
            Ok((key_path(lno, &prefix, &cmd.keys)?, infer(lno, cmd.value, Value::infer)?))
        }
        _ => Err(ParseError::new(
            ErrorKind::MalformedSection,
            lno,
            raw.trim(),
            format!("`{} end` before a section header", block),
        )),
    }
}

/// Build `prefix.key...`, splitting dotted keys.
fn key_path(lno: usize, prefix: &[String], keys: &[&str]) -> Result<SettingPath> {
    let mut segments = prefix.to_vec();
    for key in keys {
        for seg in key.split('.') {
            if !is_valid_segment(seg) {
                return Err(ParseError::new(
                    ErrorKind::MalformedKey,
                    lno,
                    keys.join(" "),
                    "key segments without spaces, brackets or any of `#`, `,`, `=`, `|`, `/`",
                ));
            }
            segments.push(seg.to_string());
        }
    }
    Ok(SettingPath::new(segments))
}

fn duplicate(lno: usize, name: &str, prev: usize) -> ParseError {
    ParseError::new(
        ErrorKind::DuplicateBlock,
        lno,
        format!("{} read", name),
        format!("a single `{}` block (first opened at line {})", name, prev),
    )
}

fn infer(
    lno: usize,
    raw: &str,
    f: fn(&str) -> std::result::Result<Value, crate::config::value::ValueError>,
) -> Result<Value> {
    f(raw).map_err(|e| ParseError::new(ErrorKind::MalformedValue, lno, raw.trim(), e.to_string()))
}
