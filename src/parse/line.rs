//! Line classification.

use regex::Regex;
use std::sync::LazyLock;

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s+(read|end)\s*$").expect("block regex")
});

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\[+)\s*([^\[\]]*?)\s*(\]+)\s*$").expect("section regex")
});

static ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^\s=\[\]|#]+)\s*=\s*(.*?)\s*$").expect("assignment regex")
});

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("token regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Line<'a> {
    Blank,
    Comment,
    Open(&'a str),
    Close(&'a str),
    /// `[name]` / `[[name]]`; `close` is the closing bracket count.
    Section { depth: usize, close: usize, name: &'a str },
    Assign { key: &'a str, value: &'a str },
    /// Whitespace-separated tokens; at least one.
    Words(&'a str),
}

pub(crate) fn classify(raw: &str) -> Line<'_> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }
    if trimmed.starts_with('#') {
        return Line::Comment;
    }
    if let Some(caps) = BLOCK_RE.captures(raw) {
        let name = caps.get(1).map_or("", |m| m.as_str());
        return match caps.get(2).map(|m| m.as_str()) {
            Some("read") => Line::Open(name),
            _ => Line::Close(name),
        };
    }
    if let Some(caps) = SECTION_RE.captures(raw) {
        return Line::Section {
            depth: caps[1].len(),
            close: caps[3].len(),
            name: caps.get(2).map_or("", |m| m.as_str()),
        };
    }
    if let Some(caps) = ASSIGN_RE.captures(raw) {
        return Line::Assign {
            key: caps.get(1).map_or("", |m| m.as_str()),
            value: caps.get(2).map_or("", |m| m.as_str()),
        };
    }
    Line::Words(trimmed)
}

/// A flat command split into key tokens and the raw value text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Command<'a> {
    pub keys: Vec<&'a str>,
    pub value: &'a str,
}

/// Split `<kw> <subkey...> <value>`.
///
/// The value is the last token, except that a token starting with `[` takes
/// the rest of the line (list literal with spaces) and a trailing quoted
/// string may contain spaces. Returns `None` when there is no key or no value.
pub(crate) fn split_command(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    let tokens: Vec<(usize, &str)> = TOKEN_RE
        .find_iter(line)
        .map(|m| (m.start(), m.as_str()))
        .collect();
    if tokens.len() < 2 {
        return None;
    }

    let mut value_start = tokens[tokens.len() - 1].0;
    if let Some(idx) = tokens.iter().position(|(_, t)| t.starts_with('[')) {
        value_start = tokens[idx].0;
    } else if let Some(q) = line.chars().last().filter(|c| *c == '\'' || *c == '"') {
        if let Some(open) = line[..line.len() - 1].rfind(q) {
            // Only widen the value when the quote opens on a token boundary.
            if tokens.iter().any(|(s, _)| *s == open) {
                value_start = open;
            }
        }
    }

    let keys: Vec<&str> = tokens
        .iter()
        .take_while(|(s, _)| *s < value_start)
        .map(|(_, t)| *t)
        .collect();
    if keys.is_empty() {
        return None;
    }
    Some(Command {
        keys,
        value: line[value_start..].trim(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_each_construct() {
        assert_eq!(classify("   "), Line::Blank);
        assert_eq!(classify("# Read in the data"), Line::Comment);
        assert_eq!(classify("data read"), Line::Open("data"));
        assert_eq!(classify(" spect end "), Line::Close("spect"));
        assert_eq!(
            classify("  [[pixelflatframe]]"),
            Line::Section { depth: 2, close: 2, name: "pixelflatframe" }
        );
        assert_eq!(
            classify("    spectrograph = shane_kast_blue"),
            Line::Assign { key: "spectrograph", value: "shane_kast_blue" }
        );
        assert_eq!(classify("run ncpus 1"), Line::Words("run ncpus 1"));
        assert_eq!(classify("bogus"), Line::Words("bogus"));
    }

    #[test]
    fn assignment_needs_a_single_token_key() {
        assert_eq!(
            classify("run opt a=b"),
            Line::Words("run opt a=b")
        );
        assert_eq!(
            classify("lamps = ArI,NeI"),
            Line::Assign { key: "lamps", value: "ArI,NeI" }
        );
        assert_eq!(
            classify("empty ="),
            Line::Assign { key: "empty", value: "" }
        );
    }

    #[test]
    fn command_value_is_last_token() {
        let c = split_command("reduce bgsubtraction method bspline").unwrap();
        assert_eq!(c.keys, vec!["reduce", "bgsubtraction", "method"]);
        assert_eq!(c.value, "bspline");
    }

    #[test]
    fn command_list_value_may_contain_spaces() {
        let c = split_command("pixflat rej_level [10.0, 10.0]").unwrap();
        assert_eq!(c.keys, vec!["pixflat", "rej_level"]);
        assert_eq!(c.value, "[10.0, 10.0]");
    }

    #[test]
    fn command_quoted_value_may_contain_spaces() {
        let c = split_command("run redux_path 'My Reductions'").unwrap();
        assert_eq!(c.keys, vec!["run", "redux_path"]);
        assert_eq!(c.value, "'My Reductions'");

        // A quote in the middle of a token is not an opening quote.
        let c = split_command("set target it's'").unwrap();
        assert_eq!(c.keys, vec!["set", "target"]);
        assert_eq!(c.value, "it's'");
    }

    #[test]
    fn command_needs_key_and_value() {
        assert_eq!(split_command("run"), None);
        assert_eq!(split_command("[1,2] x"), None);
    }
}
