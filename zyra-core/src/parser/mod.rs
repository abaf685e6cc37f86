//! Line-oriented parsers for request files and the project config file.
//!
//! ```text
//! expect-top-level --+--> blank / # comment ----------------+
//!        ^           +--> """ doc comment """ -------------+
//!        |           +--> METHOD PATH ---------------------+
//!        |           +--> [section] -> section body -------+
//!        +-------------------------------------------------+
//! ```
//!
//! Both parsers walk a single forward cursor over [`Line`]s and never backtrack.

mod assertion;
mod config;
mod document;

pub use assertion::{parse_assertion, parse_path, parse_value};
pub use config::parse_config;
pub use document::parse_document;

use indexmap::IndexMap;

use crate::model::{Assertion, Line};

/// Grammar violation at a 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            line,
            message: message.into(),
        }
    }
}

pub(crate) struct Cursor<'a> {
    lines: &'a [Line],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(lines: &'a [Line]) -> Cursor<'a> {
        Cursor { lines, pos: 0 }
    }

    pub(crate) fn current(&self) -> Option<&'a Line> {
        self.lines.get(self.pos)
    }

    pub(crate) fn advance(&mut self) {
        self.pos += 1;
    }

    pub(crate) fn lines_since(&self, start: usize) -> &'a [Line] {
        &self.lines[start..self.pos]
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    /// Error at the current line, or at the last line once the input is exhausted.
    pub(crate) fn error(&self, message: impl Into<String>) -> ParseError {
        let line = self
            .current()
            .or_else(|| self.lines.last())
            .map(|l| l.num)
            .unwrap_or(1);
        ParseError::new(line, message)
    }

    /// `key = value` lines until the next section header.
    pub(crate) fn key_values(&mut self, dst: &mut IndexMap<String, String>) -> Result<(), ParseError> {
        while let Some(line) = self.current() {
            let text = line.text.trim();
            if text.is_empty() || text.starts_with('#') {
                self.advance();
                continue;
            }
            if section_name(text).is_some() {
                return Ok(());
            }

            let Some((key, value)) = text.split_once('=') else {
                return Err(self.error("expected key = value"));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(self.error("empty key"));
            }
            dst.insert(key.to_string(), value.trim().to_string());
            self.advance();
        }
        Ok(())
    }

    /// Assertion lines until the next section header.
    pub(crate) fn assertions(&mut self, dst: &mut Vec<Assertion>) -> Result<(), ParseError> {
        while let Some(line) = self.current() {
            let text = line.text.trim();
            if text.is_empty() || text.starts_with('#') {
                self.advance();
                continue;
            }
            if section_name(text).is_some() {
                return Ok(());
            }

            dst.push(parse_assertion(text, line.num)?);
            self.advance();
        }
        Ok(())
    }
}

/// Lower-cased section name when `line` is a header such as `[Headers]`.
///
/// Names start with an ASCII letter and contain letters, digits, `_` or `-`, so JSON
/// such as `[1, 2]` inside a body is not mistaken for a header.
pub(crate) fn section_name(line: &str) -> Option<String> {
    let name = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    let mut chars = name.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return None;
    }
    Some(name.to_ascii_lowercase())
}

pub(crate) fn join_lines(lines: &[Line]) -> String {
    lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
