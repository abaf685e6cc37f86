use indexmap::IndexMap;
use std::str::FromStr;
use tracing::*;

use crate::model::{split_lines, Document, Line, Method};

use super::{join_lines, section_name, Cursor, ParseError};

const DOC_COMMENT_MARKER: &str = "\"\"\"";

/// Parse one request file.
pub fn parse_document(src: &str) -> Result<Document, ParseError> {
    let lines = split_lines(src);
    let mut builder = Builder::default();
    let mut cursor = Cursor::new(&lines);

    while let Some(line) = cursor.current() {
        let text = line.text.trim();

        if text.is_empty() || text.starts_with('#') {
            cursor.advance();
        } else if text == DOC_COMMENT_MARKER {
            builder.doc_comment(&mut cursor, line)?;
        } else if let Some(section) = section_name(text) {
            cursor.advance();
            builder.section(&mut cursor, line, &section)?;
        } else if is_request_line(text) {
            builder.request_line(line)?;
            cursor.advance();
        } else {
            return Err(ParseError::new(
                line.num,
                format!("unexpected content: `{text}`"),
            ));
        }
    }

    builder.finish(lines)
}

fn is_request_line(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .is_some_and(|word| Method::from_str(word).is_ok())
}

#[derive(Default)]
struct Builder {
    doc_comment: Option<String>,
    request: Option<(Method, String)>,
    headers: IndexMap<String, String>,
    query: IndexMap<String, String>,
    vars: IndexMap<String, String>,
    body: Option<String>,
    assertions: Vec<crate::model::Assertion>,
}

impl Builder {
    fn doc_comment(&mut self, cursor: &mut Cursor<'_>, opening: &Line) -> Result<(), ParseError> {
        if self.doc_comment.is_some() {
            return Err(ParseError::new(opening.num, "duplicate doc comment"));
        }
        cursor.advance();
        let start = cursor.position();
        while let Some(line) = cursor.current() {
            if line.text.trim() == DOC_COMMENT_MARKER {
                self.doc_comment = Some(join_lines(cursor.lines_since(start)));
                cursor.advance();
                return Ok(());
            }
            cursor.advance();
        }
        Err(ParseError::new(opening.num, "unterminated doc comment"))
    }

    fn request_line(&mut self, line: &Line) -> Result<(), ParseError> {
        if self.request.is_some() {
            return Err(ParseError::new(line.num, "duplicate request line"));
        }
        let mut parts = line.text.split_whitespace();
        let method = parts
            .next()
            .and_then(|m| Method::from_str(m).ok())
            .ok_or_else(|| ParseError::new(line.num, "invalid request line: missing method"))?;
        let path = parts
            .next()
            .ok_or_else(|| ParseError::new(line.num, "invalid request line: missing path"))?;
        if let Some(extra) = parts.next() {
            debug!("line {}: ignoring trailing request line content `{extra}`", line.num);
        }
        self.request = Some((method, path.to_string()));
        Ok(())
    }

    fn section(&mut self, cursor: &mut Cursor<'_>, header: &Line, name: &str) -> Result<(), ParseError> {
        match name {
            "headers" => cursor.key_values(&mut self.headers),
            "query" => cursor.key_values(&mut self.query),
            "vars" => cursor.key_values(&mut self.vars),
            "assert" => cursor.assertions(&mut self.assertions),
            "body" => {
                let start = cursor.position();
                while let Some(line) = cursor.current() {
                    if section_name(line.text.trim()).is_some() {
                        break;
                    }
                    cursor.advance();
                }
                let body = join_lines(cursor.lines_since(start));
                match &mut self.body {
                    Some(existing) => {
                        existing.push('\n');
                        existing.push_str(&body);
                    }
                    None => self.body = Some(body),
                }
                Ok(())
            }
            _ => Err(ParseError::new(header.num, format!("unknown section: {name}"))),
        }
    }

    fn finish(self, lines: Vec<Line>) -> Result<Document, ParseError> {
        let Some((method, path)) = self.request else {
            return Err(ParseError::new(1, "missing request line"));
        };
        Ok(Document {
            doc_comment: self.doc_comment,
            method,
            path,
            headers: self.headers,
            query: self.query,
            vars: self.vars,
            body: self.body.unwrap_or_default(),
            assertions: self.assertions,
            lines,
        })
    }
}
