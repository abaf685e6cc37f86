//! Parsed representation of request files.

use indexmap::IndexMap;
use itertools::Itertools;
use std::fmt::{self, Display};

/// HTTP verbs accepted on a request line. Parsing is case-insensitive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display, serde::Serialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A source line with its 1-based number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub num: usize,
}

/// Split source text into lines, dropping the `\r` of CRLF endings.
pub fn split_lines(src: &str) -> Vec<Line> {
    src.split('\n')
        .enumerate()
        .map(|(i, text)| Line {
            text: text.strip_suffix('\r').unwrap_or(text).to_string(),
            num: i + 1,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Address of a value inside a response, e.g. `body.items[0]["display name"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path(pub Vec<PathSegment>);

impl Path {
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Name of the first segment when it is a key.
    pub fn root(&self) -> Option<&str> {
        match self.0.first() {
            Some(PathSegment::Key(key)) => Some(key),
            _ => None,
        }
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
                PathSegment::Key(key) if is_plain_key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Key(key) => write!(f, "[\"{key}\"]")?,
            }
        }
        Ok(())
    }
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Argument of an assertion function.
///
/// Number literals keep their source text so that comparisons against lossless
/// response numbers stay exact.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(serde_json::Number),
    /// Written with a fraction or an exponent.
    Float(serde_json::Number),
    Bool(bool),
    /// Another location in the same response.
    PathRef(Path),
    /// `{{name}}`, replaced by a [`Value::String`] during resolution.
    Template(String),
    /// Bare word such as `int` or `object`.
    Identifier(String),
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Int(n) | Value::Float(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::PathRef(path) => write!(f, "{path}"),
            Value::Template(raw) | Value::Identifier(raw) => f.write_str(raw),
        }
    }
}

/// One `[assert]` statement: `<path> <function> [<arg> ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    pub path: Path,
    pub function: String,
    pub args: Vec<Value>,
    /// 1-based line in the file the assertion was read from.
    pub line: usize,
}

impl Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.function)?;
        if !self.args.is_empty() {
            write!(f, " {}", self.args.iter().join(" "))?;
        }
        Ok(())
    }
}

/// One parsed request file.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub doc_comment: Option<String>,
    pub method: Method,
    /// Request path or URL, possibly containing `{{name}}` placeholders.
    pub path: String,
    pub headers: IndexMap<String, String>,
    pub query: IndexMap<String, String>,
    pub vars: IndexMap<String, String>,
    pub body: String,
    pub assertions: Vec<Assertion>,
    pub lines: Vec<Line>,
}

impl Document {
    /// Source text of the given 1-based line.
    pub fn line(&self, num: usize) -> Option<&str> {
        self.lines
            .get(num.checked_sub(1)?)
            .map(|line| line.text.as_str())
    }

    pub fn has_body(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    // Textual-scope forwarder: a glob-imported `assert_eq` is ambiguous with the
    // prelude in nested modules (incl. those generated by `test_case`).
    macro_rules! assert_eq { ($($t:tt)*) => { pretty_assertions::assert_eq!($($t)*) } }
    use std::str::FromStr;
    use test_case::test_case;

    #[test_case("get" => Ok(Method::Get))]
    #[test_case("DELETE" => Ok(Method::Delete))]
    #[test_case("pAtCh" => Ok(Method::Patch))]
    #[test_case("OPTIONS" => Err(()))]
    fn parse_method(s: &str) -> Result<Method, ()> {
        Method::from_str(s).map_err(|_| ())
    }

    #[test]
    fn method_display_is_uppercase() {
        assert_eq!(Method::Post.to_string(), "POST");
    }

    #[test]
    fn split_lines_strips_carriage_returns() {
        let lines = split_lines("GET /a\r\n\r\n[assert]");
        assert_eq!(
            lines,
            vec![
                Line {
                    text: "GET /a".into(),
                    num: 1
                },
                Line {
                    text: "".into(),
                    num: 2
                },
                Line {
                    text: "[assert]".into(),
                    num: 3
                },
            ]
        );
    }

    #[test]
    fn path_display() {
        let path = Path(vec![
            PathSegment::Key("body".into()),
            PathSegment::Key("items".into()),
            PathSegment::Index(2),
            PathSegment::Key("display name".into()),
        ]);
        assert_eq!(path.to_string(), r#"body.items[2]["display name"]"#);
        assert_eq!(path.root(), Some("body"));
    }

    #[test]
    fn assertion_display() {
        let assertion = Assertion {
            path: Path(vec![PathSegment::Key("status".into())]),
            function: "eq".into(),
            args: vec![Value::Int(200i64.into())],
            line: 4,
        };
        assert_eq!(assertion.to_string(), "status eq 200");

        let assertion = Assertion {
            path: Path(vec![PathSegment::Key("body".into())]),
            function: "is".into(),
            args: vec![Value::Identifier("object".into())],
            line: 5,
        };
        assert_eq!(assertion.to_string(), "body is object");
    }
}
