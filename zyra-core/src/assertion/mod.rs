//! # Assertion Engine
//!
//! Evaluates one parsed [`Assertion`] against a [`Response`] in two stages:
//!
//! ```text
//! +------------------+     +-------------------+     +------------------+
//! | path             | --> | resolve_path      | --> | actual value     |
//! | status/headers/  |     | walk the response |     | (serde_json)     |
//! | body...          |     +-------------------+     +------------------+
//! +------------------+                                        |
//!                                                             v
//! +------------------+     +-------------------+     +------------------+
//! | args             | --> | argument          | --> | Registry lookup  |
//! | literals, paths  |     | literal -> JSON   |     | fn(actual, args) |
//! +------------------+     +-------------------+     +------------------+
//! ```
//!
//! Evaluation never fails past its own boundary: every problem, including an unknown
//! function or a missing field, becomes the failure reason of that single assertion.
pub mod builtin;
mod registry;

pub use registry::{Function, Registry};

use serde_json::Value as Json;

use crate::{
    http::{BodyKind, Response},
    model::{Assertion, Path, PathSegment, Value},
};

/// Evaluate `assertion`. `Err` carries the reason it failed.
pub fn evaluate(registry: &Registry, res: &Response, assertion: &Assertion) -> Result<(), String> {
    let function = registry
        .get(&assertion.function)
        .ok_or_else(|| format!("unknown function: {}", assertion.function))?;
    let actual = resolve_path(res, &assertion.path)?;
    let args = assertion
        .args
        .iter()
        .map(|arg| argument(res, arg))
        .collect::<Result<Vec<_>, _>>()?;

    function.call(&actual, &args)
}

/// Value at `path` inside `res`.
///
/// - `status` is the numeric status code and takes no further segments
/// - `headers` is an object of header values; `headers.<Name>` is a case-sensitive lookup
/// - `body` walks the decoded body by key and index
pub fn resolve_path(res: &Response, path: &Path) -> Result<Json, String> {
    let Some((PathSegment::Key(root), rest)) = path.segments().split_first() else {
        return Err(format!("invalid path: {path}"));
    };

    match root.as_str() {
        "status" => {
            if !rest.is_empty() {
                return Err(format!("status has no fields: {path}"));
            }
            Ok(Json::from(res.status))
        }
        "headers" => match rest {
            [] => Ok(Json::Object(
                res.headers
                    .iter()
                    .map(|(k, v)| (k.clone(), Json::String(v.clone())))
                    .collect(),
            )),
            [PathSegment::Key(name)] => res
                .headers
                .get(name)
                .map(|v| Json::String(v.clone()))
                .ok_or_else(|| format!("header not found: {name}")),
            _ => Err(format!("invalid header path: {path}")),
        },
        "body" => walk(&res.body, rest).cloned(),
        other => Err(format!("unknown root: {other}")),
    }
}

fn walk<'a>(value: &'a Json, segments: &[PathSegment]) -> Result<&'a Json, String> {
    let mut current = value;
    for segment in segments {
        current = match (current, segment) {
            (Json::Object(map), PathSegment::Key(key)) => map
                .get(key)
                .ok_or_else(|| format!("field not found: {key}"))?,
            (Json::Array(items), PathSegment::Index(idx)) => items
                .get(*idx)
                .ok_or_else(|| format!("index {idx} out of range (length {})", items.len()))?,
            (Json::Array(_), PathSegment::Key(key)) => {
                return Err(format!("cannot read field {key} of array"))
            }
            (other, PathSegment::Key(key)) => {
                return Err(format!("cannot read field {key} of {}", BodyKind::of(other)))
            }
            (other, PathSegment::Index(idx)) => {
                return Err(format!("cannot index {} with [{idx}]", BodyKind::of(other)))
            }
        };
    }
    Ok(current)
}

/// Turn an argument into the JSON value handed to the function.
fn argument(res: &Response, arg: &Value) -> Result<Json, String> {
    Ok(match arg {
        Value::String(s) | Value::Identifier(s) => Json::String(s.clone()),
        Value::Int(n) | Value::Float(n) => Json::Number(n.clone()),
        Value::Bool(b) => Json::Bool(*b),
        Value::PathRef(path) => resolve_path(res, path)?,
        Value::Template(raw) => return Err(format!("unresolved template: {raw}")),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::parse_assertion;
    use bytes::Bytes;
    // Textual-scope forwarder: a glob-imported `assert_eq` is ambiguous with the
    // prelude in nested modules (incl. those generated by `test_case`).
    macro_rules! assert_eq { ($($t:tt)*) => { pretty_assertions::assert_eq!($($t)*) } }
    use serde_json::json;
    use std::time::Duration;
    use test_case::test_case;

    fn response(body: &str) -> Response {
        Response::new(
            200,
            [
                ("content-type", "application/json".to_string()),
                ("x-request-id", "abc".to_string()),
            ],
            Bytes::from(body.to_string()),
            Duration::from_millis(12),
        )
    }

    fn check(res: &Response, line: &str) -> Result<(), String> {
        let registry = Registry::with_builtins().unwrap();
        evaluate(&registry, res, &parse_assertion(line, 1).unwrap())
    }

    #[test]
    fn nested_body_field() {
        let res = response(r#"{"a": {"b": 3}}"#);
        let path = crate::parser::parse_path("body.a.b").unwrap();
        assert_eq!(resolve_path(&res, &path), Ok(json!(3)));

        let path = crate::parser::parse_path("body.a.c").unwrap();
        assert_eq!(resolve_path(&res, &path), Err("field not found: c".to_string()));
    }

    #[test_case("res.status eq 200" => Ok(()); "status")]
    #[test_case("res.status is int" => Ok(()); "status type")]
    #[test_case("status lt 300" => Ok(()); "status without prefix")]
    #[test_case("res.status.code eq 1" => Err("status has no fields: status.code".to_string()); "status field")]
    #[test_case(r#"res.headers has "Content-Type""# => Ok(()); "header present")]
    #[test_case(r#"res.headers has "X-Missing""# => Err("missing key: X-Missing".to_string()); "header missing")]
    #[test_case(r#"res.headers["Content-Type"] has "json""# => Ok(()); "header substring")]
    #[test_case("res.headers.content-type eq x" => Err("header not found: content-type".to_string()); "header lookup is case-sensitive")]
    #[test_case(r#"res.body.data.id eq "42""# => Ok(()); "numeric string")]
    #[test_case("res.body.data.code eq 007" => Err("007 != 7".to_string()); "string vs int literal")]
    #[test_case("res.body.items len 3" => Ok(()); "len")]
    #[test_case("res.body.items len 2" => Err("length 3 != 2".to_string()); "len mismatch")]
    #[test_case("res.body.items[1].name eq b" => Ok(()); "index")]
    #[test_case("res.body.items[5] is object" => Err("index 5 out of range (length 3)".to_string()); "index out of range")]
    #[test_case("res.body.data[0] eq 1" => Err("cannot index object with [0]".to_string()); "index into object")]
    #[test_case("res.body.data.id.x eq 1" => Err("cannot read field x of int".to_string()); "field of scalar")]
    #[test_case(r#"res.body["display name"] eq "zyra api""# => Ok(()); "quoted key")]
    #[test_case("res.body.data.id eq body.data.copy" => Ok(()); "path reference")]
    #[test_case("res.body.price gt 19.5" => Ok(()); "float")]
    #[test_case("res.body.data.id matches x" => Err("unknown function: matches".to_string()); "unknown function")]
    #[test_case("res.cookies has a" => Err("unknown root: cookies".to_string()); "unknown root")]
    fn evaluate_assertion(line: &str) -> Result<(), String> {
        let res = response(
            r#"{"data": {"id": 42, "copy": 42, "code": "007"}, "items": [{"name": "a"}, {"name": "b"}, {"name": "c"}], "display name": "zyra api", "price": 19.90}"#,
        );
        check(&res, line)
    }

    #[test]
    fn unresolved_template_fails() {
        let res = response("{}");
        assert_eq!(
            check(&res, "body eq {{id}}"),
            Err("unresolved template: {{id}}".to_string())
        );
    }

    #[test_case("res.body.id eq 12345678901234567891" => Err("12345678901234567890 != 12345678901234567891".to_string()); "integer beyond i64")]
    #[test_case("res.body.id eq 12345678901234567890" => Ok(()); "same integer beyond i64")]
    #[test_case("res.body.ratio eq 0.12345678901234567891" => Err("0.123456789012345678901 != 0.12345678901234567891".to_string()); "long fraction")]
    #[test_case("res.body.ratio lt 0.1234567890123456789011" => Ok(()); "long fraction ordering")]
    fn literals_keep_their_precision(line: &str) -> Result<(), String> {
        let res = response(r#"{"id": 12345678901234567890, "ratio": 0.123456789012345678901}"#);
        check(&res, line)
    }

    #[test]
    fn text_body() {
        let res = response("pong");
        assert!(check(&res, "body is string").is_ok());
        assert!(check(&res, "body eq pong").is_ok());
    }
}
