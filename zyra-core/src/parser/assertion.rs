use serde_json::Number;

use crate::{
    http::is_float_literal,
    model::{Assertion, Path, PathSegment, Value},
};

use super::ParseError;

/// Roots a path may start with.
const ROOTS: [&str; 3] = ["status", "headers", "body"];

/// Parse `<path> <function> [<arg> ...]`.
pub fn parse_assertion(line: &str, num: usize) -> Result<Assertion, ParseError> {
    let tokens = split_tokens(line).map_err(|e| ParseError::new(num, e))?;
    if tokens.len() < 2 {
        return Err(ParseError::new(
            num,
            format!("invalid assertion syntax: `{}` (expected <path> <function> [args])", line.trim()),
        ));
    }

    let path = parse_path(&tokens[0]).map_err(|e| ParseError::new(num, e))?;
    let args = tokens[2..]
        .iter()
        .map(|token| parse_value(token))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ParseError::new(num, e))?;

    Ok(Assertion {
        path,
        function: tokens[1].clone(),
        args,
        line: num,
    })
}

/// Split on whitespace that is outside of `"..."`, `[...]` and `{{...}}`.
fn split_tokens(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut in_template = false;
    let mut depth = 0usize;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if !in_quotes && !in_template && chars.peek() == Some(&'{') => {
                in_template = true;
                buf.push(c);
            }
            '}' if in_template && chars.peek() == Some(&'}') => {
                in_template = false;
                buf.push(c);
                buf.extend(chars.next());
            }
            _ if in_template => buf.push(c),
            '"' => {
                in_quotes = !in_quotes;
                buf.push(c);
            }
            '[' if !in_quotes => {
                depth += 1;
                buf.push(c);
            }
            ']' if !in_quotes => {
                depth = depth.saturating_sub(1);
                buf.push(c);
            }
            ' ' | '\t' if !in_quotes && depth == 0 => {
                if !buf.is_empty() {
                    tokens.push(std::mem::take(&mut buf));
                }
            }
            _ => buf.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated string literal".into());
    }
    if in_template {
        return Err("unterminated template".into());
    }
    if depth > 0 {
        return Err("unclosed `[`".into());
    }
    if !buf.is_empty() {
        tokens.push(buf);
    }
    Ok(tokens)
}

/// Parse `a.b[0]["c.d"]` into segments. A leading `res` segment is dropped.
pub fn parse_path(src: &str) -> Result<Path, String> {
    let mut segments = Vec::new();
    let mut buf = String::new();
    let mut chars = src.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !buf.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut buf)));
                }
            }
            '[' => {
                if !buf.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut buf)));
                }
                segments.push(bracket_segment(&mut chars, src)?);
            }
            ']' => return Err(format!("unexpected `]` in path `{src}`")),
            _ => buf.push(c),
        }
    }
    if !buf.is_empty() {
        segments.push(PathSegment::Key(buf));
    }

    if segments.len() > 1 && matches!(&segments[0], PathSegment::Key(k) if k == "res") {
        segments.remove(0);
    }
    if segments.is_empty() {
        return Err("empty path".into());
    }
    Ok(Path(segments))
}

fn bracket_segment(chars: &mut std::str::Chars<'_>, src: &str) -> Result<PathSegment, String> {
    let mut inner = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    loop {
        match chars.next() {
            None => return Err(format!("unclosed `[` in path `{src}`")),
            Some('"') => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            Some(']') if !in_quotes => break,
            Some(c) => inner.push(c),
        }
    }

    if quoted {
        return Ok(PathSegment::Key(inner));
    }
    let inner = inner.trim();
    if inner.is_empty() {
        return Err(format!("empty `[]` in path `{src}`"));
    }
    Ok(match inner.parse::<usize>() {
        Ok(idx) => PathSegment::Index(idx),
        Err(_) => PathSegment::Key(inner.to_string()),
    })
}

/// Classify one argument token. The first matching rule wins.
pub fn parse_value(token: &str) -> Result<Value, String> {
    let token = token.trim();

    if let Some(rest) = token.strip_prefix('"') {
        return match rest.strip_suffix('"') {
            Some(inner) => Ok(Value::String(inner.to_string())),
            None => Err(format!("unterminated string literal `{token}`")),
        };
    }
    if let Some(number) = parse_number(token) {
        return Ok(if is_float_literal(&number.to_string()) {
            Value::Float(number)
        } else {
            Value::Int(number)
        });
    }
    match token {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if is_path_reference(token) {
        return parse_path(token).map(Value::PathRef);
    }
    if token.starts_with("{{") && token.ends_with("}}") {
        return Ok(Value::Template(token.to_string()));
    }
    Ok(Value::Identifier(token.to_string()))
}

/// JSON number text is kept as written. Other spellings Rust accepts, such as `+5` or
/// `.5`, go through `i64`/`f64`.
fn parse_number(token: &str) -> Option<Number> {
    if !token.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if let Ok(number) = serde_json::from_str::<Number>(token) {
        return Some(number);
    }
    if let Ok(i) = token.parse::<i64>() {
        return Some(i.into());
    }
    token.parse::<f64>().ok().and_then(Number::from_f64)
}

fn is_path_reference(token: &str) -> bool {
    let token = token.strip_prefix("res.").unwrap_or(token);
    ROOTS.iter().any(|root| {
        token
            .strip_prefix(root)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.') || rest.starts_with('['))
    })
}

#[cfg(test)]
mod test {
    use super::*;
    // Textual-scope forwarder: a glob-imported `assert_eq` is ambiguous with the
    // prelude in nested modules (incl. those generated by `test_case`).
    macro_rules! assert_eq { ($($t:tt)*) => { pretty_assertions::assert_eq!($($t)*) } }
    use test_case::test_case;

    fn num(s: &str) -> Number {
        serde_json::from_str(s).unwrap()
    }

    fn key(s: &str) -> PathSegment {
        PathSegment::Key(s.into())
    }

    #[test]
    fn parse_simple_assertion() {
        let a = parse_assertion("res.body.data.id eq 42", 7).unwrap();
        assert_eq!(a.path, Path(vec![key("body"), key("data"), key("id")]));
        assert_eq!(a.function, "eq");
        assert_eq!(a.args, vec![Value::Int(42i64.into())]);
        assert_eq!(a.line, 7);
    }

    #[test]
    fn brackets_and_quotes_protect_whitespace() {
        let a = parse_assertion(r#"res.headers["Content Type"] has "application json""#, 1).unwrap();
        assert_eq!(a.path, Path(vec![key("headers"), key("Content Type")]));
        assert_eq!(a.args, vec![Value::String("application json".into())]);
    }

    #[test]
    fn function_without_args() {
        let a = parse_assertion("body.items is array", 3).unwrap();
        assert_eq!(a.args, vec![Value::Identifier("array".into())]);
    }

    #[test_case("status"; "single token")]
    #[test_case("   "; "blank")]
    fn too_few_tokens(line: &str) {
        let err = parse_assertion(line, 9).unwrap_err();
        assert_eq!(err.line, 9);
        assert!(err.message.contains("invalid assertion syntax"), "{}", err.message);
    }

    #[test]
    fn padded_template_is_one_argument() {
        let a = parse_assertion("res.body.id eq {{ id }}", 4).unwrap();
        assert_eq!(a.args, vec![Value::Template("{{ id }}".into())]);

        let a = parse_assertion(r#"body.msg eq "hi {{ name }}" {{a}}{{ b }}"#, 5).unwrap();
        assert_eq!(
            a.args,
            vec![
                Value::String("hi {{ name }}".into()),
                Value::Template("{{a}}{{ b }}".into()),
            ]
        );
    }

    #[test]
    fn unterminated_template_is_rejected() {
        let err = parse_assertion("body.id eq {{ id", 2).unwrap_err();
        assert_eq!(err, ParseError::new(2, "unterminated template"));
    }

    #[test]
    fn unterminated_string_is_rejected() {
        let err = parse_assertion(r#"body.name eq "abc"#, 2).unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
    }

    #[test]
    fn path_with_indices_and_quoted_keys() {
        let path = parse_path(r#"body.items[0]["a.b"].name"#).unwrap();
        assert_eq!(
            path,
            Path(vec![
                key("body"),
                key("items"),
                PathSegment::Index(0),
                key("a.b"),
                key("name"),
            ])
        );
    }

    #[test]
    fn res_prefix_is_dropped() {
        assert_eq!(parse_path("res.status").unwrap(), Path(vec![key("status")]));
        assert_eq!(parse_path("res").unwrap(), Path(vec![key("res")]));
    }

    #[test_case("body[0"; "unclosed bracket")]
    #[test_case("body]"; "stray bracket")]
    #[test_case("body[]"; "empty bracket")]
    #[test_case(""; "empty")]
    fn invalid_paths(src: &str) {
        assert!(parse_path(src).is_err());
    }

    #[test_case("\"3\"" => Value::String("3".into()); "string literal")]
    #[test_case("\"\"" => Value::String("".into()); "empty string")]
    #[test_case("-12" => Value::Int(num("-12")); "int")]
    #[test_case("1.5" => Value::Float(num("1.5")); "float")]
    #[test_case("2e3" => Value::Float(num("2e3")); "exponent")]
    #[test_case("12345678901234567891" => Value::Int(num("12345678901234567891")); "beyond i64")]
    #[test_case("0.12345678901234567890123" => Value::Float(num("0.12345678901234567890123")); "long fraction")]
    #[test_case("+5" => Value::Int(5i64.into()); "explicit plus")]
    #[test_case(".5" => Value::Float(num("0.5")); "leading dot")]
    #[test_case("true" => Value::Bool(true); "bool")]
    #[test_case("{{user_id}}" => Value::Template("{{user_id}}".into()); "template")]
    #[test_case("object" => Value::Identifier("object".into()); "identifier")]
    #[test_case("nan" => Value::Identifier("nan".into()); "float keyword is identifier")]
    #[test_case("bodyguard" => Value::Identifier("bodyguard".into()); "root prefix only")]
    #[test_case("body.id" => Value::PathRef(Path(vec![PathSegment::Key("body".into()), PathSegment::Key("id".into())])); "path reference")]
    #[test_case("res.status" => Value::PathRef(Path(vec![PathSegment::Key("status".into())])); "res path reference")]
    fn classify_value(token: &str) -> Value {
        parse_value(token).unwrap()
    }
}
