//! Built-in assertion functions.
//!
//! Comparison rule for `eq`/`ne`: when at least one side is a JSON number and the other
//! side is a number or a string holding a JSON number, the values are compared
//! numerically. Anything else is compared by its text, so `"3"` and `"03"` differ.
//! Ordering functions (`gt`, `gte`, `lt`, `lte`) require both sides to be numeric.

use serde_json::Value;
use std::cmp::Ordering;

use super::Registry;
use crate::{
    http::BodyKind,
    Result,
};

type Outcome = std::result::Result<(), String>;

pub(crate) fn install(registry: &mut Registry) -> Result<()> {
    registry.register("eq", eq)?;
    registry.register("ne", ne)?;
    registry.register("gt", gt)?;
    registry.register("gte", gte)?;
    registry.register("lt", lt)?;
    registry.register("lte", lte)?;
    registry.register("is", is)?;
    registry.register("has", has)?;
    registry.register("len", len)?;
    Ok(())
}

pub fn eq(actual: &Value, args: &[Value]) -> Outcome {
    let expected = single_arg("eq", args)?;
    if equals(actual, expected) {
        Ok(())
    } else {
        Err(format!("{} != {}", text(actual), text(expected)))
    }
}

pub fn ne(actual: &Value, args: &[Value]) -> Outcome {
    let expected = single_arg("ne", args)?;
    if equals(actual, expected) {
        Err(format!("{} == {}", text(actual), text(expected)))
    } else {
        Ok(())
    }
}

pub fn gt(actual: &Value, args: &[Value]) -> Outcome {
    order("gt", actual, args, Ordering::is_gt, "<=")
}

pub fn gte(actual: &Value, args: &[Value]) -> Outcome {
    order("gte", actual, args, Ordering::is_ge, "<")
}

pub fn lt(actual: &Value, args: &[Value]) -> Outcome {
    order("lt", actual, args, Ordering::is_lt, ">=")
}

pub fn lte(actual: &Value, args: &[Value]) -> Outcome {
    order("lte", actual, args, Ordering::is_le, ">")
}

/// Type predicate over `json`, `object`, `array`, `string`, `int`, `float`, `bool` and `null`.
pub fn is(actual: &Value, args: &[Value]) -> Outcome {
    let Value::String(expected) = single_arg("is", args)? else {
        return Err("is expects a type name".to_string());
    };
    let kind = BodyKind::of(actual);
    let ok = match expected.as_str() {
        "json" => matches!(kind, BodyKind::Object | BodyKind::Array),
        "object" => kind == BodyKind::Object,
        "array" => kind == BodyKind::Array,
        "string" => kind == BodyKind::String,
        "int" => kind == BodyKind::Int,
        "float" => kind == BodyKind::Float,
        "bool" => kind == BodyKind::Bool,
        "null" => kind == BodyKind::Null,
        other => return Err(format!("unknown type: {other}")),
    };
    if ok {
        Ok(())
    } else {
        Err(format!("value is not {expected}, got {kind}"))
    }
}

/// Key presence in an object, element presence in an array, substring of a string.
pub fn has(actual: &Value, args: &[Value]) -> Outcome {
    let needle = single_arg("has", args)?;
    match actual {
        Value::Object(map) => {
            let key = text(needle);
            if map.contains_key(&key) {
                Ok(())
            } else {
                Err(format!("missing key: {key}"))
            }
        }
        Value::Array(items) => {
            if items.iter().any(|item| equals(item, needle)) {
                Ok(())
            } else {
                Err(format!("value not found: {}", text(needle)))
            }
        }
        Value::String(s) => {
            let sub = text(needle);
            if s.contains(&sub) {
                Ok(())
            } else {
                Err(format!("\"{s}\" does not contain \"{sub}\""))
            }
        }
        other => Err(format!("has not supported on {}", BodyKind::of(other))),
    }
}

/// Exact length of a string (in characters), an array or an object.
pub fn len(actual: &Value, args: &[Value]) -> Outcome {
    let expected = coerce(single_arg("len", args)?)
        .and_then(|n| n.as_u64())
        .ok_or_else(|| "len expects a non-negative integer".to_string())?;
    let actual_len = match actual {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => return Err(format!("cannot get length of {}", BodyKind::of(other))),
    };

    if actual_len as u64 == expected {
        Ok(())
    } else {
        Err(format!("length {actual_len} != {expected}"))
    }
}

fn single_arg<'a>(name: &str, args: &'a [Value]) -> std::result::Result<&'a Value, String> {
    match args {
        [arg] => Ok(arg),
        _ => Err(format!("{name} expects 1 argument, got {}", args.len())),
    }
}

fn order(
    name: &str,
    actual: &Value,
    args: &[Value],
    accept: fn(Ordering) -> bool,
    negated: &str,
) -> Outcome {
    let expected = single_arg(name, args)?;
    let (Some(a), Some(e)) = (coerce(actual), coerce(expected)) else {
        return Err(format!(
            "{name} needs numbers, got {} and {}",
            text(actual),
            text(expected)
        ));
    };
    if accept(a.compare(&e)) {
        Ok(())
    } else {
        Err(format!("{} {negated} {}", text(actual), text(expected)))
    }
}

fn equals(a: &Value, b: &Value) -> bool {
    if a.is_number() || b.is_number() {
        if let (Some(x), Some(y)) = (coerce(a), coerce(b)) {
            return x == y;
        }
    }
    text(a) == text(b)
}

/// Display form used for text comparison and failure reasons.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Exact decimal value of a JSON number: `0.digits × 10^exp`.
///
/// `digits` has no leading or trailing zeros and is empty for zero, so two numbers are
/// equal exactly when their fields are.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Num {
    negative: bool,
    digits: String,
    exp: i64,
}

impl Num {
    fn from_json(n: &serde_json::Number) -> Option<Num> {
        let literal = n.to_string();
        let (negative, rest) = match literal.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, literal.as_str()),
        };
        let (mantissa, exp) = match rest.find(['e', 'E']) {
            Some(i) => (&rest[..i], rest[i + 1..].parse::<i64>().ok()?),
            None => (rest, 0),
        };
        let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if !int.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }

        let all = format!("{int}{frac}");
        let significant = all.trim_start_matches('0');
        let leading_zeros = (all.len() - significant.len()) as i64;
        let digits = significant.trim_end_matches('0').to_string();
        if digits.is_empty() {
            return Some(Num {
                negative: false,
                digits,
                exp: 0,
            });
        }
        let exp = exp.checked_add(int.len() as i64 - leading_zeros)?;
        Some(Num {
            negative,
            digits,
            exp,
        })
    }

    fn signum(&self) -> i8 {
        match (self.digits.is_empty(), self.negative) {
            (true, _) => 0,
            (false, true) => -1,
            (false, false) => 1,
        }
    }

    fn compare(&self, other: &Num) -> Ordering {
        let (a, b) = (self.signum(), other.signum());
        if a != b || a == 0 {
            return a.cmp(&b);
        }
        let magnitude = self
            .exp
            .cmp(&other.exp)
            .then_with(|| self.digits.cmp(&other.digits));
        if a < 0 {
            magnitude.reverse()
        } else {
            magnitude
        }
    }

    /// The value as a count, when it is a non-negative integer.
    fn as_u64(&self) -> Option<u64> {
        if self.digits.is_empty() {
            return Some(0);
        }
        let exp = usize::try_from(self.exp).ok()?;
        if self.negative || exp < self.digits.len() {
            return None;
        }
        format!("{}{}", self.digits, "0".repeat(exp - self.digits.len()))
            .parse()
            .ok()
    }
}

/// Numbers, and strings whose trimmed text is a JSON number.
fn coerce(value: &Value) -> Option<Num> {
    match value {
        Value::Number(n) => Num::from_json(n),
        Value::String(s) => serde_json::from_str::<serde_json::Number>(s.trim())
            .ok()
            .and_then(|n| Num::from_json(&n)),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    // Textual-scope forwarder: a glob-imported `assert_eq` is ambiguous with the
    // prelude in nested modules (incl. those generated by `test_case`).
    macro_rules! assert_eq { ($($t:tt)*) => { pretty_assertions::assert_eq!($($t)*) } }
    use serde_json::json;
    use test_case::test_case;

    #[test_case(json!(3), json!("3") => Ok(()); "number vs numeric string")]
    #[test_case(json!("3"), json!(3) => Ok(()); "numeric string vs number")]
    #[test_case(json!(3), json!(3.0) => Ok(()); "int vs float")]
    #[test_case(json!("3"), json!("03") => Err("3 != 03".to_string()); "strings compare as text")]
    #[test_case(json!("abc"), json!("abc") => Ok(()); "equal strings")]
    #[test_case(json!(true), json!(true) => Ok(()); "bools")]
    #[test_case(json!(null), json!("null") => Ok(()); "null text")]
    #[test_case(json!(200), json!(201) => Err("200 != 201".to_string()); "different numbers")]
    #[test_case(number("12345678901234567890"), number("12345678901234567891") => Err("12345678901234567890 != 12345678901234567891".to_string()); "integers beyond i64")]
    #[test_case(number("0.10000000000000000001"), number("0.1") => Err("0.10000000000000000001 != 0.1".to_string()); "long fractions")]
    #[test_case(number("1.50"), number("15e-1") => Ok(()); "same value in other spelling")]
    #[test_case(number("-0.0"), json!(0) => Ok(()); "negative zero")]
    fn eq_rule(actual: Value, expected: Value) -> Outcome {
        eq(&actual, &[expected])
    }

    fn number(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn ne_fails_on_equal() {
        assert_eq!(ne(&json!(1), &[json!(1)]), Err("1 == 1".to_string()));
        assert!(ne(&json!("3"), &[json!("03")]).is_ok());
    }

    #[test]
    fn large_integers_compare_exactly() {
        let a: Value = serde_json::from_str("12345678901234567890").unwrap();
        let b: Value = serde_json::from_str("12345678901234567891").unwrap();
        assert!(eq(&a, &[b]).is_err());
    }

    #[test_case(gt, json!(5), json!(3) => Ok(()))]
    #[test_case(gt, json!(3), json!(3) => Err("3 <= 3".to_string()))]
    #[test_case(gte, json!(3), json!("3") => Ok(()))]
    #[test_case(lt, json!(2.5), json!(3) => Ok(()))]
    #[test_case(lte, json!(4), json!(3) => Err("4 > 3".to_string()))]
    #[test_case(lt, json!("a"), json!(3) => Err("lt needs numbers, got a and 3".to_string()))]
    #[test_case(gt, number("12345678901234567891"), number("12345678901234567890") => Ok(()))]
    #[test_case(lt, json!(-2), json!(-1.5) => Ok(()))]
    #[test_case(gt, number("0.30000000000000000001"), number("0.3") => Ok(()))]
    fn ordering(f: fn(&Value, &[Value]) -> Outcome, actual: Value, expected: Value) -> Outcome {
        f(&actual, &[expected])
    }

    #[test_case(json!({"a": 1}), "json" => true)]
    #[test_case(json!([1]), "json" => true)]
    #[test_case(json!("x"), "json" => false)]
    #[test_case(json!({}), "object" => true)]
    #[test_case(json!([]), "array" => true)]
    #[test_case(json!("x"), "string" => true)]
    #[test_case(json!(1), "int" => true)]
    #[test_case(json!(1.5), "int" => false)]
    #[test_case(json!(1.5), "float" => true)]
    #[test_case(json!(1), "float" => false)]
    #[test_case(json!(false), "bool" => true)]
    #[test_case(json!(null), "null" => true)]
    fn is_type(actual: Value, ty: &str) -> bool {
        is(&actual, &[json!(ty)]).is_ok()
    }

    #[test]
    fn is_reports_actual_kind() {
        assert_eq!(
            is(&json!("x"), &[json!("int")]),
            Err("value is not int, got string".to_string())
        );
        assert_eq!(
            is(&json!(1), &[json!("uuid")]),
            Err("unknown type: uuid".to_string())
        );
    }

    #[test]
    fn has_membership() {
        let headers = json!({"Content-Type": "application/json"});
        assert!(has(&headers, &[json!("Content-Type")]).is_ok());
        assert_eq!(
            has(&headers, &[json!("X-Missing")]),
            Err("missing key: X-Missing".to_string())
        );

        assert!(has(&json!([1, 2, 3]), &[json!(2)]).is_ok());
        assert!(has(&json!(["a", "b"]), &[json!("b")]).is_ok());
        assert_eq!(
            has(&json!([1, 2]), &[json!(5)]),
            Err("value not found: 5".to_string())
        );
        assert!(has(&json!("application/json"), &[json!("json")]).is_ok());
        assert!(has(&json!(1), &[json!(1)]).is_err());
    }

    #[test_case(json!([1, 2, 3]), json!(3) => Ok(()); "array")]
    #[test_case(json!([1, 2, 3]), json!(2) => Err("length 3 != 2".to_string()); "array mismatch")]
    #[test_case(json!("héllo"), json!(5) => Ok(()); "string chars")]
    #[test_case(json!({"a": 1}), json!(1) => Ok(()); "object")]
    #[test_case(json!(10), json!(2) => Err("cannot get length of int".to_string()); "number")]
    #[test_case(json!([]), json!("x") => Err("len expects a non-negative integer".to_string()); "bad argument")]
    #[test_case(json!([]), json!(-1) => Err("len expects a non-negative integer".to_string()); "negative argument")]
    #[test_case(json!([1, 2]), number("2e0") => Ok(()); "integral exponent")]
    fn length(actual: Value, expected: Value) -> Outcome {
        len(&actual, &[expected])
    }

    #[test]
    fn argument_count_is_checked() {
        assert_eq!(
            eq(&json!(1), &[]),
            Err("eq expects 1 argument, got 0".to_string())
        );
    }
}
