//! `{{name}}` placeholder substitution.
//!
//! Resolution is a single, non-recursive pass: text produced by a substitution is never
//! scanned again, and there is no default-value syntax.

use indexmap::IndexMap;
use tracing::*;

use crate::{
    config::Config,
    model::{Assertion, Document, Value},
};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("undefined variable: {0}")]
    Undefined(String),
    #[error("unterminated template")]
    Unterminated,
}

/// Variables visible to one document: the config context overlaid with the document's `[vars]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: IndexMap<String, String>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    /// Merge config context and document vars. Document vars win on collision.
    pub fn for_document(cfg: &Config, doc: &Document) -> Context {
        let mut ctx = Context::new();
        ctx.extend(&cfg.context);
        ctx.extend(&doc.vars);
        ctx
    }

    pub fn extend(&mut self, vars: &IndexMap<String, String>) {
        for (k, v) in vars {
            self.vars.insert(k.clone(), v.clone());
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

/// Substitute every `{{name}}` in `raw`.
pub fn interpolate(raw: &str, ctx: &Context) -> Result<String, ResolveError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let end = after.find(CLOSE).ok_or(ResolveError::Unterminated)?;

        let name = after[..end].trim();
        let value = ctx
            .get(name)
            .ok_or_else(|| ResolveError::Undefined(name.to_string()))?;
        out.push_str(value);

        rest = &after[end + CLOSE.len()..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Interpolated copy of `doc`. The source document is left untouched.
pub fn resolve_document(doc: &Document, ctx: &Context) -> Result<Document, ResolveError> {
    let mut resolved = doc.clone();

    resolved.path = interpolate(&doc.path, ctx)?;
    resolved.headers = resolve_map(&doc.headers, ctx)?;
    resolved.query = resolve_map(&doc.query, ctx)?;
    resolved.body = interpolate(&doc.body, ctx)?;
    resolved.assertions = resolve_assertions(&doc.assertions, ctx)?;

    trace!("resolved {} {}", resolved.method, resolved.path);
    Ok(resolved)
}

/// Replace every [`Value::Template`] argument with the interpolated [`Value::String`].
pub fn resolve_assertions(
    assertions: &[Assertion],
    ctx: &Context,
) -> Result<Vec<Assertion>, ResolveError> {
    assertions
        .iter()
        .map(|assertion| {
            let args = assertion
                .args
                .iter()
                .map(|arg| match arg {
                    Value::Template(raw) => interpolate(raw, ctx).map(Value::String),
                    other => Ok(other.clone()),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Assertion {
                args,
                ..assertion.clone()
            })
        })
        .collect()
}

fn resolve_map(
    map: &IndexMap<String, String>,
    ctx: &Context,
) -> Result<IndexMap<String, String>, ResolveError> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), interpolate(v, ctx)?)))
        .collect()
}
