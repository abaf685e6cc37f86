//! Masking of secrets in captured HTTP output.
//!
//! Captured requests print their URL and headers. Query parameters and headers that
//! usually carry credentials are replaced with `*****` unless the run disables masking.

use indexmap::IndexMap;
use url::Url;

/// Replacement text for a secret.
pub const MASK: &str = "*****";

/// Query parameters that usually carry credentials. Matched ignoring ASCII case.
const SENSITIVE_QUERY_PARAMS: &[&str] = &[
    "access_token",
    "api_key",
    "apikey",
    "token",
    "secret",
    "password",
    "key",
    "auth",
];

/// Credential-bearing headers. Matched ignoring ASCII case.
const SENSITIVE_HEADERS: &[&str] = &["authorization", "x-api-key", "x-auth-token", "cookie"];

pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|h| name.eq_ignore_ascii_case(h))
}

fn is_sensitive_param(name: &str) -> bool {
    SENSITIVE_QUERY_PARAMS
        .iter()
        .any(|p| name.eq_ignore_ascii_case(p))
}

/// Copy of `url` with the values of credential query parameters replaced by [`MASK`].
/// Other pairs keep their original encoding.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use zyra_core::masking::mask_url;
///
/// let url = Url::parse("https://httpbin.org/get?page=2&api_key=s3cr3t").unwrap();
/// assert_eq!(mask_url(&url).as_str(), "https://httpbin.org/get?page=2&api_key=*****");
/// ```
pub fn mask_url(url: &Url) -> Url {
    let Some(query) = url.query() else {
        return url.clone();
    };

    let masked_query = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_sensitive_param(key) => format!("{key}={MASK}"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&");

    let mut masked = url.clone();
    masked.set_query(Some(&masked_query));
    masked
}

/// Copy of `headers` with sensitive values replaced by [`MASK`].
pub fn mask_headers(headers: &IndexMap<String, String>) -> IndexMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive_header(name) {
                MASK.to_string()
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect()
}
