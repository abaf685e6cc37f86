//! zyra's HTTP transport: request building from a resolved [`Document`], a [`Transport`]
//! seam for the runner, and the reqwest-backed [`Client`].
use bytes::Bytes;
use indexmap::IndexMap;
use reqwest::header::{HeaderName, HeaderValue};
use std::time::{Duration, Instant};
use tracing::*;
use url::Url;

use crate::model::{Document, Method};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HttpError: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid url \"{url}\": {message}")]
    InvalidUrl { url: String, message: String },
    #[error("invalid header \"{0}\"")]
    InvalidHeader(String),
}

/// A fully resolved request, ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Target URL with query parameters already appended.
    pub url: Url,
    pub headers: IndexMap<String, String>,
    pub body: Option<String>,
}

impl Request {
    /// Build a request from a resolved document.
    ///
    /// Relative paths are joined onto `base_url`; absolute `http(s)` URLs are used as is.
    pub fn build(doc: &Document, base_url: Option<&str>) -> Result<Request, Error> {
        let mut url = target_url(&doc.path, base_url)?;
        if !doc.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &doc.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(Request {
            method: doc.method,
            url,
            headers: doc.headers.clone(),
            body: doc.has_body().then(|| doc.body.trim_end().to_string()),
        })
    }
}

fn target_url(path: &str, base_url: Option<&str>) -> Result<Url, Error> {
    let invalid = |message: String| Error::InvalidUrl {
        url: path.to_string(),
        message,
    };

    if let Ok(url) = Url::parse(path) {
        if matches!(url.scheme(), "http" | "https") {
            return Ok(url);
        }
    }

    let Some(base) = base_url else {
        return Err(invalid(
            "relative path requires the base_url option".to_string(),
        ));
    };
    let base = Url::parse(base).map_err(|e| Error::InvalidUrl {
        url: base.to_string(),
        message: e.to_string(),
    })?;
    base.join(path).map_err(|e| invalid(e.to_string()))
}

/// Type tag of a decoded response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum BodyKind {
    Object,
    Array,
    String,
    Int,
    Float,
    Bool,
    Null,
}

impl BodyKind {
    pub fn of(value: &serde_json::Value) -> BodyKind {
        match value {
            serde_json::Value::Object(_) => BodyKind::Object,
            serde_json::Value::Array(_) => BodyKind::Array,
            serde_json::Value::String(_) => BodyKind::String,
            serde_json::Value::Bool(_) => BodyKind::Bool,
            serde_json::Value::Null => BodyKind::Null,
            serde_json::Value::Number(n) => {
                if is_float_literal(&n.to_string()) {
                    BodyKind::Float
                } else {
                    BodyKind::Int
                }
            }
        }
    }
}

/// Whether number text was written with a fraction or an exponent.
pub fn is_float_literal(text: &str) -> bool {
    text.contains(['.', 'e', 'E'])
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// First value per header name, keyed by canonical name such as `Content-Type`.
    pub headers: IndexMap<String, String>,
    pub raw: Bytes,
    /// Decoded JSON body. Non-JSON payloads become a string value.
    pub body: serde_json::Value,
    pub kind: BodyKind,
    pub elapsed: Duration,
}

impl Response {
    pub fn new<'a>(
        status: u16,
        headers: impl IntoIterator<Item = (&'a str, String)>,
        raw: Bytes,
        elapsed: Duration,
    ) -> Response {
        let mut canonical = IndexMap::new();
        for (name, value) in headers {
            canonical.entry(canonical_name(name)).or_insert(value);
        }
        let body = decode_body(&raw);
        Response {
            status,
            headers: canonical,
            kind: BodyKind::of(&body),
            body,
            raw,
            elapsed,
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }
}

/// Decode a payload as JSON, falling back to its text.
pub fn decode_body(raw: &[u8]) -> serde_json::Value {
    match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(e) => {
            trace!("response body is not JSON: {e}");
            serde_json::Value::String(String::from_utf8_lossy(raw).into_owned())
        }
    }
}

/// `content-type` -> `Content-Type`
pub fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Sends requests on behalf of the runner.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<Response, Error>;
}

/// zyra's HTTP client, a thin wrapper for `reqwest::Client`.
#[derive(Clone, Default)]
pub struct Client {
    pub(crate) inner: reqwest::Client,
}

impl Client {
    pub fn new() -> Client {
        Client::default()
    }

    /// Client applying `timeout` to every request.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Client, Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Client {
            inner: builder.build()?,
        })
    }
}

#[async_trait::async_trait]
impl Transport for Client {
    async fn send(&self, request: &Request) -> Result<Response, Error> {
        debug!("Requesting {} {}", request.method, request.url);

        let mut builder = self
            .inner
            .request(request.method.into(), request.url.clone());
        for (key, value) in &request.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| Error::InvalidHeader(key.clone()))?;
            let value =
                HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader(key.clone()))?;
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let started = Instant::now();
        let res = builder.send().await?;
        let status = res.status().as_u16();
        let headers = res
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect::<Vec<_>>();
        let raw = res.bytes().await?;
        let elapsed = started.elapsed();

        debug!("{} {} -> {status} in {elapsed:?}", request.method, request.url);
        Ok(Response::new(
            status,
            headers.iter().map(|(k, v)| (k.as_str(), v.clone())),
            raw,
            elapsed,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::parse_document;
    // Textual-scope forwarder: a glob-imported `assert_eq` is ambiguous with the
    // prelude in nested modules (incl. those generated by `test_case`).
    macro_rules! assert_eq { ($($t:tt)*) => { pretty_assertions::assert_eq!($($t)*) } }
    use test_case::test_case;

    #[test_case("/users", Some("http://localhost:8080/api/") => "http://localhost:8080/users"; "absolute path")]
    #[test_case("users", Some("http://localhost:8080/api/") => "http://localhost:8080/api/users"; "relative path")]
    #[test_case("https://example.com/a", Some("http://localhost") => "https://example.com/a"; "full url")]
    #[test_case("http://example.com/a", None => "http://example.com/a"; "full url without base")]
    fn build_url(path: &str, base: Option<&str>) -> String {
        target_url(path, base).unwrap().to_string()
    }

    #[test]
    fn relative_path_without_base_url() {
        assert!(matches!(
            target_url("/users", None),
            Err(Error::InvalidUrl { .. })
        ));
    }

    #[test]
    fn request_from_document() {
        let doc = parse_document(
            "POST /items\n[headers]\nContent-Type = application/json\n[query]\npage = 2\nq = a b\n[body]\n{\"a\": 1}\n",
        )
        .unwrap();
        let req = Request::build(&doc, Some("http://localhost")).unwrap();
        assert_eq!(req.url.as_str(), "http://localhost/items?page=2&q=a+b");
        assert_eq!(req.headers["Content-Type"], "application/json");
        assert_eq!(req.body.as_deref(), Some("{\"a\": 1}"));

        let doc = parse_document("GET /items\n[body]\n\n").unwrap();
        let req = Request::build(&doc, Some("http://localhost")).unwrap();
        assert_eq!(req.body, None);
    }

    #[test_case("content-type" => "Content-Type")]
    #[test_case("X-REQUEST-ID" => "X-Request-Id")]
    #[test_case("etag" => "Etag")]
    fn canonical_header_name(name: &str) -> String {
        canonical_name(name)
    }

    #[test_case(r#"{"a": 1}"# => BodyKind::Object)]
    #[test_case("[1, 2]" => BodyKind::Array)]
    #[test_case("10" => BodyKind::Int)]
    #[test_case("1.0" => BodyKind::Float)]
    #[test_case("2e3" => BodyKind::Float)]
    #[test_case("null" => BodyKind::Null)]
    #[test_case("true" => BodyKind::Bool)]
    #[test_case("plain text" => BodyKind::String)]
    #[test_case("" => BodyKind::String)]
    fn body_kind(raw: &str) -> BodyKind {
        BodyKind::of(&decode_body(raw.as_bytes()))
    }

    #[test]
    fn numbers_keep_their_text() {
        let body = decode_body(br#"{"price": 19.90, "id": 12345678901234567890}"#);
        assert_eq!(body["price"].to_string(), "19.90");
        assert_eq!(body["id"].to_string(), "12345678901234567890");
    }

    #[test]
    fn first_header_value_wins() {
        let res = Response::new(
            200,
            [
                ("set-cookie", "a=1".to_string()),
                ("Set-Cookie", "b=2".to_string()),
            ],
            Bytes::new(),
            Duration::ZERO,
        );
        assert_eq!(res.headers.len(), 1);
        assert_eq!(res.headers["Set-Cookie"], "a=1");
    }

    #[tokio::test]
    async fn send_request() -> eyre::Result<()> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/users")
            .match_query(mockito::Matcher::UrlEncoded("page".into(), "1".into()))
            .match_header("x-token", "abc")
            .match_body(r#"{"name":"zyra"}"#)
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 7, "tags": ["a"]}"#)
            .create_async()
            .await;

        let doc = parse_document(
            "POST /users\n[headers]\nX-Token = abc\n[query]\npage = 1\n[body]\n{\"name\":\"zyra\"}\n",
        )?;
        let req = Request::build(&doc, Some(&server.url()))?;
        let res = Client::with_timeout(Some(Duration::from_secs(5)))?
            .send(&req)
            .await?;
        mock.assert_async().await;

        assert_eq!(res.status, 201);
        assert_eq!(res.headers["Content-Type"], "application/json");
        assert_eq!(res.kind, BodyKind::Object);
        assert_eq!(res.body["id"].to_string(), "7");
        Ok(())
    }

    #[tokio::test]
    async fn connection_failure_is_an_error() -> eyre::Result<()> {
        let doc = parse_document("GET /\n")?;
        let req = Request::build(&doc, Some("http://127.0.0.1:1"))?;
        let res = Client::new().send(&req).await;
        assert!(matches!(res, Err(Error::Http(_))));
        Ok(())
    }
}
