//! HTTP collaborator: request and response types and the client trait
//!
//! The runner never talks to the network directly. It builds a
//! [`RequestSpec`], hands it to an [`HttpClient`] and validates the
//! [`HttpResponse`] it gets back.

mod client;
pub mod log;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

use crate::common::{Error, ErrorKind, Result};
use crate::suite::document::HttpMethod;

pub use client::ReqwestClient;
pub use log::{Exchange, RequestLog};

/// Sends fully built requests
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send a request, failing with a transport error when no response
    /// arrives
    async fn send(&self, request: &RequestSpec) -> Result<HttpResponse>;
}

/// A fully built request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: HttpMethod,
    /// Absent when the spec has no path and `url` is the whole target
    pub base_url: Option<String>,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub timeout: Duration,
    pub body: Option<RequestBody>,
    pub redirects: RedirectPolicy,
}

impl RequestSpec {
    /// Absolute URL including the encoded query string
    pub fn href(&self) -> String {
        let mut href = match &self.base_url {
            Some(base) => join_url(base, &self.url),
            None => self.url.clone(),
        };
        if !self.query.is_empty() {
            let encoded = serde_urlencoded::to_string(&self.query).unwrap_or_default();
            href.push(if href.contains('?') { '&' } else { '?' });
            href.push_str(&encoded);
        }
        href
    }

    /// First header value with this name, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// `Cookie` header value for the declared cookies
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn follows_redirects(&self) -> bool {
        match self.method {
            HttpMethod::Get | HttpMethod::Head => self.redirects.follow,
            _ => self.redirects.follow_all,
        }
    }
}

/// Join a base URL and a path with exactly one slash between them
pub fn join_url(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) if !path.is_empty() => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// Which redirects the client follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectPolicy {
    /// Follow redirects of GET and HEAD requests
    pub follow: bool,
    /// Follow redirects of every other method too
    pub follow_all: bool,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self {
            follow: true,
            follow_all: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Text(String),
    /// File contents, read when the request is sent
    File(PathBuf),
    /// `application/x-www-form-urlencoded` fields
    Form(Vec<(String, String)>),
    Multipart(Vec<FormPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub content: PartContent,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartContent {
    Text(String),
    File(PathBuf),
}

/// A received response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpResponse {
    pub status_code: u16,
    /// Lowercased names in arrival order
    #[serde(serialize_with = "serialize_headers")]
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub duration_ms: u64,
    pub method: String,
    pub url: String,
}

impl HttpResponse {
    /// All values of a header, joined the way they would be folded on the wire
    pub fn header(&self, name: &str) -> Option<String> {
        let values = self.header_values(name);
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// Parse the body as JSON
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body).map_err(|e| {
            Error::new(
                ErrorKind::JsonBodyParse,
                format!(
                    "SyntaxError Error occurred while parsing the body as json \n {}",
                    e
                ),
            )
        })
    }

    /// JSON form handed to hook functions
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Headers as an object; `set-cookie` stays a list, repeated others are joined
pub(crate) fn serialize_headers<S: Serializer>(
    headers: &[(String, String)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut names: Vec<&str> = Vec::new();
    for (name, _) in headers {
        if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name);
        }
    }

    let mut map = serializer.serialize_map(Some(names.len()))?;
    for name in names {
        let values: Vec<&str> = headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect();
        if name.eq_ignore_ascii_case("set-cookie") {
            map.serialize_entry(name, &values)?;
        } else {
            map.serialize_entry(name, &values.join(", "))?;
        }
    }
    map.end()
}


#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> RequestSpec {
        RequestSpec {
            method: HttpMethod::Get,
            base_url: Some("http://localhost:3000/api".into()),
            url: "/users".into(),
            query: vec![("page".into(), "2".into()), ("q".into(), "a b".into())],
            headers: vec![("Content-Type".into(), "text/plain".into())],
            cookies: vec![("sid".into(), "1".into()), ("theme".into(), "dark".into())],
            timeout: Duration::from_secs(1),
            body: None,
            redirects: RedirectPolicy::default(),
        }
    }

    #[test]
    fn test_href_joins_base_path_and_query() {
        assert_eq!(spec().href(), "http://localhost:3000/api/users?page=2&q=a+b");
    }

    #[test]
    fn test_join_url_single_slash() {
        assert_eq!(join_url("http://h/", "/x"), "http://h/x");
        assert_eq!(join_url("http://h", "x"), "http://h/x");
        assert_eq!(join_url("http://h", "/x"), "http://h/x");
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        assert_eq!(spec().header("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_cookie_header() {
        assert_eq!(spec().cookie_header().unwrap(), "sid=1; theme=dark");
    }

    #[test]
    fn test_redirects_follow_only_get_by_default() {
        let mut request = spec();
        assert!(request.follows_redirects());
        request.method = HttpMethod::Post;
        assert!(!request.follows_redirects());
    }

    #[test]
    fn test_response_headers_serialize_as_object() {
        let response = HttpResponse {
            status_code: 200,
            headers: vec![
                ("set-cookie".into(), "a=1".into()),
                ("set-cookie".into(), "b=2".into()),
                ("x-id".into(), "7".into()),
            ],
            body: "{}".into(),
            duration_ms: 3,
            method: "GET".into(),
            url: "http://h/x".into(),
        };
        let value = response.to_value();
        assert_eq!(value["headers"]["set-cookie"], serde_json::json!(["a=1", "b=2"]));
        assert_eq!(value["headers"]["x-id"], "7");
        assert_eq!(value["status_code"], 200);
    }

    #[test]
    fn test_invalid_json_body() {
        let response = testing::response(200, "not json");
        assert!(response.json().unwrap_err().is(ErrorKind::JsonBodyParse));
    }
}
