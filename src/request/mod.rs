//! Request building
//!
//! Turns a declared spec plus runtime overrides into a [`RequestSpec`].
//! Overrides come from the test context a hook filled in, or from the
//! options of a dependency spec invocation, and always win over what the
//! document declares.

pub mod body;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::common::paths::FileResolver;
use crate::common::{Error, ErrorKind, Result};
use crate::http::{RedirectPolicy, RequestSpec};
use crate::suite::document::{NameValue, Payload, SpecDeclaration};
use crate::suite::matcher::display_value;
use crate::suite::Target;

/// Per-invocation request overrides
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RequestOverrides {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub base_path: Option<String>,
    pub path: Option<String>,
    pub path_params: Option<Map<String, Value>>,
    pub query_params: Option<Map<String, Value>>,
    pub headers: Option<Map<String, Value>>,
    pub cookies: Option<Map<String, Value>>,
    /// Milliseconds
    pub read_timeout: Option<u64>,
    pub payload: Option<Payload>,
}

impl RequestOverrides {
    /// Read overrides out of a test context; unrelated keys are ignored
    pub fn from_context(context: &Map<String, Value>) -> Result<Self> {
        let mut context = context.clone();
        context.remove("method");
        serde_json::from_value(Value::Object(context)).map_err(|e| {
            Error::new(
                ErrorKind::RequestBuilder,
                format!("invalid request overrides in test context: {}", e),
            )
        })
    }
}

/// Options of a dependency spec invocation
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DependencyOptions {
    #[serde(flatten)]
    pub request: RequestOverrides,
    /// Validate the response against the spec's expectations
    #[serde(default, alias = "validateResponse")]
    pub validate_response: bool,
}

impl DependencyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validation(mut self) -> Self {
        self.validate_response = true;
        self
    }

    pub fn path_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        insert(&mut self.request.path_params, name, value.into());
        self
    }

    pub fn query_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        insert(&mut self.request.query_params, name, value.into());
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<Value>) -> Self {
        insert(&mut self.request.headers, name, value.into());
        self
    }

    pub fn cookie(mut self, name: &str, value: impl Into<Value>) -> Self {
        insert(&mut self.request.cookies, name, value.into());
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.request.payload = Some(payload);
        self
    }
}

fn insert(map: &mut Option<Map<String, Value>>, name: &str, value: Value) {
    map.get_or_insert_with(Map::new).insert(name.to_string(), value);
}

/// Build the request for `spec` against `target`
///
/// `resolver` locates payload files; for a spec that belongs to a
/// dependency suite it is that suite's resolver.
pub fn build(
    spec: &SpecDeclaration,
    overrides: &RequestOverrides,
    target: &Target,
    resolver: &FileResolver,
) -> Result<RequestSpec> {
    let declared = &spec.request;

    let effective = Target {
        scheme: overrides.scheme.clone().unwrap_or_else(|| target.scheme.clone()),
        host: overrides.host.clone().unwrap_or_else(|| target.host.clone()),
        port: overrides.port.or(target.port),
        base_path: overrides
            .base_path
            .clone()
            .unwrap_or_else(|| target.base_path.clone()),
        ..target.clone()
    };
    let base_url = effective.base_url();

    let path = overrides
        .path
        .as_deref()
        .or(declared.path.as_deref())
        .unwrap_or_default();
    let (base_url, url) = if path.is_empty() {
        (None, base_url)
    } else {
        let params = union(&declared.path_params, overrides.path_params.as_ref(), exact);
        (Some(base_url), render_path(path, &params))
    };

    let query = union(&declared.query_params, overrides.query_params.as_ref(), exact);

    let mut headers = if spec.ignore_suite_headers {
        Vec::new()
    } else {
        target.common_headers.clone()
    };
    merge(
        &mut headers,
        declared.headers.iter().map(NameValue::pair),
        ignore_case,
    );
    merge(&mut headers, pairs(overrides.headers.as_ref()), ignore_case);

    let cookies = union(&declared.cookies, overrides.cookies.as_ref(), exact);

    let timeout = overrides
        .read_timeout
        .or(declared.read_timeout)
        .map(std::time::Duration::from_millis)
        .unwrap_or(target.read_timeout);

    let options = &declared.additional_options;
    if !options.unsupported.is_empty() {
        tracing::debug!(
            spec = %spec.name,
            options = ?options.unsupported.keys().collect::<Vec<_>>(),
            "ignoring unsupported additional options"
        );
    }
    let defaults = RedirectPolicy::default();
    let redirects = RedirectPolicy {
        follow: options.follow_redirect.unwrap_or(defaults.follow),
        follow_all: options.follow_all_redirects.unwrap_or(defaults.follow_all),
    };

    let mut request = RequestSpec {
        method: declared.method,
        base_url,
        url,
        query,
        headers,
        cookies,
        timeout,
        body: None,
        redirects,
    };

    if declared.method.has_body() {
        let payload = overrides.payload.as_ref().or(declared.payload.as_ref());
        request.body = body::build_body(
            payload,
            request.header("content-type"),
            declared.method,
            resolver,
        )?;
    }

    Ok(request)
}

/// Substitute `{name}` placeholders; `{{name}}` keeps a literal `{name}` and
/// unknown names render empty
pub fn render_path(template: &str, params: &[(String, String)]) -> String {
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;

    while i < template.len() {
        if bytes[i] == b'{' {
            if let Some(len) = template[i + 1..].find('}') {
                let key = &template[i + 1..i + 1 + len];
                let close = i + 1 + len;
                if !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
                    let escaped = i > 0 && bytes[i - 1] == b'{' && bytes.get(close + 1) == Some(&b'}');
                    if escaped {
                        out.push_str(key);
                    } else if let Some((_, value)) = params.iter().find(|(name, _)| name == key) {
                        out.push_str(value);
                    }
                    i = close + 1;
                    continue;
                }
            }
        }

        let ch = template[i..].chars().next().unwrap_or_default();
        out.push(ch);
        i += ch.len_utf8().max(1);
    }

    out
}

fn exact(a: &str, b: &str) -> bool {
    a == b
}

fn ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn pairs(map: Option<&Map<String, Value>>) -> Vec<(String, String)> {
    map.map(|map| {
        map.iter()
            .map(|(name, value)| (name.clone(), display_value(value)))
            .collect()
    })
    .unwrap_or_default()
}

/// Declared pairs with the overrides merged over them
fn union(
    declared: &[NameValue],
    overrides: Option<&Map<String, Value>>,
    same: fn(&str, &str) -> bool,
) -> Vec<(String, String)> {
    let mut merged = Vec::new();
    merge(&mut merged, declared.iter().map(NameValue::pair), same);
    merge(&mut merged, pairs(overrides), same);
    merged
}

/// Later pairs win; a replaced pair keeps its original position
fn merge(
    base: &mut Vec<(String, String)>,
    extra: impl IntoIterator<Item = (String, String)>,
    same: fn(&str, &str) -> bool,
) {
    for (name, value) in extra {
        match base.iter_mut().find(|(existing, _)| same(existing, &name)) {
            Some(slot) => slot.1 = value,
            None => base.push((name, value)),
        }
    }
}
