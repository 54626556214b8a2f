//! Suite document model
//!
//! Defines the data structures a YAML suite deserializes into. Unknown
//! fields are rejected so typos surface as schema errors before anything
//! runs.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::matcher::{display_value, Matcher};

/// A complete suite loaded from a YAML file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteDocument {
    /// Suite metadata
    pub meta: Meta,
    /// Target configuration shared by every spec
    pub configuration: SuiteConfiguration,
    /// Suite-scope hooks
    #[serde(default)]
    pub hooks: SuiteHooks,
    /// Suite files whose specs can be invoked as dependencies
    #[serde(default)]
    pub spec_dependencies: Vec<String>,
    /// The specs, run in declaration order
    #[serde(default)]
    pub specs: Vec<SpecDeclaration>,
}

impl SuiteDocument {
    pub fn find_spec(&self, name: &str) -> Option<&SpecDeclaration> {
        self.specs.iter().find(|spec| spec.name == name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Meta {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Resolve referenced files against the suite's directory instead of the
    /// working directory
    #[serde(default)]
    pub locate_files_relative: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Static target configuration, optionally extended by a custom function
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteConfiguration {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub base_path: Option<String>,
    /// Milliseconds
    pub read_timeout: Option<u64>,
    #[serde(default)]
    pub common_headers: Vec<NameValue>,
    /// Function whose `config` bag is merged over the static values
    pub custom_configuration: Option<FunctionRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteHooks {
    pub before_all: Option<FunctionRef>,
    pub after_all: Option<FunctionRef>,
    pub before_each: Option<FunctionRef>,
    pub after_each: Option<FunctionRef>,
}

/// Reference to a user function
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "run_type", rename_all = "snake_case", deny_unknown_fields)]
pub enum FunctionRef {
    /// A function registered by name with the runner
    Inline { inline: InlineFunction },
    /// A named function exported by a module file
    Module { module: ModuleFunction },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InlineFunction {
    pub function: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleFunction {
    pub module_path: String,
    pub function_name: String,
}

impl FunctionRef {
    pub fn inline(function: impl Into<String>) -> Self {
        FunctionRef::Inline {
            inline: InlineFunction {
                function: function.into(),
            },
        }
    }

    pub fn module(module_path: impl Into<String>, function_name: impl Into<String>) -> Self {
        FunctionRef::Module {
            module: ModuleFunction {
                module_path: module_path.into(),
                function_name: function_name.into(),
            },
        }
    }
}

/// A `{name, value}` pair from the request side of a spec
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NameValue {
    pub name: String,
    pub value: Value,
}

impl NameValue {
    pub fn pair(&self) -> (String, String) {
        (self.name.clone(), display_value(&self.value))
    }
}

/// One declared test case
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecDeclaration {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub request: RequestDeclaration,
    #[serde(default)]
    pub response: ResponseExpectation,
    pub before_test: Option<FunctionRef>,
    pub after_test: Option<FunctionRef>,
    pub retry: Option<RetryPolicy>,
    #[serde(rename = "loop")]
    pub iterate: Option<LoopDeclaration>,
    /// Leave the suite's common headers out of this spec's requests
    #[serde(default)]
    pub ignore_suite_headers: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[serde(alias = "GET")]
    Get,
    #[serde(alias = "POST")]
    Post,
    #[serde(alias = "PUT")]
    Put,
    #[serde(alias = "PATCH")]
    Patch,
    #[serde(alias = "DELETE")]
    Delete,
    #[serde(alias = "HEAD")]
    Head,
    #[serde(alias = "OPTIONS")]
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Methods that carry a payload
    pub fn has_body(self) -> bool {
        matches!(self, HttpMethod::Patch | HttpMethod::Post | HttpMethod::Put)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestDeclaration {
    pub method: HttpMethod,
    pub path: Option<String>,
    #[serde(default)]
    pub path_params: Vec<NameValue>,
    #[serde(default)]
    pub query_params: Vec<NameValue>,
    #[serde(default)]
    pub headers: Vec<NameValue>,
    #[serde(default)]
    pub cookies: Vec<NameValue>,
    pub payload: Option<Payload>,
    /// Milliseconds
    pub read_timeout: Option<u64>,
    #[serde(default)]
    pub additional_options: AdditionalOptions,
}

/// Client behaviour switches
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AdditionalOptions {
    /// Follow redirects of GET and HEAD requests (default true)
    #[serde(rename = "followRedirect")]
    pub follow_redirect: Option<bool>,
    /// Follow redirects of every method (default false)
    #[serde(rename = "followAllRedirects")]
    pub follow_all_redirects: Option<bool>,
    /// Options the client does not act on
    #[serde(flatten)]
    pub unsupported: Map<String, Value>,
}

/// Request body; exactly one field must be set
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Payload {
    pub body: Option<BodyContent>,
    pub form: Option<Map<String, Value>>,
    pub form_data: Option<Vec<FormDataField>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BodyContent {
    #[serde(rename = "type")]
    pub kind: BodyKind,
    #[serde(default)]
    pub content: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Binary,
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormDataField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FormFieldKind,
    #[serde(default)]
    pub content: Value,
    pub options: Option<FormFieldOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFieldKind {
    File,
    Text,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormFieldOptions {
    pub filename: Option<String>,
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,
}

/// Expectations checked against the response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseExpectation {
    pub status_code: Option<u16>,
    #[serde(default)]
    pub headers: Vec<ExpectedPair>,
    #[serde(default)]
    pub cookies: Vec<ExpectedPair>,
    pub json_schema: Option<JsonSchemaRef>,
    #[serde(default)]
    pub json_data: Vec<JsonDataExpectation>,
    pub custom_validator: Option<FunctionRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectedPair {
    pub name: String,
    pub value: Matcher,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonDataExpectation {
    pub path: String,
    pub value: Matcher,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonSchemaRef {
    #[serde(rename = "type")]
    pub source: SchemaSource,
    /// Schema text (or mapping) for `inline`, file path for `file`
    #[serde(rename = "$ref")]
    pub reference: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaSource {
    Inline,
    File,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub count: Option<u32>,
    /// Milliseconds to wait before each extra attempt
    pub wait_before_each: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopDeclaration {
    #[serde(rename = "type")]
    pub kind: LoopKind,
    #[serde(rename = "static")]
    pub items: Option<Value>,
    pub dynamic: Option<FunctionRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopKind {
    Static,
    Dynamic,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = r#"
meta:
  name: Users
configuration:
  scheme: http
  host: localhost
  port: 3027
  common_headers:
    - name: x-suite
      value: users
hooks:
  before_all:
    run_type: module
    module:
      module_path: hooks/users.sh
      function_name: seed
spec_dependencies:
  - auth.suite.yml
specs:
  - name: get user
    request:
      method: get
      path: /users/{id}
      path_params:
        - name: id
          value: 7
    response:
      status_code: 200
      headers:
        - name: content-type
          value: !regex application/json
      json_data:
        - path: $.id
          value: 7
  - name: create user
    enabled: false
    loop:
      type: static
      static: [a, b]
    retry:
      count: 2
      wait_before_each: 50
    request:
      method: POST
      headers:
        - name: content-type
          value: application/json
      payload:
        body:
          type: json
          content:
            name: john
"#;

    #[test]
    fn test_parse_full_suite() {
        let doc: SuiteDocument = serde_yaml::from_str(SUITE).unwrap();
        assert_eq!(doc.meta.name, "Users");
        assert!(doc.meta.enabled);
        assert_eq!(doc.configuration.port, Some(3027));
        assert_eq!(doc.spec_dependencies, vec!["auth.suite.yml"]);
        assert_eq!(
            doc.hooks.before_all,
            Some(FunctionRef::module("hooks/users.sh", "seed"))
        );

        let get = doc.find_spec("get user").unwrap();
        assert_eq!(get.request.method, HttpMethod::Get);
        assert_eq!(get.request.path_params[0].pair(), ("id".into(), "7".into()));
        assert!(matches!(get.response.headers[0].value, Matcher::Pattern(_)));

        let create = doc.find_spec("create user").unwrap();
        assert!(!create.enabled);
        assert_eq!(create.request.method, HttpMethod::Post);
        assert_eq!(create.iterate.as_ref().unwrap().kind, LoopKind::Static);
        assert_eq!(create.retry.as_ref().unwrap().count, Some(2));
        let body = create.request.payload.as_ref().unwrap().body.as_ref().unwrap();
        assert_eq!(body.kind, BodyKind::Json);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let text = SUITE.replace("  name: Users", "  name: Users\n  colour: blue");
        let err = serde_yaml::from_str::<SuiteDocument>(&text).unwrap_err();
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_inline_function_reference() {
        let f: FunctionRef =
            serde_yaml::from_str("run_type: inline\ninline:\n  function: login").unwrap();
        assert_eq!(f, FunctionRef::inline("login"));
    }

    #[test]
    fn test_unsupported_options_are_kept_aside() {
        let options: AdditionalOptions =
            serde_yaml::from_str("followRedirect: false\ngzip: true").unwrap();
        assert_eq!(options.follow_redirect, Some(false));
        assert!(options.unsupported.contains_key("gzip"));
    }

    #[test]
    fn test_body_methods() {
        assert!(HttpMethod::Put.has_body());
        assert!(!HttpMethod::Delete.has_body());
    }
}
