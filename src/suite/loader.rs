//! Suite loading, schema validation and target configuration
//!
//! Top-level suites and dependency suites go through the same functions
//! here, so a dependency is resolved and configured exactly like the suite
//! that declares it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::common::config::Defaults;
use crate::common::paths::FileResolver;
use crate::common::{Error, ErrorKind, Result};
use crate::hooks::{HookContext, HookKind, HookRegistry};

use super::document::{NameValue, SuiteDocument};

/// A parsed suite document together with where it came from
#[derive(Debug, Clone)]
pub struct LoadedSuite {
    pub file: PathBuf,
    pub document: SuiteDocument,
    pub resolver: FileResolver,
}

impl LoadedSuite {
    pub fn name(&self) -> &str {
        &self.document.meta.name
    }
}

/// Resolved network target of a suite
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub base_path: String,
    pub read_timeout: Duration,
    pub common_headers: Vec<(String, String)>,
}

impl Target {
    /// `scheme://host[:port][/base_path]`
    pub fn base_url(&self) -> String {
        let mut url = format!("{}://{}", self.scheme, self.host);
        if let Some(port) = self.port {
            url.push_str(&format!(":{}", port));
        }
        if !self.base_path.is_empty() {
            if !self.base_path.starts_with('/') {
                url.push('/');
            }
            url.push_str(&self.base_path);
        }
        url
    }
}

/// A suite loaded only so its specs can be invoked from hooks
#[derive(Debug, Clone)]
pub struct SuiteDependency {
    pub source: LoadedSuite,
    pub target: Target,
}

/// Read a suite file and validate it against the document schema
///
/// A suite whose `meta.enabled` is anything but `true` fails with
/// [`ErrorKind::DisabledSuite`] before the rest of the document is checked.
pub fn load_document(file: &Path) -> Result<LoadedSuite> {
    if !file.exists() {
        return Err(Error::file_does_not_exist("Test suite", file));
    }

    let text = std::fs::read_to_string(file).map_err(|e| {
        Error::new(
            ErrorKind::SuiteLoading,
            format!("({}) \n {}", file.display(), e),
        )
    })?;

    let raw: serde_yaml::Value = serde_yaml::from_str(&text).map_err(|e| {
        Error::new(
            ErrorKind::SuiteLoading,
            format!("({}) \n {}", file.display(), e),
        )
    })?;

    let meta = raw.get("meta").ok_or_else(|| {
        Error::invalid_schema(format!(
            "Metadata is not specified in suite '{}'",
            file.display()
        ))
    })?;
    if let Some(enabled) = meta.get("enabled") {
        if enabled != &serde_yaml::Value::Bool(true) {
            return Err(Error::new(
                ErrorKind::DisabledSuite,
                format!("Suite '{}' is disabled, skipping the suite", file.display()),
            ));
        }
    }

    let document: SuiteDocument = serde_yaml::from_str(&text).map_err(|e| {
        Error::invalid_schema(format!(
            "invalid schema found in file {} \n  {} \n",
            file.display(),
            e
        ))
    })?;

    let resolver = FileResolver::new(file, document.meta.locate_files_relative);
    Ok(LoadedSuite {
        file: file.to_path_buf(),
        document,
        resolver,
    })
}

/// Resolve the suite's target, running its custom configuration function
/// when one is declared
pub async fn configure(
    suite: &LoadedSuite,
    hooks: &HookRegistry,
    defaults: &Defaults,
) -> Result<Target> {
    let config = &suite.document.configuration;

    let mut data = Map::new();
    insert_some(&mut data, "scheme", config.scheme.clone().map(Value::from));
    insert_some(&mut data, "host", config.host.clone().map(Value::from));
    insert_some(&mut data, "port", config.port.map(Value::from));
    insert_some(&mut data, "base_path", config.base_path.clone().map(Value::from));
    insert_some(&mut data, "read_timeout", config.read_timeout.map(Value::from));
    data.insert(
        "common_headers".to_string(),
        Value::Array(
            config
                .common_headers
                .iter()
                .map(|h| json!({ "name": h.name, "value": h.value }))
                .collect(),
        ),
    );

    if let Some(function) = &config.custom_configuration {
        let mut bag = Map::new();
        let mut ctx = HookContext {
            config: Some(&mut bag),
            ..HookContext::default()
        };
        hooks
            .run(HookKind::CustomConfiguration, function, &suite.resolver, &mut ctx)
            .await?;
        tracing::debug!(suite = %suite.file.display(), keys = bag.len(), "custom configuration applied");
        data.extend(bag);
    }

    // Missing, null and zero fall back to the defaults
    if !data.get("base_path").is_some_and(Value::is_string) {
        data.insert("base_path".to_string(), Value::from(""));
    }
    let timeout_unset = match data.get("read_timeout") {
        None | Some(Value::Null) => true,
        Some(value) => value.as_u64() == Some(0),
    };
    if timeout_unset {
        data.insert(
            "read_timeout".to_string(),
            Value::from(defaults.read_timeout_ms),
        );
    }
    if data.get("port").is_some_and(Value::is_null) {
        data.remove("port");
    }

    validate_target(&suite.file, &data)?;

    let raw: RawTarget = serde_json::from_value(Value::Object(data)).map_err(|e| {
        Error::new(
            ErrorKind::InvalidSuiteConfiguration,
            format!(
                "Invalid Suite configuration : {} \n  {} \n",
                suite.file.display(),
                e
            ),
        )
    })?;

    Ok(Target {
        scheme: raw.scheme,
        host: raw.host,
        port: raw.port,
        base_path: raw.base_path,
        read_timeout: Duration::from_millis(raw.read_timeout),
        common_headers: raw
            .common_headers
            .unwrap_or_default()
            .iter()
            .map(NameValue::pair)
            .collect(),
    })
}

/// Load and configure every declared dependency suite, stopping at the first
/// failure
pub async fn load_dependencies(
    suite: &LoadedSuite,
    hooks: &HookRegistry,
    defaults: &Defaults,
) -> Result<Vec<SuiteDependency>> {
    let mut dependencies = Vec::with_capacity(suite.document.spec_dependencies.len());

    for declared in &suite.document.spec_dependencies {
        let file = suite.resolver.resolve(declared);
        let dependency = load_dependency(&file, hooks, defaults)
            .await
            .map_err(|e| e.wrap(ErrorKind::LoadingSpecDependencySuite, " error occurred while loading dependencies \n "))?;
        tracing::debug!(
            suite = %suite.file.display(),
            dependency = %file.display(),
            specs = dependency.source.document.specs.len(),
            "dependency suite loaded"
        );
        dependencies.push(dependency);
    }

    Ok(dependencies)
}

async fn load_dependency(
    file: &Path,
    hooks: &HookRegistry,
    defaults: &Defaults,
) -> Result<SuiteDependency> {
    match std::fs::symlink_metadata(file) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            return Err(Error::custom(
                "Error",
                format!(
                    "dependency suite at '{}' is not a file, Provide a valid file path",
                    file.display()
                ),
            ))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::custom(
                "Error",
                format!(
                    "dependency suite file at '{}' does not exist, Provide a valid path",
                    file.display()
                ),
            ))
        }
        Err(e) => return Err(e.into()),
    }

    let source = load_document(file)?;
    let target = configure(&source, hooks, defaults).await?;
    Ok(SuiteDependency { source, target })
}

#[derive(Deserialize)]
struct RawTarget {
    scheme: String,
    host: String,
    port: Option<u16>,
    base_path: String,
    read_timeout: u64,
    common_headers: Option<Vec<NameValue>>,
}

fn insert_some(map: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value);
    }
}

fn target_schema() -> Value {
    json!({
        "type": "object",
        "required": ["scheme", "host", "base_path", "read_timeout"],
        "properties": {
            "scheme": { "type": "string", "enum": ["http", "https"] },
            "host": { "type": "string", "minLength": 1 },
            "port": { "type": "integer", "minimum": 1, "maximum": 65535 },
            "base_path": { "type": "string" },
            "read_timeout": { "type": "integer", "minimum": 1 },
            "common_headers": {
                "type": ["array", "null"],
                "items": {
                    "type": "object",
                    "required": ["name", "value"],
                    "properties": { "name": { "type": "string" } }
                }
            }
        }
    })
}

fn validate_target(file: &Path, data: &Map<String, Value>) -> Result<()> {
    let schema = target_schema();
    let validator = jsonschema::validator_for(&schema).map_err(|e| {
        Error::new(
            ErrorKind::InvalidSuiteConfiguration,
            format!("configuration schema failed to compile: {}", e),
        )
    })?;

    let instance = Value::Object(data.clone());
    let messages: String = validator
        .iter_errors(&instance)
        .map(|error| {
            format!(
                "  property - {}, message: {} \n",
                property_path(&error.instance_path.to_string()),
                error
            )
        })
        .collect();

    if messages.is_empty() {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::InvalidSuiteConfiguration,
            format!(
                "Invalid Suite configuration : {} \n {}",
                file.display(),
                messages
            ),
        ))
    }
}

/// `/common_headers/0` becomes `instance.common_headers.0`
pub(crate) fn property_path(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold("instance".to_string(), |mut path, segment| {
            path.push('.');
            path.push_str(segment);
            path
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::FnHook;
    use std::io::Write;

    fn write_suite(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    const MINIMAL: &str = "
meta:
  name: minimal
configuration:
  scheme: http
  host: localhost
  port: 8080
  base_path: api
specs:
  - name: ping
    request:
      method: get
      path: /ping
";

    #[test]
    fn test_missing_file() {
        let err = load_document(Path::new("/definitely/not/here.yml")).unwrap_err();
        assert!(err.is(ErrorKind::FileDoesNotExist));
    }

    #[test]
    fn test_disabled_suite() {
        let dir = tempfile::tempdir().unwrap();
        let body = MINIMAL.replace("  name: minimal", "  name: minimal\n  enabled: false");
        let file = write_suite(dir.path(), "disabled.yml", &body);
        let err = load_document(&file).unwrap_err();
        assert!(err.is(ErrorKind::DisabledSuite));
    }

    #[test]
    fn test_missing_meta_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_suite(dir.path(), "nometa.yml", "configuration: {}\nspecs: []\n");
        let err = load_document(&file).unwrap_err();
        assert!(err.is(ErrorKind::InvalidSuiteSchema));
        assert!(err.message().contains("Metadata is not specified"));
    }

    #[test]
    fn test_broken_yaml_is_loading_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_suite(dir.path(), "broken.yml", "meta: [unclosed\n");
        let err = load_document(&file).unwrap_err();
        assert!(err.is(ErrorKind::SuiteLoading));
        assert_eq!(err.name(), "YAMLSuiteLoadingError");
    }

    #[tokio::test]
    async fn test_static_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_suite(dir.path(), "ok.yml", MINIMAL);
        let suite = load_document(&file).unwrap();
        let target = configure(&suite, &HookRegistry::new(), &Defaults::default())
            .await
            .unwrap();
        assert_eq!(target.base_url(), "http://localhost:8080/api");
        assert_eq!(target.read_timeout, Duration::from_millis(60_000));
    }

    #[tokio::test]
    async fn test_invalid_scheme_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_suite(dir.path(), "ftp.yml", &MINIMAL.replace("scheme: http", "scheme: ftp"));
        let suite = load_document(&file).unwrap();
        let err = configure(&suite, &HookRegistry::new(), &Defaults::default())
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::InvalidSuiteConfiguration));
        assert!(err.message().contains("property - instance.scheme"));
    }

    #[tokio::test]
    async fn test_custom_configuration_overrides_static_values() {
        let dir = tempfile::tempdir().unwrap();
        let body = MINIMAL.replace(
            "  base_path: api",
            "  base_path: api\n  custom_configuration:\n    run_type: inline\n    inline:\n      function: staging",
        );
        let file = write_suite(dir.path(), "custom.yml", &body);
        let suite = load_document(&file).unwrap();

        let mut hooks = HookRegistry::new();
        hooks.register_function(
            "staging",
            FnHook::new(|ctx| {
                let config = ctx.config.as_deref_mut().unwrap();
                config.insert("host".into(), Value::from("staging.local"));
                config.insert("port".into(), Value::from(9000));
                Ok(Value::Null)
            }),
        );

        let target = configure(&suite, &hooks, &Defaults::default()).await.unwrap();
        assert_eq!(target.base_url(), "http://staging.local:9000/api");
    }

    #[tokio::test]
    async fn test_missing_dependency_file() {
        let dir = tempfile::tempdir().unwrap();
        let body = MINIMAL.replace(
            "specs:",
            "spec_dependencies:\n  - missing.yml\nspecs:",
        );
        let file = write_suite(dir.path(), "deps.yml", &body);
        let mut suite = load_document(&file).unwrap();
        suite.resolver = FileResolver::rooted_at(dir.path());

        let err = load_dependencies(&suite, &HookRegistry::new(), &Defaults::default())
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::LoadingSpecDependencySuite));
        assert!(err.message().contains("does not exist"));
    }

    #[test]
    fn test_property_path() {
        assert_eq!(property_path(""), "instance");
        assert_eq!(property_path("/port"), "instance.port");
    }
}
