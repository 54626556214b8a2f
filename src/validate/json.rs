//! JSON body checks: JSONPath expectations and JSON schema

use jsonpath_rust::JsonPathQuery;
use serde_json::Value;

use crate::common::paths::FileResolver;
use crate::common::{Error, ErrorKind, Result};
use crate::http::HttpResponse;
use crate::suite::document::{JsonDataExpectation, JsonSchemaRef, SchemaSource};
use crate::suite::loader::property_path;
use crate::suite::matcher::display_value;
use crate::suite::Matcher;

pub(super) fn validate_data(expected: &[JsonDataExpectation], response: &HttpResponse) -> Result<()> {
    let body = response.json()?;
    let mismatch = |message: String| Error::new(ErrorKind::ResponseJsonDataMismatch, message);

    for expectation in expected {
        let path = &expectation.path;
        let found = body
            .clone()
            .path(path)
            .map_err(|e| mismatch(format!("Invalid json path: {}, {}", path, e)))?;

        let actual = match found {
            Value::Array(mut values) if !values.is_empty() => values.swap_remove(0),
            _ => {
                return Err(mismatch(format!(
                    "JSON Path evaluation did not return any matching value, json path: {}",
                    path
                )))
            }
        };

        if expectation.value.matches_json(&actual) {
            continue;
        }

        let message = match &expectation.value {
            Matcher::Pattern(pattern) => format!(
                "JSON path evaluated value did not match the expected Regexp, json path: {}, Regexp: {}, Actual value: {}",
                path,
                pattern,
                display_value(&actual)
            ),
            Matcher::Exact(Value::Null) => format!(
                "JSON path evaluated value did not match with expected value (null), json path: {}, Actual value: {}, Expected value: null",
                path,
                display_value(&actual)
            ),
            Matcher::Exact(Value::Bool(flag)) => format!(
                "JSON path evaluated value did not match with expected Boolean value, json path: {}, Actual value: {}, Expected value: {}",
                path,
                display_value(&actual),
                flag
            ),
            Matcher::Exact(structured @ (Value::Array(_) | Value::Object(_))) => format!(
                "JSON path evaluated value did not match with expected value, json path: {}, Actual value: {}, Expected value: {}",
                path, actual, structured
            ),
            Matcher::Exact(scalar) => format!(
                "JSON path evaluated value did not match with expected value, json path: {}, Actual value: {}, Expected value: {}",
                path,
                display_value(&actual),
                display_value(scalar)
            ),
        };
        return Err(mismatch(message));
    }
    Ok(())
}

pub(super) fn validate_schema(
    schema: &JsonSchemaRef,
    response: &HttpResponse,
    resolver: &FileResolver,
) -> Result<()> {
    check_schema(schema, response, resolver).map_err(|e| {
        if e.is(ErrorKind::ResponseJsonSchemaValidation) {
            e
        } else {
            e.wrap(
                ErrorKind::ResponseJsonSchemaValidation,
                " occurred during response json schema validation \n ",
            )
        }
    })
}

fn check_schema(schema: &JsonSchemaRef, response: &HttpResponse, resolver: &FileResolver) -> Result<()> {
    let expected = load_schema(schema, resolver)?;
    let body = response.json()?;

    let validator = jsonschema::validator_for(&expected)
        .map_err(|e| Error::custom("SchemaError", e.to_string()))?;

    let violations: Vec<String> = validator
        .iter_errors(&body)
        .map(|error| {
            format!(
                "Response json schema validation failed for property - {}, message: {}",
                property_path(&error.instance_path.to_string()),
                error
            )
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::ResponseJsonSchemaValidation,
            violations.join("\n"),
        ))
    }
}

fn load_schema(schema: &JsonSchemaRef, resolver: &FileResolver) -> Result<Value> {
    match (schema.source, &schema.reference) {
        (SchemaSource::Inline, Value::String(text)) => serde_json::from_str(text).map_err(|e| {
            Error::new(
                ErrorKind::ResponseJsonSchemaValidation,
                format!(
                    "SyntaxError occurred while parsing the inline input schema \n {} \n Input schema \n {}",
                    e, text
                ),
            )
        }),
        (SchemaSource::Inline, mapping) => Ok(mapping.clone()),
        (SchemaSource::File, reference) => {
            let path = resolver.resolve(display_value(reference));
            let text = std::fs::read_to_string(&path).map_err(|e| {
                Error::custom(
                    "Error",
                    format!("failed to read schema file '{}': {}", path.display(), e),
                )
            })?;
            serde_json::from_str(&text).map_err(|e| {
                Error::new(
                    ErrorKind::ResponseJsonSchemaValidation,
                    format!(
                        "SyntaxError occurred while parsing the input schema in '{}' \n {} \n Input schema: \n {}",
                        path.display(),
                        e,
                        text
                    ),
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::response;

    fn data(yaml: &str) -> Vec<JsonDataExpectation> {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn schema(yaml: &str) -> JsonSchemaRef {
        serde_yaml::from_str(yaml).unwrap()
    }

    const USER: &str = r#"{"id": 7, "name": "jo", "active": true, "tags": ["a", "b"], "manager": null}"#;

    #[test]
    fn test_matching_values() {
        let expected = data(
            r#"
- path: $.id
  value: 7
- path: $.name
  value: !regex ^j
- path: $.tags
  value: [a, b]
- path: $.active
  value: true
"#,
        );
        validate_data(&expected, &response(200, USER)).unwrap();
    }

    #[test]
    fn test_no_match() {
        let err = validate_data(&data("- path: $.missing\n  value: 1"), &response(200, USER)).unwrap_err();
        assert!(err.is(ErrorKind::ResponseJsonDataMismatch));
        assert_eq!(
            err.message(),
            "JSON Path evaluation did not return any matching value, json path: $.missing"
        );
    }

    #[test]
    fn test_mismatch_messages() {
        let err = validate_data(&data("- path: $.id\n  value: 8"), &response(200, USER)).unwrap_err();
        assert_eq!(
            err.message(),
            "JSON path evaluated value did not match with expected value, json path: $.id, Actual value: 7, Expected value: 8"
        );

        let err = validate_data(&data("- path: $.name\n  value: !regex ^x"), &response(200, USER)).unwrap_err();
        assert_eq!(
            err.message(),
            "JSON path evaluated value did not match the expected Regexp, json path: $.name, Regexp: /^x/, Actual value: jo"
        );

        let err = validate_data(&data("- path: $.tags\n  value: [a]"), &response(200, USER)).unwrap_err();
        assert!(err.message().ends_with("Actual value: [\"a\",\"b\"], Expected value: [\"a\"]"));
    }

    #[test]
    fn test_body_must_be_json() {
        let err = validate_data(&data("- path: $.id\n  value: 1"), &response(200, "<html>")).unwrap_err();
        assert!(err.is(ErrorKind::JsonBodyParse));
    }

    #[test]
    fn test_inline_schema() {
        let resolver = FileResolver::rooted_at(std::env::temp_dir());
        let ok = schema(
            r#"type: inline
$ref: '{"type": "object", "required": ["id"], "properties": {"id": {"type": "integer"}}}'"#,
        );
        validate_schema(&ok, &response(200, USER), &resolver).unwrap();

        let wrong = schema(
            r#"type: inline
$ref: '{"type": "object", "properties": {"name": {"type": "integer"}}}'"#,
        );
        let err = validate_schema(&wrong, &response(200, USER), &resolver).unwrap_err();
        assert!(err.is(ErrorKind::ResponseJsonSchemaValidation));
        assert!(err
            .message()
            .starts_with("Response json schema validation failed for property - instance.name, message: "));
    }

    #[test]
    fn test_unparseable_inline_schema() {
        let resolver = FileResolver::rooted_at(std::env::temp_dir());
        let broken = schema("type: inline\n$ref: '{not json'");
        let err = validate_schema(&broken, &response(200, USER), &resolver).unwrap_err();
        assert!(err.is(ErrorKind::ResponseJsonSchemaValidation));
        assert!(err
            .message()
            .starts_with("SyntaxError occurred while parsing the inline input schema"));
    }

    #[test]
    fn test_schema_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("user.json"), r#"{"type": "array"}"#).unwrap();
        let resolver = FileResolver::rooted_at(dir.path());

        let err = validate_schema(&schema("type: file\n$ref: user.json"), &response(200, USER), &resolver)
            .unwrap_err();
        assert!(err.message().contains("property - instance, message: "));

        let err = validate_schema(&schema("type: file\n$ref: none.json"), &response(200, USER), &resolver)
            .unwrap_err();
        assert!(err
            .message()
            .starts_with("Error occurred during response json schema validation \n failed to read schema file"));
    }
}
