//! Response validation
//!
//! Checks run in a fixed order and stop at the first failure: status code,
//! headers, cookies, JSON schema, JSON data and finally the custom
//! validator function.

mod cookies;
mod json;

use crate::common::paths::FileResolver;
use crate::common::{Error, ErrorKind, Result};
use crate::hooks::{HookContext, HookKind, HookRegistry};
use crate::http::HttpResponse;
use crate::suite::document::{ExpectedPair, ResponseExpectation};
use crate::suite::Matcher;

pub use cookies::response_cookies;

/// Validate `response` against everything `expectation` declares
///
/// `ctx` is handed to the custom validator; its `response` is set here.
pub async fn validate(
    expectation: &ResponseExpectation,
    response: &HttpResponse,
    hooks: &HookRegistry,
    resolver: &FileResolver,
    ctx: &mut HookContext<'_>,
) -> Result<()> {
    validate_declared(expectation, response, resolver)?;

    if let Some(validator) = &expectation.custom_validator {
        let mut ctx = HookContext {
            suite: ctx.suite.as_deref_mut(),
            test: ctx.test.as_deref_mut(),
            response: Some(response),
            loop_item: ctx.loop_item,
            config: None,
            runner: ctx.runner,
        };
        hooks
            .run(HookKind::CustomValidator, validator, resolver, &mut ctx)
            .await?;
    }
    Ok(())
}

/// The declarative checks, without the custom validator
pub fn validate_declared(
    expectation: &ResponseExpectation,
    response: &HttpResponse,
    resolver: &FileResolver,
) -> Result<()> {
    if let Some(code) = expectation.status_code {
        validate_status(code, response)?;
    }
    if !expectation.headers.is_empty() {
        validate_headers(&expectation.headers, response)?;
    }
    if !expectation.cookies.is_empty() {
        cookies::validate_cookies(&expectation.cookies, response)?;
    }
    if let Some(schema) = &expectation.json_schema {
        json::validate_schema(schema, response, resolver)?;
    }
    if !expectation.json_data.is_empty() {
        json::validate_data(&expectation.json_data, response)?;
    }
    Ok(())
}

fn validate_status(code: u16, response: &HttpResponse) -> Result<()> {
    if code == response.status_code {
        return Ok(());
    }
    Err(Error::new(
        ErrorKind::ResponseStatusCodeDidNotMatch,
        format!(
            "Expected status code: {}, Actual status code: {}",
            code, response.status_code
        ),
    ))
}

fn validate_headers(expected: &[ExpectedPair], response: &HttpResponse) -> Result<()> {
    for (name, matcher) in dedupe(expected, |name| name.to_lowercase()) {
        let fail = |message: String| Error::new(ErrorKind::ResponseHeaderValueDidNotMatch, message);

        let Some(actual) = response.header(&name) else {
            return Err(fail(format!(
                "Expected value for header: {} is {}, Actual value: [couldn't find it in response headers]",
                name, matcher
            )));
        };

        if matcher.matches_str(&actual) {
            continue;
        }
        return Err(fail(match matcher {
            Matcher::Pattern(_) => format!(
                "Header value did not match with expected Regex. Expected value for header: {} is to match RegExp {}, Actual value: {}",
                name, matcher, actual
            ),
            Matcher::Exact(_) => format!(
                "Expected value for header: {} is {}, Actual value: {}",
                name, matcher, actual
            ),
        }));
    }
    Ok(())
}

/// Later declarations of the same name replace earlier ones in place
pub(crate) fn dedupe<'a>(
    expected: &'a [ExpectedPair],
    key: impl Fn(&str) -> String,
) -> Vec<(String, &'a Matcher)> {
    let mut pairs: Vec<(String, &Matcher)> = Vec::new();
    for pair in expected {
        let name = key(&pair.name);
        match pairs.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = &pair.value,
            None => pairs.push((name, &pair.value)),
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::FnHook;
    use crate::http::testing::response;
    use crate::suite::FunctionRef;
    use serde_json::Value;

    fn expectation(yaml: &str) -> ResponseExpectation {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn resolver() -> FileResolver {
        FileResolver::rooted_at(std::env::temp_dir())
    }

    #[test]
    fn test_status_mismatch() {
        let err = validate_declared(&expectation("status_code: 201"), &response(200, "{}"), &resolver())
            .unwrap_err();
        assert!(err.is(ErrorKind::ResponseStatusCodeDidNotMatch));
        assert_eq!(err.message(), "Expected status code: 201, Actual status code: 200");
    }

    #[test]
    fn test_header_exact_and_regex() {
        let ok = expectation(
            "headers:\n  - name: Content-Type\n    value: application/json\n  - name: content-type\n    value: !regex json$",
        );
        validate_declared(&ok, &response(200, "{}"), &resolver()).unwrap();

        let missing = expectation("headers:\n  - name: x-request-id\n    value: abc");
        let err = validate_declared(&missing, &response(200, "{}"), &resolver()).unwrap_err();
        assert_eq!(
            err.message(),
            "Expected value for header: x-request-id is abc, Actual value: [couldn't find it in response headers]"
        );

        let regex = expectation("headers:\n  - name: content-type\n    value: !regex ^text");
        let err = validate_declared(&regex, &response(200, "{}"), &resolver()).unwrap_err();
        assert!(err.is(ErrorKind::ResponseHeaderValueDidNotMatch));
        assert_eq!(
            err.message(),
            "Header value did not match with expected Regex. Expected value for header: content-type is to match RegExp /^text/, Actual value: application/json"
        );

        let literal = expectation("headers:\n  - name: content-type\n    value: text/html");
        let err = validate_declared(&literal, &response(200, "{}"), &resolver()).unwrap_err();
        assert_eq!(
            err.message(),
            "Expected value for header: content-type is text/html, Actual value: application/json"
        );
    }

    #[test]
    fn test_status_checked_before_headers() {
        let both = expectation("status_code: 404\nheaders:\n  - name: x-missing\n    value: 1");
        let err = validate_declared(&both, &response(200, "{}"), &resolver()).unwrap_err();
        assert!(err.is(ErrorKind::ResponseStatusCodeDidNotMatch));
    }

    #[tokio::test]
    async fn test_custom_validator_sees_response() {
        let mut hooks = HookRegistry::new();
        hooks.register_function(
            "has-id",
            FnHook::new(|ctx| {
                let body = ctx.response.map(|r| r.body.clone()).unwrap_or_default();
                if body.contains("\"id\"") {
                    Ok(Value::Null)
                } else {
                    Err(Error::custom("AssertionError", "id missing"))
                }
            }),
        );

        let mut declared = expectation("status_code: 200");
        declared.custom_validator = Some(FunctionRef::inline("has-id"));

        validate(&declared, &response(200, "{\"id\":1}"), &hooks, &resolver(), &mut HookContext::default())
            .await
            .unwrap();

        let err = validate(&declared, &response(200, "{}"), &hooks, &resolver(), &mut HookContext::default())
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::CustomResponseValidation));
        assert_eq!(
            err.message(),
            "AssertionError occurred in custom response validation \n id missing"
        );
    }
}
