//! Set-Cookie parsing and cookie expectations

use crate::common::{Error, ErrorKind, Result};
use crate::http::HttpResponse;
use crate::suite::document::ExpectedPair;
use crate::suite::Matcher;

use super::dedupe;

/// Cookies set by the response, as `(name, value)` in arrival order
///
/// Only the leading `name=value` of each `Set-Cookie` header is kept; a
/// cookie set twice keeps its last value.
pub fn response_cookies(response: &HttpResponse) -> Vec<(String, String)> {
    let mut cookies: Vec<(String, String)> = Vec::new();
    for header in response.header_values("set-cookie") {
        let pair = header.split(';').next().unwrap_or_default();
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let (name, value) = (name.trim().to_string(), value.trim().to_string());
        match cookies.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => cookies.push((name, value)),
        }
    }
    cookies
}

pub(super) fn validate_cookies(expected: &[ExpectedPair], response: &HttpResponse) -> Result<()> {
    let actual_cookies = response_cookies(response);
    let fail = |message: String| Error::new(ErrorKind::ResponseCookieValueDidNotMatch, message);

    for (name, matcher) in dedupe(expected, str::to_string) {
        let Some((_, actual)) = actual_cookies.iter().find(|(cookie, _)| *cookie == name) else {
            return Err(fail(format!(
                "Expected value for Cookie: {} is {}, Actual value: [couldn't find it in response cookies]",
                name, matcher
            )));
        };

        if matcher.matches_str(actual) {
            continue;
        }
        return Err(fail(match matcher {
            Matcher::Pattern(_) => format!(
                "Cookie value did not match with expected Regex. Expected value for cookie: {} is to match RegExp {}, Actual value: {}",
                name, matcher, actual
            ),
            Matcher::Exact(_) => format!(
                "Expected value for cookie: {} is {}, Actual value: {}",
                name, matcher, actual
            ),
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::response;

    fn with_cookies(values: &[&str]) -> HttpResponse {
        let mut response = response(200, "{}");
        for value in values {
            response.headers.push(("set-cookie".into(), value.to_string()));
        }
        response
    }

    fn expected(yaml: &str) -> Vec<ExpectedPair> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_parse_set_cookie() {
        let response = with_cookies(&["sid=abc; Path=/; HttpOnly", "theme=dark", "sid=def"]);
        assert_eq!(
            response_cookies(&response),
            vec![
                ("sid".to_string(), "def".to_string()),
                ("theme".to_string(), "dark".to_string())
            ]
        );
    }

    #[test]
    fn test_cookie_expectations() {
        let response = with_cookies(&["sid=abc123; Path=/"]);

        validate_cookies(&expected("- name: sid\n  value: !regex ^abc"), &response).unwrap();

        let err = validate_cookies(&expected("- name: sid\n  value: xyz"), &response).unwrap_err();
        assert_eq!(
            err.message(),
            "Expected value for cookie: sid is xyz, Actual value: abc123"
        );

        let err = validate_cookies(&expected("- name: token\n  value: t"), &response).unwrap_err();
        assert!(err.is(ErrorKind::ResponseCookieValueDidNotMatch));
        assert_eq!(
            err.message(),
            "Expected value for Cookie: token is t, Actual value: [couldn't find it in response cookies]"
        );

        let err = validate_cookies(&expected("- name: sid\n  value: !regex ^z"), &response).unwrap_err();
        assert!(err.message().starts_with("Cookie value did not match with expected Regex."));
    }
}
