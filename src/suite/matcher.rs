//! Expected values in response checks
//!
//! A suite writes expectations either as plain YAML values compared by deep
//! equality, or as patterns tagged `!regex`:
//!
//! ```yaml
//! headers:
//!   - name: content-type
//!     value: !regex application/json
//! json_data:
//!   - path: $.name
//!     value: !regex /^jo/i
//! ```

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

/// YAML tag that marks a pattern
pub const REGEX_TAG: &str = "regex";

/// One expected value
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Matches when the pattern finds a match in the stringified actual value
    Pattern(Pattern),
    /// Matches by deep equality
    Exact(Value),
}

/// A compiled pattern that remembers how it was written
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Parse `^abc` or `/abc/flags`
    pub fn parse(text: &str) -> Result<Self, String> {
        let (body, flags) = split_delimited(text).unwrap_or((text, ""));

        let mut builder = RegexBuilder::new(body);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                // Global and unicode flags change nothing for a single test
                _ => {}
            }
        }

        let regex = builder
            .build()
            .map_err(|e| format!("invalid regex {}: {}", text, e))?;
        Ok(Self {
            source: text.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if split_delimited(&self.source).is_some() {
            f.write_str(&self.source)
        } else {
            write!(f, "/{}/", self.source)
        }
    }
}

/// Flags accepted after the closing slash
const FLAGS: &str = "imsgu";

/// `/body/flags` only when every flag is supported, so `/users/me` stays literal
fn split_delimited(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let flags = &rest[end + 1..];
    if flags.chars().all(|c| FLAGS.contains(c)) {
        Some((&rest[..end], flags))
    } else {
        None
    }
}

impl Matcher {
    /// Build a matcher from a YAML node, honouring the `!regex` tag
    pub fn from_yaml(node: &serde_yaml::Value) -> Result<Self, String> {
        if let serde_yaml::Value::Tagged(tagged) = node {
            let tag = tagged.tag.to_string();
            if tag.trim_start_matches('!') != REGEX_TAG {
                return Err(format!("unknown tag {} on expected value", tag));
            }
            return match &tagged.value {
                serde_yaml::Value::String(text) => Pattern::parse(text).map(Matcher::Pattern),
                _ => Err("!regex expects a string".to_string()),
            };
        }
        yaml_to_json(node).map(Matcher::Exact)
    }

    /// Test the matcher against a header or cookie value
    pub fn matches_str(&self, actual: &str) -> bool {
        match self {
            Matcher::Pattern(pattern) => pattern.is_match(actual),
            Matcher::Exact(expected) => display_value(expected) == actual,
        }
    }

    /// Test the matcher against a JSON value from a response body
    pub fn matches_json(&self, actual: &Value) -> bool {
        match self {
            Matcher::Pattern(pattern) => pattern.is_match(&display_value(actual)),
            Matcher::Exact(expected) => deep_equal(expected, actual),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Pattern(pattern) => fmt::Display::fmt(pattern, f),
            Matcher::Exact(value) => f.write_str(&display_value(value)),
        }
    }
}

impl<'de> Deserialize<'de> for Matcher {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let node = serde_yaml::Value::deserialize(deserializer)?;
        Matcher::from_yaml(&node).map_err(de::Error::custom)
    }
}

/// Render a value the way it reads in a message: strings bare, the rest as JSON
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Structural equality where `1` and `1.0` are the same number
pub fn deep_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| deep_equal(x, y)))
        }
        _ => expected == actual,
    }
}

/// Convert an untagged YAML node into JSON
pub fn yaml_to_json(node: &serde_yaml::Value) -> Result<Value, String> {
    Ok(match node {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| format!("{} cannot be represented in JSON", n))?
            }
        }
        serde_yaml::Value::String(s) => Value::String(s.clone()),
        serde_yaml::Value::Sequence(items) => Value::Array(
            items
                .iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut object = serde_json::Map::new();
            for (key, value) in mapping {
                let key = match key {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => display_value(&yaml_to_json(other)?),
                };
                object.insert(key, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        serde_yaml::Value::Tagged(tagged) => {
            return Err(format!(
                "tag {} is only allowed on a top level expected value",
                tagged.tag
            ))
        }
    })
}
