//! Error types for the suite runner
//!
//! Every failure carries an [`ErrorKind`] so reporters can tell a status code
//! mismatch from a broken hook without parsing messages. The kind names are
//! stable and appear verbatim in reports.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of every failure the runner can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Suite loading ===
    FileDoesNotExist,
    SuiteLoading,
    InvalidSuiteSchema,
    InvalidSuiteConfiguration,
    DisabledSuite,
    NoSpecsFound,
    LoadingSpecDependencySuite,
    SuiteConfigurationFailed,
    SuiteCustomConfiguration,

    // === Dependency specs ===
    NoSpecFoundMatchingName,

    // === Request building ===
    RequestBuilder,
    RequestBodyBuilder,
    RequestBodyNotFound,
    InvalidRequestSpecification,
    InvalidRequestHeader,
    InvalidSpecificationSchema,

    // === Response validation ===
    JsonBodyParse,
    ResponseStatusCodeDidNotMatch,
    ResponseHeaderValueDidNotMatch,
    ResponseCookieValueDidNotMatch,
    ResponseJsonSchemaValidation,
    ResponseJsonDataMismatch,
    CustomResponseValidation,

    // === Hooks and user functions ===
    BeforeAllHook,
    AfterAllHook,
    BeforeEachHook,
    AfterEachHook,
    BeforeTestHook,
    AfterTestHook,
    LoopItemsBuilder,
    CustomFunctionNotFoundInModule,
    NotAFunction,

    // === Collaborators ===
    Transport,
    Config,
    Io,

    /// Raised by a user function under a name of its own choosing
    Custom,
}

impl ErrorKind {
    /// Stable name used in reports and wrapped messages
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::FileDoesNotExist => "FileDoesNotExistError",
            ErrorKind::SuiteLoading => "YAMLSuiteLoadingError",
            ErrorKind::InvalidSuiteSchema => "InvalidSuiteSchemaError",
            ErrorKind::InvalidSuiteConfiguration => "InvalidSuiteConfigurationError",
            ErrorKind::DisabledSuite => "DisabledSuiteError",
            ErrorKind::NoSpecsFound => "NoSpecsFoundError",
            ErrorKind::LoadingSpecDependencySuite => "LoadingSpecDependencySuiteError",
            ErrorKind::SuiteConfigurationFailed => "SuiteConfigurationFailedError",
            ErrorKind::SuiteCustomConfiguration => "SuiteCustomConfigurationError",
            ErrorKind::NoSpecFoundMatchingName => "NoSpecFoundMatchingNameError",
            ErrorKind::RequestBuilder => "RequestBuilderError",
            ErrorKind::RequestBodyBuilder => "RequestBodyBuilderError",
            ErrorKind::RequestBodyNotFound => "RequestBodyNotFoundError",
            ErrorKind::InvalidRequestSpecification => "InvalidRequestSpecificationError",
            ErrorKind::InvalidRequestHeader => "InvalidRequestHeaderError",
            ErrorKind::InvalidSpecificationSchema => "InvalidSpecificationSchemaError",
            ErrorKind::JsonBodyParse => "JSONBodyParseError",
            ErrorKind::ResponseStatusCodeDidNotMatch => "ResponseStatusCodeDidNotMatchError",
            ErrorKind::ResponseHeaderValueDidNotMatch => "ResponseHeaderValueDidNotMatchError",
            ErrorKind::ResponseCookieValueDidNotMatch => "ResponseCookieValueDidNotMatchError",
            ErrorKind::ResponseJsonSchemaValidation => "ResponseJSONSchemaValidationError",
            ErrorKind::ResponseJsonDataMismatch => "ResponseJSONDataMismatchError",
            ErrorKind::CustomResponseValidation => "CustomResponseValidationError",
            ErrorKind::BeforeAllHook => "BeforeAllHookError",
            ErrorKind::AfterAllHook => "AfterAllHookError",
            ErrorKind::BeforeEachHook => "BeforeEachHookError",
            ErrorKind::AfterEachHook => "AfterEachHookError",
            ErrorKind::BeforeTestHook => "BeforeTestHookError",
            ErrorKind::AfterTestHook => "AfterTestHookError",
            ErrorKind::LoopItemsBuilder => "LoopItemsBuilderError",
            ErrorKind::CustomFunctionNotFoundInModule => "CustomFunctionNotFoundInModuleError",
            ErrorKind::NotAFunction => "NotAFunctionError",
            ErrorKind::Transport => "RequestTransportError",
            ErrorKind::Config => "ConfigurationError",
            ErrorKind::Io => "IOError",
            ErrorKind::Custom => "Error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Main error type for the suite runner
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    /// Only set for [`ErrorKind::Custom`]
    custom_name: Option<String>,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            custom_name: None,
            message: message.into(),
        }
    }

    /// An error raised by user code under its own name
    pub fn custom(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Custom,
            custom_name: Some(name.into()),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Name shown in reports: the kind name, or the user supplied one
    pub fn name(&self) -> &str {
        match (&self.kind, &self.custom_name) {
            (ErrorKind::Custom, Some(name)) => name,
            _ => self.kind.name(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Append the failing request line so the report points at the call
    pub fn with_request(mut self, method: &str, url: &str) -> Self {
        self.message = format!(
            "{} \n request: {} {}",
            self.message,
            method.to_uppercase(),
            url
        );
        self
    }

    /// Wrap this error into `kind`, keeping the original name and message
    pub fn wrap(&self, kind: ErrorKind, context: &str) -> Self {
        Self::new(kind, format!("{}{}{}", self.name(), context, self.message))
    }

    // === Shorthands for the common kinds ===

    pub fn file_does_not_exist(what: &str, path: &std::path::Path) -> Self {
        Self::new(
            ErrorKind::FileDoesNotExist,
            format!("{} file doesn't exist at '{}'", what, path.display()),
        )
    }

    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSuiteSchema, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::new(ErrorKind::Io, e.to_string())
    }
}

/// Serializable form of an error for reports and process modules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub name: String,
    pub message: String,
}

impl From<&Error> for ErrorReport {
    fn from(e: &Error) -> Self {
        Self {
            name: e.name().to_string(),
            message: e.message().to_string(),
        }
    }
}

impl From<ErrorReport> for Error {
    fn from(report: ErrorReport) -> Self {
        // Names we know map back onto their kind so pass-through rules apply
        match kind_from_name(&report.name) {
            Some(kind) => Error::new(kind, report.message),
            None => Error::custom(report.name, report.message),
        }
    }
}

impl Serialize for Error {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ErrorReport::from(self).serialize(serializer)
    }
}

fn kind_from_name(name: &str) -> Option<ErrorKind> {
    use ErrorKind::*;
    [
        FileDoesNotExist,
        InvalidSuiteSchema,
        NoSpecFoundMatchingName,
        CustomResponseValidation,
        LoopItemsBuilder,
        CustomFunctionNotFoundInModule,
        ResponseStatusCodeDidNotMatch,
        ResponseHeaderValueDidNotMatch,
        ResponseCookieValueDidNotMatch,
        ResponseJsonDataMismatch,
        ResponseJsonSchemaValidation,
        JsonBodyParse,
    ]
    .into_iter()
    .find(|kind| kind.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_keeps_original_name_and_message() {
        let inner = Error::new(ErrorKind::NoSpecFoundMatchingName, "No matching spec found with name 'x'");
        let wrapped = inner.wrap(ErrorKind::BeforeTestHook, " - ");
        assert!(wrapped.is(ErrorKind::BeforeTestHook));
        assert_eq!(
            wrapped.message(),
            "NoSpecFoundMatchingNameError - No matching spec found with name 'x'"
        );
    }

    #[test]
    fn test_custom_error_reports_its_own_name() {
        let e = Error::custom("SyntaxError", "Unexpected token");
        assert_eq!(e.name(), "SyntaxError");
        assert!(e.is(ErrorKind::Custom));
    }

    #[test]
    fn test_report_round_trip_restores_known_kinds() {
        let report = ErrorReport {
            name: "CustomResponseValidationError".to_string(),
            message: "boom".to_string(),
        };
        let e = Error::from(report);
        assert!(e.is(ErrorKind::CustomResponseValidation));
    }

    #[test]
    fn test_with_request_appends_request_line() {
        let e = Error::new(ErrorKind::ResponseStatusCodeDidNotMatch, "Expected status code: 200")
            .with_request("get", "http://localhost/x");
        assert!(e.message().ends_with("request: GET http://localhost/x"));
    }
}
