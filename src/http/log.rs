//! Per-suite log of HTTP exchanges
//!
//! Every request a suite sends is recorded with its response or transport
//! error. The log is cleared before each spec, so what a failed spec carries
//! into its result is exactly what that spec sent.

use std::sync::Mutex;

use serde::Serialize;

use crate::common::Result;

use super::{serialize_headers, HttpResponse, PartContent, RequestBody, RequestSpec};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exchange {
    pub request: LoggedRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<LoggedResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedRequest {
    pub method: String,
    pub uri: String,
    #[serde(serialize_with = "serialize_headers")]
    pub headers: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Form bodies are logged as field summaries, not raw bytes
    pub form_request: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedResponse {
    pub status_code: u16,
    #[serde(serialize_with = "serialize_headers")]
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub duration_ms: u64,
}

impl Exchange {
    pub fn new(request: &RequestSpec, outcome: &Result<HttpResponse>) -> Self {
        let mut headers = request.headers.clone();
        if let Some(cookie) = request.cookie_header() {
            headers.push(("cookie".to_string(), cookie));
        }

        let (body, form_request) = match &request.body {
            None => (None, false),
            Some(RequestBody::Text(text)) => (Some(text.clone()), false),
            Some(RequestBody::File(path)) => (Some(format!("<file {}>", path.display())), false),
            Some(RequestBody::Form(fields)) => {
                (serde_urlencoded::to_string(fields).ok(), true)
            }
            Some(RequestBody::Multipart(parts)) => {
                let summary = parts
                    .iter()
                    .map(|part| match &part.content {
                        PartContent::Text(text) => format!("{}={}", part.name, text),
                        PartContent::File(path) => {
                            format!("{}=<file {}>", part.name, path.display())
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("&");
                (Some(summary), true)
            }
        };

        let logged_request = LoggedRequest {
            method: request.method.as_str().to_string(),
            uri: request.href(),
            headers,
            body,
            form_request,
        };

        match outcome {
            Ok(response) => Self {
                request: logged_request,
                response: Some(LoggedResponse {
                    status_code: response.status_code,
                    headers: response.headers.clone(),
                    body: response.body.clone(),
                    duration_ms: response.duration_ms,
                }),
                error: None,
            },
            Err(e) => Self {
                request: logged_request,
                response: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Human readable rendering for console failure output
    pub fn render(&self) -> String {
        let mut out = String::from("Request: \n\n");
        out.push_str(&format!("{} {} \n", self.request.method, self.request.uri));
        for (name, value) in &self.request.headers {
            out.push_str(&format!("{}: {}\n", name, value));
        }
        out.push('\n');
        if let Some(body) = &self.request.body {
            if self.request.form_request {
                out.push_str("Form request, fields shown as sent by the runner \n");
            }
            out.push_str(body);
            out.push('\n');
        }

        match (&self.response, &self.error) {
            (_, Some(error)) => {
                out.push_str("\n--Encountered following error \n\n");
                out.push_str(error);
                out.push('\n');
            }
            (Some(response), None) => {
                out.push_str("\nResponse: \n\n");
                out.push_str(&format!("Status code: {} \n", response.status_code));
                for (name, value) in &response.headers {
                    out.push_str(&format!("{}: {}\n", name, value));
                }
                out.push('\n');
                out.push_str(&response.body);
                out.push('\n');
                out.push_str(&format!("\nRequest duration: {}ms \n", response.duration_ms));
            }
            (None, None) => {}
        }
        out
    }
}

/// Shared, append-only exchange log of one suite
#[derive(Debug, Default)]
pub struct RequestLog {
    entries: Mutex<Vec<Exchange>>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, exchange: Exchange) {
        self.lock().push(exchange);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Copy of everything recorded since the last clear
    pub fn snapshot(&self) -> Vec<Exchange> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Exchange>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
