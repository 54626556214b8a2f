//! reqwest-backed HTTP client

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method, Url};

use crate::common::{Error, ErrorKind, Result};
use crate::suite::document::HttpMethod;

use super::{FormPart, HttpClient, HttpResponse, PartContent, RequestBody, RequestSpec};

const MAX_REDIRECTS: usize = 10;

/// Sends requests with reqwest
///
/// Redirect handling is fixed per `reqwest::Client`, so two clients are
/// kept and picked per request.
pub struct ReqwestClient {
    following: Client,
    manual: Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        let user_agent = concat!("apisuite/", env!("CARGO_PKG_VERSION"));
        let following = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| Error::transport(format!("failed to create HTTP client: {}", e)))?;
        let manual = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { following, manual })
    }

    fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
        }
    }

    async fn build_body(
        builder: reqwest::RequestBuilder,
        body: &RequestBody,
    ) -> Result<reqwest::RequestBuilder> {
        Ok(match body {
            RequestBody::Text(text) => builder.body(text.clone()),
            RequestBody::File(path) => builder.body(open_file(path).await?),
            RequestBody::Form(fields) => {
                let encoded = serde_urlencoded::to_string(fields).map_err(|e| {
                    Error::new(ErrorKind::RequestBodyBuilder, format!("form encoding failed: {}", e))
                })?;
                builder.body(encoded)
            }
            RequestBody::Multipart(parts) => {
                let mut form = Form::new();
                for part in parts {
                    form = form.part(part.name.clone(), build_part(part).await?);
                }
                builder.multipart(form)
            }
        })
    }

    fn map_error(error: reqwest::Error, request: &RequestSpec) -> Error {
        let reason = if error.is_timeout() {
            format!("read timeout of {}ms exceeded", request.timeout.as_millis())
        } else if error.is_connect() {
            format!("connection failed: {}", error)
        } else if error.is_redirect() {
            format!("more than {} redirects", MAX_REDIRECTS)
        } else {
            error.to_string()
        };
        Error::transport(reason).with_request(request.method.as_str(), &request.href())
    }
}

/// Stream a binary body from disk
async fn open_file(path: &std::path::Path) -> Result<Body> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        Error::new(
            ErrorKind::RequestBodyBuilder,
            format!("failed to open '{}': {}", path.display(), e),
        )
    })?;
    Ok(Body::from(file))
}

async fn read_file(path: &std::path::Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| {
        Error::new(
            ErrorKind::RequestBodyBuilder,
            format!("failed to read '{}': {}", path.display(), e),
        )
    })
}

async fn build_part(part: &FormPart) -> Result<Part> {
    let mut built = match &part.content {
        PartContent::Text(text) => Part::text(text.clone()),
        PartContent::File(path) => {
            let bytes = read_file(path).await?;
            let default_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            let mut built = Part::bytes(bytes);
            if let Some(name) = part.filename.clone().or(default_name) {
                built = built.file_name(name);
            }
            built
        }
    };

    if let (PartContent::Text(_), Some(name)) = (&part.content, &part.filename) {
        built = built.file_name(name.clone());
    }
    if let Some(content_type) = &part.content_type {
        built = built.mime_str(content_type).map_err(|e| {
            Error::new(
                ErrorKind::RequestBodyBuilder,
                format!("invalid content type '{}' for field {}: {}", content_type, part.name, e),
            )
        })?;
    }
    Ok(built)
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: &RequestSpec) -> Result<HttpResponse> {
        let href = request.href();
        let url = Url::parse(&href).map_err(|e| {
            Error::new(ErrorKind::RequestBuilder, format!("invalid url '{}': {}", href, e))
        })?;

        let client = if request.follows_redirects() {
            &self.following
        } else {
            &self.manual
        };

        let mut builder = client
            .request(Self::to_reqwest_method(request.method), url)
            .timeout(request.timeout);

        let multipart = matches!(request.body, Some(RequestBody::Multipart(_)));
        for (name, value) in &request.headers {
            // The multipart boundary comes from the encoder
            if multipart && name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = request.cookie_header() {
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(body) = &request.body {
            builder = Self::build_body(builder, body).await?;
        }

        tracing::debug!(method = request.method.as_str(), url = %href, "sending request");
        let start = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(e, request))?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| Self::map_error(e, request))?;
        let duration_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(status = status_code, duration_ms, "response received");
        Ok(HttpResponse {
            status_code,
            headers,
            body,
            duration_ms,
            method: request.method.as_str().to_string(),
            url: final_url,
        })
    }
}
