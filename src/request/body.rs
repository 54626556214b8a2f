//! Request body construction
//!
//! Which body a request carries is decided by the payload together with the
//! request's Content-Type header. The header must be present whenever a
//! payload is, and form bodies require their exact media type.

use std::path::Path;

use serde_json::Value;

use crate::common::paths::FileResolver;
use crate::common::{Error, ErrorKind, Result};
use crate::http::{FormPart, PartContent, RequestBody};
use crate::suite::document::{BodyContent, BodyKind, FormDataField, FormFieldKind, HttpMethod, Payload};
use crate::suite::matcher::display_value;

const BODY_FIELDS: &str = "body,form,form_data";
const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data";

/// Build the body of a PATCH, POST or PUT request
pub fn build_body(
    payload: Option<&Payload>,
    content_type: Option<&str>,
    method: HttpMethod,
    resolver: &FileResolver,
) -> Result<Option<RequestBody>> {
    let method = method.as_str().to_lowercase();
    let content_type = content_type.filter(|ct| ct.len() > 1);

    let (content_type, payload) = match (content_type, payload) {
        (None, None) => return Ok(None),
        (None, Some(_)) => {
            return Err(Error::new(
                ErrorKind::InvalidRequestHeader,
                format!(
                    "Request method is {},request body is provided but Content-Type header is not provided",
                    method
                ),
            ))
        }
        (Some(ct), None) => {
            return Err(Error::new(
                ErrorKind::RequestBodyNotFound,
                format!("request content-type is {}, but request body is not found", ct),
            ))
        }
        (Some(ct), Some(payload)) => (ct, payload),
    };

    let provided = [
        payload.body.is_some(),
        payload.form.is_some(),
        payload.form_data.is_some(),
    ]
    .iter()
    .filter(|present| **present)
    .count();

    if provided == 0 {
        return Err(Error::new(
            ErrorKind::RequestBodyNotFound,
            format!(
                "Request method is {}, but request specification does not have any expected body fields. \n  Provide request body as one of {}",
                method, BODY_FIELDS
            ),
        ));
    }
    if provided > 1 {
        return Err(Error::new(
            ErrorKind::InvalidRequestSpecification,
            format!(
                "request method is {}, and request specification contains more than one of expected body fields. Provide one of {}",
                method, BODY_FIELDS
            ),
        ));
    }

    if let Some(body) = &payload.body {
        return raw_body(body, content_type, resolver).map(Some);
    }

    if let Some(form) = &payload.form {
        if content_type != FORM {
            return Err(Error::new(
                ErrorKind::InvalidRequestHeader,
                format!(
                    "Request body is provided as form but request Content-Type is {}. It should be {}",
                    content_type, FORM
                ),
            ));
        }
        let fields = form
            .iter()
            .map(|(name, value)| (name.clone(), display_value(value)))
            .collect();
        return Ok(Some(RequestBody::Form(fields)));
    }

    let fields = payload.form_data.as_deref().unwrap_or_default();
    if content_type != MULTIPART {
        return Err(Error::new(
            ErrorKind::InvalidRequestHeader,
            format!(
                "Request body is provided as formData but request Content-Type is {}. It should be {}",
                content_type, MULTIPART
            ),
        ));
    }
    let parts = fields
        .iter()
        .map(|field| form_part(field, resolver))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(RequestBody::Multipart(parts)))
}

fn raw_body(body: &BodyContent, content_type: &str, resolver: &FileResolver) -> Result<RequestBody> {
    match body.kind {
        BodyKind::Binary => {
            let path = content_path(&body.content, "binary body content")?;
            let file = resolver.resolve(path);
            ensure_file(&file, "a valid file path to be sent as body content")?;
            Ok(RequestBody::File(file))
        }
        BodyKind::Text => match &body.content {
            Value::String(_) | Value::Number(_) => Ok(RequestBody::Text(display_value(&body.content))),
            _ => Err(Error::new(
                ErrorKind::InvalidRequestSpecification,
                "Payload type is given as text, but content provided is not a string or number",
            )),
        },
        BodyKind::Json => match &body.content {
            Value::String(_) | Value::Number(_) => Ok(RequestBody::Text(display_value(&body.content))),
            Value::Object(_) | Value::Array(_) if content_type != JSON => Err(Error::new(
                ErrorKind::InvalidRequestSpecification,
                "Request body is an object but content-type header value is not application/json",
            )),
            other => dump_json(other).map(RequestBody::Text),
        },
    }
}

fn form_part(field: &FormDataField, resolver: &FileResolver) -> Result<FormPart> {
    let content = match field.kind {
        FormFieldKind::File => {
            let path = content_path(&field.content, "multipart file field content")?;
            let file = resolver.resolve(path);
            ensure_file(&file, "a valid path for content of form body")?;
            PartContent::File(file)
        }
        FormFieldKind::Text => match &field.content {
            Value::String(_) | Value::Number(_) => PartContent::Text(display_value(&field.content)),
            _ => {
                return Err(Error::new(
                    ErrorKind::InvalidRequestSpecification,
                    "Multipart form field type is given as text, but content provided is not a string or number",
                ))
            }
        },
        FormFieldKind::Json => match &field.content {
            Value::String(_) | Value::Number(_) => PartContent::Text(display_value(&field.content)),
            other => PartContent::Text(dump_json(other)?),
        },
    };

    let options = field.options.clone().unwrap_or_default();
    Ok(FormPart {
        name: field.name.clone(),
        content,
        filename: options.filename,
        content_type: options.content_type,
    })
}

fn content_path<'a>(content: &'a Value, what: &str) -> Result<&'a str> {
    content.as_str().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidRequestSpecification,
            format!("{} should be a file path, got {}", what, content),
        )
    })
}

fn dump_json(value: &Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| {
        Error::new(
            ErrorKind::RequestBodyBuilder,
            format!("Unable to dump the body content as json \n {}", e),
        )
    })
}

/// The path must name an existing regular file
fn ensure_file(file: &Path, provide: &str) -> Result<()> {
    match std::fs::metadata(file) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(Error::new(
            ErrorKind::RequestBodyBuilder,
            format!("'{}' is not a file, Provide {}", file.display(), provide),
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::new(
            ErrorKind::RequestBodyBuilder,
            format!(
                "ENOENT file at '{}' does not exist, Provide {}",
                file.display(),
                provide
            ),
        )),
        Err(e) => Err(Error::new(
            ErrorKind::RequestBodyBuilder,
            format!("cannot read '{}': {}", file.display(), e),
        )),
    }
}
