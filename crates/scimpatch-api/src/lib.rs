use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use scimpatch_patch::PatchError;
use scimpatch_storage::StorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SCIM_CONTENT_TYPE: &str = "application/scim+json";
pub const ERROR_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

// -------------------------
// SCIM error body (RFC 7644 §3.12)
// -------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScimErrorBody {
    pub schemas: Vec<String>,
    /// HTTP status code as a string, e.g. "400".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ScimErrorBody {
    pub fn new(status: StatusCode, scim_type: Option<&str>, detail: impl Into<String>) -> Self {
        Self {
            schemas: vec![ERROR_SCHEMA.to_string()],
            status: status.as_u16().to_string(),
            scim_type: scim_type.map(str::to_string),
            detail: Some(detail.into()),
        }
    }
}

/// High-level API errors to be mapped to HTTP responses and SCIM error bodies
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {message}")]
    BadRequest {
        message: String,
        scim_type: Option<&'static str>,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        scim_type: Option<&'static str>,
    },
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest {
            message: msg.into(),
            scim_type: None,
        }
    }
    pub fn scim_bad_request(scim_type: &'static str, msg: impl Into<String>) -> Self {
        Self::BadRequest {
            message: msg.into(),
            scim_type: Some(scim_type),
        }
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict {
            message: msg.into(),
            scim_type: None,
        }
    }
    pub fn uniqueness(msg: impl Into<String>) -> Self {
        Self::Conflict {
            message: msg.into(),
            scim_type: Some("uniqueness"),
        }
    }
    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::PayloadTooLarge(msg.into())
    }
    pub fn unsupported_media_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(msg.into())
    }
    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::NotImplemented(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn scim_type(&self) -> Option<&'static str> {
        match self {
            ApiError::BadRequest { scim_type, .. } | ApiError::Conflict { scim_type, .. } => {
                *scim_type
            }
            _ => None,
        }
    }

    fn detail(&self) -> &str {
        match self {
            ApiError::BadRequest { message, .. } | ApiError::Conflict { message, .. } => message,
            ApiError::NotFound(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::UnsupportedMediaType(msg)
            | ApiError::NotImplemented(msg)
            | ApiError::Internal(msg) => msg,
        }
    }

    pub fn to_error_body(&self) -> ScimErrorBody {
        ScimErrorBody::new(self.status_code(), self.scim_type(), self.detail())
    }
}

impl From<PatchError> for ApiError {
    fn from(err: PatchError) -> Self {
        match err {
            PatchError::NotImplemented(msg) => Self::NotImplemented(msg),
            other => Self::BadRequest {
                scim_type: other.scim_type(),
                message: other.to_string(),
            },
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::NotFound { id } => Self::not_found(format!("User {id} not found")),
            StorageError::AlreadyExists { .. } => Self::uniqueness(err.to_string()),
            StorageError::InvalidResource { .. } => {
                Self::scim_bad_request("invalidValue", err.to_string())
            }
            StorageError::TransactionError { .. } | StorageError::Internal { .. } => {
                Self::internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::to_vec(&self.to_error_body()).unwrap_or_else(|_| b"{}".to_vec());
        scim_json(status, Vec::new(), body)
    }
}

fn scim_json(status: StatusCode, headers: Vec<(HeaderName, HeaderValue)>, body: Vec<u8>) -> Response {
    let mut builder = axum::http::Response::builder().status(status);
    builder = builder.header(header::CONTENT_TYPE, HeaderValue::from_static(SCIM_CONTENT_TYPE));
    for (n, v) in headers {
        builder = builder.header(n, v);
    }
    builder
        .body(axum::body::Body::from(body))
        .unwrap_or_else(|_| {
            let mut fallback = Response::new(axum::body::Body::from("{}"));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}


// -------------------------
// API Response Wrapper
// -------------------------

#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub value: T,
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl<T> ApiResponse<T> {
    pub fn new(value: T, status: StatusCode) -> Self {
        Self {
            value,
            status,
            headers: Vec::new(),
        }
    }

    pub fn ok(value: T) -> Self {
        Self::new(value, StatusCode::OK)
    }

    pub fn created(value: T) -> Self {
        Self::new(value, StatusCode::CREATED)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Adds an `ETag` header; `etag` is already in `W/"n"` form.
    pub fn with_etag(mut self, etag: &str) -> Self {
        if let Ok(val) = HeaderValue::from_str(etag) {
            self.headers.push((header::ETAG, val));
        }
        self
    }

    pub fn with_location(mut self, location: &str) -> Self {
        if let Ok(val) = HeaderValue::from_str(location) {
            self.headers.push((header::LOCATION, val));
        }
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.value) {
            Ok(body) => scim_json(self.status, self.headers, body),
            Err(e) => ApiError::internal(format!("Serialization failure: {e}")).into_response(),
        }
    }
}


// -------------------------
// Content Negotiation
// -------------------------

/// Validate Content-Type for requests with bodies: require application/scim+json or application/json
pub fn validate_content_type(headers: &HeaderMap) -> Result<(), ApiError> {
    if let Some(ct) = headers.get(header::CONTENT_TYPE) {
        let val = ct.to_str().unwrap_or("").to_ascii_lowercase();
        let allowed = val.starts_with(SCIM_CONTENT_TYPE) || val.starts_with("application/json");
        if !allowed {
            return Err(ApiError::unsupported_media_type(format!(
                "Unsupported Content-Type: {val}. Only application/scim+json or application/json are supported."
            )));
        }
    }
    Ok(())
}
