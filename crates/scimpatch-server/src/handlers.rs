use axum::{
    Json,
    body::Bytes,
    extract::{Path, State, rejection::BytesRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use scimpatch_api::{ApiError, ApiResponse, validate_content_type};
use scimpatch_patch::PatchRequest;
use scimpatch_storage::attributes_from_scim;
use serde_json::{Value, json};

use crate::state::AppState;

pub async fn healthz() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Resource not found")
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let user = state.service.read(&id).await?;
    Ok(ApiResponse::ok(state.render(&user)).with_etag(&user.etag()))
}

pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<ApiResponse<Value>, ApiError> {
    validate_content_type(&headers)?;
    let body = body_bytes(body)?;
    let resource: Value = serde_json::from_slice(&body).map_err(|e| {
        ApiError::scim_bad_request("invalidSyntax", format!("Invalid JSON body: {e}"))
    })?;

    let attributes = attributes_from_scim(resource)?;
    let user = state.service.create(attributes).await?;
    Ok(ApiResponse::created(state.render(&user))
        .with_location(&state.location(&user))
        .with_etag(&user.etag()))
}

/// `PATCH /Users/{id}`: 200 with the resource when it changed, 204 otherwise.
pub async fn patch_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    validate_content_type(&headers)?;
    let body = body_bytes(body)?;
    let operations = PatchRequest::from_slice(&body)?.into_operations()?;

    let result = state.service.patch(&id, &operations).await?;
    let etag = result.user.etag();
    if !result.changed {
        let mut response = StatusCode::NO_CONTENT.into_response();
        if let Ok(value) = HeaderValue::from_str(&etag) {
            response.headers_mut().insert(header::ETAG, value);
        }
        return Ok(response);
    }

    Ok(ApiResponse::ok(state.render(&result.user))
        .with_etag(&etag)
        .into_response())
}

fn body_bytes(body: Result<Bytes, BytesRejection>) -> Result<Bytes, ApiError> {
    body.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::payload_too_large(rejection.body_text()),
        _ => ApiError::bad_request(rejection.body_text()),
    })
}
