//! API response helpers.
//!
//! Success bodies are plain serialized DTOs; the error envelope
//! (`{"error":{"code","message"}}`) comes from
//! [`opine_common::AppError`]'s `IntoResponse`.

use axum::{http::StatusCode, response::IntoResponse};

/// Empty success response.
#[must_use]
pub fn ok() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}
