//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use opine_common::AppError;

/// Caller identity installed into request extensions by the identity
/// middleware. Authentication itself happens upstream; this layer trusts
/// the forwarded user id.
#[derive(Debug, Clone)]
pub struct Identity(pub String);

/// Authenticated user extractor. Rejects with 401 when no identity was
/// forwarded.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(|identity| Self(identity.0))
            .ok_or(AppError::Unauthorized)
    }
}
