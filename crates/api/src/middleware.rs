//! API middleware.

#![allow(missing_docs)]

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use opine_core::{FeedService, PollService};

use crate::extractors::Identity;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub feed_service: FeedService,
    pub poll_service: PollService,
}

/// Identity middleware.
///
/// The fronting auth layer authenticates callers and forwards the verified
/// user id in `x-user-id`. Copy it into request extensions so the
/// `AuthUser` extractor can pick it up.
pub async fn identity_middleware(mut req: Request<Body>, next: Next) -> Response {
    let user_id = req
        .headers()
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .filter(|user_id| !user_id.is_empty())
        .map(str::to_string);
    if let Some(user_id) = user_id {
        req.extensions_mut().insert(Identity(user_id));
    }

    next.run(req).await
}
