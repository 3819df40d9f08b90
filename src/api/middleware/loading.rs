//! Loading gate.
//!
//! Until the identity provider reports for the first time, nothing but
//! health and auth events is served: every gated route answers 503
//! `LOADING`.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

/// Reject the request while auth is unresolved.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_resolved(req: Request<axum::body::Body>, next: Next) -> Response {
    let resolved = match req.extensions().get::<ApiContext>() {
        Some(ctx) => ctx.state.is_auth_resolved(),
        None => return ApiError::Internal("missing API context".into()).into_response(),
    };
    if !resolved {
        return ApiError::Loading.into_response();
    }
    next.run(req).await
}
