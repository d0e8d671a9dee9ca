//! Middleware for identity resolution, admin gating and security headers

use crate::error::AppError;
use crate::handlers::auth::session_admin;
use crate::handlers::AppState;
use crate::models::AdminUser;
use crate::workflow::Actor;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Header carrying the member identity of a non-admin caller.
pub const MEMBER_HEADER: &str = "x-member-id";

/// Resolves who is calling and stores it as `Extension<Actor>`.
///
/// A valid admin session wins; otherwise the member header is used, and a
/// caller with neither is anonymous.
pub async fn resolve_actor(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let admin = match session_admin(&state.pool, request.headers()).await {
        Ok(admin) => admin,
        Err(e) => {
            tracing::error!("Database error during session validation: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({"success": false, "error": "Authentication error"})),
            )
                .into_response();
        }
    };

    let actor = match admin {
        Some(user) => {
            let actor = Actor::Admin {
                username: user.username.clone(),
            };
            request.extensions_mut().insert(user);
            actor
        }
        None => member_actor(request.headers()),
    };
    request.extensions_mut().insert(actor);

    next.run(request).await
}

/// Rejects callers without an admin session.
pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    if request.extensions().get::<AdminUser>().is_none() {
        return AppError::Unauthorized("Not authenticated".to_string()).into_response();
    }
    next.run(request).await
}

fn member_actor(headers: &HeaderMap) -> Actor {
    headers
        .get(MEMBER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| Actor::Submitter {
            identity: id.chars().take(100).collect(),
        })
        .unwrap_or_else(Actor::anonymous)
}

/// Security headers middleware
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );

    if state.is_production {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        );
    }

    response
}
