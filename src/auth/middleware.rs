/// Authentication Middleware
///
/// Axum middleware resolving the session cookie (refreshing it when
/// expired) and injecting the `Session` into request extensions. Cookie
/// rotations made while resolving are written to the response.
use crate::auth::{AuthManager, CookieJar};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Optional authentication middleware - resolves the session if present but
/// doesn't require it
pub async fn optional_auth_middleware(
    State(auth_manager): State<Arc<AuthManager>>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut jar = CookieJar::from_headers(req.headers());

    if let Some(session) = auth_manager.resolve_session(&mut jar).await {
        req.extensions_mut().insert(session);
    }

    jar.apply(next.run(req).await)
}

/// Required authentication middleware - redirects to the login page when no
/// session can be resolved
pub async fn required_auth_middleware(
    State(auth_manager): State<Arc<AuthManager>>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut jar = CookieJar::from_headers(req.headers());

    match auth_manager.require_session(&mut jar).await {
        Ok(session) => {
            req.extensions_mut().insert(session);
            jar.apply(next.run(req).await)
        }
        // A failed refresh still deletes the stale cookie
        Err(redirect) => jar.apply(redirect.into_response()),
    }
}
