/// Authentication Routes
///
/// HTTP route handlers for password sign-in and sign-up, the OAuth PKCE
/// flow, logout, and session status.
use crate::auth::{
    AuthError, AuthManager, CONFIRM_EMAIL, CallbackParams, CookieJar, OAuthProvider, Session,
    SignUpOutcome, optional_auth_middleware,
};
use axum::{
    Extension, Form, Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    middleware::from_fn_with_state,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Login page parameters
#[derive(Debug, Deserialize)]
pub struct LoginPageParams {
    error: Option<String>,
    message: Option<String>,
}

/// Email/password form body
#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

impl CredentialsForm {
    fn is_complete(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }
}

/// JSON response for the status endpoint
#[derive(Debug, Serialize)]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub expires_at: Option<i64>,
}

/// Where `create_auth_router` is mounted; the login page's forms and
/// provider links point below it
pub const AUTH_BASE_PATH: &str = "/auth";

const CREDENTIALS_REQUIRED: &str = "Email and password are required.";

/// Login page handler - password form plus one link per provider
async fn login_page(
    State(auth_manager): State<Arc<AuthManager>>,
    session: Option<Extension<Session>>,
    Query(params): Query<LoginPageParams>,
) -> Html<String> {
    let banner = |class: &str, text: Option<String>| {
        text.map(|t| {
            format!(
                r#"<p class="alert alert-{}">{}</p>"#,
                class,
                html_escape::encode_text(&t)
            )
        })
        .unwrap_or_default()
    };

    let providers = OAuthProvider::ALL
        .iter()
        .map(|p| {
            format!(
                r#"<a href="{}/oauth/{}" class="btn btn-block provider-btn provider-{} mb-2">Continue with {}</a>"#,
                AUTH_BASE_PATH,
                p.as_str(),
                p.as_str(),
                p.display_name()
            )
        })
        .collect::<Vec<_>>()
        .join("\n                    ");

    let signed_in = session
        .map(|Extension(session)| {
            format!(
                r#"<p class="alert alert-info">Signed in as {}. <a href="{}">Continue</a></p>"#,
                html_escape::encode_text(&session.email),
                html_escape::encode_double_quoted_attribute(&auth_manager.config().auth.landing_path)
            )
        })
        .unwrap_or_default();

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Sign In</title>
</head>
<body>
    <main class="page-main">
        <div class="card">
            <h1>Sign In</h1>
            {signed_in}{error}{message}
            <form method="post" action="{base}/login">
                <input type="email" name="email" placeholder="Email" required>
                <input type="password" name="password" placeholder="Password" required>
                <button type="submit">Sign in</button>
                <button type="submit" formaction="{base}/signup">Create account</button>
            </form>
            <div class="providers">
                    {providers}
            </div>
        </div>
    </main>
</body>
</html>"#,
        base = AUTH_BASE_PATH,
        error = banner("error", params.error),
        message = banner("info", params.message),
    );

    Html(html)
}

/// Log a failed user action by severity and bounce back to the login page
/// with the error's message
fn action_failed(auth_manager: &AuthManager, action: &str, e: AuthError) -> Response {
    if e.status_code() >= 500 {
        error!("{} failed: {} (retryable: {})", action, e, e.is_retryable());
    } else {
        info!("{} rejected: {}", action, e);
    }
    auth_manager.login_error(&e.to_string()).into_response()
}

/// Password sign-in form handler
async fn password_login(
    State(auth_manager): State<Arc<AuthManager>>,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> Response {
    if !form.is_complete() {
        return auth_manager.login_error(CREDENTIALS_REQUIRED).into_response();
    }

    let mut jar = CookieJar::from_headers(&headers);
    let response = match auth_manager
        .sign_in(form.email.trim(), &form.password, &mut jar)
        .await
    {
        Ok(_) => Redirect::to(&auth_manager.config().auth.landing_path).into_response(),
        Err(e) => action_failed(&auth_manager, "Sign-in", e),
    };

    jar.apply(response)
}

/// Password sign-up form handler
async fn sign_up(
    State(auth_manager): State<Arc<AuthManager>>,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> Response {
    if !form.is_complete() {
        return auth_manager.login_error(CREDENTIALS_REQUIRED).into_response();
    }

    let mut jar = CookieJar::from_headers(&headers);
    let response = match auth_manager
        .sign_up(form.email.trim(), &form.password, &mut jar)
        .await
    {
        Ok(SignUpOutcome::Session(_)) => {
            Redirect::to(&auth_manager.config().auth.landing_path).into_response()
        }
        Ok(SignUpOutcome::PendingConfirmation) => {
            auth_manager.login_notice(CONFIRM_EMAIL).into_response()
        }
        Err(e) => action_failed(&auth_manager, "Sign-up", e),
    };

    jar.apply(response)
}

/// Start OAuth2 login flow - redirects to the identity backend
async fn start_oauth(
    State(auth_manager): State<Arc<AuthManager>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut jar = CookieJar::from_headers(&headers);

    match auth_manager.start_oauth(&provider, &mut jar) {
        Ok(url) => jar.apply(Redirect::to(&url).into_response()),
        Err(e) => {
            warn!("Refusing to start OAuth sign-in: {}", e);
            auth_manager.login_error(&e.to_string()).into_response()
        }
    }
}

/// Handle the OAuth2 redirect back from the identity backend
async fn oauth_callback(
    State(auth_manager): State<Arc<AuthManager>>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Response {
    let mut jar = CookieJar::from_headers(&headers);
    let outcome = auth_manager.handle_callback(params, &mut jar).await;

    let response = match outcome.error_message() {
        None => Redirect::to(&auth_manager.config().auth.landing_path).into_response(),
        Some(message) => auth_manager.login_error(&message).into_response(),
    };

    jar.apply(response)
}

/// Logout handler - deletes the session cookie
async fn logout(State(auth_manager): State<Arc<AuthManager>>, headers: HeaderMap) -> Response {
    let mut jar = CookieJar::from_headers(&headers);
    auth_manager.sign_out(&mut jar);

    jar.apply(Redirect::to(&auth_manager.config().auth.login_path).into_response())
}

/// Status endpoint - check authentication status
async fn auth_status(State(auth_manager): State<Arc<AuthManager>>, headers: HeaderMap) -> Response {
    let mut jar = CookieJar::from_headers(&headers);

    let status = match auth_manager.resolve_session(&mut jar).await {
        Some(session) => AuthStatusResponse {
            authenticated: true,
            user_id: Some(session.user_id),
            email: Some(session.email),
            expires_at: Some(session.expires_at),
        },
        None => AuthStatusResponse {
            authenticated: false,
            user_id: None,
            email: None,
            expires_at: None,
        },
    };

    jar.apply(Json(status).into_response())
}

/// Create authentication router with all routes
pub fn create_auth_router(auth_manager: Arc<AuthManager>) -> Router {
    Router::new()
        .route(
            "/login",
            get(login_page)
                .route_layer(from_fn_with_state(
                    Arc::clone(&auth_manager),
                    optional_auth_middleware,
                ))
                .post(password_login),
        )
        .route("/signup", post(sign_up))
        .route("/oauth/{provider}", get(start_oauth))
        .route("/callback", get(oauth_callback))
        .route("/logout", get(logout).post(logout))
        .route("/status", get(auth_status))
        .with_state(auth_manager)
}
