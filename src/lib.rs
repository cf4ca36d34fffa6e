use axum::{
    Extension, Router,
    middleware::from_fn_with_state,
    response::{Html, IntoResponse},
    routing::get,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

pub mod auth;
pub mod config;
pub mod security;

use auth::routes::AUTH_BASE_PATH;
use auth::{AuthManager, Session, create_auth_router, required_auth_middleware};

/// Landing page for signed-in users
async fn app_home(Extension(session): Extension<Session>) -> impl IntoResponse {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>CareLink</title>
</head>
<body>
    <main class="page-main">
        <h1>Welcome</h1>
        <p>Signed in as {}</p>
        <form method="post" action="/auth/logout">
            <button type="submit">Sign out</button>
        </form>
    </main>
</body>
</html>"#,
        html_escape::encode_text(&session.email)
    ))
}

async fn health() -> &'static str {
    "ok"
}

/// Builds the application router: the `/auth` routes, the protected landing
/// page and a health probe
pub fn build_router(auth_manager: Arc<AuthManager>) -> Router {
    let landing_path = auth_manager.config().auth.landing_path.clone();

    let protected = Router::new()
        .route(&landing_path, get(app_home))
        .route_layer(from_fn_with_state(
            Arc::clone(&auth_manager),
            required_auth_middleware,
        ));

    Router::new()
        .nest(AUTH_BASE_PATH, create_auth_router(Arc::clone(&auth_manager)))
        .merge(protected)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
}

/// Starts the web server with custom configuration
///
/// Runs until the listener fails or `shutdown_rx` fires.
pub async fn start_server_with_config(
    config: config::Config,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let auth_manager = Arc::new(AuthManager::from_config(Arc::clone(&config))?);
    let app = build_router(auth_manager);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;

    info!("listening on {}", listener.local_addr()?);
    debug!(
        "Server configuration - environment: {:?}, backend: {}, encrypted cookies: {}",
        config.environment,
        config.backend.url,
        config.auth.session_secret.is_some()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
            info!("shutdown requested, stopping server");
        })
        .await?;

    Ok(())
}
