use carelink::auth::AuthManager;
use carelink::build_router;
use carelink::config::{Config, Environment};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::oneshot;
use wiremock::MockServer;

pub const SESSION_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const SESSION_COOKIE: &str = "carelink_session";

/// App server on a random local port, talking to a mocked identity backend
pub struct TestServer {
    port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start(backend: &MockServer) -> anyhow::Result<Self> {
        let mut config = Config::default();
        config.environment = Environment::Development;
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.backend.url = backend.uri();
        config.backend.anon_key = "anon-key".to_string();
        config.backend.timeout_secs = 5;
        config.auth.session_secret = Some(SESSION_SECRET.to_string());
        config.auth.site_url = "http://localhost:3000".to_string();
        config.validate()?;

        let manager = AuthManager::from_config(Arc::new(config))?;
        let app = build_router(Arc::new(manager));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Client that reports redirects instead of following them
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client")
}

/// Raw `Set-Cookie` header values
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// The full `Set-Cookie` header for `name`, if one was sent
pub fn find_set_cookie(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with(&prefix))
}

/// `name=value` pairs from `Set-Cookie`, ready for a `Cookie` header
pub fn cookie_header(response: &reqwest::Response) -> String {
    set_cookies(response)
        .iter()
        .filter_map(|c| c.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Token endpoint body for a successful grant
pub fn session_body(access_token: &str, refresh_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": refresh_token,
        "user": { "id": "user-1", "email": "guardian@example.com" }
    })
}
