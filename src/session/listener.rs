//! Loopback callback listener for wait-mode handshakes.
//!
//! A single token-guarded path accepts one POST carrying the sealed
//! ciphertext. Bodies are capped at 64 KB. CORS headers reflect the
//! request Origin rather than enforcing an allow-list; the random URL
//! token is the guard. That reflection is a known hardening gap, kept as
//! part of the callback contract.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Result, SessionError};

/// Maximum accepted callback body size.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

const CONFIRMATION_PAGE: &str = "<!doctype html><html><body>\
<h3>Session approved</h3>\
<p>You can close this tab and return to the terminal.</p>\
</body></html>";

/// One-shot loopback HTTP listener on an OS-assigned port.
pub struct CallbackListener {
    local_addr: SocketAddr,
    path_token: String,
    rx: mpsc::Receiver<String>,
    server: tokio::task::JoinHandle<()>,
}

impl CallbackListener {
    /// Bind on `127.0.0.1:0` and start serving the callback route.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub async fn bind() -> Result<Self> {
        let path_token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();

        let (tx, rx) = mpsc::channel::<String>(1);
        let app = Router::new()
            .route(
                &format!("/cb/{path_token}"),
                post(receive_callback).options(preflight),
            )
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .with_state(tx);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await?;
        let local_addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        debug!(addr = %local_addr, "Callback listener bound");
        Ok(Self {
            local_addr,
            path_token,
            rx,
            server,
        })
    }

    /// Local port the listener is bound to.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Token-guarded callback path, e.g. `/cb/<token>`.
    #[must_use]
    pub fn callback_path(&self) -> String {
        format!("/cb/{}", self.path_token)
    }

    /// Block until a ciphertext arrives or the timeout elapses. The
    /// listener task is torn down on both paths.
    ///
    /// # Errors
    ///
    /// Returns `CallbackTimeout` when no callback arrives in time.
    pub async fn wait(mut self, timeout: Duration) -> Result<String> {
        let outcome = tokio::time::timeout(timeout, self.rx.recv()).await;
        self.server.abort();
        match outcome {
            Ok(Some(ciphertext)) => Ok(ciphertext),
            _ => Err(SessionError::CallbackTimeout {
                timeout_secs: timeout.as_secs(),
            }
            .into()),
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn reflected_origin(headers: &HeaderMap) -> String {
    headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("*")
        .to_string()
}

async fn receive_callback(
    State(tx): State<mpsc::Sender<String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let origin = reflected_origin(&headers);
    match extract_ciphertext(&body) {
        Some(ciphertext) => {
            let _ = tx.send(ciphertext).await;
            (
                StatusCode::OK,
                [(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin)],
                Html(CONFIRMATION_PAGE),
            )
                .into_response()
        }
        None => (
            StatusCode::BAD_REQUEST,
            [(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin)],
            "missing ciphertext field",
        )
            .into_response(),
    }
}

async fn preflight(headers: HeaderMap) -> Response {
    let origin = reflected_origin(&headers);
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, origin),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                "POST, OPTIONS".to_string(),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                "content-type".to_string(),
            ),
        ],
    )
        .into_response()
}

/// Pull the `ciphertext` field out of a JSON or form-encoded body.
fn extract_ciphertext(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(ciphertext) = value.get("ciphertext").and_then(|v| v.as_str()) {
            if !ciphertext.is_empty() {
                return Some(ciphertext.to_string());
            }
        }
        return None;
    }
    url::form_urlencoded::parse(body.as_bytes())
        .find(|(key, value)| key == "ciphertext" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Body parsing
    // -------------------------------------------------------------------------

    #[test]
    fn extracts_ciphertext_from_json() {
        let body = r#"{"ciphertext":"AAAA"}"#;
        assert_eq!(extract_ciphertext(body), Some("AAAA".to_string()));
    }

    #[test]
    fn extracts_ciphertext_from_form_encoding() {
        let body = "ciphertext=QUJD&other=1";
        assert_eq!(extract_ciphertext(body), Some("QUJD".to_string()));
    }

    #[test]
    fn rejects_bodies_without_ciphertext() {
        assert_eq!(extract_ciphertext(r#"{"other":"x"}"#), None);
        assert_eq!(extract_ciphertext("other=x"), None);
        assert_eq!(extract_ciphertext(r#"{"ciphertext":""}"#), None);
    }

    // -------------------------------------------------------------------------
    // Listener lifecycle
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn callback_post_resolves_wait() {
        let listener = CallbackListener::bind().await.unwrap();
        let url = format!(
            "http://127.0.0.1:{}{}",
            listener.port(),
            listener.callback_path()
        );

        let client = reqwest::Client::new();
        let waiter = tokio::spawn(listener.wait(Duration::from_secs(5)));

        let response = client
            .post(&url)
            .header("origin", "https://approve.example.org")
            .json(&serde_json::json!({ "ciphertext": "c2VhbGVk" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .unwrap(),
            "https://approve.example.org"
        );

        let ciphertext = waiter.await.unwrap().unwrap();
        assert_eq!(ciphertext, "c2VhbGVk");
    }

    #[tokio::test]
    async fn wrong_token_path_is_not_found() {
        let listener = CallbackListener::bind().await.unwrap();
        let url = format!("http://127.0.0.1:{}/cb/wrong-token", listener.port());

        let response = reqwest::Client::new()
            .post(&url)
            .body("ciphertext=abc")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn timeout_tears_down_and_reports() {
        let listener = CallbackListener::bind().await.unwrap();
        let port = listener.port();

        let err = listener.wait(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Session(SessionError::CallbackTimeout { .. })
        ));

        // Port no longer accepts connections once torn down
        tokio::time::sleep(Duration::from_millis(50)).await;
        let connect = tokio::net::TcpStream::connect(("127.0.0.1", port)).await;
        assert!(connect.is_err());
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let listener = CallbackListener::bind().await.unwrap();
        let url = format!(
            "http://127.0.0.1:{}{}",
            listener.port(),
            listener.callback_path()
        );

        let oversized = "ciphertext=".to_string() + &"A".repeat(MAX_BODY_BYTES + 1);
        let response = reqwest::Client::new()
            .post(&url)
            .body(oversized)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 413);
    }
}
