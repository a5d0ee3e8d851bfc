//! In-process HTTP responder standing in for the toss service.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use tossbook_client::TossClient;
use tossbook_client::config::RefreshConfig;
use tossbook_client::freshness::FreshnessController;
use tossbook_client::gateway::Gateway;
use tossbook_client::session::SessionStore;
use tossbook_client::types::{Profile, Session};

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

#[derive(Default)]
struct MockState {
    routes: Mutex<HashMap<(String, String), Reply>>,
    requests: Mutex<Vec<Recorded>>,
}

type Shared = Arc<MockState>;

pub struct MockServer {
    pub base_url: String,
    state: Shared,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Shared::default();
        let router = Router::new().fallback(answer).with_state(Arc::clone(&state));
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Self {
            base_url: format!("http://{addr}/api"),
            state,
            task,
        }
    }

    /// Answer `method path` (path relative to `/api`) with `reply` from now on.
    pub fn route(&self, method: &str, path: &str, reply: Reply) {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), reply);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn gateway(&self, session: SessionStore) -> Gateway {
        Gateway::new(&self.base_url, Duration::from_secs(5), session).unwrap()
    }

    pub fn client(&self, session: SessionStore, freshness: FreshnessController) -> TossClient {
        TossClient::new(self.gateway(session), freshness, RefreshConfig::default())
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Record the request, then reply from the route table (404 when unrouted).
async fn answer(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().strip_prefix("/api").unwrap_or(uri.path()).to_string();
    state.requests.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path: path.clone(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let reply = state
        .routes
        .lock()
        .unwrap()
        .get(&(method.to_string(), path))
        .cloned()
        .unwrap_or_else(|| Reply::json(404, serde_json::json!({ "message": "Route not found" })));
    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(reply.status).unwrap();
    (status, [(header::CONTENT_TYPE, "application/json")], reply.body).into_response()
}

pub fn logged_in(token: &str) -> SessionStore {
    let session = SessionStore::in_memory();
    session.establish(Session {
        credential: token.to_string(),
        profile: Some(Profile {
            id: "u1".into(),
            name: Some("Ravi".into()),
            username: Some("ravi".into()),
            ..Profile::default()
        }),
    });
    session
}

/// Wait until `rx` sees a new value, failing the test after `within`.
pub async fn changed_within(rx: &mut tokio::sync::watch::Receiver<u64>, within: Duration) {
    tokio::time::timeout(within, rx.changed())
        .await
        .expect("view did not refresh in time")
        .unwrap();
}

/// Poll `check` until it holds, failing the test after `within`.
pub async fn eventually(within: Duration, check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + within;
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
