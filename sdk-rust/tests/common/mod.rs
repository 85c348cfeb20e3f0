#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Json, Router,
};
use folio_sdk::{FolioConfig, Session, SessionUser};
use serde_json::{json, Value};
use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    sync::{Arc, Mutex},
};

/// A request received by the fake backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Default)]
struct BackendState {
    routes: HashMap<(Method, String), VecDeque<(StatusCode, Value)>>,
    requests: Vec<RecordedRequest>,
}

type SharedState = Arc<Mutex<BackendState>>;

/// Backend and image host on one ephemeral port. Routes answer with queued
/// responses; the last queued response for a route keeps repeating.
/// Unrouted requests get a 404.
#[derive(Clone)]
pub struct FakeBackend {
    state: SharedState,
    pub addr: SocketAddr,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state = SharedState::default();
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("fake backend address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake backend");
        });

        Self { state, addr }
    }

    pub fn respond(&self, method: Method, path: &str, status: StatusCode, body: Value) -> &Self {
        self.state
            .lock()
            .unwrap()
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back((status, body));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }

    pub fn config(&self) -> FolioConfig {
        FolioConfig::new(format!("http://{}/api", self.addr), "acct", "unsigned-preset")
            .with_upload_base_url(format!("http://{}", self.addr))
    }
}

async fn handle(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    let mut state = state.lock().unwrap();
    state.requests.push(RecordedRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        body,
    });

    let key = (method, uri.path().to_string());
    let response = state.routes.get_mut(&key).and_then(|queue| {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    });

    match response {
        Some((status, body)) => (status, Json(body)),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "no such route" })),
        ),
    }
}

pub fn admin(token: &str) -> SessionUser {
    SessionUser {
        email: "admin@example.com".to_string(),
        is_admin: true,
        token: token.to_string(),
    }
}

pub fn admin_session(token: &str) -> Arc<Session> {
    Arc::new(Session::with_user(admin(token)))
}
