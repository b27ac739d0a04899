//! Local HTTP servers answering like the hosted services.

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: String,
    pub body: Value,
}

pub type Reply = Pin<Box<dyn Future<Output = (StatusCode, Value)> + Send>>;
pub type Responder = Arc<dyn Fn(&RecordedRequest) -> Reply + Send + Sync>;

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    responder: Responder,
}

/// A mock server on an ephemeral port. Shuts down when dropped.
pub struct MockService {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    _shutdown_tx: oneshot::Sender<()>,
}

async fn record_and_reply(State(state): State<MockState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or_default().to_string();
    let bytes: Bytes = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    let recorded = RecordedRequest { path, query, body };

    state.requests.lock().unwrap().push(recorded.clone());
    let (status, body) = (state.responder)(&recorded).await;
    (status, Json(body)).into_response()
}

impl MockService {
    pub async fn spawn<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Reply + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            requests: requests.clone(),
            responder: Arc::new(responder),
        };
        let app = Router::new().fallback(record_and_reply).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener.local_addr().unwrap().port();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Mock server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            requests,
            _shutdown_tx: shutdown_tx,
        }
    }

    /// Always answers with `status` and `body`.
    pub async fn fixed(status: StatusCode, body: Value) -> Self {
        Self::spawn(move |_| {
            let body = body.clone();
            let reply: Reply = Box::pin(async move { (status, body) });
            reply
        })
        .await
    }

    /// A `generateContent` endpoint answering `text`.
    pub async fn gemini_text(text: &str) -> Self {
        Self::fixed(StatusCode::OK, gemini_body(text)).await
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Base URL in the shape of the Gemini API root.
    pub fn gemini_base_url(&self) -> String {
        format!("{}/v1beta", self.base_url)
    }
}

pub fn gemini_body(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

/// Text of the first part of a recorded `generateContent` request.
pub fn prompt_of(request: &RecordedRequest) -> String {
    request.body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

impl RecordedRequest {
    pub fn prompt(&self) -> String {
        prompt_of(self)
    }
}
