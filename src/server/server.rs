use anyhow::Result;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower_http::services::ServeDir;

use super::websocket::dashboard_ws_handler;
use super::{log_requests, state::*, ServerConfig};
use crate::home::{HomeState, WeatherStatus, WidgetEntry};
use crate::notifications::{CollectionPath, Identity};
use crate::sync::ClearOutcome;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

#[derive(Deserialize, Debug)]
struct IngestParams {
    pub server_timestamp: Option<bool>,
}

#[derive(Serialize)]
struct IngestResponse {
    id: String,
    path: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Reads the sender-provided `timestamp`: RFC 3339 text or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, String> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| format!("Invalid timestamp {:?}: {}", text, e)),
        Value::Number(number) => number
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| format!("Invalid timestamp {}", number)),
        other => Err(format!("Invalid timestamp {}", other)),
    }
}

async fn ingest_notification(
    State(state): State<ServerState>,
    Path((app_id, identity)): Path<(String, String)>,
    Query(params): Query<IngestParams>,
    body: Bytes,
) -> Response {
    if app_id != state.sync_core.app_id() {
        return StatusCode::NOT_FOUND.into_response();
    }
    let Some(store) = state.store.clone() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    if identity.trim().is_empty() {
        return bad_request("Empty identity");
    }

    let mut fields: Map<String, Value> = match serde_json::from_slice(&body) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return bad_request("Notification must be a JSON object"),
        Err(e) => return bad_request(format!("Invalid JSON: {}", e)),
    };

    let timestamp = match fields.shift_remove("timestamp") {
        Some(value) => match parse_timestamp(&value) {
            Ok(timestamp) => Some(timestamp),
            Err(message) => return bad_request(message),
        },
        None if params.server_timestamp.unwrap_or(true) => Some(Utc::now()),
        None => None,
    };

    let path = CollectionPath::new(app_id, Identity::new(identity));
    match store.add_document(&path, fields, timestamp) {
        Ok(document) => {
            debug!("Stored notification {} in {}", document.id, path);
            (
                StatusCode::CREATED,
                Json(IngestResponse {
                    id: document.id,
                    path: path.to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to store notification in {}: {}", path, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Serialize)]
struct SessionInfo {
    identity: Option<Identity>,
    collection_path: String,
}

async fn get_session(State(sync_core): State<GuardedSyncCore>) -> impl IntoResponse {
    let collection_path = match sync_core.collection_path() {
        Some(path) => path.to_string(),
        None => CollectionPath::placeholder(sync_core.app_id()),
    };
    Json(SessionInfo {
        identity: sync_core.state().identity,
        collection_path,
    })
}

async fn sign_out(State(sync_core): State<GuardedSyncCore>) -> Response {
    match sync_core.sign_out().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Sign-out failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn get_dashboard(State(sync_core): State<GuardedSyncCore>) -> impl IntoResponse {
    Json(sync_core.state())
}

async fn summarize(State(sync_core): State<GuardedSyncCore>) -> StatusCode {
    match sync_core.start_summary() {
        Some(_) => StatusCode::ACCEPTED,
        None => StatusCode::NO_CONTENT,
    }
}

async fn analyze(
    State(sync_core): State<GuardedSyncCore>,
    Path(id): Path<String>,
) -> StatusCode {
    match sync_core.start_analysis(&id) {
        Some(_) => StatusCode::ACCEPTED,
        None => StatusCode::NOT_FOUND,
    }
}

#[derive(Deserialize, Debug, Default)]
struct ClearBody {
    #[serde(default)]
    pub confirm: bool,
}

async fn clear_notifications(
    State(sync_core): State<GuardedSyncCore>,
    Json(body): Json<ClearBody>,
) -> Response {
    let outcome = sync_core.clear_all(|prompt| {
        debug!("Clear confirmation \"{}\": {}", prompt, body.confirm);
        body.confirm
    });
    let status = match outcome {
        ClearOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        ClearOutcome::NotReady => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    (status, Json(outcome)).into_response()
}

async fn close_modal(State(sync_core): State<GuardedSyncCore>) -> StatusCode {
    sync_core.close_modal();
    StatusCode::NO_CONTENT
}

#[derive(Serialize)]
struct HomeResponse {
    weather_line: String,
    weather: WeatherStatus,
    latest: Option<Vec<WidgetEntry>>,
}

impl From<HomeState> for HomeResponse {
    fn from(state: HomeState) -> Self {
        Self {
            weather_line: state.weather_line(),
            weather: state.weather,
            latest: state.latest,
        }
    }
}

async fn get_home(State(home_view): State<GuardedHomeView>) -> impl IntoResponse {
    Json(HomeResponse::from(home_view.state()))
}

pub fn make_app(state: ServerState) -> Router {
    let ingest_routes: Router = Router::new()
        .route(
            "/artifacts/{app_id}/users/{identity}/notifications",
            post(ingest_notification),
        )
        .with_state(state.clone());

    let session_routes: Router = Router::new()
        .route("/", get(get_session))
        .route("/sign-out", post(sign_out))
        .with_state(state.clone());

    let dashboard_routes: Router = Router::new()
        .route("/", get(get_dashboard))
        .route("/ws", get(dashboard_ws_handler))
        .route("/summarize", post(summarize))
        .route("/notifications/{id}/analyze", post(analyze))
        .route("/clear", post(clear_notifications))
        .route("/modal/close", post(close_modal))
        .with_state(state.clone());

    let home_routes: Router = Router::new()
        .route("/", get(get_home))
        .with_state(state.clone());

    let root_router: Router = match state.config.frontend_dir_path.clone() {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    root_router
        .nest("/v1", ingest_routes)
        .nest("/v1/session", session_routes)
        .nest("/v1/dashboard", dashboard_routes)
        .nest("/v1/home", home_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let bind_address = state.config.bind_address();
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
