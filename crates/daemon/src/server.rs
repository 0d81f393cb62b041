// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP and WebSocket gateway

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use cw_adapters::ProcessAdapter;
use cw_core::{
    BroadcastMessage, CallerRole, ComputationRequest, LocationDescriptor, LocationRegistry,
};
use cw_engine::{
    AlertBoard, Broadcaster, ComputationInvoker, DetectionError, IncidentDetector,
    InvocationError, WorkerSupervisor,
};
use cw_storage::{RecordStore, StoreError};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::config::DaemonConfig;

/// Header carrying the opaque caller role on route requests
pub const ROLE_HEADER: &str = "x-crossway-role";

/// Shared services behind the gateway
pub struct AppState<P: ProcessAdapter> {
    pub registry: LocationRegistry,
    pub broadcaster: Broadcaster,
    pub supervisor: Arc<Mutex<WorkerSupervisor<P>>>,
    pub invoker: Arc<ComputationInvoker<P>>,
    pub detector: Arc<IncidentDetector<P>>,
    pub alerts: AlertBoard,
    pub subscriber_buffer: usize,
}

impl<P: ProcessAdapter> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            broadcaster: self.broadcaster.clone(),
            supervisor: Arc::clone(&self.supervisor),
            invoker: Arc::clone(&self.invoker),
            detector: Arc::clone(&self.detector),
            alerts: self.alerts.clone(),
            subscriber_buffer: self.subscriber_buffer,
        }
    }
}

impl<P: ProcessAdapter> AppState<P> {
    /// Wire every service from the daemon configuration
    pub fn from_config(config: &DaemonConfig, adapter: P, store: Arc<dyn RecordStore>) -> Self {
        let broadcaster = Broadcaster::new();
        let supervisor = WorkerSupervisor::new(
            adapter.clone(),
            broadcaster.clone(),
            config.worker_config(),
        );
        let invoker = ComputationInvoker::new(
            adapter.clone(),
            broadcaster.clone(),
            Arc::clone(&store),
            config.invoker_config(),
        );
        let detector = IncidentDetector::new(
            adapter,
            broadcaster.clone(),
            Arc::clone(&store),
            config.detector_config(),
        );

        Self {
            registry: LocationRegistry::new(config.locations_path()),
            alerts: AlertBoard::new(broadcaster.clone(), store),
            broadcaster,
            supervisor: Arc::new(Mutex::new(supervisor)),
            invoker: Arc::new(invoker),
            detector: Arc::new(detector),
            subscriber_buffer: config.subscriber_buffer.max(1),
        }
    }

    /// Snapshot sent to every new subscriber.
    ///
    /// An unreadable registry yields an empty snapshot rather than refusing
    /// the connection.
    pub async fn greeting(&self) -> BroadcastMessage {
        let signals = match self.load_locations().await {
            Ok(signals) => signals,
            Err(e) => {
                warn!(error = %e.message, "location registry unavailable for greeting");
                Vec::new()
            }
        };
        BroadcastMessage::InitialSignals { signals }
    }

    /// Re-read the location source on the blocking pool
    pub async fn load_locations(&self) -> Result<Vec<LocationDescriptor>, ApiError> {
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || registry.load())
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?
            .map_err(|e| ApiError::internal(e.to_string()))
    }
}

pub fn router<P: ProcessAdapter>(state: AppState<P>) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler::<P>))
        .route("/signals", get(list_signals::<P>))
        .route("/workers", get(list_workers::<P>))
        .route("/routes", post(compute_routes::<P>))
        .route("/incidents", post(detect_incident::<P>))
        .route("/alerts", get(list_alerts::<P>).post(raise_alert::<P>))
        .route("/alerts/{id}", delete(clear_alert::<P>))
        .with_state(state)
}

/// Error returned to gateway callers
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Worker stderr, when the failure came from a worker
    pub stderr: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            stderr: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "message": self.message,
            "status": self.status.as_u16(),
        });
        if let Some(stderr) = self.stderr {
            error["stderr"] = Value::String(stderr);
        }
        (self.status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<InvocationError> for ApiError {
    fn from(err: InvocationError) -> Self {
        let stderr = err.stderr().map(str::to_string);
        let status = match err {
            InvocationError::WriteInput { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: err.to_string(),
            stderr,
        }
    }
}

impl From<DetectionError> for ApiError {
    fn from(err: DetectionError) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::internal(err.to_string())
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn websocket_handler<P: ProcessAdapter>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<P>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Register the socket as a subscriber and forward frames until either side
/// goes away
async fn handle_socket<P: ProcessAdapter>(socket: WebSocket, state: AppState<P>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<str>>(state.subscriber_buffer);

    let greeting = state.greeting().await;
    let id = match state.broadcaster.subscribe_with_greeting(tx, &greeting) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "could not greet subscriber");
            return;
        }
    };
    debug!(subscription = %id, "websocket subscriber connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_sender
                .send(Message::Text(text.to_string().into()))
                .await
                .is_err()
            {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    // Client frames carry nothing we act on; read only to notice the close
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "websocket read failed");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.broadcaster.unsubscribe(id);
    debug!(subscription = %id, "websocket subscriber disconnected");
}

async fn list_signals<P: ProcessAdapter>(State(state): State<AppState<P>>) -> ApiResult<Response> {
    let signals = state.load_locations().await?;
    Ok(Json(signals).into_response())
}

async fn list_workers<P: ProcessAdapter>(State(state): State<AppState<P>>) -> Response {
    let statuses = state.supervisor.lock().await.statuses();
    Json(statuses).into_response()
}

async fn compute_routes<P: ProcessAdapter>(
    State(state): State<AppState<P>>,
    headers: HeaderMap,
    Json(request): Json<ComputationRequest>,
) -> ApiResult<Response> {
    let role = headers
        .get(ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let result = state
        .invoker
        .invoke(&request, &CallerRole::new(role))
        .await?;
    Ok(Json(result).into_response())
}

#[derive(Debug, Deserialize)]
struct IncidentRequest {
    signal_id: String,
    image: String,
}

async fn detect_incident<P: ProcessAdapter>(
    State(state): State<AppState<P>>,
    Json(request): Json<IncidentRequest>,
) -> ApiResult<Response> {
    let report = state
        .detector
        .detect(&request.signal_id, &request.image)
        .await?;
    Ok(Json(report).into_response())
}

#[derive(Debug, Deserialize)]
struct RaiseAlertRequest {
    #[serde(default)]
    signal_id: Option<String>,
    #[serde(default)]
    data: Value,
}

async fn list_alerts<P: ProcessAdapter>(State(state): State<AppState<P>>) -> ApiResult<Response> {
    Ok(Json(state.alerts.active()?).into_response())
}

async fn raise_alert<P: ProcessAdapter>(
    State(state): State<AppState<P>>,
    Json(request): Json<RaiseAlertRequest>,
) -> ApiResult<Response> {
    let alert = state.alerts.raise(request.signal_id, request.data)?;
    Ok((StatusCode::CREATED, Json(alert)).into_response())
}

async fn clear_alert<P: ProcessAdapter>(
    State(state): State<AppState<P>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    match state.alerts.clear(&id)? {
        Some(alert) => Ok(Json(alert).into_response()),
        None => Err(ApiError::not_found(format!("no active alert {}", id))),
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
