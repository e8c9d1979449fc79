//! Admin endpoints for AMQP workers.
//!
//! - `GET /health`: liveness, always 200 while the process serves requests
//! - `GET /ready`: broker plus every registered [`ReadinessProbe`], 503 if any fails
//! - `GET /queue/info`: depth and consumer count of the consumed queue
//! - `GET /metrics`: Prometheus text exposition
//! - `GET /dlq/stats`, `GET /dlq/messages?limit=`, `POST /dlq/replay?limit=`, `DELETE /dlq`

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::warn;

use crate::connection::Broker;
use crate::dlq::DlqInspector;
use crate::metrics;
use crate::topology::Topology;

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;

/// Extra dependency checked by `/ready`, such as the database.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self) -> Result<(), String>;
}

#[derive(Clone)]
pub struct AdminState {
    pub broker: Broker,
    pub topology: Arc<Topology>,
    pub app_name: String,
    pub app_version: String,
    pub probes: Vec<Arc<dyn ReadinessProbe>>,
}

impl AdminState {
    pub fn new(
        broker: Broker,
        topology: Arc<Topology>,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            topology,
            app_name: app_name.into(),
            app_version: app_version.into(),
            probes: Vec::new(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    fn dlq(&self) -> DlqInspector {
        DlqInspector::new(self.broker.clone(), Arc::clone(&self.topology))
    }
}

pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/queue/info", get(queue_info_handler))
        .route("/metrics", get(metrics_handler))
        .route("/dlq", delete(dlq_purge_handler))
        .route("/dlq/stats", get(dlq_stats_handler))
        .route("/dlq/messages", get(dlq_messages_handler))
        .route("/dlq/replay", post(dlq_replay_handler))
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl LimitParams {
    fn capped(&self) -> usize {
        self.limit.min(MAX_LIMIT)
    }
}

type HandlerError = (StatusCode, Json<Value>);

fn internal_error(e: impl std::fmt::Display) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

async fn health_handler(State(state): State<AdminState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        name: state.app_name,
        version: state.app_version,
    })
}

async fn ready_handler(State(state): State<AdminState>) -> (StatusCode, Json<Value>) {
    let mut checks = Map::new();
    let mut ready = true;

    match state.broker.health_check().await {
        Ok(()) => {
            checks.insert("broker".into(), json!("ok"));
        }
        Err(e) => {
            ready = false;
            checks.insert("broker".into(), json!(format!("error: {}", e)));
        }
    }

    for probe in &state.probes {
        match probe.check().await {
            Ok(()) => {
                checks.insert(probe.name().into(), json!("ok"));
            }
            Err(e) => {
                ready = false;
                checks.insert(probe.name().into(), json!(format!("error: {}", e)));
            }
        }
    }

    if ready {
        (
            StatusCode::OK,
            Json(json!({ "status": "ready", "checks": checks })),
        )
    } else {
        warn!(checks = ?checks, "Readiness check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "checks": checks })),
        )
    }
}

async fn queue_info_handler(
    State(state): State<AdminState>,
) -> Result<Json<Value>, HandlerError> {
    let (message_count, consumer_count) = state
        .broker
        .queue_depth(&state.topology.queue)
        .await
        .map_err(internal_error)?;

    Ok(Json(json!({
        "queue": state.topology.queue,
        "exchange": state.topology.exchange,
        "routing_keys": state.topology.routing_keys,
        "message_count": message_count,
        "consumer_count": consumer_count,
    })))
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::prometheus_handle() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Metrics not initialized".to_string(),
        ),
    }
}

async fn dlq_stats_handler(State(state): State<AdminState>) -> Result<impl IntoResponse, HandlerError> {
    let stats = state.dlq().stats().await.map_err(internal_error)?;
    Ok(Json(stats))
}

async fn dlq_messages_handler(
    State(state): State<AdminState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Value>, HandlerError> {
    let limit = params.capped();
    let messages = state.dlq().peek(limit).await.map_err(internal_error)?;

    Ok(Json(json!({
        "queue": state.topology.dead_letter_queue,
        "limit": limit,
        "count": messages.len(),
        "messages": messages,
    })))
}

async fn dlq_replay_handler(
    State(state): State<AdminState>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, HandlerError> {
    let result = state
        .dlq()
        .replay(params.capped())
        .await
        .map_err(internal_error)?;
    Ok(Json(result))
}

async fn dlq_purge_handler(State(state): State<AdminState>) -> Result<Json<Value>, HandlerError> {
    let purged = state.dlq().purge().await.map_err(internal_error)?;
    Ok(Json(json!({ "success": true, "purged_count": purged })))
}
