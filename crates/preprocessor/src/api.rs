//! HTTP surface of the serving process
//!
//! `/ping` and `/invocations` follow the hosting platform's container
//! contract; `/healthz` and `/metrics` are for operators.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use preprocessor_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::{outcomes, ServingMetrics, StructuredLogger},
    InferenceAdapter, MediaType, PreprocessError,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Header carrying the caller's trace / custom attributes
pub const CUSTOM_ATTRIBUTES_HEADER: &str = "x-amzn-sagemaker-custom-attributes";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub adapter: Arc<InferenceAdapter>,
    pub health_registry: HealthRegistry,
    pub metrics: ServingMetrics,
    pub logger: StructuredLogger,
    pub default_accept: MediaType,
    pub endpoint_name: String,
    pub max_payload_bytes: usize,
}

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Platform ping - 200 once the artifact is loaded, 503 otherwise
async fn ping(State(state): State<Arc<AppState>>) -> Response {
    let readiness = state.health_registry.readiness().await;

    if readiness.ready {
        StatusCode::OK.into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(readiness)).into_response()
    }
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still serving
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(e.to_string(), "metrics_error")),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn invocations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_invocation(&state, &headers, &body).await
}

async fn endpoint_invocations(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if name != state.endpoint_name {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                format!("Endpoint {} not found", name),
                "endpoint_not_found",
            )),
        )
            .into_response();
    }
    handle_invocation(&state, &headers, &body).await
}

/// Runs the parse, transform and encode callbacks for one request
async fn handle_invocation(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Response {
    let start = Instant::now();
    let trace_id = header_str(headers, CUSTOM_ATTRIBUTES_HEADER);
    let content_type = header_str(headers, header::CONTENT_TYPE.as_str())
        .unwrap_or(MediaType::Csv.as_str());

    let accept = match MediaType::from_accept(
        header_str(headers, header::ACCEPT.as_str()),
        state.default_accept,
    ) {
        Ok(accept) => accept,
        Err(e) => return failure(state, trace_id, StatusCode::NOT_ACCEPTABLE, e).await,
    };

    let table = match state.adapter.parse_request(body, content_type) {
        Ok(table) => table,
        Err(e) => {
            let status = status_for(&e);
            return failure(state, trace_id, status, e).await;
        }
    };

    let response = state
        .adapter
        .transform(&table)
        .and_then(|prediction| state.adapter.encode_response(prediction.view(), accept.as_str()));

    let encoded = match response {
        Ok(encoded) => encoded,
        Err(e) => {
            let status = status_for(&e);
            return failure(state, trace_id, status, e).await;
        }
    };

    let elapsed = start.elapsed();
    state.metrics.observe_invocation_latency(elapsed.as_secs_f64());
    state.metrics.inc_invocations(outcomes::SUCCESS);
    state.metrics.add_rows_transformed(table.n_rows() as u64);
    state.logger.log_invocation(
        trace_id,
        table.n_rows(),
        content_type,
        accept.as_str(),
        elapsed.as_micros(),
    );
    state.health_registry.record_invocation_success().await;

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoded.content_type.as_str())],
        encoded.body,
    )
        .into_response();
    echo_trace_id(&mut response, trace_id);
    response
}

async fn failure(
    state: &AppState,
    trace_id: Option<&str>,
    status: StatusCode,
    err: PreprocessError,
) -> Response {
    let message = err.to_string();
    let client_error = status.is_client_error();

    state.logger.log_invocation_failed(trace_id, err.code(), &message, client_error);
    if client_error {
        state.metrics.inc_invocations(outcomes::CLIENT_ERROR);
    } else {
        state.metrics.inc_invocations(outcomes::SERVER_ERROR);
        state
            .health_registry
            .record_invocation_failure(message.clone())
            .await;
    }

    let mut response = (status, Json(ErrorResponse::new(message, err.code()))).into_response();
    echo_trace_id(&mut response, trace_id);
    response
}

fn status_for(err: &PreprocessError) -> StatusCode {
    match err {
        PreprocessError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn echo_trace_id(response: &mut Response, trace_id: Option<&str>) {
    if let Some(value) = trace_id.and_then(|t| HeaderValue::from_str(t).ok()) {
        response.headers_mut().insert(CUSTOM_ATTRIBUTES_HEADER, value);
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_payload_bytes = state.max_payload_bytes;

    Router::new()
        .route("/ping", get(ping))
        .route("/invocations", post(invocations))
        .route("/endpoints/:name/invocations", post(endpoint_invocations))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(max_payload_bytes))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
