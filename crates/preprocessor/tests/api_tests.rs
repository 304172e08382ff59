//! Integration tests for the serving API endpoints

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use preprocessor::api::{create_router, AppState, ErrorResponse, CUSTOM_ATTRIBUTES_HEADER};
use preprocessor_lib::{
    adapter::InstancesDocument,
    health::{components, HealthRegistry},
    observability::{ServingMetrics, StructuredLogger},
    transform::StandardParams,
    FeatureSchema, FittedPipeline, FittedTransform, InferenceAdapter, MediaType,
};
use std::sync::Arc;
use tower::ServiceExt;

fn adapter() -> InferenceAdapter {
    let model = FittedPipeline {
        feature_names: vec!["value".to_string()],
        steps: vec![FittedTransform::Standard(StandardParams {
            with_mean: true,
            with_std: true,
            mean: vec![70.0],
            var: vec![100.0],
            scale: vec![10.0],
            n_samples_seen: 42,
        })],
    };
    InferenceAdapter::new(FeatureSchema::default(), model)
}

async fn setup_test_app(ready: bool) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::MODEL).await;
    health_registry.register(components::INVOCATIONS).await;
    health_registry.set_ready(ready).await;

    let state = Arc::new(AppState {
        adapter: Arc::new(adapter()),
        health_registry,
        metrics: ServingMetrics::new(),
        logger: StructuredLogger::new("test-instance"),
        default_accept: MediaType::Json,
        endpoint_name: "sample-anomaly-endpoint".to_string(),
        max_payload_bytes: 1024,
    });
    (create_router(state.clone()), state)
}

fn invocation(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("POST").uri(uri)
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_ping_returns_503_before_model_loaded() {
    let (app, _state) = setup_test_app(false).await;

    let response = app
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_ping_returns_ok_when_ready() {
    let (app, _state) = setup_test_app(true).await;

    let response = app
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_csv_invocation_returns_csv() {
    let (app, _state) = setup_test_app(true).await;

    let response = app
        .oneshot(
            invocation("/invocations")
                .header(header::CONTENT_TYPE, "text/csv")
                .header(header::ACCEPT, "text/csv")
                .header(CUSTOM_ATTRIBUTES_HEADER, "c000b4f9-df62-4c85-a0bf-7c525f9104a4")
                .body(Body::from("2013-12-02 21:15:00, 75"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    assert_eq!(
        response.headers()[CUSTOM_ATTRIBUTES_HEADER],
        "c000b4f9-df62-4c85-a0bf-7c525f9104a4"
    );
    assert_eq!(body_bytes(response).await, b"0.5\n");
}

#[tokio::test]
async fn test_missing_accept_uses_default_json() {
    let (app, _state) = setup_test_app(true).await;

    let response = app
        .oneshot(
            invocation("/invocations")
                .header(header::CONTENT_TYPE, "text/csv")
                .body(Body::from("2013-12-02 21:15:00,75\n2013-12-02 21:20:00,90\n"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let doc: InstancesDocument = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(doc.instances.len(), 2);
    assert_eq!(doc.instances[1].features, vec![2.0]);
}

#[tokio::test]
async fn test_unsupported_content_type_returns_415() {
    let (app, state) = setup_test_app(true).await;
    let metrics = state.metrics.clone();
    let before = metrics.invocations("client_error");

    let response = app
        .oneshot(
            invocation("/invocations")
                .header(header::CONTENT_TYPE, "application/x-npy")
                .header(header::ACCEPT, "text/csv")
                .body(Body::from("binary"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let error: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(error.code, "unsupported_media_type");
    assert!(error.error.contains("application/x-npy"));
    assert!(metrics.invocations("client_error") > before);
}

#[tokio::test]
async fn test_unsupported_accept_returns_406() {
    let (app, state) = setup_test_app(true).await;

    let response = app
        .oneshot(
            invocation("/invocations")
                .header(header::CONTENT_TYPE, "text/csv")
                .header(header::ACCEPT, "application/xml")
                .body(Body::from("2013-12-02 21:15:00,75"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    let error: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(error.error.contains("application/xml"));

    // Client errors do not degrade the service
    let readiness = state.health_registry.readiness().await;
    assert!(readiness.ready);
}

#[tokio::test]
async fn test_malformed_body_returns_400() {
    let (app, _state) = setup_test_app(true).await;

    let response = app
        .oneshot(
            invocation("/invocations")
                .header(header::CONTENT_TYPE, "text/csv")
                .body(Body::from("2013-12-02 21:15:00,seventy-five"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(error.code, "malformed_input");
}

#[tokio::test]
async fn test_named_endpoint_route() {
    let (app, _state) = setup_test_app(true).await;

    let response = app
        .clone()
        .oneshot(
            invocation("/endpoints/sample-anomaly-endpoint/invocations")
                .header(header::CONTENT_TYPE, "text/csv")
                .header(header::ACCEPT, "text/csv")
                .body(Body::from("2013-12-02 21:15:00,80"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"1.0\n");

    let response = app
        .oneshot(
            invocation("/endpoints/other/invocations")
                .header(header::CONTENT_TYPE, "text/csv")
                .body(Body::from("2013-12-02 21:15:00,80"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oversized_payload_is_rejected() {
    let (app, _state) = setup_test_app(true).await;
    let body = "2013-12-02 21:15:00,75\n".repeat(100);

    let response = app
        .oneshot(
            invocation("/invocations")
                .header(header::CONTENT_TYPE, "text/csv")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_healthz_and_metrics() {
    let (app, _state) = setup_test_app(true).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"].get("model").is_some());

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
}
