//! HTTP surface tests: envelope shape, status-code mapping, and the main
//! resource routes, driven through the router with `tower::ServiceExt`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use insightpipe::analysis::{AnalysisConfig, AnalysisPipeline, HttpInferenceClient};
use insightpipe::api::{build_router, AppState};
use insightpipe::{
    AnalysisCaches, MemoryRepository, ParticipantLifecycle, Repository, ResponseIngestor,
    StudyService, TaskSequencer,
};

fn test_app() -> Router {
    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let caches = Arc::new(AnalysisCaches::new());
    // The inference backend is never reached in these tests; analysis
    // endpoints that would call it are covered in pipeline_flow.
    let client = Arc::new(
        HttpInferenceClient::new(
            "http://127.0.0.1:9",
            Some("test-key".into()),
            "test-model",
            Duration::from_millis(50),
        )
        .unwrap(),
    );

    let state = AppState {
        studies: Arc::new(StudyService::new(Arc::clone(&repo))),
        sequencer: Arc::new(TaskSequencer::new(Arc::clone(&repo))),
        lifecycle: Arc::new(ParticipantLifecycle::new(Arc::clone(&repo))),
        ingestor: Arc::new(ResponseIngestor::new(Arc::clone(&repo), Arc::clone(&caches))),
        pipeline: Arc::new(AnalysisPipeline::new(
            repo,
            client,
            caches,
            AnalysisConfig::default(),
        )),
        started_at: Instant::now(),
    };
    build_router(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn new_study_body(name: &str) -> Value {
    json!({
        "organization_id": Uuid::new_v4(),
        "created_by": Uuid::new_v4(),
        "name": name,
        "status": "active"
    })
}

async fn create_study(app: &Router, name: &str) -> String {
    let (status, body) = send(app, Method::POST, "/api/v1/studies", Some(new_study_body(name))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoint_shape() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert!(body["data"]["analysis"]["inference_calls"].is_u64());
    assert!(body["meta"]["timestamp"].is_string());
}

#[tokio::test]
async fn test_study_crud_roundtrip() {
    let app = test_app();
    let id = create_study(&app, "Coffee rituals").await;

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/studies/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Coffee rituals");
    assert_eq!(body["data"]["status"], "active");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/studies/{id}"),
        Some(json!({"name": "Coffee rituals v2"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Coffee rituals v2");

    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/studies/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/studies/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_unknown_study_is_enveloped_404() {
    let app = test_app();
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/studies/{}", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["meta"]["timestamp"].is_string());
}

#[tokio::test]
async fn test_malformed_body_is_enveloped_400() {
    let app = test_app();
    let study_id = create_study(&app, "Cereal diary").await;

    // Unknown enum variant in the body must fail inside the envelope,
    // not as axum's plain-text rejection.
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/studies/{study_id}/tasks"),
        Some(json!({"type": "bogus", "title": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");
    assert!(body["error"]["message"].is_string());
    assert!(body["meta"]["timestamp"].is_string());
}

#[tokio::test]
async fn test_task_create_list_reorder() {
    let app = test_app();
    let study_id = create_study(&app, "Snack audit").await;
    let tasks_uri = format!("/api/v1/studies/{study_id}/tasks");

    let mut task_ids = Vec::new();
    for title in ["One", "Two", "Three"] {
        let (status, body) = send(
            &app,
            Method::POST,
            &tasks_uri,
            Some(json!({"type": "discussion", "title": title})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        task_ids.push(body["data"]["id"].as_str().unwrap().to_string());
    }

    task_ids.reverse();
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("{tasks_uri}/reorder"),
        Some(json!({"task_ids": task_ids})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, task_ids);

    // Reorder with a foreign id is a 400 and changes nothing.
    let mut bogus = task_ids.clone();
    bogus[0] = Uuid::new_v4().to_string();
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("{tasks_uri}/reorder"),
        Some(json!({"task_ids": bogus})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_participant_enroll_and_illegal_transition() {
    let app = test_app();
    let study_id = create_study(&app, "Juice panel").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/studies/{study_id}/participants"),
        Some(json!({"contact": "pat@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "invited");
    let participant_id = body["data"]["id"].as_str().unwrap().to_string();

    // invited -> completed skips started and is rejected.
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/participants/{participant_id}/transition"),
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/participants/{participant_id}/transition"),
        Some(json!({"status": "started"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "started");
    assert!(body["data"]["started_at"].is_string());
}

#[tokio::test]
async fn test_bulk_enroll_reports_failures() {
    let app = test_app();
    let study_id = create_study(&app, "Yogurt diary").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/studies/{study_id}/participants/bulk"),
        Some(json!({"contacts": ["a@example.com", "", "b@example.com"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["created"], 2);
    assert_eq!(body["data"]["requested"], 3);
    assert_eq!(body["data"]["failures"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_mismatched_payload_is_400() {
    let app = test_app();
    let study_id = create_study(&app, "Pantry tour").await;

    let (_, task) = send(
        &app,
        Method::POST,
        &format!("/api/v1/studies/{study_id}/tasks"),
        Some(json!({"type": "camera", "title": "Show your pantry"})),
    )
    .await;
    let task_id = task["data"]["id"].as_str().unwrap();

    let (_, participant) = send(
        &app,
        Method::POST,
        &format!("/api/v1/studies/{study_id}/participants"),
        Some(json!({"contact": "pat@example.com"})),
    )
    .await;
    let participant_id = participant["data"]["id"].as_str().unwrap();

    // A camera task needs media urls, not free text.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/responses",
        Some(json!({
            "participant_id": participant_id,
            "task_id": task_id,
            "response_data": {"kind": "text", "text": "no photo"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_PAYLOAD");
}

#[tokio::test]
async fn test_cached_synthesis_read_is_404_before_any_run() {
    let app = test_app();
    let study_id = create_study(&app, "Cold brew").await;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/analysis/studies/{study_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
