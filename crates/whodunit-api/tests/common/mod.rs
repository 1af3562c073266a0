//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use whodunit_api::providers::ProviderFactory;
use whodunit_api::state::AppState;
use whodunit_content::Scenario;
use whodunit_engine::application::ports::DecisionProvider;
use whodunit_engine::config::EngineConfig;
use whodunit_engine::domain::roster::Participant;
use whodunit_test_support::{FixedClock, ScriptedProvider};

/// Seats every autonomous participant with a default `ScriptedProvider`.
struct ScriptedProviders;

impl ProviderFactory for ScriptedProviders {
    fn provider_for(&self, _participant: &Participant) -> Arc<dyn DecisionProvider> {
        Arc::new(ScriptedProvider::new())
    }
}

/// Application state over the bundled Willow Manor scenario, with a fixed
/// clock, scripted providers and no pauses.
pub fn test_state() -> AppState {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../scenarios/willow_manor.yaml");
    let scenario = Scenario::load(path).unwrap();
    AppState::new(
        scenario,
        EngineConfig::immediate(),
        Arc::new(FixedClock::fixture()),
        Arc::new(ScriptedProviders),
        Some(7),
    )
}

/// Build the full app router. Uses the same route structure as `main.rs`.
pub fn build_test_app(state: AppState) -> Router {
    whodunit_api::app(state)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Creates a session and returns its id.
pub async fn create_session(state: &AppState) -> String {
    let (status, json) =
        post_json(build_test_app(state.clone()), "/api/v1/sessions", &serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    json["session_id"].as_str().unwrap().to_owned()
}

/// Polls the public state until `done` holds, failing after a few seconds.
pub async fn wait_for_state(
    state: &AppState,
    session_id: &str,
    done: impl Fn(&serde_json::Value) -> bool,
) -> serde_json::Value {
    for _ in 0..300 {
        let (_, json) = get_json(
            build_test_app(state.clone()),
            &format!("/api/v1/sessions/{session_id}/state"),
        )
        .await;
        if done(&json) {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {session_id} never reached the expected state");
}
