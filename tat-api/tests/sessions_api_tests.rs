//! Integration tests for the authenticated session endpoints
//!
//! Uses an in-memory SQLite store and a fixed-token verifier.

mod helpers;

use axum::http::StatusCode;
use helpers::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tat_api::store::SqliteStore;
use tat_api::{build_router, AppState};
use tempfile::TempDir;
use tower::util::ServiceExt;
use uuid::Uuid;

const PLAYER_TOKEN: &str = "player-token";
const OTHER_TOKEN: &str = "other-token";

async fn setup_app(dir: &TempDir) -> axum::Router {
    let store = SqliteStore::in_memory().await.expect("Should open memory store");
    let verifier = StaticVerifier::default()
        .with_user(PLAYER_TOKEN, Uuid::new_v4())
        .with_user(OTHER_TOKEN, Uuid::new_v4());

    let state = AppState::new(base_config(dir.path()), None)
        .expect("Should build state")
        .with_session_store(Arc::new(store))
        .with_token_verifier(Arc::new(verifier));
    build_router(state)
}

fn analysis() -> Value {
    json!({
        "segments": [
            {
                "segment_id": 1,
                "quote": "Siempre fallo el revés",
                "helpfulness_score": 3,
                "psychological_patterns": [
                    {"type": "self_criticism", "helpfulness_score": 3, "explanation": "", "intensity": "high"}
                ],
                "attribution_analysis": {"has_attribution": true, "attribution_quality_score": 3},
                "focus_direction": "backward"
            },
            {
                "segment_id": 2,
                "quote": "Pies rápidos en el próximo",
                "helpfulness_score": 9,
                "psychological_patterns": [
                    {"type": "tactical_focus", "helpfulness_score": 9, "explanation": "", "intensity": "medium"},
                    {"type": "self_criticism", "helpfulness_score": 6, "explanation": "", "intensity": "low"}
                ],
                "focus_direction": "forward"
            }
        ],
        "analysis_summary": {
            "total_segments": 2,
            "helpful_thought_ratio": "50%",
            "average_attribution_quality": 3
        }
    })
}

async fn save(app: &axum::Router, token: &str, session_type: &str) -> Value {
    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/sessions",
            token,
            &json!({
                "transcript": "Siempre fallo el revés. Pies rápidos en el próximo.",
                "analysis": analysis(),
                "session_type": session_type,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    extract_json(response.into_body()).await
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir).await;

    for (method, uri) in [
        ("GET", "/api/sessions"),
        ("POST", "/api/sessions"),
        ("GET", "/api/trends"),
        ("GET", "/api/profile"),
    ] {
        let response = app.clone().oneshot(test_request(method, uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        let body = extract_json(response.into_body()).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Authentication required. Please sign in.");
    }
}

#[tokio::test]
async fn test_unknown_token_rejected() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir).await;

    let response = app
        .oneshot(authed_request("GET", "/api/sessions", "forged"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Invalid or expired token. Please sign in again.");
}

#[tokio::test]
async fn test_unconfigured_auth_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let state = AppState::new(base_config(dir.path()), None).unwrap();
    let app = build_router(state);

    let response = app
        .oneshot(authed_request("GET", "/api/sessions", PLAYER_TOKEN))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unconfigured_store_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let state = AppState::new(base_config(dir.path()), None)
        .unwrap()
        .with_token_verifier(Arc::new(
            StaticVerifier::default().with_user(PLAYER_TOKEN, Uuid::new_v4()),
        ));
    let app = build_router(state);

    let response = app
        .oneshot(authed_request("GET", "/api/trends", PLAYER_TOKEN))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_save_list_and_get_sessions() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir).await;

    let first = save(&app, PLAYER_TOKEN, "practice").await;
    let second = save(&app, PLAYER_TOKEN, "match").await;
    save(&app, OTHER_TOKEN, "match").await;

    assert_eq!(second["success"], true);
    assert_eq!(second["data"]["session_type"], "match");
    assert_eq!(second["data"]["total_segments"], 2);
    assert_eq!(second["data"]["helpful_thought_ratio"], "50%");

    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/sessions?limit=5", PLAYER_TOKEN))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let list = extract_json(response.into_body()).await;
    let rows = list["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].get("analysis_json").is_none());

    let ids: Vec<&Value> = rows.iter().map(|r| &r["id"]).collect();
    assert!(ids.contains(&&first["data"]["id"]));
    assert!(ids.contains(&&second["data"]["id"]));

    let uri = format!("/api/sessions/{}", first["data"]["id"].as_str().unwrap());
    let response = app
        .clone()
        .oneshot(authed_request("GET", &uri, PLAYER_TOKEN))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session = extract_json(response.into_body()).await;
    assert_eq!(session["data"]["analysis_json"]["segments"].as_array().unwrap().len(), 2);

    // another player's token cannot read it
    let response = app
        .oneshot(authed_request("GET", &uri, OTHER_TOKEN))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_save_rejects_bad_input() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir).await;

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/sessions",
            PLAYER_TOKEN,
            &json!({"transcript": "hola"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/sessions",
            PLAYER_TOKEN,
            &json!({"analysis": {"segments": []}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/api/sessions",
            PLAYER_TOKEN,
            &json!({"analysis": analysis(), "session_type": "tournament"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Unknown session type: tournament");
}

#[tokio::test]
async fn test_trends_aggregate_by_pattern_type() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir).await;
    save(&app, PLAYER_TOKEN, "match").await;

    let response = app
        .oneshot(authed_request("GET", "/api/trends?days=7", PLAYER_TOKEN))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["days"], 7);

    let criticism = &body["data"]["self_criticism"];
    assert_eq!(criticism["count"], 2);
    assert_eq!(criticism["total_score"], 9.0);
    assert_eq!(criticism["average_score"], 4.5);
    assert_eq!(body["data"]["tactical_focus"]["count"], 1);
}

#[tokio::test]
async fn test_profile_update_and_read() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(&dir).await;

    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/profile", PLAYER_TOKEN))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "PUT",
            "/api/profile",
            PLAYER_TOKEN,
            &json!({"full_name": " "}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "PUT",
            "/api/profile",
            PLAYER_TOKEN,
            &json!({"full_name": "Paula Badosa"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(authed_request("GET", "/api/profile", PLAYER_TOKEN))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["data"]["full_name"], "Paula Badosa");
    assert_eq!(body["data"]["role"], "player");
}
