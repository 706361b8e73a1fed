//! Integration tests for settings routes: the single-row configuration
//! surface with secrets reported as booleans.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::util::ServiceExt;

use curator::handlers;
use curator::state::AppState;
use curator::test_utils::*;

fn create_test_router(state: &AppState) -> Router {
    Router::new()
        .nest("/api", handlers::api_routes())
        .with_state(state.clone())
}

async fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: axum::response::Response,
) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_get_settings_not_found_before_first_save() {
    let state = setup_test_app_state().await;
    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/settings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_put_settings_creates_row() {
    let state = setup_test_app_state().await;
    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/settings")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "music_folder_path": "/music",
                        "auto_sync_enabled": true,
                        "sync_interval_hours": 6,
                        "plex_base_url": "http://plex.local:32400",
                        "plex_token": "plex-secret",
                        "openai_api_key": "sk-secret"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["music_folder_path"], "/music");
    assert_eq!(body["auto_sync_enabled"], true);
    assert_eq!(body["sync_interval_hours"], 6);
    assert_eq!(body["plex_base_url"], "http://plex.local:32400");

    // Secrets come back as booleans, never echoed
    assert_eq!(body["plex_configured"], true);
    assert_eq!(body["openai_configured"], true);
    assert_eq!(body["lastfm_configured"], false);
    assert_eq!(body["spotify_connected"], false);
    assert!(body.get("plex_token").is_none());
    assert!(body.get("openai_api_key").is_none());
}

#[tokio::test]
async fn test_put_settings_partial_update_preserves_other_fields() {
    let state = setup_test_app_state().await;
    create_test_settings(&state.db, Some("/music")).await;

    let app = create_test_router(&state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/settings")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "lastfm_api_key": "fm-secret", "lastfm_username": "listener" })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["music_folder_path"], "/music");
    assert_eq!(body["lastfm_configured"], true);
    assert_eq!(body["lastfm_username"], "listener");
}

#[tokio::test]
async fn test_sync_interval_floor() {
    let state = setup_test_app_state().await;
    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/settings")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "sync_interval_hours": 0 }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["sync_interval_hours"], 1);
}

#[tokio::test]
async fn test_connection_probes_require_configuration() {
    let state = setup_test_app_state().await;
    create_test_settings(&state.db, None).await;

    let app = create_test_router(&state);

    // No Plex credentials stored
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/settings/test-plex")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // No Last.fm credentials stored
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/settings/test-lastfm")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
