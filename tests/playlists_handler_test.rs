//! Integration tests for playlist handler routes
//!
//! Tests playlist CRUD including:
//! - List with pagination and enabled filter
//! - Create with validation
//! - Detail with entries
//! - Update and delete

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use sea_orm::EntityTrait;
use serde_json::json;
use tower::util::ServiceExt;

use curator::db::entities::{playlist_entries, playlists};
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
async fn test_list_playlists_empty() {
    let state = setup_test_app_state().await;
    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/playlists")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["playlists"].as_array().unwrap().len(), 0);
    assert_eq!(body["pagination"]["total_items"], 0);
}

#[tokio::test]
async fn test_create_playlist() {
    let state = setup_test_app_state().await;
    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/playlists")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "name": "Road Trip", "description": "for driving" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["name"], "Road Trip");
    assert_eq!(body["description"], "for driving");
    assert_eq!(body["is_enabled"], true);
    assert_eq!(body["entry_count"], 0);

    let stored = playlists::Entity::find()
        .all(&state.db)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "Road Trip");
}

#[tokio::test]
async fn test_create_playlist_rejects_blank_name() {
    let state = setup_test_app_state().await;
    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/playlists")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "name": "   " }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_playlist_with_entries() {
    let state = setup_test_app_state().await;

    let artist = create_test_artist(&state.db, "Queen").await;
    let track = create_test_track(&state.db, artist.id, None, "Bohemian Rhapsody", None).await;
    let playlist = create_test_playlist(&state.db, "Classics", None).await;
    create_test_track_entry(&state.db, playlist.id, track.id, 0).await;
    create_test_request_entry(&state.db, playlist.id, 1, "Hey Jude", "The Beatles").await;

    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri(&format!("/api/playlists/{}", playlist.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["playlist"]["name"], "Classics");
    assert_eq!(body["playlist"]["entry_count"], 2);
    assert_eq!(body["playlist"]["matched_count"], 1);

    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["kind"], "track");
    assert_eq!(entries[0]["title"], "Bohemian Rhapsody");
    assert_eq!(entries[0]["artist"], "Queen");
    assert_eq!(entries[1]["kind"], "request");
    assert_eq!(entries[1]["title"], "Hey Jude");
    assert_eq!(entries[1]["match_status"], "pending");
}

#[tokio::test]
async fn test_get_playlist_not_found() {
    let state = setup_test_app_state().await;
    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/playlists/999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_playlist_rename_and_toggle() {
    let state = setup_test_app_state().await;
    let playlist = create_test_playlist(&state.db, "Old Name", None).await;

    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(&format!("/api/playlists/{}", playlist.id))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "name": "New Name", "is_enabled": false }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["name"], "New Name");
    assert_eq!(body["is_enabled"], false);

    let stored = playlists::Entity::find_by_id(playlist.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.name, "New Name");
    assert!(!stored.is_enabled);
}

#[tokio::test]
async fn test_delete_playlist_cascades_entries() {
    let state = setup_test_app_state().await;

    let playlist = create_test_playlist(&state.db, "Doomed", None).await;
    create_test_request_entry(&state.db, playlist.id, 0, "Song", "Artist").await;

    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(&format!("/api/playlists/{}", playlist.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let remaining = playlist_entries::Entity::find().all(&state.db).await.unwrap();
    assert_eq!(remaining.len(), 0);
}

#[tokio::test]
async fn test_list_playlists_enabled_filter_and_order() {
    let state = setup_test_app_state().await;

    let enabled = create_test_playlist(&state.db, "B Enabled", None).await;
    let disabled = create_test_playlist(&state.db, "A Disabled", None).await;

    // Disable one playlist
    let mut active: playlists::ActiveModel = disabled.clone().into();
    active.is_enabled = sea_orm::Set(false);
    sea_orm::ActiveModelTrait::update(active, &state.db).await.unwrap();

    let app = create_test_router(&state);

    // Unfiltered: enabled playlists sort first
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/playlists")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body: serde_json::Value = parse_json_response(response).await;
    let playlists = body["playlists"].as_array().unwrap();
    assert_eq!(playlists.len(), 2);
    assert_eq!(playlists[0]["id"], enabled.id);

    // Filtered: only enabled
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/playlists?is_enabled=true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body: serde_json::Value = parse_json_response(response).await;
    let playlists = body["playlists"].as_array().unwrap();
    assert_eq!(playlists.len(), 1);
    assert_eq!(playlists[0]["id"], enabled.id);
}

#[tokio::test]
async fn test_list_playlists_pagination() {
    let state = setup_test_app_state().await;

    for i in 0..5 {
        create_test_playlist(&state.db, &format!("Playlist {}", i), None).await;
    }

    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/playlists?page=2&page_size=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["playlists"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["total_items"], 5);
    assert_eq!(body["pagination"]["total_pages"], 3);
}
