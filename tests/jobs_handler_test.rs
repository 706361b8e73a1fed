//! Integration tests for job handler routes
//!
//! Tests the polling surface and the trigger endpoints that insert
//! pending job rows and put messages on the queue.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use sea_orm::EntityTrait;
use serde_json::json;
use tower::util::ServiceExt;

use curator::db::entities::jobs::{self, JobStatus, JobType};
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
async fn test_list_jobs_empty() {
    let state = setup_test_app_state().await;
    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/jobs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_list_jobs_most_recent_first() {
    let state = setup_test_app_state().await;

    let job1 = create_test_job(&state.db, JobType::SpotifySync, JobStatus::Completed).await;
    let job2 = create_test_job(&state.db, JobType::MatchEntries, JobStatus::Running).await;
    let job3 = create_test_job(&state.db, JobType::LibraryScan, JobStatus::Pending).await;

    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/jobs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    let jobs = body.as_array().unwrap();
    assert_eq!(jobs.len(), 3);
    assert_eq!(jobs[0]["id"], job3.id);
    assert_eq!(jobs[1]["id"], job2.id);
    assert_eq!(jobs[2]["id"], job1.id);

    assert_eq!(jobs[0]["job_type"], "library_scan");
    assert_eq!(jobs[0]["status"], "pending");
}

#[tokio::test]
async fn test_list_jobs_limit_50() {
    let state = setup_test_app_state().await;

    for _ in 0..60 {
        create_test_job(&state.db, JobType::LibraryScan, JobStatus::Pending).await;
    }

    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/jobs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body.as_array().unwrap().len(), 50);
}

#[tokio::test]
async fn test_get_job_status() {
    let state = setup_test_app_state().await;
    let job = create_test_job(&state.db, JobType::SpotifySync, JobStatus::Running).await;

    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri(&format!("/api/jobs/{}/status", job.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["id"], job.id);
    assert_eq!(body["job_type"], "spotify_sync");
    assert_eq!(body["status"], "running");

    // Nullable fields present but unset
    assert!(body["progress"].is_null());
    assert!(body["error_message"].is_null());
    assert!(body["started_at"].is_null());
    assert!(body["completed_at"].is_null());
}

#[tokio::test]
async fn test_get_job_status_not_found() {
    let state = setup_test_app_state().await;
    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/jobs/99999/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trigger_library_scan() {
    let (state, mut receiver) = setup_test_app_state_with_queue().await;
    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/jobs/library-scan")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    let job_id = body["job_id"].as_i64().unwrap() as i32;
    assert!(job_id > 0);
    assert_eq!(body["status"], "pending");

    // Job row persisted
    let job = jobs::Entity::find_by_id(job_id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.job_type, JobType::LibraryScan);
    assert_eq!(job.status, JobStatus::Pending);

    // Message went onto the queue
    let message = receiver.try_recv().unwrap();
    assert_eq!(message.job_id, job_id);
    assert_eq!(message.job_type, JobType::LibraryScan);
    assert_eq!(message.playlist_id, None);
}

#[tokio::test]
async fn test_trigger_playlist_sync_requires_link() {
    let (state, _receiver) = setup_test_app_state_with_queue().await;

    let unlinked = create_test_playlist(&state.db, "Local Only", None).await;
    let linked = create_test_playlist(&state.db, "Spotify Mix", Some("sp_1")).await;

    let app = create_test_router(&state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&format!("/api/playlists/{}/sync", unlinked.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&format!("/api/playlists/{}/sync", linked.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    let job = jobs::Entity::find_by_id(body["job_id"].as_i64().unwrap() as i32)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.job_type, JobType::SpotifySync);
    assert_eq!(job.playlist_id, Some(linked.id));
}

#[tokio::test]
async fn test_trigger_match_entries() {
    let (state, mut receiver) = setup_test_app_state_with_queue().await;
    let playlist = create_test_playlist(&state.db, "Mix", None).await;

    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&format!("/api/playlists/{}/match", playlist.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let message = receiver.try_recv().unwrap();
    assert_eq!(message.job_type, JobType::MatchEntries);
    assert_eq!(message.playlist_id, Some(playlist.id));
}

#[tokio::test]
async fn test_trigger_suggest_parks_count_on_job() {
    let (state, _receiver) = setup_test_app_state_with_queue().await;
    let playlist = create_test_playlist(&state.db, "Mix", None).await;

    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&format!("/api/playlists/{}/suggest", playlist.id))
                .header("content-type", "application/json")
                .body(Body::from(json!({ "count": 15 }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    let job = jobs::Entity::find_by_id(body["job_id"].as_i64().unwrap() as i32)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.job_type, JobType::OpenaiSuggest);
    assert_eq!(job.total_items, Some(15));
}

#[tokio::test]
async fn test_trigger_jobs_unknown_playlist_is_404() {
    let (state, _receiver) = setup_test_app_state_with_queue().await;
    let app = create_test_router(&state);

    for uri in [
        "/api/playlists/999/sync",
        "/api/playlists/999/push-plex",
        "/api/playlists/999/match",
        "/api/playlists/999/similar",
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri: {}", uri);
    }
}
