//! Integration tests for library browse routes: track/album/artist
//! listings with search, artist detail, and the dashboard stats.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
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

async fn seed_library(state: &AppState) {
    let queen = create_test_artist(&state.db, "Queen").await;
    let opera = create_test_album(&state.db, queen.id, "A Night at the Opera").await;
    create_test_track(
        &state.db,
        queen.id,
        Some(opera.id),
        "Bohemian Rhapsody",
        Some("/music/queen/bohemian.mp3"),
    )
    .await;
    create_test_track(&state.db, queen.id, Some(opera.id), "Love of My Life", None).await;

    let radiohead = create_test_artist(&state.db, "Radiohead").await;
    let ok = create_test_album(&state.db, radiohead.id, "OK Computer").await;
    create_test_track(
        &state.db,
        radiohead.id,
        Some(ok.id),
        "Paranoid Android",
        Some("/music/radiohead/paranoid.mp3"),
    )
    .await;
}

#[tokio::test]
async fn test_list_tracks_with_artist_names() {
    let state = setup_test_app_state().await;
    seed_library(&state).await;

    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/tracks")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["total_items"], 3);

    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    // Ordered by title
    assert_eq!(items[0]["title"], "Bohemian Rhapsody");
    assert_eq!(items[0]["artist_name"], "Queen");
    assert_eq!(items[0]["has_file"], true);
    assert_eq!(items[1]["title"], "Love of My Life");
    assert_eq!(items[1]["has_file"], false);
}

#[tokio::test]
async fn test_track_search_matches_title_and_artist() {
    let state = setup_test_app_state().await;
    seed_library(&state).await;

    let app = create_test_router(&state);

    // Title match
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/tracks?q=paranoid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["total_items"], 1);
    assert_eq!(body["items"][0]["title"], "Paranoid Android");

    // Artist-name match returns all of that artist's tracks
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/tracks?q=Queen")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["total_items"], 2);
}

#[tokio::test]
async fn test_list_tracks_pagination() {
    let state = setup_test_app_state().await;

    let artist = create_test_artist(&state.db, "Prolific").await;
    for i in 0..5 {
        create_test_track(&state.db, artist.id, None, &format!("Song {}", i), None).await;
    }

    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/tracks?page=2&page_size=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["total_items"], 5);
    assert_eq!(body["page"], 2);

    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["title"], "Song 2");
}

#[tokio::test]
async fn test_list_albums_and_artists() {
    let state = setup_test_app_state().await;
    seed_library(&state).await;

    let app = create_test_router(&state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/albums")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["total_items"], 2);
    assert_eq!(body["items"][0]["title"], "A Night at the Opera");
    assert_eq!(body["items"][0]["artist_name"], "Queen");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/artists?q=radio")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["total_items"], 1);
    assert_eq!(body["items"][0]["name"], "Radiohead");
}

#[tokio::test]
async fn test_get_artist_with_albums() {
    let state = setup_test_app_state().await;

    let artist = create_test_artist(&state.db, "Queen").await;
    create_test_album(&state.db, artist.id, "A Night at the Opera").await;
    create_test_album(&state.db, artist.id, "News of the World").await;

    let app = create_test_router(&state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(&format!("/api/artists/{}", artist.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["artist"]["name"], "Queen");
    assert_eq!(body["albums"].as_array().unwrap().len(), 2);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/artists/999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_counts() {
    let state = setup_test_app_state().await;
    seed_library(&state).await;

    let playlist = create_test_playlist(&state.db, "Mix", None).await;
    create_test_request_entry(&state.db, playlist.id, 0, "Wanted", "Someone").await;

    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = parse_json_response(response).await;
    assert_eq!(body["artists"], 2);
    assert_eq!(body["albums"], 2);
    assert_eq!(body["tracks"], 3);
    assert_eq!(body["indexed_tracks"], 2);
    assert_eq!(body["playlists"], 1);
    assert_eq!(body["entries"], 1);
    assert_eq!(body["matched_entries"], 0);
    assert_eq!(body["active_jobs"], 0);
}
