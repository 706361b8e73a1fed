//! Test utilities for Curator
//!
//! Provides helpers for creating isolated test environments with:
//! - In-memory SQLite databases (one per test)
//! - AppState factories (no Redis; caching degrades to a no-op)
//! - Test data generators

use chrono::Utc;
use migration::MigratorTrait;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};

use crate::{
    config::Config,
    db::entities::{
        albums, artists, jobs,
        playlist_entries::{self, EntryKind, MatchStatus},
        playlists, tracks, user_settings,
    },
    jobs::JobQueue,
    state::AppState,
};

/// Setup an in-memory SQLite database with all migrations applied
///
/// Each call creates a fresh, isolated database perfect for parallel testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Create a test configuration with sensible defaults
pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        redis_url: None,
        server_host: "127.0.0.1".to_string(),
        server_port: 3000,
        spotify_client_id: "test_client_id".to_string(),
        spotify_redirect_uri: "http://localhost:3000/api/auth/spotify/callback".to_string(),
        music_folder_path: None,
        static_dir: "static".to_string(),
    }
}

/// Create a complete test AppState with an isolated database
pub async fn setup_test_app_state() -> AppState {
    let db = setup_test_db().await;
    let config = test_config();
    let (job_queue, _receiver) = JobQueue::new();

    AppState::new(db, None, config, job_queue)
}

/// Create a test AppState with a job queue that keeps the receiver alive.
/// Keep the receiver in scope to observe submitted jobs.
pub async fn setup_test_app_state_with_queue() -> (
    AppState,
    tokio::sync::mpsc::UnboundedReceiver<crate::jobs::JobMessage>,
) {
    let db = setup_test_db().await;
    let config = test_config();
    let (job_queue, receiver) = JobQueue::new();

    (AppState::new(db, None, config, job_queue), receiver)
}

// ============================================================================
// Test Data Factories
// ============================================================================

/// Create a test artist in the database
pub async fn create_test_artist(db: &DatabaseConnection, name: &str) -> artists::Model {
    let now = Utc::now().into();
    let artist = artists::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    artist.insert(db).await.expect("Failed to insert test artist")
}

/// Create a test album in the database
pub async fn create_test_album(
    db: &DatabaseConnection,
    artist_id: i32,
    title: &str,
) -> albums::Model {
    let now = Utc::now().into();
    let album = albums::ActiveModel {
        artist_id: Set(artist_id),
        title: Set(title.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    album.insert(db).await.expect("Failed to insert test album")
}

/// Create a file-backed test track in the database
pub async fn create_test_track(
    db: &DatabaseConnection,
    artist_id: i32,
    album_id: Option<i32>,
    title: &str,
    file_path: Option<&str>,
) -> tracks::Model {
    let now = Utc::now().into();
    let track = tracks::ActiveModel {
        artist_id: Set(artist_id),
        album_id: Set(album_id),
        title: Set(title.to_string()),
        file_path: Set(file_path.map(|p| p.to_string())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    track.insert(db).await.expect("Failed to insert test track")
}

/// Create a test playlist in the database
pub async fn create_test_playlist(
    db: &DatabaseConnection,
    name: &str,
    spotify_id: Option<&str>,
) -> playlists::Model {
    let now = Utc::now().into();
    let playlist = playlists::ActiveModel {
        name: Set(name.to_string()),
        spotify_id: Set(spotify_id.map(|s| s.to_string())),
        is_enabled: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    playlist
        .insert(db)
        .await
        .expect("Failed to insert test playlist")
}

/// Create a track entry at the given position
pub async fn create_test_track_entry(
    db: &DatabaseConnection,
    playlist_id: i32,
    track_id: i32,
    position: i32,
) -> playlist_entries::Model {
    let now = Utc::now().into();
    let entry = playlist_entries::ActiveModel {
        playlist_id: Set(playlist_id),
        position: Set(position),
        kind: Set(EntryKind::Track),
        track_id: Set(Some(track_id)),
        match_status: Set(MatchStatus::Matched),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    entry.insert(db).await.expect("Failed to insert test entry")
}

/// Create a request entry at the given position
pub async fn create_test_request_entry(
    db: &DatabaseConnection,
    playlist_id: i32,
    position: i32,
    title: &str,
    artist: &str,
) -> playlist_entries::Model {
    let now = Utc::now().into();
    let entry = playlist_entries::ActiveModel {
        playlist_id: Set(playlist_id),
        position: Set(position),
        kind: Set(EntryKind::Request),
        requested_title: Set(Some(title.to_string())),
        requested_artist: Set(Some(artist.to_string())),
        match_status: Set(MatchStatus::Pending),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    entry.insert(db).await.expect("Failed to insert test entry")
}

/// Create a test job in the database
pub async fn create_test_job(
    db: &DatabaseConnection,
    job_type: jobs::JobType,
    status: jobs::JobStatus,
) -> jobs::Model {
    let now = Utc::now().into();
    let job = jobs::ActiveModel {
        job_type: Set(job_type),
        status: Set(status),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    job.insert(db).await.expect("Failed to insert test job")
}

/// Create the settings row with the given music folder
pub async fn create_test_settings(
    db: &DatabaseConnection,
    music_folder_path: Option<&str>,
) -> user_settings::Model {
    let now = Utc::now().into();
    let settings = user_settings::ActiveModel {
        music_folder_path: Set(music_folder_path.map(|p| p.to_string())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    settings
        .insert(db)
        .await
        .expect("Failed to insert test settings")
}
