pub mod auth;
pub mod entries;
pub mod health;
pub mod jobs;
pub mod library;
pub mod playlists;
pub mod settings;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::state::AppState;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Auth endpoints
        .route("/auth/spotify/authorize", get(auth::authorize))
        .route("/auth/spotify/callback", get(auth::callback))
        .route("/auth/spotify/status", get(auth::spotify_status))

        // Playlist endpoints
        .route("/playlists", get(playlists::list_playlists))
        .route("/playlists", post(playlists::create_playlist))
        .route("/playlists/:id", get(playlists::get_playlist))
        .route("/playlists/:id", patch(playlists::update_playlist))
        .route("/playlists/:id", delete(playlists::delete_playlist))

        // Playlist entry endpoints
        .route("/playlists/:id/entries", get(entries::list_entries))
        .route("/playlists/:id/entries", post(entries::create_entry))
        .route("/playlists/:id/entries/:entry_id", patch(entries::move_entry))
        .route("/playlists/:id/entries/:entry_id", delete(entries::delete_entry))
        .route("/playlists/:id/dedupe", post(entries::dedupe_entries))
        .route(
            "/playlists/:id/entries/:entry_id/candidates",
            get(entries::entry_candidates),
        )

        // Playlist job triggers
        .route("/playlists/:id/sync", post(jobs::trigger_playlist_sync))
        .route("/playlists/:id/push-plex", post(jobs::trigger_plex_push))
        .route("/playlists/:id/match", post(jobs::trigger_match_entries))
        .route("/playlists/:id/suggest", post(jobs::trigger_openai_suggest))
        .route("/playlists/:id/similar", post(jobs::trigger_lastfm_similar))

        // Library endpoints
        .route("/tracks", get(library::list_tracks))
        .route("/albums", get(library::list_albums))
        .route("/artists", get(library::list_artists))
        .route("/artists/:id", get(library::get_artist))
        .route("/stats", get(library::get_stats))

        // Job endpoints
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:id/status", get(jobs::get_job_status))
        .route("/jobs/library-scan", post(jobs::trigger_library_scan))

        // Settings endpoints
        .route("/settings", get(settings::get_settings))
        .route("/settings", put(settings::update_settings))
        .route("/settings/test-plex", post(settings::test_plex_connection))
        .route("/settings/test-lastfm", post(settings::test_lastfm_connection))
}
