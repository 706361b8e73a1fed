use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use std::collections::{HashMap, HashSet};

use crate::{
    db::entities::{
        artists, jobs,
        playlist_entries::{self, EntryKind, MatchStatus},
        playlists, tracks, UserSettings,
    },
    services::matching,
    services::{CacheService, LastfmService, OpenAiService},
    state::AppState,
    tasks::{load_local_index, match_entries::match_request_entries},
};

const DEFAULT_SUGGESTION_COUNT: u32 = 10;
const LASTFM_SEED_LIMIT: u64 = 5;
const LASTFM_PER_SEED: u32 = 10;
const LASTFM_APPEND_LIMIT: usize = 20;

/// Ask OpenAI for tracks fitting the playlist and append the new ones as
/// request entries, then try to match them against the library.
pub async fn run_openai_suggest(state: AppState, job_id: i32, playlist_id: i32) -> Result<()> {
    tracing::info!("Starting OpenAI suggestions for playlist {}", playlist_id);

    let settings = UserSettings::find()
        .one(&state.db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No user settings found"))?;
    let api_key = settings
        .openai_api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("OpenAI API key not configured"))?;

    let playlist = playlists::Entity::find_by_id(playlist_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Playlist not found: {}", playlist_id))?;

    // The trigger parks the requested count on the job row.
    let count = jobs::Entity::find_by_id(job_id)
        .one(&state.db)
        .await?
        .and_then(|j| j.total_items)
        .map(|n| n.max(1) as u32)
        .unwrap_or(DEFAULT_SUGGESTION_COUNT);

    let display = entry_display_names(&state, playlist_id).await?;
    let existing_titles: Vec<String> = display
        .iter()
        .map(|(title, artist)| format!("{} — {}", title, artist))
        .collect();

    let suggestions = OpenAiService::new()
        .suggest_tracks(
            &api_key,
            settings.openai_model.as_deref(),
            &playlist.name,
            &existing_titles,
            count,
        )
        .await?;

    let items: Vec<(String, String, Option<String>)> = suggestions
        .into_iter()
        .map(|s| (s.title, s.artist, None))
        .collect();

    ingest_suggestions(&state, job_id, playlist_id, items, &display).await
}

/// Append Last.fm similar tracks, seeded from the playlist's resolved
/// entries, then try to match them against the library.
pub async fn run_lastfm_similar(state: AppState, job_id: i32, playlist_id: i32) -> Result<()> {
    tracing::info!("Starting Last.fm suggestions for playlist {}", playlist_id);

    let settings = UserSettings::find()
        .one(&state.db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No user settings found"))?;
    let api_key = settings
        .lastfm_api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Last.fm API key not configured"))?;

    playlists::Entity::find_by_id(playlist_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Playlist not found: {}", playlist_id))?;

    // Seed from resolved track entries.
    let seeds = playlist_entries::Entity::find()
        .filter(playlist_entries::Column::PlaylistId.eq(playlist_id))
        .filter(playlist_entries::Column::TrackId.is_not_null())
        .order_by_asc(playlist_entries::Column::Position)
        .limit(LASTFM_SEED_LIMIT)
        .all(&state.db)
        .await?;

    if seeds.is_empty() {
        anyhow::bail!("Playlist has no resolved tracks to seed similar-track lookup");
    }

    let lastfm = LastfmService::new();
    let cache = CacheService::new(state.redis.clone());
    let display = entry_display_names(&state, playlist_id).await?;

    let mut collected: Vec<(String, String, Option<String>)> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for seed in &seeds {
        let Some(track_id) = seed.track_id else {
            continue;
        };
        let Some((title, artist)) = track_display(&state, track_id).await? else {
            continue;
        };

        let cache_key = CacheService::lastfm_similar_key(
            &matching::normalize(&artist),
            &matching::normalize(&title),
        );

        let similar: Vec<crate::services::SimilarTrack> =
            match cache.get(&cache_key).await.unwrap_or(None) {
                Some(cached) => cached,
                None => {
                    let fetched = lastfm
                        .similar_tracks(&api_key, &artist, &title, LASTFM_PER_SEED)
                        .await?;
                    cache.set(&cache_key, &fetched, None).await.ok();
                    fetched
                }
            };

        for track in similar {
            let key = (
                matching::normalize(&track.name),
                matching::normalize(&track.artist),
            );
            if seen.insert(key) {
                collected.push((track.name, track.artist, None));
            }
        }
    }

    collected.truncate(LASTFM_APPEND_LIMIT);
    ingest_suggestions(&state, job_id, playlist_id, collected, &display).await
}

/// Drop suggestions already present, append the rest as request entries
/// at the tail, and run matching over the fresh rows.
async fn ingest_suggestions(
    state: &AppState,
    job_id: i32,
    playlist_id: i32,
    items: Vec<(String, String, Option<String>)>,
    existing_display: &[(String, String)],
) -> Result<()> {
    let existing_keys: HashSet<(String, String)> = existing_display
        .iter()
        .map(|(title, artist)| (matching::normalize(title), matching::normalize(artist)))
        .collect();

    let fresh: Vec<_> = items
        .into_iter()
        .filter(|(title, artist, _)| {
            !existing_keys.contains(&(matching::normalize(title), matching::normalize(artist)))
        })
        .collect();

    if fresh.is_empty() {
        tracing::info!("No new suggestions for playlist {}", playlist_id);
        return Ok(());
    }

    let tail = playlist_entries::Entity::find()
        .filter(playlist_entries::Column::PlaylistId.eq(playlist_id))
        .order_by_desc(playlist_entries::Column::Position)
        .one(&state.db)
        .await?
        .map(|e| e.position + 1)
        .unwrap_or(0);

    let now = Utc::now();
    let mut inserted = Vec::with_capacity(fresh.len());

    for (offset, (title, artist, album)) in fresh.into_iter().enumerate() {
        let entry = playlist_entries::ActiveModel {
            playlist_id: Set(playlist_id),
            position: Set(tail + offset as i32),
            kind: Set(EntryKind::Request),
            requested_title: Set(Some(title)),
            requested_artist: Set(Some(artist)),
            requested_album: Set(album),
            match_status: Set(MatchStatus::Pending),
            added_at: Set(Some(now.into())),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        inserted.push(entry.insert(&state.db).await?);
    }

    tracing::info!(
        "Appended {} suggestions to playlist {}",
        inserted.len(),
        playlist_id
    );

    let index = load_local_index(&state.db).await?;
    match_request_entries(state, inserted, &index, job_id).await?;

    Ok(())
}

/// (title, artist) display pairs for every entry in a playlist, used for
/// prompt context and dedupe.
async fn entry_display_names(state: &AppState, playlist_id: i32) -> Result<Vec<(String, String)>> {
    let entries = playlist_entries::Entity::find()
        .filter(playlist_entries::Column::PlaylistId.eq(playlist_id))
        .order_by_asc(playlist_entries::Column::Position)
        .all(&state.db)
        .await?;

    let track_ids: Vec<i32> = entries.iter().filter_map(|e| e.track_id).collect();
    let track_rows = if track_ids.is_empty() {
        Vec::new()
    } else {
        tracks::Entity::find()
            .filter(tracks::Column::Id.is_in(track_ids))
            .all(&state.db)
            .await?
    };

    let artist_names: HashMap<i32, String> = artists::Entity::find()
        .all(&state.db)
        .await?
        .into_iter()
        .map(|a| (a.id, a.name))
        .collect();

    let track_display: HashMap<i32, (String, String)> = track_rows
        .into_iter()
        .map(|t| {
            let artist = artist_names.get(&t.artist_id).cloned().unwrap_or_default();
            (t.id, (t.title, artist))
        })
        .collect();

    Ok(entries
        .into_iter()
        .filter_map(|e| {
            if let Some(track_id) = e.track_id {
                track_display.get(&track_id).cloned()
            } else {
                e.requested_title.map(|title| {
                    (title, e.requested_artist.unwrap_or_default())
                })
            }
        })
        .collect())
}

async fn track_display(state: &AppState, track_id: i32) -> Result<Option<(String, String)>> {
    let Some(track) = tracks::Entity::find_by_id(track_id).one(&state.db).await? else {
        return Ok(None);
    };

    let artist = artists::Entity::find_by_id(track.artist_id)
        .one(&state.db)
        .await?
        .map(|a| a.name)
        .unwrap_or_default();

    Ok(Some((track.title, artist)))
}
