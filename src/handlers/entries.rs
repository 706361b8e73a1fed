use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::{
    db::entities::{
        albums, artists,
        playlist_entries::{self, EntryKind, MatchStatus},
        playlists, tracks,
    },
    error::{AppError, Result},
    services::matching,
    state::AppState,
};

#[derive(Serialize)]
pub struct EntryResponse {
    pub id: i32,
    pub position: i32,
    pub kind: EntryKind,
    pub match_status: MatchStatus,
    pub match_score: Option<i32>,
    pub track_id: Option<i32>,
    pub album_id: Option<i32>,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<i32>,
    pub added_at: Option<String>,
}

#[derive(Deserialize)]
pub struct ListEntriesQuery {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_entry_limit")]
    pub limit: u64,
}

fn default_entry_limit() -> u64 {
    50
}

#[derive(Serialize)]
pub struct PaginatedEntriesResponse {
    pub entries: Vec<EntryResponse>,
    pub has_more: bool,
    pub total: u64,
    pub next_offset: u64,
}

#[derive(Deserialize)]
pub struct CreateEntryRequest {
    pub kind: EntryKind,
    pub track_id: Option<i32>,
    pub album_id: Option<i32>,
    pub requested_title: Option<String>,
    pub requested_artist: Option<String>,
    pub requested_album: Option<String>,
}

#[derive(Deserialize)]
pub struct MoveEntryRequest {
    pub position: i32,
}

#[derive(Serialize)]
pub struct DedupeResponse {
    pub removed: u64,
}

/// An external search hit offered for manual review of an unresolved
/// request entry.
#[derive(Serialize)]
pub struct CandidateResponse {
    pub source: String,
    pub external_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<i32>,
}

/// Get paginated entries for a playlist (for infinite scroll)
pub async fn list_entries(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<ListEntriesQuery>,
) -> Result<Json<PaginatedEntriesResponse>> {
    require_playlist(&state, id).await?;

    let limit = query.limit.clamp(1, 200);

    let total = playlist_entries::Entity::find()
        .filter(playlist_entries::Column::PlaylistId.eq(id))
        .count(&state.db)
        .await?;

    let entries = fetch_entries_page(&state, id, query.offset, limit).await?;
    let has_more = query.offset + (entries.len() as u64) < total;

    Ok(Json(PaginatedEntriesResponse {
        entries,
        has_more,
        total,
        next_offset: query.offset + limit,
    }))
}

/// Append an entry to a playlist. The polymorphic target must match the
/// kind: a track id, an album id, or a requested title.
pub async fn create_entry(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<CreateEntryRequest>,
) -> Result<(StatusCode, Json<EntryResponse>)> {
    require_playlist(&state, id).await?;

    let now = Utc::now();
    let mut entry = playlist_entries::ActiveModel {
        playlist_id: Set(id),
        kind: Set(payload.kind),
        added_at: Set(Some(now.into())),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    match payload.kind {
        EntryKind::Track => {
            let track_id = payload
                .track_id
                .ok_or_else(|| AppError::Validation("track entries need track_id".to_string()))?;
            tracks::Entity::find_by_id(track_id)
                .one(&state.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Track not found".to_string()))?;
            entry.track_id = Set(Some(track_id));
            entry.match_status = Set(MatchStatus::Matched);
        }
        EntryKind::Album => {
            let album_id = payload
                .album_id
                .ok_or_else(|| AppError::Validation("album entries need album_id".to_string()))?;
            albums::Entity::find_by_id(album_id)
                .one(&state.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Album not found".to_string()))?;
            entry.album_id = Set(Some(album_id));
            entry.match_status = Set(MatchStatus::Matched);
        }
        EntryKind::Request => {
            let title = payload
                .requested_title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    AppError::Validation("request entries need requested_title".to_string())
                })?;
            entry.requested_title = Set(Some(title.to_string()));
            entry.requested_artist = Set(payload.requested_artist);
            entry.requested_album = Set(payload.requested_album);
            entry.match_status = Set(MatchStatus::Pending);
        }
    }

    let tail = playlist_entries::Entity::find()
        .filter(playlist_entries::Column::PlaylistId.eq(id))
        .order_by_desc(playlist_entries::Column::Position)
        .one(&state.db)
        .await?
        .map(|e| e.position + 1)
        .unwrap_or(0);
    entry.position = Set(tail);

    let inserted = entry.insert(&state.db).await?;
    let response = resolve_display(&state, vec![inserted]).await?.remove(0);

    Ok((StatusCode::CREATED, Json(response)))
}

/// Move an entry to a new position, shifting displaced entries so the
/// sequence stays dense. This is the drag-and-drop reorder endpoint.
pub async fn move_entry(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(i32, i32)>,
    Json(payload): Json<MoveEntryRequest>,
) -> Result<Json<EntryResponse>> {
    require_playlist(&state, id).await?;

    let entry = playlist_entries::Entity::find_by_id(entry_id)
        .one(&state.db)
        .await?
        .filter(|e| e.playlist_id == id)
        .ok_or_else(|| AppError::NotFound("Entry not found".to_string()))?;

    let count = playlist_entries::Entity::find()
        .filter(playlist_entries::Column::PlaylistId.eq(id))
        .count(&state.db)
        .await? as i32;

    let old_position = entry.position;
    let new_position = payload.position.clamp(0, count.saturating_sub(1));

    if new_position != old_position {
        if new_position > old_position {
            // Shift the block between old and new down by one.
            playlist_entries::Entity::update_many()
                .col_expr(
                    playlist_entries::Column::Position,
                    Expr::col(playlist_entries::Column::Position).sub(1),
                )
                .filter(playlist_entries::Column::PlaylistId.eq(id))
                .filter(playlist_entries::Column::Position.gt(old_position))
                .filter(playlist_entries::Column::Position.lte(new_position))
                .exec(&state.db)
                .await?;
        } else {
            playlist_entries::Entity::update_many()
                .col_expr(
                    playlist_entries::Column::Position,
                    Expr::col(playlist_entries::Column::Position).add(1),
                )
                .filter(playlist_entries::Column::PlaylistId.eq(id))
                .filter(playlist_entries::Column::Position.gte(new_position))
                .filter(playlist_entries::Column::Position.lt(old_position))
                .exec(&state.db)
                .await?;
        }

        let mut active: playlist_entries::ActiveModel = entry.into();
        active.position = Set(new_position);
        active.updated_at = Set(Utc::now().into());
        active.update(&state.db).await?;
    }

    let moved = playlist_entries::Entity::find_by_id(entry_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Entry not found".to_string()))?;

    let response = resolve_display(&state, vec![moved]).await?.remove(0);
    Ok(Json(response))
}

/// Remove an entry and close the position gap it leaves
pub async fn delete_entry(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(i32, i32)>,
) -> Result<StatusCode> {
    require_playlist(&state, id).await?;

    let entry = playlist_entries::Entity::find_by_id(entry_id)
        .one(&state.db)
        .await?
        .filter(|e| e.playlist_id == id)
        .ok_or_else(|| AppError::NotFound("Entry not found".to_string()))?;

    let removed_position = entry.position;
    playlist_entries::Entity::delete_by_id(entry.id)
        .exec(&state.db)
        .await?;

    playlist_entries::Entity::update_many()
        .col_expr(
            playlist_entries::Column::Position,
            Expr::col(playlist_entries::Column::Position).sub(1),
        )
        .filter(playlist_entries::Column::PlaylistId.eq(id))
        .filter(playlist_entries::Column::Position.gt(removed_position))
        .exec(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Remove duplicate entries resolving to the same track, album, or
/// normalized request; the first occurrence wins.
pub async fn dedupe_entries(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DedupeResponse>> {
    require_playlist(&state, id).await?;

    let entries = playlist_entries::Entity::find()
        .filter(playlist_entries::Column::PlaylistId.eq(id))
        .order_by_asc(playlist_entries::Column::Position)
        .all(&state.db)
        .await?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut removed = 0u64;
    let mut position = 0i32;

    for entry in entries {
        let key = match (entry.kind, entry.track_id, entry.album_id) {
            (_, Some(track_id), _) => format!("track:{}", track_id),
            (EntryKind::Album, _, Some(album_id)) => format!("album:{}", album_id),
            _ => format!(
                "request:{}:{}",
                matching::normalize(entry.requested_title.as_deref().unwrap_or_default()),
                matching::normalize(entry.requested_artist.as_deref().unwrap_or_default())
            ),
        };

        if !seen.insert(key) {
            playlist_entries::Entity::delete_by_id(entry.id)
                .exec(&state.db)
                .await?;
            removed += 1;
            continue;
        }

        if entry.position != position {
            let mut active: playlist_entries::ActiveModel = entry.into();
            active.position = Set(position);
            active.updated_at = Set(Utc::now().into());
            active.update(&state.db).await?;
        }
        position += 1;
    }

    Ok(Json(DedupeResponse { removed }))
}

/// External candidates for a request entry's manual review: Spotify
/// catalog search plus YouTube video search, each skipped when the
/// service is not connected.
pub async fn entry_candidates(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(i32, i32)>,
) -> Result<Json<Vec<CandidateResponse>>> {
    require_playlist(&state, id).await?;

    let entry = playlist_entries::Entity::find_by_id(entry_id)
        .one(&state.db)
        .await?
        .filter(|e| e.playlist_id == id)
        .ok_or_else(|| AppError::NotFound("Entry not found".to_string()))?;

    if entry.kind != EntryKind::Request {
        return Err(AppError::Validation(
            "Only request entries have external candidates".to_string(),
        ));
    }

    let title = entry.requested_title.clone().unwrap_or_default();
    let artist = entry.requested_artist.clone().unwrap_or_default();

    let mut candidates = Vec::new();

    // Spotify catalog search, when connected.
    match crate::tasks::spotify_sync::ensure_access_token(&state).await {
        Ok(token) => {
            let spotify = crate::services::SpotifyService::new(
                state.config.spotify_client_id.clone(),
                state.config.spotify_redirect_uri.clone(),
            );
            match spotify.search_tracks(&token, &title, &artist).await {
                Ok(tracks) => {
                    candidates.extend(tracks.into_iter().filter_map(|t| {
                        t.id.map(|spotify_id| CandidateResponse {
                            source: "spotify".to_string(),
                            external_id: spotify_id,
                            title: t.name,
                            artist: t.artists.first().map(|a| a.name.clone()),
                            album: Some(t.album.name),
                            duration_ms: Some(t.duration_ms),
                        })
                    }));
                }
                Err(e) => tracing::warn!("Spotify candidate search failed: {}", e),
            }
        }
        Err(e) => tracing::debug!("Spotify not available for candidates: {}", e),
    }

    // YouTube video search, when an API key is stored.
    let settings = crate::db::entities::UserSettings::find().one(&state.db).await?;
    if let Some(api_key) = settings.and_then(|s| s.youtube_api_key) {
        let cache = crate::services::CacheService::new(state.redis.clone());
        let query = format!("{} {}", title, artist);
        let cache_key = crate::services::CacheService::youtube_search_key(&matching::normalize(&query));

        let videos: Option<Vec<crate::services::YoutubeVideo>> =
            cache.get(&cache_key).await.unwrap_or(None);
        let videos = match videos {
            Some(cached) => cached,
            None => match crate::services::YoutubeService::new()
                .search_videos(&api_key, &query)
                .await
            {
                Ok(fetched) => {
                    cache.set(&cache_key, &fetched, None).await.ok();
                    fetched
                }
                Err(e) => {
                    tracing::warn!("YouTube candidate search failed: {}", e);
                    Vec::new()
                }
            },
        };

        candidates.extend(videos.into_iter().map(|v| CandidateResponse {
            source: "youtube".to_string(),
            external_id: v.video_id,
            title: v.title,
            artist: Some(v.channel_title),
            album: None,
            duration_ms: None,
        }));
    }

    Ok(Json(candidates))
}

/// One page of a playlist's entries with display fields joined in.
pub async fn fetch_entries_page(
    state: &AppState,
    playlist_id: i32,
    offset: u64,
    limit: u64,
) -> Result<Vec<EntryResponse>> {
    let entries = playlist_entries::Entity::find()
        .filter(playlist_entries::Column::PlaylistId.eq(playlist_id))
        .order_by_asc(playlist_entries::Column::Position)
        .offset(offset)
        .limit(limit)
        .all(&state.db)
        .await?;

    resolve_display(state, entries).await
}

/// Join track/album/artist display fields onto a batch of entries.
async fn resolve_display(
    state: &AppState,
    entries: Vec<playlist_entries::Model>,
) -> Result<Vec<EntryResponse>> {
    let track_ids: Vec<i32> = entries.iter().filter_map(|e| e.track_id).collect();
    let mut album_ids: Vec<i32> = entries.iter().filter_map(|e| e.album_id).collect();

    let track_rows = if track_ids.is_empty() {
        Vec::new()
    } else {
        tracks::Entity::find()
            .filter(tracks::Column::Id.is_in(track_ids))
            .all(&state.db)
            .await?
    };
    album_ids.extend(track_rows.iter().filter_map(|t| t.album_id));

    let album_rows = if album_ids.is_empty() {
        Vec::new()
    } else {
        albums::Entity::find()
            .filter(albums::Column::Id.is_in(album_ids))
            .all(&state.db)
            .await?
    };

    let mut artist_ids: Vec<i32> = track_rows.iter().map(|t| t.artist_id).collect();
    artist_ids.extend(album_rows.iter().map(|a| a.artist_id));

    let artist_rows = if artist_ids.is_empty() {
        Vec::new()
    } else {
        artists::Entity::find()
            .filter(artists::Column::Id.is_in(artist_ids))
            .all(&state.db)
            .await?
    };

    let artist_names: HashMap<i32, String> =
        artist_rows.into_iter().map(|a| (a.id, a.name)).collect();
    let album_map: HashMap<i32, albums::Model> =
        album_rows.into_iter().map(|a| (a.id, a)).collect();
    let track_map: HashMap<i32, tracks::Model> =
        track_rows.into_iter().map(|t| (t.id, t)).collect();

    Ok(entries
        .into_iter()
        .map(|entry| {
            let (title, artist, album, duration_ms) = match (
                entry.track_id.and_then(|id| track_map.get(&id)),
                entry.album_id.and_then(|id| album_map.get(&id)),
            ) {
                (Some(track), _) => (
                    track.title.clone(),
                    artist_names.get(&track.artist_id).cloned(),
                    track
                        .album_id
                        .and_then(|id| album_map.get(&id))
                        .map(|a| a.title.clone()),
                    track.duration_ms,
                ),
                (None, Some(album)) => (
                    album.title.clone(),
                    artist_names.get(&album.artist_id).cloned(),
                    Some(album.title.clone()),
                    None,
                ),
                (None, None) => (
                    entry.requested_title.clone().unwrap_or_default(),
                    entry.requested_artist.clone(),
                    entry.requested_album.clone(),
                    None,
                ),
            };

            EntryResponse {
                id: entry.id,
                position: entry.position,
                kind: entry.kind,
                match_status: entry.match_status,
                match_score: entry.match_score,
                track_id: entry.track_id,
                album_id: entry.album_id,
                title,
                artist,
                album,
                duration_ms,
                added_at: entry.added_at.map(|dt| dt.to_rfc3339()),
            }
        })
        .collect())
}

async fn require_playlist(state: &AppState, id: i32) -> Result<playlists::Model> {
    playlists::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Playlist not found".to_string()))
}
