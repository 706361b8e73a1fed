use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    db::entities::{
        playlist_entries::{self, MatchStatus},
        playlists,
    },
    error::{AppError, Result},
    handlers::entries::{self, EntryResponse},
    state::AppState,
};

#[derive(Deserialize)]
pub struct ListPlaylistsQuery {
    pub is_enabled: Option<bool>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    50
}

#[derive(Serialize)]
pub struct PlaylistResponse {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub cover_art_url: Option<String>,
    pub spotify_linked: bool,
    pub plex_linked: bool,
    pub is_enabled: bool,
    pub entry_count: i64,
    pub matched_count: i64,
    pub matched_percentage: f64,
    pub last_synced_at: Option<String>,
}

#[derive(Serialize)]
pub struct PaginatedPlaylistsResponse {
    pub playlists: Vec<PlaylistResponse>,
    pub pagination: PaginationInfo,
}

#[derive(Serialize)]
pub struct PaginationInfo {
    pub page: u64,
    pub page_size: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

#[derive(Serialize)]
pub struct PlaylistDetailResponse {
    pub playlist: PlaylistResponse,
    pub entries: Vec<EntryResponse>,
}

#[derive(Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub description: Option<String>,
    pub spotify_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdatePlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_enabled: Option<bool>,
}

/// List all playlists with entry statistics
pub async fn list_playlists(
    State(state): State<AppState>,
    Query(query): Query<ListPlaylistsQuery>,
) -> Result<Json<PaginatedPlaylistsResponse>> {
    let page = query.page.max(1);
    let page_size = query.page_size.clamp(1, 200);

    let mut select = playlists::Entity::find();

    if let Some(enabled) = query.is_enabled {
        select = select.filter(playlists::Column::IsEnabled.eq(enabled));
    }

    let total_items = select.clone().count(&state.db).await?;
    let total_pages = total_items.div_ceil(page_size);

    let playlist_models = select
        .order_by_desc(playlists::Column::IsEnabled) // Enabled playlists first
        .order_by_asc(playlists::Column::Name)
        .offset((page - 1) * page_size)
        .limit(page_size)
        .all(&state.db)
        .await?;

    // Batch fetch entry counts for the playlists on this page
    let playlist_ids: Vec<i32> = playlist_models.iter().map(|p| p.id).collect();
    let (counts, matched) = entry_stats(&state, &playlist_ids).await?;

    let playlist_responses: Vec<PlaylistResponse> = playlist_models
        .into_iter()
        .map(|playlist| to_response(playlist, &counts, &matched))
        .collect();

    Ok(Json(PaginatedPlaylistsResponse {
        playlists: playlist_responses,
        pagination: PaginationInfo {
            page,
            page_size,
            total_items,
            total_pages,
        },
    }))
}

/// Get a single playlist with its first page of entries
pub async fn get_playlist(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<PlaylistDetailResponse>> {
    let playlist = playlists::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Playlist not found".to_string()))?;

    let (counts, matched) = entry_stats(&state, &[playlist.id]).await?;
    let playlist_response = to_response(playlist, &counts, &matched);

    let entry_rows = entries::fetch_entries_page(&state, id, 0, 100).await?;

    Ok(Json(PlaylistDetailResponse {
        playlist: playlist_response,
        entries: entry_rows,
    }))
}

pub async fn create_playlist(
    State(state): State<AppState>,
    Json(payload): Json<CreatePlaylistRequest>,
) -> Result<(StatusCode, Json<PlaylistResponse>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Playlist name must not be empty".to_string()));
    }

    let now = Utc::now();
    let playlist = playlists::ActiveModel {
        name: Set(name.to_string()),
        description: Set(payload.description),
        spotify_id: Set(payload.spotify_id),
        is_enabled: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    let playlist = playlist.insert(&state.db).await?;
    let response = to_response(playlist, &HashMap::new(), &HashMap::new());

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_playlist(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdatePlaylistRequest>,
) -> Result<Json<PlaylistResponse>> {
    let playlist = playlists::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Playlist not found".to_string()))?;

    let mut active: playlists::ActiveModel = playlist.into();

    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Playlist name must not be empty".to_string()));
        }
        active.name = Set(name);
    }

    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }

    if let Some(enabled) = payload.is_enabled {
        active.is_enabled = Set(enabled);
    }

    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.db).await?;

    let (counts, matched) = entry_stats(&state, &[updated.id]).await?;
    Ok(Json(to_response(updated, &counts, &matched)))
}

/// Delete a playlist; entries cascade with it
pub async fn delete_playlist(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    let playlist = playlists::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Playlist not found".to_string()))?;

    playlists::Entity::delete_by_id(playlist.id)
        .exec(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Entry totals and matched totals per playlist, batched in two queries.
async fn entry_stats(
    state: &AppState,
    playlist_ids: &[i32],
) -> Result<(HashMap<i32, i64>, HashMap<i32, i64>)> {
    if playlist_ids.is_empty() {
        return Ok((HashMap::new(), HashMap::new()));
    }

    let counts: Vec<(i32, i64)> = playlist_entries::Entity::find()
        .select_only()
        .column(playlist_entries::Column::PlaylistId)
        .column_as(playlist_entries::Column::Id.count(), "count")
        .filter(playlist_entries::Column::PlaylistId.is_in(playlist_ids.to_vec()))
        .group_by(playlist_entries::Column::PlaylistId)
        .into_tuple()
        .all(&state.db)
        .await?;

    let matched: Vec<(i32, i64)> = playlist_entries::Entity::find()
        .select_only()
        .column(playlist_entries::Column::PlaylistId)
        .column_as(playlist_entries::Column::Id.count(), "count")
        .filter(playlist_entries::Column::PlaylistId.is_in(playlist_ids.to_vec()))
        .filter(playlist_entries::Column::MatchStatus.eq(MatchStatus::Matched))
        .group_by(playlist_entries::Column::PlaylistId)
        .into_tuple()
        .all(&state.db)
        .await?;

    Ok((
        counts.into_iter().collect(),
        matched.into_iter().collect(),
    ))
}

fn to_response(
    playlist: playlists::Model,
    counts: &HashMap<i32, i64>,
    matched: &HashMap<i32, i64>,
) -> PlaylistResponse {
    let entry_count = counts.get(&playlist.id).copied().unwrap_or(0);
    let matched_count = matched.get(&playlist.id).copied().unwrap_or(0);

    let matched_percentage = if entry_count > 0 {
        (matched_count as f64 / entry_count as f64) * 100.0
    } else {
        0.0
    };

    PlaylistResponse {
        id: playlist.id,
        name: playlist.name,
        description: playlist.description,
        cover_art_url: playlist.cover_art_url,
        spotify_linked: playlist.spotify_id.is_some(),
        plex_linked: playlist.plex_rating_key.is_some(),
        is_enabled: playlist.is_enabled,
        entry_count,
        matched_count,
        matched_percentage,
        last_synced_at: playlist.last_synced_at.map(|dt| dt.to_rfc3339()),
    }
}
