use axum::{
    extract::{Path, Query, State},
    Json,
};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::entities::{
        albums, artists, jobs,
        playlist_entries::{self, MatchStatus},
        playlists, tracks,
    },
    error::{AppError, Result},
    state::AppState,
};

#[derive(Deserialize)]
pub struct BrowseQuery {
    pub q: Option<String>,
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
pub struct TrackResponse {
    pub id: i32,
    pub title: String,
    pub artist_id: i32,
    pub artist_name: Option<String>,
    pub album_id: Option<i32>,
    pub track_number: Option<i32>,
    pub duration_ms: Option<i32>,
    pub has_file: bool,
    pub spotify_linked: bool,
    pub plex_linked: bool,
}

#[derive(Serialize)]
pub struct AlbumResponse {
    pub id: i32,
    pub title: String,
    pub artist_id: i32,
    pub artist_name: Option<String>,
    pub year: Option<i32>,
    pub cover_art_url: Option<String>,
    pub has_files: bool,
}

#[derive(Serialize)]
pub struct ArtistResponse {
    pub id: i32,
    pub name: String,
    pub spotify_linked: bool,
}

#[derive(Serialize)]
pub struct ArtistDetailResponse {
    pub artist: ArtistResponse,
    pub albums: Vec<AlbumResponse>,
}

#[derive(Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    pub total_items: u64,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub artists: u64,
    pub albums: u64,
    pub tracks: u64,
    pub indexed_tracks: u64,
    pub playlists: u64,
    pub entries: u64,
    pub matched_entries: u64,
    pub active_jobs: u64,
}

/// Browse/search the track index
pub async fn list_tracks(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<PaginatedResponse<TrackResponse>>> {
    let page = query.page.max(1);
    let page_size = query.page_size.clamp(1, 200);

    let mut select = tracks::Entity::find().find_also_related(artists::Entity);

    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(tracks::Column::Title.contains(q))
                .add(artists::Column::Name.contains(q)),
        );
    }

    let total_items = select.clone().count(&state.db).await?;

    let rows = select
        .order_by_asc(tracks::Column::Title)
        .offset((page - 1) * page_size)
        .limit(page_size)
        .all(&state.db)
        .await?;

    let items = rows
        .into_iter()
        .map(|(track, artist)| TrackResponse {
            id: track.id,
            title: track.title,
            artist_id: track.artist_id,
            artist_name: artist.map(|a| a.name),
            album_id: track.album_id,
            track_number: track.track_number,
            duration_ms: track.duration_ms,
            has_file: track.file_path.is_some(),
            spotify_linked: track.spotify_id.is_some(),
            plex_linked: track.plex_rating_key.is_some(),
        })
        .collect();

    Ok(Json(PaginatedResponse {
        items,
        page,
        page_size,
        total_items,
    }))
}

/// Browse/search albums
pub async fn list_albums(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<PaginatedResponse<AlbumResponse>>> {
    let page = query.page.max(1);
    let page_size = query.page_size.clamp(1, 200);

    let mut select = albums::Entity::find().find_also_related(artists::Entity);

    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(albums::Column::Title.contains(q))
                .add(artists::Column::Name.contains(q)),
        );
    }

    let total_items = select.clone().count(&state.db).await?;

    let rows = select
        .order_by_asc(albums::Column::Title)
        .offset((page - 1) * page_size)
        .limit(page_size)
        .all(&state.db)
        .await?;

    let items = rows
        .into_iter()
        .map(|(album, artist)| to_album_response(album, artist.map(|a| a.name)))
        .collect();

    Ok(Json(PaginatedResponse {
        items,
        page,
        page_size,
        total_items,
    }))
}

/// Browse/search artists
pub async fn list_artists(
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<PaginatedResponse<ArtistResponse>>> {
    let page = query.page.max(1);
    let page_size = query.page_size.clamp(1, 200);

    let mut select = artists::Entity::find();

    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        select = select.filter(artists::Column::Name.contains(q));
    }

    let total_items = select.clone().count(&state.db).await?;

    let rows = select
        .order_by_asc(artists::Column::Name)
        .offset((page - 1) * page_size)
        .limit(page_size)
        .all(&state.db)
        .await?;

    let items = rows
        .into_iter()
        .map(|artist| ArtistResponse {
            id: artist.id,
            name: artist.name,
            spotify_linked: artist.spotify_id.is_some(),
        })
        .collect();

    Ok(Json(PaginatedResponse {
        items,
        page,
        page_size,
        total_items,
    }))
}

/// One artist with their albums
pub async fn get_artist(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ArtistDetailResponse>> {
    let artist = artists::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Artist not found".to_string()))?;

    let albums = albums::Entity::find()
        .filter(albums::Column::ArtistId.eq(artist.id))
        .order_by_asc(albums::Column::Year)
        .all(&state.db)
        .await?;

    let artist_name = artist.name.clone();
    Ok(Json(ArtistDetailResponse {
        artist: ArtistResponse {
            id: artist.id,
            name: artist.name,
            spotify_linked: artist.spotify_id.is_some(),
        },
        albums: albums
            .into_iter()
            .map(|album| to_album_response(album, Some(artist_name.clone())))
            .collect(),
    }))
}

/// Library and playlist totals for the dashboard
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let artists = artists::Entity::find().count(&state.db).await?;
    let albums = albums::Entity::find().count(&state.db).await?;
    let tracks_total = tracks::Entity::find().count(&state.db).await?;
    let indexed_tracks = tracks::Entity::find()
        .filter(tracks::Column::FilePath.is_not_null())
        .count(&state.db)
        .await?;
    let playlists = playlists::Entity::find().count(&state.db).await?;
    let entries = playlist_entries::Entity::find().count(&state.db).await?;
    let matched_entries = playlist_entries::Entity::find()
        .filter(playlist_entries::Column::MatchStatus.eq(MatchStatus::Matched))
        .count(&state.db)
        .await?;
    let active_jobs = jobs::Entity::find()
        .filter(
            jobs::Column::Status.is_in([jobs::JobStatus::Pending, jobs::JobStatus::Running]),
        )
        .count(&state.db)
        .await?;

    Ok(Json(StatsResponse {
        artists,
        albums,
        tracks: tracks_total,
        indexed_tracks,
        playlists,
        entries,
        matched_entries,
        active_jobs,
    }))
}

fn to_album_response(album: albums::Model, artist_name: Option<String>) -> AlbumResponse {
    AlbumResponse {
        id: album.id,
        title: album.title,
        artist_id: album.artist_id,
        artist_name,
        year: album.year,
        cover_art_url: album.cover_art_url,
        has_files: album.local_path.is_some(),
    }
}
