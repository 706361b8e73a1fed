use axum::{
    extract::{Path, State},
    Json,
};
use sea_orm::{EntityTrait, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};

use crate::{
    db::entities::{
        jobs::{self, JobStatus, JobType},
        playlists,
    },
    error::{AppError, Result},
    state::AppState,
    tasks::enqueue_job,
};

#[derive(Serialize)]
pub struct JobResponse {
    pub id: i32,
    pub job_type: JobType,
    pub status: JobStatus,
    pub playlist_id: Option<i32>,
    pub progress: Option<i32>,
    pub processed_items: Option<i32>,
    pub total_items: Option<i32>,
    pub error_message: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct JobCreatedResponse {
    pub job_id: i32,
    pub status: JobStatus,
}

#[derive(Deserialize, Default)]
pub struct SuggestRequest {
    pub count: Option<u32>,
}

pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<JobResponse>>> {
    let jobs = jobs::Entity::find()
        .order_by_desc(jobs::Column::CreatedAt)
        .order_by_desc(jobs::Column::Id)
        .limit(50)
        .all(&state.db)
        .await?;

    Ok(Json(jobs.into_iter().map(to_response).collect()))
}

/// Status of one job; polled by the frontend's job panel
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<JobResponse>> {
    let job_record = jobs::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;

    Ok(Json(to_response(job_record)))
}

pub async fn trigger_library_scan(
    State(state): State<AppState>,
) -> Result<Json<JobCreatedResponse>> {
    let job = enqueue_job(&state, JobType::LibraryScan, None, None).await?;
    Ok(Json(created(job)))
}

/// Pull a playlist from Spotify
pub async fn trigger_playlist_sync(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<JobCreatedResponse>> {
    let playlist = require_playlist(&state, id).await?;

    if playlist.spotify_id.is_none() {
        return Err(AppError::Validation(
            "Playlist is not linked to Spotify".to_string(),
        ));
    }

    let job = enqueue_job(&state, JobType::SpotifySync, Some(id), None).await?;
    Ok(Json(created(job)))
}

/// Push a playlist to the Plex server
pub async fn trigger_plex_push(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<JobCreatedResponse>> {
    require_playlist(&state, id).await?;
    let job = enqueue_job(&state, JobType::PlexPush, Some(id), None).await?;
    Ok(Json(created(job)))
}

/// Match a playlist's requested entries against the local index
pub async fn trigger_match_entries(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<JobCreatedResponse>> {
    require_playlist(&state, id).await?;
    let job = enqueue_job(&state, JobType::MatchEntries, Some(id), None).await?;
    Ok(Json(created(job)))
}

/// Ask OpenAI for suggestions to append to a playlist
pub async fn trigger_openai_suggest(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    payload: Option<Json<SuggestRequest>>,
) -> Result<Json<JobCreatedResponse>> {
    require_playlist(&state, id).await?;

    let count = payload
        .and_then(|Json(p)| p.count)
        .map(|c| c.clamp(1, 50) as i32);

    let job = enqueue_job(&state, JobType::OpenaiSuggest, Some(id), count).await?;
    Ok(Json(created(job)))
}

/// Append Last.fm similar tracks to a playlist
pub async fn trigger_lastfm_similar(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<JobCreatedResponse>> {
    require_playlist(&state, id).await?;
    let job = enqueue_job(&state, JobType::LastfmSimilar, Some(id), None).await?;
    Ok(Json(created(job)))
}

async fn require_playlist(state: &AppState, id: i32) -> Result<playlists::Model> {
    playlists::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Playlist not found".to_string()))
}

fn created(job: jobs::Model) -> JobCreatedResponse {
    JobCreatedResponse {
        job_id: job.id,
        status: job.status,
    }
}

fn to_response(job: jobs::Model) -> JobResponse {
    JobResponse {
        id: job.id,
        job_type: job.job_type,
        status: job.status,
        playlist_id: job.playlist_id,
        progress: job.progress,
        processed_items: job.processed_items,
        total_items: job.total_items,
        error_message: job.error_message,
        started_at: job.started_at.map(|dt| dt.to_rfc3339()),
        completed_at: job.completed_at.map(|dt| dt.to_rfc3339()),
        created_at: job.created_at.to_rfc3339(),
    }
}
