use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use std::collections::HashMap;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::db::entities::{albums, artists, jobs, playlists, tracks, UserSettings};
use crate::jobs::JobMessage;
use crate::services::matching::TrackInfo;
use crate::state::AppState;

pub mod library_scan;
pub mod library_watcher;
pub mod match_entries;
pub mod plex_push;
pub mod spotify_sync;
pub mod suggest;

/// A locally indexed track projected for matching.
#[derive(Debug, Clone)]
pub struct LocalTrack {
    pub track_id: i32,
    pub spotify_id: Option<String>,
    pub plex_rating_key: Option<String>,
    pub info: TrackInfo,
}

/// Load every file-backed track with its artist and album names resolved,
/// ready to be fed to the matcher.
pub async fn load_local_index(db: &sea_orm::DatabaseConnection) -> Result<Vec<LocalTrack>> {
    let artist_names: HashMap<i32, String> = artists::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|a| (a.id, a.name))
        .collect();

    let album_titles: HashMap<i32, String> = albums::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|a| (a.id, a.title))
        .collect();

    let rows = tracks::Entity::find()
        .filter(tracks::Column::FilePath.is_not_null())
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|t| LocalTrack {
            track_id: t.id,
            spotify_id: t.spotify_id.clone(),
            plex_rating_key: t.plex_rating_key.clone(),
            info: TrackInfo {
                title: t.title,
                artist: artist_names.get(&t.artist_id).cloned().unwrap_or_default(),
                album: t.album_id.and_then(|id| album_titles.get(&id).cloned()),
                duration_ms: t.duration_ms,
            },
        })
        .collect())
}

/// Insert a pending job row and put it on the queue. `total_items` lets
/// triggers park a requested item count for the task to pick up.
pub async fn enqueue_job(
    state: &AppState,
    job_type: jobs::JobType,
    playlist_id: Option<i32>,
    total_items: Option<i32>,
) -> Result<jobs::Model> {
    let now = Utc::now();
    let job = jobs::ActiveModel {
        job_type: Set(job_type),
        status: Set(jobs::JobStatus::Pending),
        playlist_id: Set(playlist_id),
        total_items: Set(total_items),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    let job = job.insert(&state.db).await?;

    state.job_queue.submit(JobMessage {
        job_id: job.id,
        job_type,
        playlist_id,
    })?;

    Ok(job)
}

/// Start periodic work: the auto-sync interval job (when enabled in
/// settings) and the music folder watcher.
pub async fn start_scheduler(state: AppState) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let settings = UserSettings::find().one(&state.db).await?;

    let auto_sync = settings
        .as_ref()
        .and_then(|s| s.auto_sync_enabled)
        .unwrap_or(false);

    if auto_sync {
        let interval_hours = settings
            .as_ref()
            .and_then(|s| s.sync_interval_hours)
            .unwrap_or(12)
            .max(1) as u64;

        let sync_state = state.clone();
        let sync_job = Job::new_repeated_async(
            Duration::from_secs(interval_hours * 3600),
            move |_uuid, _lock| {
                let state = sync_state.clone();
                Box::pin(async move {
                    if let Err(e) = enqueue_scheduled_sync(&state).await {
                        tracing::error!("Scheduled sync failed to enqueue: {}", e);
                    }
                })
            },
        )?;
        scheduler.add(sync_job).await?;
        tracing::info!("Auto-sync scheduled every {} hours", interval_hours);
    }

    library_watcher::init_watcher_if_configured(state.clone()).await?;

    scheduler.start().await?;

    Ok(scheduler)
}

/// One sync job covering all enabled Spotify-linked playlists.
async fn enqueue_scheduled_sync(state: &AppState) -> Result<()> {
    let any_linked = playlists::Entity::find()
        .filter(playlists::Column::IsEnabled.eq(true))
        .filter(playlists::Column::SpotifyId.is_not_null())
        .one(&state.db)
        .await?
        .is_some();

    if !any_linked {
        tracing::debug!("No enabled Spotify-linked playlists, skipping scheduled sync");
        return Ok(());
    }

    enqueue_job(state, jobs::JobType::SpotifySync, None, None).await?;
    Ok(())
}
