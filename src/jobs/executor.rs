use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tokio::sync::mpsc;

use crate::{
    db::entities::jobs::{self, JobStatus, JobType},
    jobs::queue::JobMessage,
    state::AppState,
    tasks::{library_scan, match_entries, plex_push, spotify_sync, suggest},
};

/// Background job executor that processes jobs from the queue
pub struct JobExecutor {
    state: AppState,
    receiver: mpsc::UnboundedReceiver<JobMessage>,
}

impl JobExecutor {
    pub fn new(state: AppState, receiver: mpsc::UnboundedReceiver<JobMessage>) -> Self {
        Self { state, receiver }
    }

    /// Start the job executor loop
    pub async fn start(mut self) {
        tracing::info!("Job executor started");

        while let Some(message) = self.receiver.recv().await {
            tracing::info!("Processing job {} ({:?})", message.job_id, message.job_type);

            // Spawn each job in its own task to allow concurrent processing
            let state = self.state.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::execute_job(state, message).await {
                    tracing::error!("Job execution failed: {}", e);
                }
            });
        }

        tracing::warn!("Job executor stopped - queue closed");
    }

    /// Execute a single job
    async fn execute_job(state: AppState, message: JobMessage) -> Result<()> {
        let job_id = message.job_id;

        if let Err(e) = Self::update_job_status(
            &state,
            job_id,
            JobStatus::Running,
            None,
            Some(Utc::now().into()),
        )
        .await
        {
            tracing::error!("Failed to update job status to running: {}", e);
        }

        // Dispatch inside an async block so that a missing playlist id
        // also lands in the failed branch below instead of leaving the
        // row stuck in running.
        let result: Result<()> = async {
            match message.job_type {
                JobType::LibraryScan => library_scan::run_library_scan(state.clone(), job_id).await,

                JobType::SpotifySync => {
                    spotify_sync::run_spotify_sync(state.clone(), job_id, message.playlist_id).await
                }

                JobType::PlexPush => {
                    plex_push::run_plex_push(state.clone(), job_id, require_playlist(&message)?)
                        .await
                }

                JobType::MatchEntries => {
                    match_entries::run_match_entries(
                        state.clone(),
                        job_id,
                        require_playlist(&message)?,
                    )
                    .await
                }

                JobType::OpenaiSuggest => {
                    suggest::run_openai_suggest(state.clone(), job_id, require_playlist(&message)?)
                        .await
                }

                JobType::LastfmSimilar => {
                    suggest::run_lastfm_similar(state.clone(), job_id, require_playlist(&message)?)
                        .await
                }
            }
        }
        .await;

        match result {
            Ok(_) => {
                tracing::info!("Job {} completed successfully", job_id);
                Self::update_job_status(&state, job_id, JobStatus::Completed, None, None).await?;
            }
            Err(e) => {
                tracing::error!("Job {} failed: {}", job_id, e);
                Self::update_job_status(&state, job_id, JobStatus::Failed, Some(e.to_string()), None)
                    .await?;
            }
        }

        Ok(())
    }

    /// Update job status in database
    async fn update_job_status(
        state: &AppState,
        job_id: i32,
        status: JobStatus,
        error_message: Option<String>,
        started_at: Option<chrono::DateTime<chrono::FixedOffset>>,
    ) -> Result<()> {
        let job_record = jobs::Entity::find_by_id(job_id)
            .one(&state.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Job not found: {}", job_id))?;

        let mut active: jobs::ActiveModel = job_record.into();
        active.status = Set(status);

        if let Some(msg) = error_message {
            active.error_message = Set(Some(msg));
        }

        if let Some(start) = started_at {
            active.started_at = Set(Some(start));
        }

        if status == JobStatus::Completed || status == JobStatus::Failed {
            active.completed_at = Set(Some(Utc::now().into()));
        }

        active.updated_at = Set(Utc::now().into());
        active.update(&state.db).await?;
        Ok(())
    }
}

fn require_playlist(message: &JobMessage) -> Result<i32> {
    message
        .playlist_id
        .ok_or_else(|| anyhow::anyhow!("Job {:?} requires a playlist id", message.job_type))
}

/// Record item-level progress on a job row so the polling UI can render it.
pub async fn update_progress(
    db: &DatabaseConnection,
    job_id: i32,
    processed: i32,
    total: i32,
) -> Result<()> {
    let Some(job_record) = jobs::Entity::find_by_id(job_id).one(db).await? else {
        return Ok(());
    };

    let percent = if total > 0 {
        ((processed as f64 / total as f64) * 100.0) as i32
    } else {
        0
    };

    let mut active: jobs::ActiveModel = job_record.into();
    active.processed_items = Set(Some(processed));
    active.total_items = Set(Some(total));
    active.progress = Set(Some(percent.min(100)));
    active.updated_at = Set(Utc::now().into());
    active.update(db).await?;

    Ok(())
}
