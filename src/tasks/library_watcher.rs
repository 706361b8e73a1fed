use anyhow::Result;
use notify_debouncer_full::{new_debouncer, notify::*, DebounceEventResult};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::db::entities::{jobs, UserSettings};
use crate::state::AppState;
use crate::tasks::enqueue_job;

/// Start the filesystem watcher for monitoring music directory changes
pub async fn start_watcher(state: AppState, music_path: PathBuf) -> Result<()> {
    tracing::info!("Starting music folder watcher for: {:?}", music_path);

    let (tx, mut rx) = mpsc::unbounded_channel();

    // 5-second debounce batches the event storm from a folder copy.
    let mut debouncer = new_debouncer(
        Duration::from_secs(5),
        None,
        move |result: DebounceEventResult| match result {
            Ok(events) => {
                for event in events {
                    if let Err(e) = tx.send(event) {
                        tracing::error!("Failed to send filesystem event: {}", e);
                    }
                }
            }
            Err(errors) => {
                for error in errors {
                    tracing::error!("Filesystem watch error: {:?}", error);
                }
            }
        },
    )?;

    debouncer
        .watcher()
        .watch(&music_path, RecursiveMode::Recursive)?;

    tracing::info!("Music folder watcher started");

    tokio::task::spawn(async move {
        // The debouncer must stay alive as long as events are consumed.
        let _debouncer = debouncer;

        while let Some(event) = rx.recv().await {
            tracing::debug!("Filesystem event: {:?}", event);

            if event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove() {
                if let Err(e) = enqueue_scan_if_idle(&state).await {
                    tracing::error!("Failed to enqueue scan after filesystem event: {}", e);
                }
            }
        }
    });

    Ok(())
}

/// Enqueue a library scan unless one is already pending or running.
async fn enqueue_scan_if_idle(state: &AppState) -> Result<()> {
    let active = jobs::Entity::find()
        .filter(jobs::Column::JobType.eq(jobs::JobType::LibraryScan))
        .filter(
            jobs::Column::Status
                .is_in([jobs::JobStatus::Pending, jobs::JobStatus::Running]),
        )
        .one(&state.db)
        .await?;

    if active.is_some() {
        tracing::debug!("Library scan already queued, skipping");
        return Ok(());
    }

    tracing::info!("Filesystem changes detected, triggering library scan");
    enqueue_job(state, jobs::JobType::LibraryScan, None, None).await?;
    Ok(())
}

/// Initialize the filesystem watcher if a music folder is configured
pub async fn init_watcher_if_configured(state: AppState) -> Result<()> {
    let configured = match UserSettings::find().one(&state.db).await? {
        Some(settings) => settings
            .music_folder_path
            .or_else(|| state.config.music_folder_path.clone()),
        None => state.config.music_folder_path.clone(),
    };

    match configured {
        Some(music_path) => {
            let path = PathBuf::from(music_path);
            if path.is_dir() {
                start_watcher(state, path).await?;
            } else {
                tracing::warn!("Music folder configured but doesn't exist: {:?}", path);
            }
        }
        None => {
            tracing::info!("No music folder configured, watcher not started");
        }
    }

    Ok(())
}
