use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use crate::{
    db::entities::playlist_entries::{self, EntryKind, MatchStatus},
    jobs::update_progress,
    services::matching::{self, TrackInfo},
    state::AppState,
    tasks::{load_local_index, LocalTrack},
};

/// Match a playlist's unresolved request entries against the local index.
pub async fn run_match_entries(state: AppState, job_id: i32, playlist_id: i32) -> Result<()> {
    tracing::info!("Starting entry matching for playlist {}", playlist_id);

    let entries = playlist_entries::Entity::find()
        .filter(playlist_entries::Column::PlaylistId.eq(playlist_id))
        .filter(playlist_entries::Column::Kind.eq(EntryKind::Request))
        .filter(
            playlist_entries::Column::MatchStatus
                .is_in([MatchStatus::Pending, MatchStatus::NoMatch]),
        )
        .all(&state.db)
        .await?;

    let total = entries.len() as i32;
    update_progress(&state.db, job_id, 0, total).await?;

    let index = load_local_index(&state.db).await?;
    let matched = match_request_entries(&state, entries, &index, job_id).await?;

    tracing::info!(
        "Entry matching completed for playlist {}: {} matched",
        playlist_id,
        matched
    );
    Ok(())
}

/// Run the matcher over a batch of request entries, persisting verdicts.
/// Returns the number of entries that auto-matched. Shared with the
/// suggestion tasks so fresh suggestions resolve in the same pass.
pub async fn match_request_entries(
    state: &AppState,
    entries: Vec<playlist_entries::Model>,
    index: &[LocalTrack],
    job_id: i32,
) -> Result<usize> {
    let total = entries.len() as i32;
    let mut matched_count = 0usize;

    for (i, entry) in entries.into_iter().enumerate() {
        let Some(title) = entry.requested_title.clone() else {
            tracing::warn!("Request entry {} has no title, skipping", entry.id);
            continue;
        };

        let wanted = TrackInfo {
            title,
            artist: entry.requested_artist.clone().unwrap_or_default(),
            album: entry.requested_album.clone(),
            duration_ms: None,
        };

        let best = matching::find_best_match(
            &wanted,
            index.iter().map(|local| (local, local.info.clone())),
        );

        let mut active: playlist_entries::ActiveModel = entry.into();
        match best {
            Some((local, verdict)) => {
                if verdict.status == MatchStatus::Matched {
                    matched_count += 1;
                }
                active.track_id = Set(Some(local.track_id));
                active.match_score = Set(Some(verdict.score));
                active.match_status = Set(verdict.status);
            }
            None => {
                active.match_status = Set(MatchStatus::NoMatch);
                active.match_score = Set(None);
            }
        }
        active.updated_at = Set(Utc::now().into());
        active.update(&state.db).await?;

        update_progress(&state.db, job_id, (i + 1) as i32, total).await?;
    }

    Ok(matched_count)
}
