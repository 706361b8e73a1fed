use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::{
    db::entities::{
        playlist_entries::{self, EntryKind},
        playlists, tracks, UserSettings,
    },
    jobs::update_progress,
    services::matching::{self, TrackInfo},
    services::plex::{PlexService, PlexTrack},
    state::AppState,
};

/// Push a playlist to the user's Plex server, resolving each entry to a
/// Plex rating key via the stored key or a section search + matcher.
pub async fn run_plex_push(state: AppState, job_id: i32, playlist_id: i32) -> Result<()> {
    tracing::info!("Starting Plex push for playlist {}", playlist_id);

    let settings = UserSettings::find()
        .one(&state.db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No user settings found"))?;

    let base_url = settings
        .plex_base_url
        .ok_or_else(|| anyhow::anyhow!("Plex base URL not configured"))?;
    let token = settings
        .plex_token
        .ok_or_else(|| anyhow::anyhow!("Plex token not configured"))?;

    let playlist = playlists::Entity::find_by_id(playlist_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Playlist not found: {}", playlist_id))?;

    let plex = PlexService::new();
    let identity = plex.identity(&base_url, &token).await?;

    let sections = plex.music_sections(&base_url, &token).await?;
    let section = sections
        .first()
        .ok_or_else(|| anyhow::anyhow!("Plex server has no music sections"))?;

    let entries = playlist_entries::Entity::find()
        .filter(playlist_entries::Column::PlaylistId.eq(playlist_id))
        .order_by_asc(playlist_entries::Column::Position)
        .all(&state.db)
        .await?;

    let total = entries.len() as i32;
    update_progress(&state.db, job_id, 0, total).await?;

    let mut rating_keys: Vec<String> = Vec::new();
    let mut skipped = 0usize;

    for (i, entry) in entries.iter().enumerate() {
        match resolve_entry_tracks(&state, entry).await? {
            Some(track_ids) => {
                for track_id in track_ids {
                    match resolve_rating_key(&state, &plex, &base_url, &token, &section.key, track_id)
                        .await
                    {
                        Ok(Some(key)) => rating_keys.push(key),
                        Ok(None) => {
                            skipped += 1;
                            tracing::debug!("No Plex match for track {}", track_id);
                        }
                        Err(e) => {
                            skipped += 1;
                            tracing::warn!("Plex resolution failed for track {}: {}", track_id, e);
                        }
                    }
                }
            }
            None => skipped += 1,
        }

        update_progress(&state.db, job_id, (i + 1) as i32, total).await?;
    }

    if rating_keys.is_empty() {
        anyhow::bail!("No entries could be resolved on the Plex server");
    }

    match &playlist.plex_rating_key {
        Some(existing_key) => {
            plex.replace_playlist_items(
                &base_url,
                &token,
                existing_key,
                &identity.machine_identifier,
                &rating_keys,
            )
            .await?;
        }
        None => {
            let new_key = plex
                .create_playlist(
                    &base_url,
                    &token,
                    &identity.machine_identifier,
                    &playlist.name,
                    &rating_keys,
                )
                .await?;

            let mut active: playlists::ActiveModel = playlist.clone().into();
            active.plex_rating_key = Set(Some(new_key));
            active.updated_at = Set(Utc::now().into());
            active.update(&state.db).await?;
        }
    }

    tracing::info!(
        "Plex push completed for playlist {}: {} items, {} skipped",
        playlist_id,
        rating_keys.len(),
        skipped
    );
    Ok(())
}

/// The local track ids an entry contributes: the linked track, a whole
/// album's tracks in order, or nothing for an unresolved request.
async fn resolve_entry_tracks(
    state: &AppState,
    entry: &playlist_entries::Model,
) -> Result<Option<Vec<i32>>> {
    match entry.kind {
        EntryKind::Track | EntryKind::Request => Ok(entry.track_id.map(|id| vec![id])),
        EntryKind::Album => {
            let Some(album_id) = entry.album_id else {
                return Ok(None);
            };
            let album_tracks = tracks::Entity::find()
                .filter(tracks::Column::AlbumId.eq(album_id))
                .order_by_asc(tracks::Column::DiscNumber)
                .order_by_asc(tracks::Column::TrackNumber)
                .all(&state.db)
                .await?;
            if album_tracks.is_empty() {
                return Ok(None);
            }
            Ok(Some(album_tracks.into_iter().map(|t| t.id).collect()))
        }
    }
}

/// Stored rating key, or a section search scored through the matcher.
/// Fresh matches are persisted on the track row.
async fn resolve_rating_key(
    state: &AppState,
    plex: &PlexService,
    base_url: &str,
    token: &str,
    section_key: &str,
    track_id: i32,
) -> Result<Option<String>> {
    let track = tracks::Entity::find_by_id(track_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Track not found: {}", track_id))?;

    if let Some(key) = &track.plex_rating_key {
        return Ok(Some(key.clone()));
    }

    let artist = crate::db::entities::artists::Entity::find_by_id(track.artist_id)
        .one(&state.db)
        .await?
        .map(|a| a.name)
        .unwrap_or_default();

    let candidates = plex
        .search_tracks(base_url, token, section_key, &track.title)
        .await?;

    let wanted = TrackInfo {
        title: track.title.clone(),
        artist,
        album: None,
        duration_ms: track.duration_ms,
    };

    let best = matching::find_best_match(
        &wanted,
        candidates.iter().map(|c| (c, plex_track_info(c))),
    );

    let Some((candidate, verdict)) = best else {
        return Ok(None);
    };

    if verdict.status != crate::db::entities::playlist_entries::MatchStatus::Matched {
        return Ok(None);
    }

    let key = candidate.rating_key.clone();
    let mut active: tracks::ActiveModel = track.into();
    active.plex_rating_key = Set(Some(key.clone()));
    active.updated_at = Set(Utc::now().into());
    active.update(&state.db).await?;

    Ok(Some(key))
}

fn plex_track_info(candidate: &PlexTrack) -> TrackInfo {
    TrackInfo {
        title: candidate.title.clone(),
        artist: candidate.artist.clone().unwrap_or_default(),
        album: candidate.album.clone(),
        duration_ms: candidate.duration.map(|d| d as i32),
    }
}
