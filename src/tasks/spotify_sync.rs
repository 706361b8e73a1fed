use anyhow::Result;
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::{
    db::entities::{
        playlist_entries::{self, EntryKind, MatchStatus},
        playlists, tracks, user_settings, UserSettings,
    },
    jobs::update_progress,
    services::matching::{self, TrackInfo},
    services::spotify::{SpotifyService, SpotifyTrack},
    state::AppState,
    tasks::{load_local_index, LocalTrack},
};

/// Pull one playlist (or every enabled Spotify-linked playlist) from
/// Spotify and reconcile its entries against the remote track list.
pub async fn run_spotify_sync(state: AppState, job_id: i32, playlist_id: Option<i32>) -> Result<()> {
    tracing::info!("Starting Spotify sync job");

    let access_token = ensure_access_token(&state).await?;
    let spotify = SpotifyService::new(
        state.config.spotify_client_id.clone(),
        state.config.spotify_redirect_uri.clone(),
    );

    let targets = match playlist_id {
        Some(id) => {
            let playlist = playlists::Entity::find_by_id(id)
                .one(&state.db)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Playlist not found: {}", id))?;
            if playlist.spotify_id.is_none() {
                anyhow::bail!("Playlist {} is not linked to Spotify", id);
            }
            vec![playlist]
        }
        None => {
            playlists::Entity::find()
                .filter(playlists::Column::IsEnabled.eq(true))
                .filter(playlists::Column::SpotifyId.is_not_null())
                .all(&state.db)
                .await?
        }
    };

    let mut index = load_local_index(&state.db).await?;

    for playlist in targets {
        if let Err(e) = sync_playlist(&state, &spotify, &access_token, &playlist, &mut index, job_id).await
        {
            tracing::error!("Sync failed for playlist {}: {}", playlist.id, e);
            if playlist_id.is_some() {
                return Err(e);
            }
        }
    }

    tracing::info!("Spotify sync completed");
    Ok(())
}

/// Current access token, refreshed and persisted when close to expiry.
pub async fn ensure_access_token(state: &AppState) -> Result<String> {
    let settings = UserSettings::find()
        .one(&state.db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No user settings found"))?;

    let access_token = settings
        .spotify_access_token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Spotify not connected"))?;

    let expiring = settings
        .spotify_token_expires_at
        .map(|exp| Utc::now() + Duration::minutes(5) >= exp.to_utc())
        .unwrap_or(false);

    if !expiring {
        return Ok(access_token);
    }

    let refresh_token = settings
        .spotify_refresh_token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Spotify token expired and no refresh token stored"))?;

    let spotify = SpotifyService::new(
        state.config.spotify_client_id.clone(),
        state.config.spotify_redirect_uri.clone(),
    );

    let token_response = spotify.refresh_token(&refresh_token).await?;
    let expires_at = Utc::now() + Duration::seconds(token_response.expires_in);

    let mut active: user_settings::ActiveModel = settings.into();
    active.spotify_access_token = Set(Some(token_response.access_token.clone()));
    if let Some(new_refresh) = token_response.refresh_token {
        active.spotify_refresh_token = Set(Some(new_refresh));
    }
    active.spotify_token_expires_at = Set(Some(expires_at.into()));
    active.updated_at = Set(Utc::now().into());
    active.update(&state.db).await?;

    Ok(token_response.access_token)
}

async fn sync_playlist(
    state: &AppState,
    spotify: &SpotifyService,
    access_token: &str,
    playlist: &playlists::Model,
    index: &mut Vec<LocalTrack>,
    job_id: i32,
) -> Result<()> {
    let spotify_id = playlist
        .spotify_id
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Playlist {} is not linked to Spotify", playlist.id))?;

    let remote = spotify.fetch_playlist(access_token, spotify_id).await?;

    if playlist.snapshot_id.as_deref() == Some(remote.snapshot_id.as_str()) {
        tracing::debug!("Playlist {} unchanged (snapshot match)", playlist.id);
        touch_synced(state, playlist, None).await?;
        return Ok(());
    }

    let remote_tracks = spotify.fetch_playlist_tracks(access_token, spotify_id).await?;
    let total = remote_tracks.len() as i32;
    update_progress(&state.db, job_id, 0, total).await?;

    reconcile_entries(state, playlist, &remote_tracks, index, job_id, total).await?;

    let cover = remote.images.first().map(|i| i.url.clone());
    touch_synced(state, playlist, Some((remote.snapshot_id, cover))).await?;

    tracing::info!("Synced playlist {} ({} remote tracks)", playlist.id, total);
    Ok(())
}

/// Remote order wins for Spotify-linked entries; entries with no remote
/// counterpart are preserved after the remote block unless they point at
/// a Spotify-derived track that vanished remotely.
async fn reconcile_entries(
    state: &AppState,
    playlist: &playlists::Model,
    remote_tracks: &[crate::services::spotify::SpotifyPlaylistTrack],
    index: &mut Vec<LocalTrack>,
    job_id: i32,
    total: i32,
) -> Result<()> {
    let existing = playlist_entries::Entity::find()
        .filter(playlist_entries::Column::PlaylistId.eq(playlist.id))
        .order_by_asc(playlist_entries::Column::Position)
        .all(&state.db)
        .await?;

    let mut by_track: HashMap<i32, VecDeque<playlist_entries::Model>> = HashMap::new();
    let mut by_request: HashMap<(String, String), VecDeque<playlist_entries::Model>> =
        HashMap::new();
    for entry in &existing {
        match entry.kind {
            EntryKind::Track | EntryKind::Request if entry.track_id.is_some() => {
                by_track
                    .entry(entry.track_id.unwrap())
                    .or_default()
                    .push_back(entry.clone());
            }
            EntryKind::Request => {
                let key = (
                    matching::normalize(entry.requested_title.as_deref().unwrap_or_default()),
                    matching::normalize(entry.requested_artist.as_deref().unwrap_or_default()),
                );
                by_request.entry(key).or_default().push_back(entry.clone());
            }
            _ => {}
        }
    }

    let mut claimed: HashSet<i32> = HashSet::new();
    let now = Utc::now();
    let mut position = 0i32;

    for (i, item) in remote_tracks.iter().enumerate() {
        let Some(track) = &item.track else {
            continue; // unavailable/removed market entries
        };

        let resolution = resolve_remote_track(state, track, index).await?;
        let added_at = item
            .added_at
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok());

        // Claim an existing entry for this remote item if one exists.
        let claimable = match &resolution {
            Resolution::Local { track_id, .. } => by_track
                .get_mut(track_id)
                .and_then(|queue| queue.pop_front()),
            Resolution::Unmatched => {
                let artist = track.artists.first().map(|a| a.name.as_str()).unwrap_or("");
                by_request
                    .get_mut(&(
                        matching::normalize(&track.name),
                        matching::normalize(artist),
                    ))
                    .and_then(|queue| queue.pop_front())
            }
        };

        match claimable {
            Some(entry) => {
                claimed.insert(entry.id);
                let mut active: playlist_entries::ActiveModel = entry.into();
                active.position = Set(position);
                if let Some(added) = added_at {
                    active.added_at = Set(Some(added));
                }
                active.updated_at = Set(now.into());
                active.update(&state.db).await?;
            }
            None => {
                insert_remote_entry(state, playlist.id, position, track, &resolution, added_at)
                    .await?;
            }
        }

        position += 1;
        update_progress(&state.db, job_id, (i + 1) as i32, total).await?;
    }

    // Leftovers: keep local-only entries in order, drop entries whose
    // Spotify-derived track vanished from the remote list.
    let spotify_backed: HashSet<i32> = index
        .iter()
        .filter(|l| l.spotify_id.is_some())
        .map(|l| l.track_id)
        .collect();

    for entry in existing {
        if claimed.contains(&entry.id) {
            continue;
        }

        let vanished_remote = entry.kind == EntryKind::Track
            && entry.track_id.map(|id| spotify_backed.contains(&id)).unwrap_or(false);

        if vanished_remote {
            playlist_entries::Entity::delete_by_id(entry.id)
                .exec(&state.db)
                .await?;
            continue;
        }

        let mut active: playlist_entries::ActiveModel = entry.into();
        active.position = Set(position);
        active.updated_at = Set(now.into());
        active.update(&state.db).await?;
        position += 1;
    }

    Ok(())
}

enum Resolution {
    Local { track_id: i32, score: i32, status: MatchStatus },
    Unmatched,
}

/// Find the local track for a remote one: exact Spotify id linkage first,
/// then the heuristic matcher. A fresh auto-match persists the Spotify id
/// onto the local track row.
async fn resolve_remote_track(
    state: &AppState,
    track: &SpotifyTrack,
    index: &mut Vec<LocalTrack>,
) -> Result<Resolution> {
    if let Some(remote_id) = &track.id {
        if let Some(local) = index.iter().find(|l| l.spotify_id.as_ref() == Some(remote_id)) {
            return Ok(Resolution::Local {
                track_id: local.track_id,
                score: 100,
                status: MatchStatus::Matched,
            });
        }
    }

    let artist = track
        .artists
        .first()
        .map(|a| a.name.clone())
        .unwrap_or_default();
    let wanted = TrackInfo {
        title: track.name.clone(),
        artist,
        album: Some(track.album.name.clone()),
        duration_ms: Some(track.duration_ms),
    };

    let best = matching::find_best_match(
        &wanted,
        index.iter().map(|local| (local, local.info.clone())),
    )
    .map(|(local, verdict)| (local.track_id, verdict));

    match best {
        Some((track_id, verdict)) if verdict.status == MatchStatus::Matched => {
            if let Some(remote_id) = &track.id {
                link_spotify_id(state, track_id, remote_id, index).await?;
            }
            Ok(Resolution::Local {
                track_id,
                score: verdict.score,
                status: MatchStatus::Matched,
            })
        }
        Some((track_id, verdict)) => Ok(Resolution::Local {
            track_id,
            score: verdict.score,
            status: verdict.status,
        }),
        None => Ok(Resolution::Unmatched),
    }
}

async fn link_spotify_id(
    state: &AppState,
    track_id: i32,
    spotify_id: &str,
    index: &mut [LocalTrack],
) -> Result<()> {
    if let Some(track) = tracks::Entity::find_by_id(track_id).one(&state.db).await? {
        if track.spotify_id.is_none() {
            let mut active: tracks::ActiveModel = track.into();
            active.spotify_id = Set(Some(spotify_id.to_string()));
            active.updated_at = Set(Utc::now().into());
            active.update(&state.db).await?;
        }
    }

    if let Some(local) = index.iter_mut().find(|l| l.track_id == track_id) {
        local.spotify_id = Some(spotify_id.to_string());
    }

    Ok(())
}

async fn insert_remote_entry(
    state: &AppState,
    playlist_id: i32,
    position: i32,
    track: &SpotifyTrack,
    resolution: &Resolution,
    added_at: Option<chrono::DateTime<chrono::FixedOffset>>,
) -> Result<()> {
    let now = Utc::now();
    let artist = track
        .artists
        .first()
        .map(|a| a.name.clone())
        .unwrap_or_default();

    let entry = match resolution {
        Resolution::Local {
            track_id,
            score,
            status: MatchStatus::Matched,
        } => playlist_entries::ActiveModel {
            playlist_id: Set(playlist_id),
            position: Set(position),
            kind: Set(EntryKind::Track),
            track_id: Set(Some(*track_id)),
            match_status: Set(MatchStatus::Matched),
            match_score: Set(Some(*score)),
            added_at: Set(added_at),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        },
        Resolution::Local {
            track_id,
            score,
            status,
        } => playlist_entries::ActiveModel {
            playlist_id: Set(playlist_id),
            position: Set(position),
            kind: Set(EntryKind::Request),
            track_id: Set(Some(*track_id)),
            requested_title: Set(Some(track.name.clone())),
            requested_artist: Set(Some(artist)),
            requested_album: Set(Some(track.album.name.clone())),
            match_status: Set(*status),
            match_score: Set(Some(*score)),
            added_at: Set(added_at),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        },
        Resolution::Unmatched => playlist_entries::ActiveModel {
            playlist_id: Set(playlist_id),
            position: Set(position),
            kind: Set(EntryKind::Request),
            requested_title: Set(Some(track.name.clone())),
            requested_artist: Set(Some(artist)),
            requested_album: Set(Some(track.album.name.clone())),
            match_status: Set(MatchStatus::NoMatch),
            added_at: Set(added_at),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        },
    };

    entry.insert(&state.db).await?;
    Ok(())
}

async fn touch_synced(
    state: &AppState,
    playlist: &playlists::Model,
    update: Option<(String, Option<String>)>,
) -> Result<()> {
    let mut active: playlists::ActiveModel = playlist.clone().into();

    if let Some((snapshot_id, cover)) = update {
        active.snapshot_id = Set(Some(snapshot_id));
        if playlist.cover_art_url.is_none() {
            active.cover_art_url = Set(cover);
        }
    }

    active.last_synced_at = Set(Some(Utc::now().into()));
    active.updated_at = Set(Utc::now().into());
    active.update(&state.db).await?;
    Ok(())
}
