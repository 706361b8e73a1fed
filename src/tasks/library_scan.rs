use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set,
};
use id3::TagLike;
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

use crate::{
    db::entities::{albums, artists, tracks, UserSettings},
    jobs::update_progress,
    state::AppState,
};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "ogg", "wav"];

/// Metadata extracted from one audio file.
#[derive(Debug)]
struct ScannedFile {
    path: String,
    title: String,
    artist: String,
    album: Option<String>,
    track_number: Option<i32>,
    disc_number: Option<i32>,
    duration_ms: Option<i32>,
}

/// Walk the music folder, upsert artist/album/track rows keyed by file
/// path, and prune index rows whose files are gone.
pub async fn run_library_scan(state: AppState, job_id: i32) -> Result<()> {
    let music_path = resolve_music_folder(&state).await?;
    tracing::info!("Starting library scan: {:?}", music_path);

    let files = collect_audio_files(&music_path);
    let total = files.len() as i32;
    update_progress(&state.db, job_id, 0, total).await?;

    let mut seen_paths: HashSet<String> = HashSet::with_capacity(files.len());
    let mut processed = 0i32;

    for path in files {
        let scanned = read_metadata(&path);
        seen_paths.insert(scanned.path.clone());

        if let Err(e) = upsert_track(&state, &scanned).await {
            tracing::warn!("Skipping {:?}: {}", path, e);
        }

        processed += 1;
        if processed % 50 == 0 {
            update_progress(&state.db, job_id, processed, total).await?;
        }
    }

    update_progress(&state.db, job_id, processed, total).await?;

    prune_missing(&state, &seen_paths).await?;

    tracing::info!("Library scan completed: {} files indexed", processed);
    Ok(())
}

async fn resolve_music_folder(state: &AppState) -> Result<std::path::PathBuf> {
    let settings = UserSettings::find().one(&state.db).await?;

    let configured = settings
        .and_then(|s| s.music_folder_path)
        .or_else(|| state.config.music_folder_path.clone())
        .ok_or_else(|| anyhow::anyhow!("Music folder path not configured"))?;

    let path = std::path::PathBuf::from(configured);
    if !path.is_dir() {
        anyhow::bail!("Music folder does not exist: {:?}", path);
    }
    Ok(path)
}

fn collect_audio_files(root: &Path) -> Vec<std::path::PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect()
}

/// Read ID3 tags, falling back to path-derived metadata
/// (artist/album/title from the directory layout) for untagged files.
fn read_metadata(path: &Path) -> ScannedFile {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Unknown")
        .to_string();
    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|s| s.to_str())
        .map(str::to_string);
    let grandparent = path
        .parent()
        .and_then(|p| p.parent())
        .and_then(|p| p.file_name())
        .and_then(|s| s.to_str())
        .map(str::to_string);

    match id3::Tag::read_from_path(path) {
        Ok(tag) => ScannedFile {
            path: path.to_string_lossy().into_owned(),
            title: tag
                .title()
                .map(str::to_string)
                .filter(|t| !t.is_empty())
                .unwrap_or(stem),
            artist: tag
                .artist()
                .map(str::to_string)
                .filter(|a| !a.is_empty())
                .or(grandparent)
                .unwrap_or_else(|| "Unknown Artist".to_string()),
            album: tag.album().map(str::to_string).filter(|a| !a.is_empty()).or(parent),
            track_number: tag.track().map(|n| n as i32),
            disc_number: tag.disc().map(|n| n as i32),
            duration_ms: tag.duration().map(|secs| (secs * 1000) as i32),
        },
        Err(_) => ScannedFile {
            path: path.to_string_lossy().into_owned(),
            title: stem,
            artist: grandparent.unwrap_or_else(|| "Unknown Artist".to_string()),
            album: parent,
            track_number: None,
            disc_number: None,
            duration_ms: None,
        },
    }
}

async fn upsert_track(state: &AppState, scanned: &ScannedFile) -> Result<()> {
    let now = Utc::now();

    let artist = match artists::Entity::find()
        .filter(artists::Column::Name.eq(&scanned.artist))
        .one(&state.db)
        .await?
    {
        Some(existing) => existing,
        None => {
            artists::ActiveModel {
                name: Set(scanned.artist.clone()),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
                ..Default::default()
            }
            .insert(&state.db)
            .await?
        }
    };

    let album = match &scanned.album {
        Some(title) => {
            let existing = albums::Entity::find()
                .filter(albums::Column::ArtistId.eq(artist.id))
                .filter(albums::Column::Title.eq(title))
                .one(&state.db)
                .await?;

            Some(match existing {
                Some(album) => album,
                None => {
                    let local_path = Path::new(&scanned.path)
                        .parent()
                        .map(|p| p.to_string_lossy().into_owned());

                    albums::ActiveModel {
                        artist_id: Set(artist.id),
                        title: Set(title.clone()),
                        local_path: Set(local_path),
                        created_at: Set(now.into()),
                        updated_at: Set(now.into()),
                        ..Default::default()
                    }
                    .insert(&state.db)
                    .await?
                }
            })
        }
        None => None,
    };

    match tracks::Entity::find()
        .filter(tracks::Column::FilePath.eq(&scanned.path))
        .one(&state.db)
        .await?
    {
        Some(existing) => {
            let mut active: tracks::ActiveModel = existing.into();
            active.artist_id = Set(artist.id);
            active.album_id = Set(album.as_ref().map(|a| a.id));
            active.title = Set(scanned.title.clone());
            active.track_number = Set(scanned.track_number);
            active.disc_number = Set(scanned.disc_number);
            if scanned.duration_ms.is_some() {
                active.duration_ms = Set(scanned.duration_ms);
            }
            active.updated_at = Set(now.into());
            active.update(&state.db).await?;
        }
        None => {
            tracks::ActiveModel {
                artist_id: Set(artist.id),
                album_id: Set(album.as_ref().map(|a| a.id)),
                title: Set(scanned.title.clone()),
                track_number: Set(scanned.track_number),
                disc_number: Set(scanned.disc_number),
                duration_ms: Set(scanned.duration_ms),
                file_path: Set(Some(scanned.path.clone())),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
                ..Default::default()
            }
            .insert(&state.db)
            .await?;
        }
    }

    Ok(())
}

/// Delete file-backed tracks whose files vanished, then albums and
/// artists left with nothing under them.
async fn prune_missing(state: &AppState, seen_paths: &HashSet<String>) -> Result<()> {
    let indexed = tracks::Entity::find()
        .filter(tracks::Column::FilePath.is_not_null())
        .all(&state.db)
        .await?;

    let mut removed = 0u64;
    for track in indexed {
        let Some(path) = &track.file_path else { continue };
        if !seen_paths.contains(path) {
            tracks::Entity::delete_by_id(track.id).exec(&state.db).await?;
            removed += 1;
        }
    }

    if removed > 0 {
        tracing::info!("Pruned {} tracks with missing files", removed);
    }

    // Albums that lost all their tracks; keep externally sourced rows.
    let albums_all = albums::Entity::find()
        .filter(albums::Column::LocalPath.is_not_null())
        .all(&state.db)
        .await?;

    for album in albums_all {
        let remaining = tracks::Entity::find()
            .filter(tracks::Column::AlbumId.eq(album.id))
            .one(&state.db)
            .await?;
        if remaining.is_none() {
            albums::Entity::delete_by_id(album.id).exec(&state.db).await?;
        }
    }

    // Artists with neither tracks nor albums left.
    for artist in artists::Entity::find().all(&state.db).await? {
        let has_tracks = tracks::Entity::find()
            .filter(tracks::Column::ArtistId.eq(artist.id))
            .one(&state.db)
            .await?
            .is_some();
        let has_albums = albums::Entity::find()
            .filter(albums::Column::ArtistId.eq(artist.id))
            .one(&state.db)
            .await?
            .is_some();
        if !has_tracks && !has_albums {
            artists::Entity::delete_by_id(artist.id)
                .exec(&state.db)
                .await?;
        }
    }

    Ok(())
}
