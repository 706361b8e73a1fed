//! Database-level tests: schema relations, cascade behavior, and the
//! tasks that run purely against the local database (library scan and
//! entry matching).

use id3::TagLike;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use curator::db::entities::{
    jobs::{JobStatus, JobType},
    playlist_entries::{self, MatchStatus},
    playlists, tracks,
};
use curator::tasks::{library_scan, match_entries};
use curator::test_utils::*;

#[tokio::test]
async fn test_playlist_delete_cascades_entries() {
    let state = setup_test_app_state().await;

    let playlist = create_test_playlist(&state.db, "Doomed", None).await;
    create_test_request_entry(&state.db, playlist.id, 0, "Song", "Artist").await;
    create_test_request_entry(&state.db, playlist.id, 1, "Other", "Artist").await;

    playlists::Entity::delete_by_id(playlist.id)
        .exec(&state.db)
        .await
        .unwrap();

    let remaining = playlist_entries::Entity::find()
        .all(&state.db)
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn test_track_delete_nulls_entry_reference() {
    let state = setup_test_app_state().await;

    let artist = create_test_artist(&state.db, "Artist").await;
    let track = create_test_track(&state.db, artist.id, None, "Song", None).await;
    let playlist = create_test_playlist(&state.db, "Keeps Entry", None).await;
    let entry = create_test_track_entry(&state.db, playlist.id, track.id, 0).await;

    tracks::Entity::delete_by_id(track.id)
        .exec(&state.db)
        .await
        .unwrap();

    let entry = playlist_entries::Entity::find_by_id(entry.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.track_id, None);
}

#[tokio::test]
async fn test_artist_delete_cascades_tracks() {
    let state = setup_test_app_state().await;

    let artist = create_test_artist(&state.db, "Artist").await;
    let album = create_test_album(&state.db, artist.id, "Album").await;
    create_test_track(&state.db, artist.id, Some(album.id), "Song", None).await;

    curator::db::entities::artists::Entity::delete_by_id(artist.id)
        .exec(&state.db)
        .await
        .unwrap();

    let remaining = tracks::Entity::find().all(&state.db).await.unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn test_match_entries_task_resolves_requests() {
    let state = setup_test_app_state().await;

    // Local index
    let queen = create_test_artist(&state.db, "Queen").await;
    create_test_track(
        &state.db,
        queen.id,
        None,
        "Bohemian Rhapsody",
        Some("/music/queen/bohemian.mp3"),
    )
    .await;
    let beatles = create_test_artist(&state.db, "The Beatles").await;
    let yesterday = create_test_track(
        &state.db,
        beatles.id,
        None,
        "Yesterday",
        Some("/music/beatles/yesterday.mp3"),
    )
    .await;

    let playlist = create_test_playlist(&state.db, "Wanted", None).await;
    let hit =
        create_test_request_entry(&state.db, playlist.id, 0, "Yesterday", "Beatles").await;
    let miss =
        create_test_request_entry(&state.db, playlist.id, 1, "Smells Like Teen Spirit", "Nirvana")
            .await;

    let job = create_test_job(&state.db, JobType::MatchEntries, JobStatus::Running).await;

    match_entries::run_match_entries(state.clone(), job.id, playlist.id)
        .await
        .unwrap();

    let hit = playlist_entries::Entity::find_by_id(hit.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.match_status, MatchStatus::Matched);
    assert_eq!(hit.track_id, Some(yesterday.id));
    assert!(hit.match_score.unwrap() >= 90);

    let miss = playlist_entries::Entity::find_by_id(miss.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(miss.match_status, MatchStatus::NoMatch);
    assert_eq!(miss.track_id, None);
}

#[tokio::test]
async fn test_match_entries_ignores_resolved_entries() {
    let state = setup_test_app_state().await;

    let artist = create_test_artist(&state.db, "Queen").await;
    let track = create_test_track(
        &state.db,
        artist.id,
        None,
        "Under Pressure",
        Some("/music/queen/pressure.mp3"),
    )
    .await;

    let playlist = create_test_playlist(&state.db, "Mix", None).await;
    let resolved = create_test_track_entry(&state.db, playlist.id, track.id, 0).await;
    let job = create_test_job(&state.db, JobType::MatchEntries, JobStatus::Running).await;

    match_entries::run_match_entries(state.clone(), job.id, playlist.id)
        .await
        .unwrap();

    let unchanged = playlist_entries::Entity::find_by_id(resolved.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.match_status, MatchStatus::Matched);
}

fn write_tagged_mp3(dir: &std::path::Path, name: &str, title: &str, artist: &str, album: &str) {
    let path = dir.join(name);
    std::fs::File::create(&path).unwrap();

    let mut tag = id3::Tag::new();
    tag.set_title(title);
    tag.set_artist(artist);
    tag.set_album(album);
    tag.set_track(1);
    tag.write_to_path(&path, id3::Version::Id3v24).unwrap();
}

#[tokio::test]
async fn test_library_scan_indexes_and_prunes() {
    let state = setup_test_app_state().await;

    let dir = tempfile::tempdir().unwrap();
    let album_dir = dir.path().join("Queen").join("A Night at the Opera");
    std::fs::create_dir_all(&album_dir).unwrap();

    write_tagged_mp3(
        &album_dir,
        "01 - Bohemian Rhapsody.mp3",
        "Bohemian Rhapsody",
        "Queen",
        "A Night at the Opera",
    );
    write_tagged_mp3(
        &album_dir,
        "02 - Love of My Life.mp3",
        "Love of My Life",
        "Queen",
        "A Night at the Opera",
    );
    // Non-audio files are ignored
    std::fs::write(album_dir.join("cover.jpg"), b"not audio").unwrap();

    create_test_settings(&state.db, Some(dir.path().to_str().unwrap())).await;
    let job = create_test_job(&state.db, JobType::LibraryScan, JobStatus::Running).await;

    library_scan::run_library_scan(state.clone(), job.id)
        .await
        .unwrap();

    let indexed = tracks::Entity::find()
        .filter(tracks::Column::FilePath.is_not_null())
        .all(&state.db)
        .await
        .unwrap();
    assert_eq!(indexed.len(), 2);

    let titles: Vec<&str> = indexed.iter().map(|t| t.title.as_str()).collect();
    assert!(titles.contains(&"Bohemian Rhapsody"));
    assert!(titles.contains(&"Love of My Life"));

    let artists = curator::db::entities::artists::Entity::find()
        .all(&state.db)
        .await
        .unwrap();
    assert_eq!(artists.len(), 1);
    assert_eq!(artists[0].name, "Queen");

    // Remove one file and rescan: the vanished row is pruned.
    std::fs::remove_file(album_dir.join("02 - Love of My Life.mp3")).unwrap();

    let job2 = create_test_job(&state.db, JobType::LibraryScan, JobStatus::Running).await;
    library_scan::run_library_scan(state.clone(), job2.id)
        .await
        .unwrap();

    let indexed = tracks::Entity::find()
        .filter(tracks::Column::FilePath.is_not_null())
        .all(&state.db)
        .await
        .unwrap();
    assert_eq!(indexed.len(), 1);
    assert_eq!(indexed[0].title, "Bohemian Rhapsody");
}

#[tokio::test]
async fn test_library_scan_rescan_is_idempotent() {
    let state = setup_test_app_state().await;

    let dir = tempfile::tempdir().unwrap();
    let album_dir = dir.path().join("Artist").join("Album");
    std::fs::create_dir_all(&album_dir).unwrap();
    write_tagged_mp3(&album_dir, "song.mp3", "Song", "Artist", "Album");

    create_test_settings(&state.db, Some(dir.path().to_str().unwrap())).await;

    for _ in 0..2 {
        let job = create_test_job(&state.db, JobType::LibraryScan, JobStatus::Running).await;
        library_scan::run_library_scan(state.clone(), job.id)
            .await
            .unwrap();
    }

    let indexed = tracks::Entity::find().all(&state.db).await.unwrap();
    assert_eq!(indexed.len(), 1);

    let artists = curator::db::entities::artists::Entity::find()
        .all(&state.db)
        .await
        .unwrap();
    assert_eq!(artists.len(), 1);
}
