pub use sea_orm_migration::prelude::*;

mod m20240115_000001_create_artists_table;
mod m20240115_000002_create_albums_table;
mod m20240115_000003_create_tracks_table;
mod m20240115_000004_create_playlists_table;
mod m20240115_000005_create_playlist_entries_table;
mod m20240115_000006_create_user_settings_table;
mod m20240115_000007_create_jobs_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240115_000001_create_artists_table::Migration),
            Box::new(m20240115_000002_create_albums_table::Migration),
            Box::new(m20240115_000003_create_tracks_table::Migration),
            Box::new(m20240115_000004_create_playlists_table::Migration),
            Box::new(m20240115_000005_create_playlist_entries_table::Migration),
            Box::new(m20240115_000006_create_user_settings_table::Migration),
            Box::new(m20240115_000007_create_jobs_table::Migration),
        ]
    }
}
