use sea_orm_migration::prelude::*;

use super::m20240115_000002_create_albums_table::Albums;
use super::m20240115_000003_create_tracks_table::Tracks;
use super::m20240115_000004_create_playlists_table::Playlists;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PlaylistEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlaylistEntries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PlaylistEntries::PlaylistId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlaylistEntries::Position)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlaylistEntries::Kind)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PlaylistEntries::TrackId).integer())
                    .col(ColumnDef::new(PlaylistEntries::AlbumId).integer())
                    .col(ColumnDef::new(PlaylistEntries::RequestedTitle).string_len(500))
                    .col(ColumnDef::new(PlaylistEntries::RequestedArtist).string_len(500))
                    .col(ColumnDef::new(PlaylistEntries::RequestedAlbum).string_len(500))
                    .col(
                        ColumnDef::new(PlaylistEntries::MatchStatus)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(PlaylistEntries::MatchScore).integer())
                    .col(ColumnDef::new(PlaylistEntries::AddedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(PlaylistEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlaylistEntries::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_playlist_entries_playlist_id")
                            .from(PlaylistEntries::Table, PlaylistEntries::PlaylistId)
                            .to(Playlists::Table, Playlists::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_playlist_entries_track_id")
                            .from(PlaylistEntries::Table, PlaylistEntries::TrackId)
                            .to(Tracks::Table, Tracks::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_playlist_entries_album_id")
                            .from(PlaylistEntries::Table, PlaylistEntries::AlbumId)
                            .to(Albums::Table, Albums::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_playlist_entries_playlist_id")
                    .table(PlaylistEntries::Table)
                    .col(PlaylistEntries::PlaylistId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_playlist_entries_track_id")
                    .table(PlaylistEntries::Table)
                    .col(PlaylistEntries::TrackId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_playlist_entries_playlist_position")
                    .table(PlaylistEntries::Table)
                    .col(PlaylistEntries::PlaylistId)
                    .col(PlaylistEntries::Position)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PlaylistEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum PlaylistEntries {
    Table,
    Id,
    PlaylistId,
    Position,
    Kind,
    TrackId,
    AlbumId,
    RequestedTitle,
    RequestedArtist,
    RequestedAlbum,
    MatchStatus,
    MatchScore,
    AddedAt,
    CreatedAt,
    UpdatedAt,
}
