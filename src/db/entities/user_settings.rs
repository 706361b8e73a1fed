use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Single-row table holding runtime-mutable configuration: external
/// service credentials, the music folder path, and sync preferences.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub spotify_access_token: Option<String>,
    pub spotify_refresh_token: Option<String>,
    pub spotify_token_expires_at: Option<DateTimeWithTimeZone>,
    /// PKCE fallback slot: "state:verifier" when Redis is not configured.
    pub spotify_auth_state: Option<String>,
    pub plex_base_url: Option<String>,
    pub plex_token: Option<String>,
    pub lastfm_api_key: Option<String>,
    pub lastfm_username: Option<String>,
    pub youtube_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub music_folder_path: Option<String>,
    pub auto_sync_enabled: Option<bool>,
    pub sync_interval_hours: Option<i32>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
