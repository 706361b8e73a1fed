use axum::{extract::State, Json};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};

use crate::{
    db::entities::{user_settings, UserSettings},
    error::{AppError, Result},
    services::{LastfmService, PlexService},
    state::AppState,
};

/// Secrets are reported as booleans, never echoed back.
#[derive(Serialize)]
pub struct SettingsResponse {
    pub music_folder_path: Option<String>,
    pub auto_sync_enabled: Option<bool>,
    pub sync_interval_hours: Option<i32>,
    pub spotify_connected: bool,
    pub plex_base_url: Option<String>,
    pub plex_configured: bool,
    pub lastfm_username: Option<String>,
    pub lastfm_configured: bool,
    pub youtube_configured: bool,
    pub openai_model: Option<String>,
    pub openai_configured: bool,
}

#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub music_folder_path: Option<String>,
    pub auto_sync_enabled: Option<bool>,
    pub sync_interval_hours: Option<i32>,
    pub plex_base_url: Option<String>,
    pub plex_token: Option<String>,
    pub lastfm_api_key: Option<String>,
    pub lastfm_username: Option<String>,
    pub youtube_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
}

#[derive(Serialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: String,
}

pub async fn get_settings(State(state): State<AppState>) -> Result<Json<SettingsResponse>> {
    let settings = UserSettings::find()
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Settings not found".to_string()))?;

    Ok(Json(to_response(settings)))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>> {
    let existing = UserSettings::find().one(&state.db).await?;

    let settings = if let Some(existing_settings) = existing {
        let mut active: user_settings::ActiveModel = existing_settings.into();
        apply_update(&mut active, payload);
        active.updated_at = Set(Utc::now().into());
        active.update(&state.db).await?
    } else {
        let now = Utc::now();
        let mut active = user_settings::ActiveModel {
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        apply_update(&mut active, payload);
        active.insert(&state.db).await?
    };

    Ok(Json(to_response(settings)))
}

fn apply_update(active: &mut user_settings::ActiveModel, payload: UpdateSettingsRequest) {
    if let Some(path) = payload.music_folder_path {
        active.music_folder_path = Set(Some(path));
    }
    if let Some(enabled) = payload.auto_sync_enabled {
        active.auto_sync_enabled = Set(Some(enabled));
    }
    if let Some(interval) = payload.sync_interval_hours {
        active.sync_interval_hours = Set(Some(interval.max(1)));
    }
    if let Some(url) = payload.plex_base_url {
        active.plex_base_url = Set(Some(url));
    }
    if let Some(token) = payload.plex_token {
        active.plex_token = Set(Some(token));
    }
    if let Some(key) = payload.lastfm_api_key {
        active.lastfm_api_key = Set(Some(key));
    }
    if let Some(username) = payload.lastfm_username {
        active.lastfm_username = Set(Some(username));
    }
    if let Some(key) = payload.youtube_api_key {
        active.youtube_api_key = Set(Some(key));
    }
    if let Some(key) = payload.openai_api_key {
        active.openai_api_key = Set(Some(key));
    }
    if let Some(model) = payload.openai_model {
        active.openai_model = Set(Some(model));
    }
}

pub async fn test_plex_connection(
    State(state): State<AppState>,
) -> Result<Json<TestConnectionResponse>> {
    let settings = UserSettings::find()
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Configuration("Settings not configured".to_string()))?;

    let base_url = settings
        .plex_base_url
        .ok_or_else(|| AppError::Configuration("Plex base URL not configured".to_string()))?;
    let token = settings
        .plex_token
        .ok_or_else(|| AppError::Configuration("Plex token not configured".to_string()))?;

    match PlexService::new().test_connection(&base_url, &token).await {
        Ok(true) => Ok(Json(TestConnectionResponse {
            success: true,
            message: "Successfully connected to Plex".to_string(),
        })),
        Ok(false) => Ok(Json(TestConnectionResponse {
            success: false,
            message: "Failed to connect to Plex".to_string(),
        })),
        Err(e) => Ok(Json(TestConnectionResponse {
            success: false,
            message: format!("Connection error: {}", e),
        })),
    }
}

pub async fn test_lastfm_connection(
    State(state): State<AppState>,
) -> Result<Json<TestConnectionResponse>> {
    let settings = UserSettings::find()
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Configuration("Settings not configured".to_string()))?;

    let api_key = settings
        .lastfm_api_key
        .ok_or_else(|| AppError::Configuration("Last.fm API key not configured".to_string()))?;
    let username = settings
        .lastfm_username
        .ok_or_else(|| AppError::Configuration("Last.fm username not configured".to_string()))?;

    match LastfmService::new().test_connection(&api_key, &username).await {
        Ok(true) => Ok(Json(TestConnectionResponse {
            success: true,
            message: "Successfully connected to Last.fm".to_string(),
        })),
        Ok(false) => Ok(Json(TestConnectionResponse {
            success: false,
            message: "Failed to connect to Last.fm".to_string(),
        })),
        Err(e) => Ok(Json(TestConnectionResponse {
            success: false,
            message: format!("Connection error: {}", e),
        })),
    }
}

fn to_response(settings: user_settings::Model) -> SettingsResponse {
    SettingsResponse {
        music_folder_path: settings.music_folder_path,
        auto_sync_enabled: settings.auto_sync_enabled,
        sync_interval_hours: settings.sync_interval_hours,
        spotify_connected: settings.spotify_access_token.is_some(),
        plex_base_url: settings.plex_base_url.clone(),
        plex_configured: settings.plex_base_url.is_some() && settings.plex_token.is_some(),
        lastfm_username: settings.lastfm_username.clone(),
        lastfm_configured: settings.lastfm_api_key.is_some(),
        youtube_configured: settings.youtube_api_key.is_some(),
        openai_model: settings.openai_model.clone(),
        openai_configured: settings.openai_api_key.is_some(),
    }
}
