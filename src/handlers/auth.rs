use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use chrono::{Duration, Utc};
use redis::AsyncCommands;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};

use crate::{
    db::entities::{user_settings, UserSettings},
    error::{AppError, Result},
    services::{CacheService, SpotifyService},
    state::AppState,
};

const STATE_TTL_SECONDS: usize = 600;

#[derive(Serialize)]
pub struct AuthorizeResponse {
    pub url: String,
}

#[derive(Serialize)]
pub struct SpotifyStatus {
    pub connected: bool,
    pub needs_reauth: bool,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

/// Start the PKCE flow: hand the SPA the authorization URL and stash the
/// verifier under the state token.
pub async fn authorize(State(state): State<AppState>) -> Result<Json<AuthorizeResponse>> {
    let spotify_service = SpotifyService::new(
        state.config.spotify_client_id.clone(),
        state.config.spotify_redirect_uri.clone(),
    );

    let auth_url = spotify_service.generate_authorization_url()?;
    store_verifier(&state, &auth_url.state, &auth_url.code_verifier).await?;

    Ok(Json(AuthorizeResponse { url: auth_url.url }))
}

/// Spotify redirects here with the code; exchange it and persist tokens.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackQuery>,
) -> Result<Redirect> {
    let code_verifier = take_verifier(&state, &params.state)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid or expired state".to_string()))?;

    let spotify_service = SpotifyService::new(
        state.config.spotify_client_id.clone(),
        state.config.spotify_redirect_uri.clone(),
    );

    let token_response = spotify_service
        .exchange_code(&params.code, &code_verifier)
        .await?;

    let expires_at = Utc::now() + Duration::seconds(token_response.expires_in);

    let existing = UserSettings::find().one(&state.db).await?;

    if let Some(existing_settings) = existing {
        let mut active: user_settings::ActiveModel = existing_settings.into();
        active.spotify_access_token = Set(Some(token_response.access_token));
        if let Some(refresh) = token_response.refresh_token {
            active.spotify_refresh_token = Set(Some(refresh));
        }
        active.spotify_token_expires_at = Set(Some(expires_at.into()));
        active.updated_at = Set(Utc::now().into());
        active.update(&state.db).await?;
    } else {
        let now = Utc::now();
        let new_settings = user_settings::ActiveModel {
            spotify_access_token: Set(Some(token_response.access_token)),
            spotify_refresh_token: Set(token_response.refresh_token),
            spotify_token_expires_at: Set(Some(expires_at.into())),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        new_settings.insert(&state.db).await?;
    }

    Ok(Redirect::to("/settings"))
}

/// Check Spotify connection status and attempt token refresh if needed
pub async fn spotify_status(State(state): State<AppState>) -> Result<Json<SpotifyStatus>> {
    let settings = UserSettings::find().one(&state.db).await?;

    let Some(settings) = settings else {
        return Ok(Json(SpotifyStatus {
            connected: false,
            needs_reauth: true,
        }));
    };

    if settings.spotify_access_token.is_none() {
        return Ok(Json(SpotifyStatus {
            connected: false,
            needs_reauth: true,
        }));
    }

    let is_expired = settings
        .spotify_token_expires_at
        .map(|exp| Utc::now() + Duration::minutes(5) >= exp.to_utc())
        .unwrap_or(true);

    if !is_expired {
        return Ok(Json(SpotifyStatus {
            connected: true,
            needs_reauth: false,
        }));
    }

    let Some(refresh_token) = settings.spotify_refresh_token.clone() else {
        return Ok(Json(SpotifyStatus {
            connected: false,
            needs_reauth: true,
        }));
    };

    let spotify_service = SpotifyService::new(
        state.config.spotify_client_id.clone(),
        state.config.spotify_redirect_uri.clone(),
    );

    match spotify_service.refresh_token(&refresh_token).await {
        Ok(token_response) => {
            let expires_at = Utc::now() + Duration::seconds(token_response.expires_in);
            let mut active: user_settings::ActiveModel = settings.into();
            active.spotify_access_token = Set(Some(token_response.access_token));
            if let Some(new_refresh) = token_response.refresh_token {
                active.spotify_refresh_token = Set(Some(new_refresh));
            }
            active.spotify_token_expires_at = Set(Some(expires_at.into()));
            active.updated_at = Set(Utc::now().into());
            active.update(&state.db).await?;

            Ok(Json(SpotifyStatus {
                connected: true,
                needs_reauth: false,
            }))
        }
        Err(_) => Ok(Json(SpotifyStatus {
            connected: false,
            needs_reauth: true,
        })),
    }
}

/// Store the PKCE verifier: Redis when available, otherwise the settings
/// row (single-user deployment, one in-flight authorization).
async fn store_verifier(state: &AppState, auth_state: &str, verifier: &str) -> Result<()> {
    if let Some(redis) = &state.redis {
        let mut conn = redis.clone();
        let _: () = conn
            .set_ex(
                CacheService::spotify_state_key(auth_state),
                verifier,
                STATE_TTL_SECONDS as u64,
            )
            .await?;
        return Ok(());
    }

    let existing = UserSettings::find().one(&state.db).await?;
    let slot = format!("{}:{}", auth_state, verifier);

    if let Some(settings) = existing {
        let mut active: user_settings::ActiveModel = settings.into();
        active.spotify_auth_state = Set(Some(slot));
        active.updated_at = Set(Utc::now().into());
        active.update(&state.db).await?;
    } else {
        let now = Utc::now();
        user_settings::ActiveModel {
            spotify_auth_state: Set(Some(slot)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(&state.db)
        .await?;
    }

    Ok(())
}

/// Fetch and invalidate the stored verifier for a state token.
async fn take_verifier(state: &AppState, auth_state: &str) -> Result<Option<String>> {
    if let Some(redis) = &state.redis {
        let key = CacheService::spotify_state_key(auth_state);
        let mut conn = redis.clone();
        let verifier: Option<String> = conn.get(&key).await?;
        if verifier.is_some() {
            let _: () = conn.del(&key).await?;
        }
        return Ok(verifier);
    }

    let Some(settings) = UserSettings::find().one(&state.db).await? else {
        return Ok(None);
    };

    let Some(slot) = settings.spotify_auth_state.clone() else {
        return Ok(None);
    };

    let verifier = slot
        .split_once(':')
        .filter(|(stored_state, _)| *stored_state == auth_state)
        .map(|(_, verifier)| verifier.to_string());

    let mut active: user_settings::ActiveModel = settings.into();
    active.spotify_auth_state = Set(None);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.db).await?;

    Ok(verifier)
}
