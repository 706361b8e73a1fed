use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use governor::{
    clock::DefaultClock, state::direct::NotKeyed, state::InMemoryState, Quota, RateLimiter,
};
use nonzero_ext::nonzero;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::{AppError, Result};

const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

#[derive(Clone)]
pub struct SpotifyService {
    client: Client,
    client_id: String,
    redirect_uri: String,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizationUrl {
    pub url: String,
    pub code_verifier: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub scope: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub collaborative: bool,
    pub tracks: SpotifyPlaylistTracksRef,
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub images: Vec<SpotifyImage>,
    pub snapshot_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylistTracksRef {
    pub total: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
    pub height: Option<i32>,
    pub width: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylistTrack {
    pub track: Option<SpotifyTrack>,
    pub added_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTrack {
    pub id: Option<String>,
    pub name: String,
    pub track_number: i32,
    pub disc_number: i32,
    pub duration_ms: i32,
    pub album: SpotifyAlbum,
    pub artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyAlbum {
    pub id: String,
    pub name: String,
    pub release_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub images: Vec<SpotifyImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyArtist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistsResponse {
    items: Vec<SpotifyPlaylist>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistTracksResponse {
    items: Vec<SpotifyPlaylistTrack>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: SearchTracks,
}

#[derive(Debug, Deserialize)]
struct SearchTracks {
    items: Vec<SpotifyTrack>,
}

/// Deserialize null or missing as empty vec
fn deserialize_null_as_empty_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    let opt: Option<Vec<T>> = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

impl SpotifyService {
    pub fn new(client_id: String, redirect_uri: String) -> Self {
        // 2 requests per second stays under Spotify's ~3 req/sec limit
        let quota = Quota::per_second(nonzero!(2u32));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Self {
            client: Client::new(),
            client_id,
            redirect_uri,
            rate_limiter,
        }
    }

    /// Generate authorization URL with PKCE
    pub fn generate_authorization_url(&self) -> Result<AuthorizationUrl> {
        let code_verifier = self.generate_code_verifier();
        let code_challenge = self.generate_code_challenge(&code_verifier);

        // Random state for CSRF protection and verifier lookup
        let state = uuid::Uuid::new_v4().to_string();

        let scopes = [
            "playlist-read-private",
            "playlist-read-collaborative",
            "user-library-read",
        ];

        let url = format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&code_challenge_method=S256&code_challenge={}&scope={}&state={}",
            SPOTIFY_AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            code_challenge,
            urlencoding::encode(&scopes.join(" ")),
            state
        );

        Ok(AuthorizationUrl {
            url,
            code_verifier,
            state,
        })
    }

    /// Exchange authorization code for access token
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenResponse> {
        self.rate_limiter.until_ready().await;

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
            ("client_id", &self.client_id),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .client
            .post(SPOTIFY_TOKEN_URL)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::Authentication(format!(
                "Failed to exchange code: {}",
                error_text
            )));
        }

        Ok(response.json().await?)
    }

    /// Refresh access token
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.rate_limiter.until_ready().await;

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
        ];

        let response = self
            .client
            .post(SPOTIFY_TOKEN_URL)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::Authentication(format!(
                "Failed to refresh token: {}",
                error_text
            )));
        }

        Ok(response.json().await?)
    }

    /// Fetch all of the user's playlists (owned and followed)
    pub async fn fetch_user_playlists(&self, access_token: &str) -> Result<Vec<SpotifyPlaylist>> {
        let mut playlists = Vec::new();
        let mut next_url = Some(format!("{}/me/playlists?limit=50", SPOTIFY_API_BASE));

        while let Some(url) = next_url {
            let data: PlaylistsResponse = self.get_json(&url, access_token).await?;
            playlists.extend(data.items);
            next_url = data.next;

            tracing::debug!("Fetched {} playlists so far", playlists.len());
        }

        Ok(playlists)
    }

    /// Fetch a single playlist's metadata
    pub async fn fetch_playlist(
        &self,
        access_token: &str,
        playlist_id: &str,
    ) -> Result<SpotifyPlaylist> {
        let url = format!(
            "{}/playlists/{}?fields=id,name,description,collaborative,tracks(total),images,snapshot_id",
            SPOTIFY_API_BASE, playlist_id
        );
        self.get_json(&url, access_token).await
    }

    /// Fetch all tracks in a specific playlist
    pub async fn fetch_playlist_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
    ) -> Result<Vec<SpotifyPlaylistTrack>> {
        let mut tracks = Vec::new();
        let mut next_url = Some(format!(
            "{}/playlists/{}/tracks?limit=100",
            SPOTIFY_API_BASE, playlist_id
        ));

        while let Some(url) = next_url {
            let data: PlaylistTracksResponse = self.get_json(&url, access_token).await?;
            tracks.extend(data.items);
            next_url = data.next;

            tracing::debug!(
                "Fetched {} tracks so far for playlist {}",
                tracks.len(),
                playlist_id
            );
        }

        Ok(tracks)
    }

    /// Search Spotify's catalog for tracks matching a title/artist query
    pub async fn search_tracks(
        &self,
        access_token: &str,
        title: &str,
        artist: &str,
    ) -> Result<Vec<SpotifyTrack>> {
        let query = format!("track:{} artist:{}", title, artist);
        let url = format!(
            "{}/search?type=track&limit=5&q={}",
            SPOTIFY_API_BASE,
            urlencoding::encode(&query)
        );

        let data: SearchResponse = self.get_json(&url, access_token).await?;
        Ok(data.tracks.items)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::ExternalApi(format!(
                "Spotify API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response.json().await?)
    }

    /// Generate a random code verifier
    fn generate_code_verifier(&self) -> String {
        let mut rng = rand::thread_rng();
        let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
        general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
    }

    /// Generate code challenge from verifier using SHA256
    fn generate_code_challenge(&self, verifier: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    /// Check if token is expired or about to expire (within 5 minutes)
    pub fn is_token_expired(&self, expires_at: DateTime<Utc>) -> bool {
        Utc::now() + Duration::minutes(5) >= expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SpotifyService {
        SpotifyService::new(
            "test_client_id".to_string(),
            "http://localhost:3000/api/auth/spotify/callback".to_string(),
        )
    }

    #[test]
    fn code_verifier_length_in_pkce_range() {
        let verifier = service().generate_code_verifier();
        assert!(verifier.len() >= 43 && verifier.len() <= 128);
    }

    #[test]
    fn code_challenge_is_deterministic() {
        let svc = service();
        let verifier = "test_verifier_1234567890_abcdefghijklmnop";
        assert_eq!(
            svc.generate_code_challenge(verifier),
            svc.generate_code_challenge(verifier)
        );
    }

    #[test]
    fn authorization_url_carries_state_and_challenge() {
        let auth = service().generate_authorization_url().unwrap();
        assert!(auth.url.contains("code_challenge_method=S256"));
        assert!(auth.url.contains(&format!("state={}", auth.state)));
    }

    #[test]
    fn expiry_includes_leeway() {
        let svc = service();
        assert!(svc.is_token_expired(Utc::now() + Duration::minutes(2)));
        assert!(!svc.is_token_expired(Utc::now() + Duration::minutes(30)));
    }
}
