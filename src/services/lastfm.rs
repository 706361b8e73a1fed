use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AppError, Result};

const API_TIMEOUT: Duration = Duration::from_secs(30);
const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0";

/// Last.fm client, used as a suggestion source: similar tracks seeded
/// from a playlist's matched entries.
#[derive(Clone)]
pub struct LastfmService {
    client: Client,
    base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarTrack {
    pub name: String,
    pub artist: String,
    pub match_weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SimilarTracksEnvelope {
    similartracks: SimilarTracksBody,
}

#[derive(Debug, Deserialize)]
struct SimilarTracksBody {
    #[serde(rename = "track", default)]
    tracks: Vec<SimilarTrackRow>,
}

#[derive(Debug, Deserialize)]
struct SimilarTrackRow {
    name: String,
    #[serde(rename = "match")]
    match_weight: Option<f64>,
    artist: SimilarArtist,
}

#[derive(Debug, Deserialize)]
struct SimilarArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoEnvelope {
    user: UserInfo,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    name: String,
}

impl LastfmService {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: LASTFM_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(base_url: String) -> Self {
        let mut service = Self::new();
        service.base_url = base_url;
        service
    }

    /// Probe the API key by looking up the configured user
    pub async fn test_connection(&self, api_key: &str, username: &str) -> Result<bool> {
        let url = format!(
            "{}/?method=user.getInfo&user={}&api_key={}&format=json",
            self.base_url,
            urlencoding::encode(username),
            urlencoding::encode(api_key)
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Ok(false);
        }

        let envelope: UserInfoEnvelope = response.json().await?;
        Ok(!envelope.user.name.is_empty())
    }

    /// Tracks similar to the given one, ordered by Last.fm's match weight
    pub async fn similar_tracks(
        &self,
        api_key: &str,
        artist: &str,
        title: &str,
        limit: u32,
    ) -> Result<Vec<SimilarTrack>> {
        let url = format!(
            "{}/?method=track.getSimilar&artist={}&track={}&limit={}&api_key={}&format=json&autocorrect=1",
            self.base_url,
            urlencoding::encode(artist),
            urlencoding::encode(title),
            limit,
            urlencoding::encode(api_key)
        );

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::ExternalApi(format!(
                "Last.fm API error ({}): {}",
                status, error_text
            )));
        }

        let envelope: SimilarTracksEnvelope = response.json().await?;

        Ok(envelope
            .similartracks
            .tracks
            .into_iter()
            .map(|t| SimilarTrack {
                name: t.name,
                artist: t.artist.name,
                match_weight: t.match_weight,
            })
            .collect())
    }
}

impl Default for LastfmService {
    fn default() -> Self {
        Self::new()
    }
}
