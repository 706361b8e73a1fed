use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{AppError, Result};

const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for a user's Plex Media Server. The base URL and token come
/// from the settings row, so every call takes them explicitly.
#[derive(Clone)]
pub struct PlexService {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct IdentityEnvelope {
    #[serde(rename = "MediaContainer")]
    media_container: PlexIdentity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlexIdentity {
    #[serde(rename = "machineIdentifier")]
    pub machine_identifier: String,
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SectionsEnvelope {
    #[serde(rename = "MediaContainer")]
    media_container: SectionsContainer,
}

#[derive(Debug, Deserialize)]
struct SectionsContainer {
    #[serde(rename = "Directory", default)]
    directory: Vec<PlexSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlexSection {
    pub key: String,
    pub title: String,
    #[serde(rename = "type")]
    pub section_type: String,
}

#[derive(Debug, Deserialize)]
struct MetadataEnvelope {
    #[serde(rename = "MediaContainer")]
    media_container: MetadataContainer,
}

#[derive(Debug, Deserialize)]
struct MetadataContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<PlexTrack>,
}

/// A track row from a Plex section search. Plex exposes the artist as
/// `grandparentTitle` and the album as `parentTitle`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlexTrack {
    #[serde(rename = "ratingKey")]
    pub rating_key: String,
    pub title: String,
    #[serde(rename = "grandparentTitle")]
    pub artist: Option<String>,
    #[serde(rename = "parentTitle")]
    pub album: Option<String>,
    pub duration: Option<i64>,
}

impl PlexService {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }

    /// Test connection to the Plex server
    pub async fn test_connection(&self, base_url: &str, token: &str) -> Result<bool> {
        let url = format!("{}/identity", base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .header("X-Plex-Token", token)
            .header("Accept", "application/json")
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    /// Server identity, including the machine identifier needed to build
    /// playlist item URIs
    pub async fn identity(&self, base_url: &str, token: &str) -> Result<PlexIdentity> {
        let url = format!("{}/identity", base_url.trim_end_matches('/'));
        let envelope: IdentityEnvelope = self.get_json(&url, token).await?;
        Ok(envelope.media_container)
    }

    /// All music ("artist" type) library sections on the server
    pub async fn music_sections(&self, base_url: &str, token: &str) -> Result<Vec<PlexSection>> {
        let url = format!("{}/library/sections", base_url.trim_end_matches('/'));
        let envelope: SectionsEnvelope = self.get_json(&url, token).await?;

        Ok(envelope
            .media_container
            .directory
            .into_iter()
            .filter(|s| s.section_type == "artist")
            .collect())
    }

    /// Search one section for tracks (Plex type 10) matching a query
    pub async fn search_tracks(
        &self,
        base_url: &str,
        token: &str,
        section_key: &str,
        query: &str,
    ) -> Result<Vec<PlexTrack>> {
        let url = format!(
            "{}/library/sections/{}/search?type=10&query={}",
            base_url.trim_end_matches('/'),
            section_key,
            urlencoding::encode(query)
        );

        let envelope: MetadataEnvelope = self.get_json(&url, token).await?;
        Ok(envelope.media_container.metadata)
    }

    /// Create an audio playlist from a set of track rating keys, returning
    /// the new playlist's rating key
    pub async fn create_playlist(
        &self,
        base_url: &str,
        token: &str,
        machine_identifier: &str,
        title: &str,
        rating_keys: &[String],
    ) -> Result<String> {
        let url = format!(
            "{}/playlists?type=audio&smart=0&title={}&uri={}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(title),
            urlencoding::encode(&Self::items_uri(machine_identifier, rating_keys))
        );

        let response = self
            .client
            .post(&url)
            .header("X-Plex-Token", token)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::ExternalApi(format!(
                "Plex API error ({}): {}",
                status, error_text
            )));
        }

        #[derive(Debug, Deserialize)]
        struct PlaylistEnvelope {
            #[serde(rename = "MediaContainer")]
            media_container: PlaylistContainer,
        }

        #[derive(Debug, Deserialize)]
        struct PlaylistContainer {
            #[serde(rename = "Metadata", default)]
            metadata: Vec<PlexPlaylistRow>,
        }

        #[derive(Debug, Deserialize)]
        struct PlexPlaylistRow {
            #[serde(rename = "ratingKey")]
            rating_key: String,
        }

        let envelope: PlaylistEnvelope = response.json().await?;
        envelope
            .media_container
            .metadata
            .into_iter()
            .next()
            .map(|p| p.rating_key)
            .ok_or_else(|| AppError::ExternalApi("Plex returned no playlist metadata".to_string()))
    }

    /// Replace the items of an existing playlist with the given tracks
    pub async fn replace_playlist_items(
        &self,
        base_url: &str,
        token: &str,
        playlist_rating_key: &str,
        machine_identifier: &str,
        rating_keys: &[String],
    ) -> Result<()> {
        let base = base_url.trim_end_matches('/');

        // Clear existing items, then add the new set in order.
        let clear_url = format!("{}/playlists/{}/items", base, playlist_rating_key);
        let response = self
            .client
            .delete(&clear_url)
            .header("X-Plex-Token", token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Plex API error clearing playlist ({})",
                response.status()
            )));
        }

        let add_url = format!(
            "{}/playlists/{}/items?uri={}",
            base,
            playlist_rating_key,
            urlencoding::encode(&Self::items_uri(machine_identifier, rating_keys))
        );

        let response = self
            .client
            .put(&add_url)
            .header("X-Plex-Token", token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Plex API error adding playlist items ({})",
                response.status()
            )));
        }

        Ok(())
    }

    fn items_uri(machine_identifier: &str, rating_keys: &[String]) -> String {
        format!(
            "server://{}/com.plexapp.plugins.library/library/metadata/{}",
            machine_identifier,
            rating_keys.join(",")
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, token: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header("X-Plex-Token", token)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::ExternalApi(format!(
                "Plex API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response.json().await?)
    }
}

impl Default for PlexService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_connection_checks_identity_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/identity"))
            .and(header("X-Plex-Token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "MediaContainer": { "machineIdentifier": "abc123", "version": "1.40.0" }
            })))
            .mount(&server)
            .await;

        let service = PlexService::new();
        assert!(service.test_connection(&server.uri(), "secret").await.unwrap());

        let identity = service.identity(&server.uri(), "secret").await.unwrap();
        assert_eq!(identity.machine_identifier, "abc123");
    }

    #[tokio::test]
    async fn search_parses_media_container_tracks() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/library/sections/3/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "MediaContainer": {
                    "Metadata": [{
                        "ratingKey": "4242",
                        "title": "Yesterday",
                        "grandparentTitle": "The Beatles",
                        "parentTitle": "Help!",
                        "duration": 125000
                    }]
                }
            })))
            .mount(&server)
            .await;

        let tracks = PlexService::new()
            .search_tracks(&server.uri(), "secret", "3", "Yesterday")
            .await
            .unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].rating_key, "4242");
        assert_eq!(tracks[0].artist.as_deref(), Some("The Beatles"));
    }

    #[tokio::test]
    async fn search_tolerates_empty_container() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/library/sections/3/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "MediaContainer": {} })),
            )
            .mount(&server)
            .await;

        let tracks = PlexService::new()
            .search_tracks(&server.uri(), "secret", "3", "nothing")
            .await
            .unwrap();

        assert!(tracks.is_empty());
    }

    #[tokio::test]
    async fn create_playlist_returns_rating_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/playlists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "MediaContainer": { "Metadata": [{ "ratingKey": "777", "title": "Mix" }] }
            })))
            .mount(&server)
            .await;

        let key = PlexService::new()
            .create_playlist(
                &server.uri(),
                "secret",
                "abc123",
                "Mix",
                &["1".to_string(), "2".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(key, "777");
    }
}
