use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AppError, Result};

const API_TIMEOUT: Duration = Duration::from_secs(30);
const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// YouTube Data API client. Used to annotate playlist entries with a
/// video id on demand ("play on YouTube Music" in the UI).
#[derive(Clone)]
pub struct YoutubeService {
    client: Client,
    base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeVideo {
    pub video_id: String,
    pub title: String,
    pub channel_title: String,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    title: String,
    #[serde(rename = "channelTitle")]
    channel_title: String,
}

impl YoutubeService {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: YOUTUBE_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(base_url: String) -> Self {
        let mut service = Self::new();
        service.base_url = base_url;
        service
    }

    /// Search music videos for a track query ("<title> <artist>")
    pub async fn search_videos(&self, api_key: &str, query: &str) -> Result<Vec<YoutubeVideo>> {
        let url = format!(
            "{}/search?part=snippet&type=video&videoCategoryId=10&maxResults=5&q={}&key={}",
            self.base_url,
            urlencoding::encode(query),
            urlencoding::encode(api_key)
        );

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::ExternalApi(format!(
                "YouTube API error ({}): {}",
                status, error_text
            )));
        }

        let envelope: SearchEnvelope = response.json().await?;

        Ok(envelope
            .items
            .into_iter()
            .filter_map(|item| {
                item.id.video_id.map(|video_id| YoutubeVideo {
                    video_id,
                    title: item.snippet.title,
                    channel_title: item.snippet.channel_title,
                })
            })
            .collect())
    }
}

impl Default for YoutubeService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_parses_video_results() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("type", "video"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {
                        "id": { "videoId": "dQw4w9WgXcQ" },
                        "snippet": { "title": "Song", "channelTitle": "Artist - Topic" }
                    },
                    {
                        "id": {},
                        "snippet": { "title": "Channel result", "channelTitle": "Other" }
                    }
                ]
            })))
            .mount(&server)
            .await;

        let videos = YoutubeService::with_base_url(server.uri())
            .search_videos("key", "Song Artist")
            .await
            .unwrap();

        // Results without a videoId are skipped.
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].video_id, "dQw4w9WgXcQ");
    }
}
