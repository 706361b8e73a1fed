use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::error::{AppError, Result};

const API_TIMEOUT: Duration = Duration::from_secs(60);
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI client used as a suggestion source: the model is shown a
/// playlist's current titles and asked for more in the same vein.
#[derive(Clone)]
pub struct OpenAiService {
    client: Client,
    base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedTrack {
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiService {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: OPENAI_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(base_url: String) -> Self {
        let mut service = Self::new();
        service.base_url = base_url;
        service
    }

    /// Ask the model for `count` track suggestions fitting the playlist.
    /// The reply is required to be a JSON array of {title, artist}.
    pub async fn suggest_tracks(
        &self,
        api_key: &str,
        model: Option<&str>,
        playlist_name: &str,
        existing: &[String],
        count: u32,
    ) -> Result<Vec<SuggestedTrack>> {
        let sample: Vec<&String> = existing.iter().take(50).collect();

        let prompt = format!(
            "Playlist \"{}\" currently contains:\n{}\n\nSuggest {} more tracks that fit. \
             Reply with only a JSON array of objects with \"title\" and \"artist\" keys.",
            playlist_name,
            sample
                .iter()
                .map(|t| format!("- {}", t))
                .collect::<Vec<_>>()
                .join("\n"),
            count
        );

        let body = json!({
            "model": model.unwrap_or(DEFAULT_MODEL),
            "messages": [
                {
                    "role": "system",
                    "content": "You are a music curator. Respond with JSON only."
                },
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.8,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::ExternalApi(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| AppError::ExternalApi("OpenAI returned no choices".to_string()))?;

        Self::parse_suggestions(content)
    }

    /// Models sometimes wrap the array in markdown fences despite the
    /// instructions; strip them before parsing.
    fn parse_suggestions(content: &str) -> Result<Vec<SuggestedTrack>> {
        let trimmed = content.trim();
        let trimmed = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .unwrap_or(trimmed);
        let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();

        serde_json::from_str(trimmed).map_err(|e| {
            AppError::ExternalApi(format!("Could not parse suggestions from OpenAI: {}", e))
        })
    }
}

impl Default for OpenAiService {
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

    #[test]
    fn parse_plain_array() {
        let suggestions = OpenAiService::parse_suggestions(
            r#"[{"title": "Karma Police", "artist": "Radiohead"}]"#,
        )
        .unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].title, "Karma Police");
    }

    #[test]
    fn parse_fenced_array() {
        let content = "```json\n[{\"title\": \"A\", \"artist\": \"B\"}]\n```";
        let suggestions = OpenAiService::parse_suggestions(content).unwrap();
        assert_eq!(suggestions.len(), 1);
    }

    #[test]
    fn parse_rejects_prose() {
        assert!(OpenAiService::parse_suggestions("Here are some songs!").is_err());
    }

    #[tokio::test]
    async fn suggest_tracks_round_trip() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "content": "[{\"title\": \"No Surprises\", \"artist\": \"Radiohead\"}]"
                    }
                }]
            })))
            .mount(&server)
            .await;

        let suggestions = OpenAiService::with_base_url(server.uri())
            .suggest_tracks("sk-test", None, "Mellow", &["Paranoid Android".to_string()], 1)
            .await
            .unwrap();

        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].artist, "Radiohead");
    }
}
