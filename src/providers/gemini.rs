//! Google Gemini provider using the `generateContent` REST API.

use crate::providers::traits::Provider;
use crate::sessions::{Message, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A provider that speaks the Gemini `models/{model}:generateContent` API.
pub struct GeminiProvider {
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    client: Client,
}

impl GeminiProvider {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn generate_content_url(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{model}:generateContent", self.base_url)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent<'a>>,
    contents: Vec<WireContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct WireContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart<'a>>,
}

#[derive(Debug, Serialize)]
struct WirePart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
}

impl<'a> GenerateContentRequest<'a> {
    /// Gemini has no system role inside `contents`: system turns become the
    /// `systemInstruction`, assistant turns use the `model` role.
    fn from_messages(messages: &'a [Message], temperature: f64) -> Self {
        let system: Vec<WirePart<'a>> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| WirePart { text: &m.content })
            .collect();

        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireContent {
                role: Some(match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                }),
                parts: vec![WirePart { text: &m.content }],
            })
            .collect();

        Self {
            system_instruction: (!system.is_empty()).then_some(WireContent {
                role: None,
                parts: system,
            }),
            contents,
            generation_config: GenerationConfig { temperature },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text parts of the first candidate, one per line.
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let texts: Vec<String> = content.parts.into_iter().filter_map(|p| p.text).collect();
        Some(texts.join("\n"))
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn chat_with_history(
        &self,
        messages: &[Message],
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<String> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "gemini API key not set. Set SHELLCHAT_API_KEY, GEMINI_API_KEY or api_key in config.toml."
            )
        })?;

        let request = GenerateContentRequest::from_messages(messages, temperature);
        let url = self.generate_content_url(model);
        tracing::debug!(
            provider = "gemini",
            model,
            messages = messages.len(),
            "sending generateContent request"
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error("gemini", response).await);
        }

        let body: GenerateContentResponse = response.json().await?;
        body.into_text()
            .ok_or_else(|| anyhow::anyhow!("No response from gemini"))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
