//! Text-generation collaborator. The core only needs one capability:
//! hand over a prompt, get opaque prose back.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A single documentation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
}

/// Boxed future type alias keeping [`TextGenerator`] dyn-compatible.
pub type GenerationFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;

/// Sends one prompt to a text-generation service and returns its prose.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> GenerationFuture<'_>;
}

/// Live client for the Anthropic messages API.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            max_tokens,
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl TextGenerator for AnthropicClient {
    fn generate(&self, request: &GenerationRequest) -> GenerationFuture<'_> {
        let system = request.system.clone();
        let prompt = request.prompt.clone();
        Box::pin(async move {
            let body = MessagesRequest {
                model: &self.model,
                max_tokens: self.max_tokens,
                system: &system,
                messages: vec![Message {
                    role: "user",
                    content: &prompt,
                }],
            };
            let response = self
                .client
                .post(API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                let detail = serde_json::from_str::<ApiError>(&text)
                    .map(|e| e.error.message)
                    .unwrap_or(text);
                anyhow::bail!("generation request failed ({status}): {detail}");
            }

            let parsed: MessagesResponse = response.json().await?;
            let text: String = parsed
                .content
                .iter()
                .map(|block| block.text.as_str())
                .collect::<Vec<_>>()
                .join("");
            if text.is_empty() {
                anyhow::bail!("generation response contained no text");
            }
            Ok(text)
        })
    }
}

/// Offline stand-in returning a fixed reply; used by the orchestrator tests.
#[cfg(test)]
pub(crate) struct CannedGenerator {
    pub reply: String,
    pub fail_on: Option<String>,
}

#[cfg(test)]
impl TextGenerator for CannedGenerator {
    fn generate(&self, request: &GenerationRequest) -> GenerationFuture<'_> {
        let fails = self
            .fail_on
            .as_deref()
            .is_some_and(|marker| request.prompt.contains(marker));
        let reply = self.reply.clone();
        Box::pin(async move {
            if fails {
                anyhow::bail!("simulated generation failure");
            }
            Ok(reply)
        })
    }
}
