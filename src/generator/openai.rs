//! OpenAI-compatible chat completion generator
//!
//! Sends the whole conversation on every request (no server-side session) and
//! retries transport failures, 429 and 5xx responses up to the configured
//! limit, waiting with exponential backoff or as long as `Retry-After` asks.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{Conversation, GenerationOptions, Message, TextGenerator};
use crate::config::GeneratorConfig;
use crate::{Error, Result};

/// Generator backed by an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiGenerator {
    /// API base URL
    api_base: String,
    /// HTTP client with auth headers and timeout
    client: reqwest::Client,
    /// Default model
    model: String,
    /// Extra attempts after a retryable failure
    max_retries: u32,
    /// Wait before the first retry
    retry_delay: Duration,
}

/// Longest wait between attempts, whatever the server asks for
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Outcome of one HTTP round trip
enum Attempt {
    Reply(String),
    /// Worth retrying, after the server's requested delay if it gave one
    Retry(Option<Duration>),
}

/// `Retry-After` in its delay-seconds form
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl OpenAiGenerator {
    /// Create a new generator
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| Error::Config("Generator API key not configured".to_string()))?;

        // Build HTTP client with default headers
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Generation(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client,
            model: config.model.clone(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn build_request<'a>(
        &'a self,
        conversation: &'a Conversation,
        options: &'a GenerationOptions,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: options.model.as_deref().unwrap_or(&self.model),
            messages: conversation.messages(),
            temperature: options.temperature,
            response_format: options.json.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        }
    }

    async fn attempt(&self, request: &ChatCompletionRequest<'_>) -> Result<Attempt> {
        let response = match self.client.post(self.endpoint()).json(request).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() => {
                warn!("Generator request failed: {}", e);
                return Ok(Attempt::Retry(None));
            }
            Err(e) => return Err(Error::Http(e)),
        };

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            let wait = retry_after(response.headers());
            warn!("Generator returned {}", status);
            return Ok(Attempt::Retry(wait));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("API error {}: {}", status, body)));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        if let Some(usage) = &parsed.usage {
            debug!(
                "Generator usage: {} prompt tokens, {} completion tokens",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Generation("Response contained no choices".to_string()))?;

        if choice.finish_reason.as_deref() == Some("length") {
            warn!("Generator reply was truncated at the token limit");
        }

        choice
            .message
            .content
            .map(Attempt::Reply)
            .ok_or_else(|| Error::Generation("Response contained no content".to_string()))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(
        &self,
        conversation: &Conversation,
        options: &GenerationOptions,
    ) -> Result<String> {
        let request = self.build_request(conversation, options);
        debug!(
            "Requesting completion from {} ({} messages)",
            request.model,
            conversation.len()
        );

        let mut delay = self.retry_delay;
        for attempt in 0..=self.max_retries {
            let requested = match self.attempt(&request).await? {
                Attempt::Reply(text) => return Ok(text),
                Attempt::Retry(requested) => requested,
            };
            if attempt == self.max_retries {
                break;
            }

            let wait = requested.unwrap_or(delay).min(MAX_RETRY_DELAY);
            warn!(
                "Attempt {} of {} failed, retrying in {:?}",
                attempt + 1,
                self.max_retries + 1,
                wait
            );
            tokio::time::sleep(wait).await;
            delay = delay.saturating_mul(2);
        }

        Err(Error::Generation(format!(
            "Generator unavailable after {} attempts",
            self.max_retries + 1
        )))
    }
}
