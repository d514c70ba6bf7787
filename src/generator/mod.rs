//! Text generation abstraction
//!
//! The generator is stateless: every call carries the full conversation, so
//! retry rounds can extend a conversation value and resubmit it without any
//! server-side session.

mod openai;

pub use openai::OpenAiGenerator;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Config, Error, Result};

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only prompt/response history
///
/// Extending a conversation consumes it and returns the longer one, so a
/// caller holding an earlier value still sees exactly what it sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation with a system prompt
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system)],
        }
    }

    /// Append a message
    pub fn with(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Append a user message
    pub fn with_user(self, content: impl Into<String>) -> Self {
        self.with(Message::user(content))
    }

    /// Append an assistant message
    pub fn with_assistant(self, content: impl Into<String>) -> Self {
        self.with(Message::assistant(content))
    }

    /// All messages, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Per-call generation settings
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    /// Model override; the generator's default when `None`
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Ask for a JSON object response
    pub json: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.0,
            json: false,
        }
    }
}

impl GenerationOptions {
    /// Deterministic plain-text output
    pub fn exact() -> Self {
        Self::default()
    }

    /// JSON object output at the given temperature
    pub fn json(temperature: f32) -> Self {
        Self {
            temperature,
            json: true,
            ..Default::default()
        }
    }

    /// Use a specific model
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    /// Use a specific temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Core text generator trait
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Name of this generator
    fn name(&self) -> &str;

    /// Produce the next assistant message for the conversation
    async fn generate(
        &self,
        conversation: &Conversation,
        options: &GenerationOptions,
    ) -> Result<String>;
}

/// Create the configured generator
pub fn create_generator(config: &Config) -> Result<Box<dyn TextGenerator>> {
    Ok(Box::new(OpenAiGenerator::new(&config.generator)?))
}

/// Parse a JSON object reply, tolerating a surrounding markdown code fence
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    // Fall back to the outermost braces when the model wraps the object in prose
    let candidate = match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end && !unfenced.starts_with('{') => {
            &unfenced[start..=end]
        }
        _ => unfenced,
    };

    serde_json::from_str(candidate)
        .map_err(|e| Error::Generation(format!("Reply is not the expected JSON: {}", e)))
}
