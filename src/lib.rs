//! Meeting Reporter: human-in-the-loop news writing
//!
//! Turns the transcript or minutes of a meeting into a news report by
//! alternating automated generation steps with human review gates:
//! - **Workflow engine**: a validated step graph executed one step at a time,
//!   checkpointed after every step, suspended at review gates and resumed later
//!   (possibly from another process)
//! - **Quote verification**: every quoted span in generated copy must appear
//!   verbatim in the source, enforced by a bounded three-round revision protocol
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Caller (CLI / human gate)               │
//! │  start(thread) / resume(thread, updates) │
//! └────────────────────┬─────────────────────┘
//!                      ▼
//! ┌──────────────────────────────────────────┐
//! │  WorkflowEngine ──► CheckpointStore      │
//! │     │ start → input → outliner ⏸         │
//! │     │ review ⇒ write → critique ⏸        │
//! │     │ review ⇒ output ■                  │
//! └─────┼────────────────────────────────────┘
//!       ▼
//! ┌──────────────────────────────────────────┐
//! │  Steps: TextGenerator, SourceLoader,     │
//! │         QuoteVerifier, Renderer          │
//! └──────────────────────────────────────────┘
//! ```

pub mod article;
pub mod config;
pub mod gate;
pub mod generator;
pub mod render;
pub mod source;
pub mod steps;
pub mod verify;
pub mod workflow;

// Re-exports for convenience
pub use article::{ArticleRecord, FormNumber, RecordUpdate, ReviewAction, SignificantItem};
pub use config::Config;
pub use generator::{Conversation, Message, Role, TextGenerator};
pub use verify::{QuoteVerifier, Verification};
pub use workflow::{
    CheckpointStore, ConfigError, RunOutcome, StepId, WorkflowEngine, WorkflowGraph,
};

/// Crate-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Graph configuration error: {0}")]
    Graph(#[from] ConfigError),

    #[error("No checkpoint for thread {0}")]
    NoCheckpoint(String),

    #[error("Thread {0} stopped mid-run; use resume to continue it")]
    ThreadInProgress(String),

    #[error("Step {step} failed: {message}")]
    Step { step: StepId, message: String },

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Source load error: {0}")]
    Load(#[from] source::LoadError),

    #[error("Invalid record update: {0}")]
    InvalidUpdate(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Wrap a failure raised while a step was running
    pub fn step(step: StepId, message: impl Into<String>) -> Self {
        Error::Step {
            step,
            message: message.into(),
        }
    }

    /// Whether the thread stays resumable after this error
    pub fn is_resumable(&self) -> bool {
        !matches!(
            self,
            Error::Graph(_) | Error::NoCheckpoint(_) | Error::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
