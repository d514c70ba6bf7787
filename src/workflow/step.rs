//! Step identifiers and the step registry

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::article::ArticleRecord;
use crate::{Error, Result};

/// Every stage the article pipeline knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    /// Create the record and wait for the intake form
    Start,
    /// Load the source document
    Input,
    /// Produce or revise the list of significant items
    Outliner,
    /// Gate: editor reviews the outline
    OutlineReview,
    /// Draft or revise the article
    Write,
    /// Automated editorial critique
    Critique,
    /// Gate: editor reviews the article and critique
    ArticleReview,
    /// Render the finished article
    Output,
}

impl StepId {
    pub const ALL: [StepId; 8] = [
        StepId::Start,
        StepId::Input,
        StepId::Outliner,
        StepId::OutlineReview,
        StepId::Write,
        StepId::Critique,
        StepId::ArticleReview,
        StepId::Output,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::Start => "start",
            StepId::Input => "input",
            StepId::Outliner => "outliner",
            StepId::OutlineReview => "outline_review",
            StepId::Write => "write",
            StepId::Critique => "critique",
            StepId::ArticleReview => "article_review",
            StepId::Output => "output",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for StepId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        StepId::ALL
            .into_iter()
            .find(|step| step.as_str() == wanted)
            .ok_or_else(|| Error::Config(format!("Unknown step: {}", s)))
    }
}

/// One pipeline stage
///
/// A step takes ownership of the record and hands back the updated one. On
/// error the record is dropped; the engine falls back to the last checkpoint.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, record: ArticleRecord) -> Result<ArticleRecord>;
}

/// Adapter turning a synchronous closure into a [`Step`]
pub struct FnStep<F>(F);

#[async_trait]
impl<F> Step for FnStep<F>
where
    F: Fn(ArticleRecord) -> Result<ArticleRecord> + Send + Sync,
{
    async fn run(&self, record: ArticleRecord) -> Result<ArticleRecord> {
        (self.0)(record)
    }
}

/// Wrap a closure as a shareable step
pub fn step_fn<F>(f: F) -> Arc<dyn Step>
where
    F: Fn(ArticleRecord) -> Result<ArticleRecord> + Send + Sync + 'static,
{
    Arc::new(FnStep(f))
}

/// Named steps available to graph construction
#[derive(Default, Clone)]
pub struct StepRegistry {
    steps: HashMap<StepId, Arc<dyn Step>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step, replacing any previous registration
    pub fn register(mut self, id: StepId, step: Arc<dyn Step>) -> Self {
        self.steps.insert(id, step);
        self
    }

    pub fn get(&self, id: StepId) -> Option<Arc<dyn Step>> {
        self.steps.get(&id).cloned()
    }

    pub fn contains(&self, id: StepId) -> bool {
        self.steps.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
