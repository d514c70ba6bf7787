//! Start and input steps

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::article::{ArticleRecord, FormNumber};
use crate::source::{SourceLoader, SourceRef};
use crate::workflow::{Step, StepId};
use crate::Result;

/// Opens a thread; the run suspends here for the intake form
pub struct StartStep;

#[async_trait]
impl Step for StartStep {
    async fn run(&self, mut record: ArticleRecord) -> Result<ArticleRecord> {
        record.form_number = FormNumber::Intake;
        Ok(record)
    }
}

/// Resolves the intake answer into source text
pub struct InputStep {
    loader: Arc<dyn SourceLoader>,
    default_words: u32,
}

impl InputStep {
    pub fn new(loader: Arc<dyn SourceLoader>, default_words: u32) -> Self {
        Self {
            loader,
            default_words,
        }
    }
}

#[async_trait]
impl Step for InputStep {
    async fn run(&self, mut record: ArticleRecord) -> Result<ArticleRecord> {
        if record.words.is_none() {
            record.words = Some(self.default_words);
        }

        if record.source.as_deref().is_some_and(|s| !s.trim().is_empty()) {
            debug!("Source already loaded, keeping it");
            record.raw = None;
            return Ok(record);
        }

        let reference = SourceRef::from_record(&record)
            .map_err(|e| crate::Error::step(StepId::Input, e.to_string()))?;
        let text = self
            .loader
            .load(&reference)
            .await
            .map_err(|e| crate::Error::step(StepId::Input, e.to_string()))?;

        info!(
            "Loaded {} characters from {}",
            text.chars().count(),
            reference.describe()
        );
        record.source = Some(text);
        record.raw = None;
        Ok(record)
    }
}
