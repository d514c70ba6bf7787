//! Critique step: automated editorial feedback on the draft

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::prompts;
use super::WriterSettings;
use crate::article::{ArticleRecord, FormNumber};
use crate::generator::{Conversation, TextGenerator};
use crate::workflow::{Step, StepId};
use crate::Result;

/// Whether the critic's reply means "nothing to improve"
fn is_no_critique(reply: &str) -> bool {
    let word = reply
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
    word.is_empty() || word.eq_ignore_ascii_case(prompts::NO_CRITIQUE)
}

pub struct CritiqueStep {
    generator: Arc<dyn TextGenerator>,
    settings: WriterSettings,
}

impl CritiqueStep {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: WriterSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }
}

#[async_trait]
impl Step for CritiqueStep {
    async fn run(&self, mut record: ArticleRecord) -> Result<ArticleRecord> {
        let body = record.require_body(StepId::Critique)?;
        let source = record.require_source(StepId::Critique)?;
        let today = chrono::Local::now().format("%d/%m/%Y").to_string();

        let conversation = Conversation::new(prompts::critic_system()).with_user(
            prompts::critic_user(
                &today,
                record.title.as_deref().unwrap_or_default(),
                body,
                source,
            ),
        );
        let reply = self
            .generator
            .generate(&conversation, &self.settings.critique_options())
            .await?;

        if is_no_critique(&reply) {
            info!("Critic has no changes to suggest");
            record.critique = None;
        } else {
            info!("Critic feedback: {}", reply.trim());
            record.critique = Some(reply.trim().to_string());
            record.message = None;
        }
        record.form_number = FormNumber::ArticleReview;
        Ok(record)
    }
}
