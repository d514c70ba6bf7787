//! Writer step: drafts the article, or revises it against a critique
//!
//! Either way the new body goes through quote verification before it is
//! stored on the record.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::prompts;
use super::WriterSettings;
use crate::article::ArticleRecord;
use crate::generator::{parse_json_reply, Conversation, TextGenerator};
use crate::verify::{QuoteVerifier, Verification};
use crate::workflow::{Step, StepId};
use crate::Result;

#[derive(Debug, Deserialize)]
struct DraftReply {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
    body: String,
    #[serde(default)]
    information_suggested: Option<Value>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RevisionReply {
    body: String,
    #[serde(default)]
    message: Option<String>,
}

/// Free-form text from a reply field that may come back as a string or a list
fn flatten_text(value: Option<Value>) -> Option<String> {
    let text = match value? {
        Value::Null => return None,
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    };
    Some(text).filter(|t| !t.trim().is_empty())
}

pub struct WriterStep {
    generator: Arc<dyn TextGenerator>,
    settings: WriterSettings,
}

impl WriterStep {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: WriterSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    async fn verify(
        &self,
        body: String,
        source: &str,
        conversation: Conversation,
    ) -> Result<Verification> {
        let mut verifier = QuoteVerifier::new(self.generator.as_ref());
        if let Some(model) = &self.settings.model {
            verifier = verifier.with_model(model);
        }
        let verification = verifier.verify(body, source, conversation).await?;
        if let Some(warning) = &verification.warning {
            warn!(
                "Article keeps {} unverified quotes",
                warning.all().count()
            );
        }
        Ok(verification)
    }

    async fn draft(&self, mut record: ArticleRecord, words: u32) -> Result<ArticleRecord> {
        let source = record.require_source(StepId::Write)?.to_string();
        record.require_items(StepId::Write)?;

        let conversation = Conversation::new(prompts::writer_system(words))
            .with_user(prompts::writer_user(&source, &record.items_text()));
        let reply = self
            .generator
            .generate(&conversation, &self.settings.writer_options())
            .await?;
        let draft: DraftReply = parse_json_reply(&reply)?;

        let verification = self
            .verify(draft.body, &source, conversation.with_assistant(reply))
            .await?;
        info!(
            "Drafted article ({} quote repair rounds)",
            verification.rounds
        );

        if draft.title.is_some() {
            record.title = draft.title;
        }
        if draft.date.is_some() {
            record.date = draft.date;
        }
        record.summary = draft.summary;
        record.information_suggested = flatten_text(draft.information_suggested);
        record.body = Some(verification.text);
        record.message = None;
        Ok(record)
    }

    async fn revise(
        &self,
        mut record: ArticleRecord,
        words: u32,
        critique: String,
    ) -> Result<ArticleRecord> {
        let source = record.require_source(StepId::Write)?.to_string();
        let body = record.require_body(StepId::Write)?;

        let conversation = Conversation::new(prompts::reviser_system(words))
            .with_user(prompts::reviser_user(body, &critique, &source));
        let reply = self
            .generator
            .generate(&conversation, &self.settings.writer_options())
            .await?;
        let revision: RevisionReply = parse_json_reply(&reply)?;

        let verification = self
            .verify(revision.body, &source, conversation.with_assistant(reply))
            .await?;
        let message = revision.message.filter(|m| !m.trim().is_empty());
        if let Some(message) = &message {
            info!("Writer revision message: {}", message);
        }
        info!(
            "Revised article ({} quote repair rounds)",
            verification.rounds
        );

        record.body = Some(verification.text);
        record.message = message;
        Ok(record)
    }
}

#[async_trait]
impl Step for WriterStep {
    async fn run(&self, mut record: ArticleRecord) -> Result<ArticleRecord> {
        let words = record.words.unwrap_or(self.settings.default_words);
        match record.take_critique() {
            Some(critique) => self.revise(record, words, critique).await,
            None => self.draft(record, words).await,
        }
    }
}
