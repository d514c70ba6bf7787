//! Outliner step: ranks the significant items of the meeting

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::prompts;
use super::WriterSettings;
use crate::article::{ArticleRecord, FormNumber, SignificantItem};
use crate::generator::{parse_json_reply, Conversation, TextGenerator};
use crate::workflow::{Step, StepId};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct OutlineReply {
    significant_items: Vec<SignificantItem>,
}

pub struct OutlinerStep {
    generator: Arc<dyn TextGenerator>,
    settings: WriterSettings,
}

impl OutlinerStep {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: WriterSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    fn conversation(record: &ArticleRecord, source: &str, critique: Option<&str>) -> Conversation {
        let system = match critique {
            Some(_) if record.significant_items.is_some() => {
                prompts::outline_reviser_system(&record.items_text())
            }
            _ => prompts::outliner_system(),
        };
        Conversation::new(system).with_user(prompts::outliner_user(source, critique))
    }
}

#[async_trait]
impl Step for OutlinerStep {
    async fn run(&self, mut record: ArticleRecord) -> Result<ArticleRecord> {
        let critique = record.take_critique();
        let source = record.require_source(StepId::Outliner)?;
        let conversation = Self::conversation(&record, source, critique.as_deref());

        let reply = self
            .generator
            .generate(&conversation, &self.settings.writer_options())
            .await?;
        let mut items = parse_json_reply::<OutlineReply>(&reply)?.significant_items;
        if items.is_empty() {
            return Err(Error::step(StepId::Outliner, "generator returned no items"));
        }
        items.sort_by_key(|item| item.number);

        info!(
            "Outlined {} significant items{}",
            items.len(),
            if critique.is_some() { " (revised)" } else { "" }
        );
        record.significant_items = Some(items);
        record.form_number = FormNumber::OutlineReview;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GenerationOptions, Role};
    use std::sync::Mutex;

    struct Canned {
        reply: String,
        seen: Mutex<Vec<Conversation>>,
    }

    #[async_trait]
    impl TextGenerator for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(
            &self,
            conversation: &Conversation,
            _options: &GenerationOptions,
        ) -> Result<String> {
            self.seen.lock().unwrap().push(conversation.clone());
            Ok(self.reply.clone())
        }
    }

    fn canned(reply: &str) -> Arc<Canned> {
        Arc::new(Canned {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    const ITEMS: &str = r#"{"significant_items": [
        {"number": 2, "description": "Parking", "explanation": "Minor"},
        {"number": 1, "description": "Budget", "explanation": "Largest item"}
    ]}"#;

    fn sourced() -> ArticleRecord {
        ArticleRecord {
            source: Some("The council met.".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_outline_sorted_and_form_set() {
        let generator = canned(ITEMS);
        let step = OutlinerStep::new(generator.clone(), WriterSettings::default());

        let record = step.run(sourced()).await.unwrap();
        let items = record.significant_items.unwrap();
        assert_eq!(items[0].description, "Budget");
        assert_eq!(record.form_number, FormNumber::OutlineReview);
    }

    #[tokio::test]
    async fn test_revision_consumes_critique() {
        let generator = canned(ITEMS);
        let step = OutlinerStep::new(generator.clone(), WriterSettings::default());

        let mut record = step.run(sourced()).await.unwrap();
        record.critique = Some("drop parking".to_string());
        let record = step.run(record).await.unwrap();

        assert_eq!(record.critique, None);
        let seen = generator.seen.lock().unwrap();
        let revision = &seen[1];
        assert!(revision.messages()[0].content.contains("previously produced"));
        assert_eq!(revision.last().unwrap().role, Role::User);
        assert!(revision.last().unwrap().content.contains("drop parking"));
    }

    #[tokio::test]
    async fn test_empty_outline_is_error() {
        let step = OutlinerStep::new(canned(r#"{"significant_items": []}"#), WriterSettings::default());
        assert!(step.run(sourced()).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_source_is_error() {
        let step = OutlinerStep::new(canned(ITEMS), WriterSettings::default());
        let err = step.run(ArticleRecord::new()).await.unwrap_err();
        assert!(matches!(err, Error::Step { step: StepId::Outliner, .. }));
    }
}
