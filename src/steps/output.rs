//! Output step: renders the accepted article

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::article::{ArticleRecord, FormNumber};
use crate::render::Renderer;
use crate::workflow::{Step, StepId};
use crate::Result;

pub struct OutputStep {
    renderer: Arc<dyn Renderer>,
}

impl OutputStep {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl Step for OutputStep {
    async fn run(&self, mut record: ArticleRecord) -> Result<ArticleRecord> {
        record.require_body(StepId::Output)?;

        record.formatted = Some(self.renderer.render(&record));
        record.output_name = Some(self.renderer.file_name().to_string());
        record.form_number = FormNumber::Finished;
        record.done = true;

        info!(
            "Rendered {}",
            record.output_name.as_deref().unwrap_or_default()
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HtmlRenderer;

    #[tokio::test]
    async fn test_output_finishes_record() {
        let record = ArticleRecord {
            title: Some("Done".to_string()),
            body: Some("Body text".to_string()),
            ..Default::default()
        };
        let record = OutputStep::new(Arc::new(HtmlRenderer::new()))
            .run(record)
            .await
            .unwrap();

        assert!(record.done);
        assert_eq!(record.form_number, FormNumber::Finished);
        assert_eq!(record.output_name.as_deref(), Some("Story.html"));
        assert!(record.formatted.unwrap().contains("<p>Body text</p>"));
    }

    #[tokio::test]
    async fn test_output_requires_body() {
        let step = OutputStep::new(Arc::new(HtmlRenderer::new()));
        assert!(step.run(ArticleRecord::new()).await.is_err());
    }
}
