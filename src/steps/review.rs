//! Human review gates
//!
//! The run suspends before these steps; by the time one runs, the editor's
//! answer has been merged into the record. The step only normalizes that
//! answer, and the conditional edge out of it decides accept or revise.

use async_trait::async_trait;
use tracing::info;

use crate::article::{ArticleRecord, ReviewAction};
use crate::workflow::{BranchLabel, Step, StepId};
use crate::{Error, Result};

/// Outcome of a review gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Accept,
    Revise,
}

impl ReviewDecision {
    /// No pending critique means accept
    pub fn route(record: &ArticleRecord) -> Self {
        if record.has_critique() {
            ReviewDecision::Revise
        } else {
            ReviewDecision::Accept
        }
    }
}

impl BranchLabel for ReviewDecision {
    fn all() -> &'static [Self] {
        &[ReviewDecision::Accept, ReviewDecision::Revise]
    }

    fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Accept => "accept",
            ReviewDecision::Revise => "revise",
        }
    }
}

pub struct ReviewStep {
    id: StepId,
}

impl ReviewStep {
    pub fn new(id: StepId) -> Self {
        Self { id }
    }
}

#[async_trait]
impl Step for ReviewStep {
    async fn run(&self, mut record: ArticleRecord) -> Result<ArticleRecord> {
        if record.review_action == Some(ReviewAction::Cancel) {
            return Err(Error::step(self.id, "cancelled by editor"));
        }
        if !record.has_critique() {
            record.critique = None;
        }
        info!(
            "{}: {}",
            self.id,
            ReviewDecision::route(&record).as_str()
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blank_critique_normalized() {
        let record = ArticleRecord {
            critique: Some("  \n".to_string()),
            review_action: Some(ReviewAction::Ok),
            ..Default::default()
        };
        let record = ReviewStep::new(StepId::ArticleReview)
            .run(record)
            .await
            .unwrap();

        assert_eq!(record.critique, None);
        assert_eq!(ReviewDecision::route(&record), ReviewDecision::Accept);
    }

    #[tokio::test]
    async fn test_critique_routes_to_revise() {
        let record = ArticleRecord {
            critique: Some("Shorter".to_string()),
            ..Default::default()
        };
        let record = ReviewStep::new(StepId::OutlineReview)
            .run(record)
            .await
            .unwrap();
        assert_eq!(ReviewDecision::route(&record), ReviewDecision::Revise);
    }

    #[tokio::test]
    async fn test_cancel_is_step_error() {
        let record = ArticleRecord {
            review_action: Some(ReviewAction::Cancel),
            ..Default::default()
        };
        let err = ReviewStep::new(StepId::ArticleReview)
            .run(record)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Step {
                step: StepId::ArticleReview,
                ..
            }
        ));
    }
}
