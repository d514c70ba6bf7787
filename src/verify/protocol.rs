//! Bounded quote-repair protocol
//!
//! Round 0 checks the draft. Round 1 asks the generator to swap each unmatched
//! quote for a verbatim one. Round 2 asks it to turn whatever is still
//! unmatched into indirect attribution followed by the verbatim source text in
//! brackets. Anything left after round 2 is reported in a warning block
//! prepended to the draft; the draft itself is never rejected.

use std::fmt;
use tracing::{debug, info, warn};

use super::quotes::{extract_bracketed, extract_quotes, NormalizedSource};
use crate::generator::{Conversation, GenerationOptions, TextGenerator};
use crate::Result;

/// Last round the protocol will run
pub const MAX_ROUNDS: u8 = 2;

/// Quotes still unmatched when the protocol gave up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationWarning {
    /// Quoted spans with no verbatim counterpart in the source
    pub quotes: Vec<String>,
    /// Bracketed source excerpts that do not match the source either
    ///
    /// These are supposed to be copied straight from the source, so a miss
    /// here points at the source text (e.g. a mis-transcription) as much as at
    /// the generator.
    pub audit_text: Vec<String>,
}

impl VerificationWarning {
    fn classify(unmatched: Vec<String>, draft: &str) -> Self {
        let bracketed = extract_bracketed(draft);
        let (audit_text, quotes) = unmatched
            .into_iter()
            .partition(|quote| bracketed.contains(quote));
        Self { quotes, audit_text }
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty() && self.audit_text.is_empty()
    }

    /// Every unmatched span, quotes first
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.quotes
            .iter()
            .chain(self.audit_text.iter())
            .map(|s| s.as_str())
    }

    /// Prefix the warning block to a draft
    pub fn annotate(&self, draft: &str) -> String {
        format!("{}\n{}", self, draft)
    }
}

impl fmt::Display for VerificationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.quotes.is_empty() {
            writeln!(
                f,
                "WARNING: the following quotes do not exactly match the transcript:"
            )?;
            for quote in &self.quotes {
                writeln!(f, "{}", quote)?;
            }
        }
        if !self.audit_text.is_empty() {
            writeln!(
                f,
                "WARNING: the following bracketed transcript excerpts do not match the transcript \
                 (check the transcript itself for errors):"
            )?;
            for excerpt in &self.audit_text {
                writeln!(f, "{}", excerpt)?;
            }
        }
        Ok(())
    }
}

/// Result of running the protocol over a draft
#[derive(Debug, Clone)]
pub struct Verification {
    /// Final text: the accepted draft, or the last draft with a warning block
    pub text: String,
    /// Round in which the protocol stopped (0 = accepted unchanged)
    pub rounds: u8,
    /// Present when unmatched quotes survived round 2
    pub warning: Option<VerificationWarning>,
    /// Conversation including every repair request and reply
    pub conversation: Conversation,
}

impl Verification {
    /// Whether every quote matched
    pub fn is_clean(&self) -> bool {
        self.warning.is_none()
    }
}

/// Drives the repair rounds against a text generator
pub struct QuoteVerifier<'a> {
    generator: &'a dyn TextGenerator,
    options: GenerationOptions,
}

impl<'a> QuoteVerifier<'a> {
    /// Create a verifier; repair requests run at temperature 0
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self {
            generator,
            options: GenerationOptions::exact(),
        }
    }

    /// Use a specific model for repair requests
    pub fn with_model(mut self, model: &str) -> Self {
        self.options = self.options.with_model(model);
        self
    }

    /// Check a draft and repair it if needed
    ///
    /// `conversation` is the history that produced `draft`, ending with the
    /// assistant reply that contained it; repair requests are appended to it.
    pub async fn verify(
        &self,
        draft: String,
        source: &str,
        conversation: Conversation,
    ) -> Result<Verification> {
        let source = NormalizedSource::new(source);

        let mut draft = draft;
        let mut conversation = conversation;
        let mut round = 0u8;

        loop {
            let quotes = extract_quotes(&draft);
            if quotes.is_empty() {
                debug!("Round {}: no quotes in draft", round);
                return Ok(Verification {
                    text: draft,
                    rounds: round,
                    warning: None,
                    conversation,
                });
            }

            let unmatched = source.unmatched(&quotes);
            if unmatched.is_empty() {
                info!("Round {}: all {} quotes found in source", round, quotes.len());
                return Ok(Verification {
                    text: draft,
                    rounds: round,
                    warning: None,
                    conversation,
                });
            }

            if round >= MAX_ROUNDS {
                let warning = VerificationWarning::classify(unmatched, &draft);
                warn!(
                    "Draft still has {} unmatched quotes after {} repair rounds",
                    warning.all().count(),
                    MAX_ROUNDS
                );
                return Ok(Verification {
                    text: warning.annotate(&draft),
                    rounds: round,
                    warning: Some(warning),
                    conversation,
                });
            }

            round += 1;
            info!(
                "Round {}: {} quotes not found verbatim, requesting repair",
                round,
                unmatched.len()
            );

            conversation = conversation.with_user(repair_request(round, &unmatched));
            let revised = self.generator.generate(&conversation, &self.options).await?;
            draft = revised.trim().to_string();
            conversation = conversation.with_assistant(draft.clone());
        }
    }
}

/// Instruction for a repair round
fn repair_request(round: u8, unmatched: &[String]) -> String {
    let listing = unmatched.join("\n");
    if round == 1 {
        format!(
            "The following quotes from the body of the story you wrote were not found \
             verbatim in the source transcript. Replace them with quotes which are word for \
             word and letter for letter from the transcript, and return only the amended \
             story.\n\n{}",
            listing
        )
    } else {
        format!(
            "The following quotes from the body of the story you wrote were still not found \
             verbatim in the source transcript; they are paraphrases. Turn each of them into \
             an indirect quote with NO quotation marks, and follow it with the verbatim text \
             from the transcript that was paraphrased, inside square brackets and double \
             quotation marks. The bracketed text will be matched against the transcript, so \
             it must be exact, including repeated words and speaking or transcription errors. \
             Return only the amended story.\n\n{}",
            listing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Role;
    use crate::Error;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with canned drafts in order and records what it was sent
    struct Scripted {
        replies: Mutex<Vec<String>>,
        seen: Mutex<Vec<Conversation>>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            conversation: &Conversation,
            _options: &GenerationOptions,
        ) -> Result<String> {
            self.seen.lock().unwrap().push(conversation.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| Error::Generation("script exhausted".to_string()))
        }
    }

    fn history(draft: &str) -> Conversation {
        Conversation::new("write").with_user("source").with_assistant(draft)
    }

    #[tokio::test]
    async fn test_clean_draft_accepted_in_round_zero() {
        let generator = Scripted::new(&[]);
        let draft = r#"The mayor said "it's fine" and left."#;
        let result = QuoteVerifier::new(&generator)
            .verify(draft.to_string(), "the mayor said it's fine.", history(draft))
            .await
            .unwrap();

        assert_eq!(result.text, draft);
        assert_eq!(result.rounds, 0);
        assert!(result.is_clean());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_draft_without_quotes_accepted() {
        let generator = Scripted::new(&[]);
        let result = QuoteVerifier::new(&generator)
            .verify("No quotes.".to_string(), "anything", history("No quotes."))
            .await
            .unwrap();
        assert_eq!(result.rounds, 0);
        assert_eq!(result.text, "No quotes.");
    }

    #[tokio::test]
    async fn test_round_one_repair() {
        let generator = Scripted::new(&[r#"He said "the span is 13 feet"."#]);
        let draft = r#"He said "the span is 30 feet"."#;
        let result = QuoteVerifier::new(&generator)
            .verify(draft.to_string(), "Well, the span is 13 feet.", history(draft))
            .await
            .unwrap();

        assert_eq!(result.rounds, 1);
        assert!(result.is_clean());
        assert_eq!(result.text, r#"He said "the span is 13 feet"."#);

        let seen = generator.seen.lock().unwrap();
        let request = seen[0].last().unwrap();
        assert_eq!(request.role, Role::User);
        assert!(request.content.contains("the span is 30 feet"));
        // Full history resubmitted
        assert_eq!(seen[0].len(), 4);
    }

    #[tokio::test]
    async fn test_round_two_indirect_attribution() {
        let generator = Scripted::new(&[
            r#"He said "it is 30 feet"."#,
            r#"He said the span was about thirty feet ["the span is 13 feet"]."#,
        ]);
        let draft = r#"He said "it is 30 feet"."#;
        let result = QuoteVerifier::new(&generator)
            .verify(draft.to_string(), "the span is 13 feet", history(draft))
            .await
            .unwrap();

        assert_eq!(result.rounds, 2);
        assert!(result.is_clean());
        assert!(result.text.contains("[\"the span is 13 feet\"]"));

        let seen = generator.seen.lock().unwrap();
        assert!(seen[1].last().unwrap().content.contains("indirect quote"));
        // Round one reply is part of the round two history
        assert_eq!(seen[1].messages()[4].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_exhausted_rounds_prepend_warning() {
        let generator = Scripted::new(&[
            r#"They said "30 feet" again."#,
            r#"They said "30 feet" once more."#,
        ]);
        let draft = r#"They said "30 feet"."#;
        let result = QuoteVerifier::new(&generator)
            .verify(draft.to_string(), "the gap is 13 feet", history(draft))
            .await
            .unwrap();

        assert_eq!(result.rounds, 2);
        assert_eq!(generator.calls(), 2);
        let warning = result.warning.clone().unwrap();
        assert_eq!(warning.quotes, vec!["30 feet"]);
        assert!(warning.audit_text.is_empty());
        assert!(result.text.starts_with("WARNING:"));
        assert!(result.text.contains("\n30 feet\n"));
        assert!(result.text.ends_with(r#"They said "30 feet" once more."#));
    }

    #[tokio::test]
    async fn test_unmatched_audit_text_reported_separately() {
        let generator = Scripted::new(&[
            r#"She said "we will fix it"."#,
            r#"She said repairs would come ["we will fix the brige"]."#,
        ]);
        let draft = r#"She said "we will fix it"."#;
        let result = QuoteVerifier::new(&generator)
            .verify(draft.to_string(), "we will fix the bridge", history(draft))
            .await
            .unwrap();

        let warning = result.warning.unwrap();
        assert!(warning.quotes.is_empty());
        assert_eq!(warning.audit_text, vec!["we will fix the brige"]);
        assert!(result.text.contains("bracketed transcript excerpts"));
    }

    #[tokio::test]
    async fn test_generator_failure_propagates() {
        let generator = Scripted::new(&[]);
        let draft = r#""invented""#;
        let err = QuoteVerifier::new(&generator)
            .verify(draft.to_string(), "real words", history(draft))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }
}
