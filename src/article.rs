//! The article record threaded through every workflow step
//!
//! Fields accrue as steps run, so everything a step produces is optional and
//! each step checks its own preconditions. Keys the schema does not know about
//! (UI hints, caller bookkeeping) are kept in `extra` so the record stays
//! open-ended without losing data across checkpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::workflow::StepId;
use crate::{Error, Result};

/// Which human-facing form produced the current suspension
///
/// Purely a routing hint for the caller's UI; the engine never reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FormNumber {
    /// Intake: choose the source document and article length
    #[default]
    Intake,
    /// Review the drafted article and the automated critique
    ArticleReview,
    /// Review the list of significant items
    OutlineReview,
    /// Finished article is ready to display
    Finished,
}

impl From<FormNumber> for u8 {
    fn from(form: FormNumber) -> Self {
        match form {
            FormNumber::Intake => 0,
            FormNumber::ArticleReview => 1,
            FormNumber::OutlineReview => 2,
            FormNumber::Finished => 3,
        }
    }
}

impl TryFrom<u8> for FormNumber {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(FormNumber::Intake),
            1 => Ok(FormNumber::ArticleReview),
            2 => Ok(FormNumber::OutlineReview),
            3 => Ok(FormNumber::Finished),
            other => Err(format!("unknown form number {}", other)),
        }
    }
}

impl fmt::Display for FormNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// What the editor did with a review form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    /// Submitted the form (with or without a critique)
    #[serde(alias = "OK", alias = "Ok")]
    Ok,
    /// Abandoned the article
    Cancel,
}

/// One entry of the outline, most significant first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignificantItem {
    /// 1-based rank
    pub number: u32,
    /// Brief description of the item
    pub description: String,
    /// Why the item matters
    #[serde(default)]
    pub explanation: String,
}

/// Shared state of one workflow run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Gate that produced the current suspension
    #[serde(default)]
    pub form_number: FormNumber,

    /// Requested article length in words
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<u32>,
    /// URL of a transcript handed over by an upstream system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    /// URL of the source document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Local path or uploaded file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Raw bytes of an uploaded file, dropped once extracted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Vec<u8>>,

    /// Plain text of the source; set once by the input step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Outline in descending order of significance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significant_items: Option<Vec<SignificantItem>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Information the writer thinks would round out the story
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub information_suggested: Option<String>,

    /// Pending change request; `None` means accept
    #[serde(default)]
    pub critique: Option<String>,
    /// Note from the writer about instructions it could not follow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Button pressed on the last review form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_action: Option<ReviewAction>,

    /// Rendered output document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    /// Suggested file name for the rendered document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
    /// Set by the terminal step
    #[serde(default)]
    pub done: bool,

    /// Fields outside the schema, preserved verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ArticleRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow-merge an update into the record
    ///
    /// Keys in the update overwrite, everything else is preserved, and an
    /// explicit `null` clears an optional field. A value that does not fit the
    /// field's type rejects the whole update and leaves the record untouched.
    /// Once a source has been loaded it cannot be replaced.
    pub fn apply(&mut self, update: &RecordUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let has_source = self.source.as_deref().is_some_and(|s| !s.trim().is_empty());
        if has_source && update.contains("source") {
            return Err(Error::InvalidUpdate("source is fixed once loaded".to_string()));
        }

        let mut value = serde_json::to_value(&*self)?;
        let object = value
            .as_object_mut()
            .ok_or_else(|| Error::InvalidUpdate("record is not an object".to_string()))?;

        for (key, field) in &update.fields {
            object.insert(key.clone(), field.clone());
        }

        *self = serde_json::from_value(value).map_err(|e| Error::InvalidUpdate(e.to_string()))?;
        Ok(())
    }

    /// The source text, or a step error if the input step never ran
    pub fn require_source(&self, step: StepId) -> Result<&str> {
        match self.source.as_deref() {
            Some(source) if !source.trim().is_empty() => Ok(source),
            _ => Err(Error::step(step, "source text is missing")),
        }
    }

    /// The outline, or a step error if it was never produced
    pub fn require_items(&self, step: StepId) -> Result<&[SignificantItem]> {
        match self.significant_items.as_deref() {
            Some(items) if !items.is_empty() => Ok(items),
            _ => Err(Error::step(step, "significant items are missing")),
        }
    }

    /// The article body, or a step error if nothing was written yet
    pub fn require_body(&self, step: StepId) -> Result<&str> {
        self.body
            .as_deref()
            .ok_or_else(|| Error::step(step, "article body is missing"))
    }

    /// Whether a non-blank critique is waiting to be addressed
    pub fn has_critique(&self) -> bool {
        self.critique
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false)
    }

    /// Take the pending critique, leaving `None` behind
    ///
    /// Revision steps call this so that a stale critique can never send the
    /// graph around the revise loop a second time.
    pub fn take_critique(&mut self) -> Option<String> {
        self.critique.take().filter(|c| !c.trim().is_empty())
    }

    /// Outline formatted for prompts and review forms
    pub fn items_text(&self) -> String {
        self.significant_items
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|item| {
                format!(
                    "{}. {}\n    Explanation: {}",
                    item.number, item.description, item.explanation
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A shallow merge-patch for [`ArticleRecord`]
///
/// This is how a human gate's answer re-enters the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordUpdate {
    fields: Map<String, Value>,
}

impl RecordUpdate {
    /// Create an empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an arbitrary field
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Request changes, or accept with `None`
    pub fn critique(self, critique: Option<&str>) -> Self {
        match critique {
            Some(text) => self.set("critique", text),
            None => self.set("critique", Value::Null),
        }
    }

    /// Submit a review form without changes requested
    pub fn accept(self) -> Self {
        self.critique(None).review(ReviewAction::Ok)
    }

    /// Submit a review form asking for changes
    pub fn revise(self, critique: &str) -> Self {
        self.critique(Some(critique)).review(ReviewAction::Ok)
    }

    /// Abandon the article at a review gate
    pub fn cancel(self) -> Self {
        self.review(ReviewAction::Cancel)
    }

    /// Record which button was pressed
    pub fn review(self, action: ReviewAction) -> Self {
        let label = match action {
            ReviewAction::Ok => "ok",
            ReviewAction::Cancel => "cancel",
        };
        self.set("review_action", label)
    }

    /// Replace the article body with an edited version
    pub fn body(self, body: &str) -> Self {
        self.set("body", body)
    }

    /// Requested article length
    pub fn words(self, words: u32) -> Self {
        self.set("words", words)
    }

    /// Source document URL
    pub fn url(self, url: &str) -> Self {
        self.set("url", url)
    }

    /// Transcript URL handed over by an upstream system
    pub fn transcript(self, url: &str) -> Self {
        self.set("transcript", url)
    }

    /// Local source document path
    pub fn file(self, path: &str) -> Self {
        self.set("file_name", path)
    }

    /// Uploaded source document
    pub fn upload(self, file_name: &str, bytes: &[u8]) -> Self {
        self.set("file_name", file_name).set(
            "raw",
            Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
        )
    }

    /// Parse a `key=value` assignment; the value is JSON if it parses, text otherwise
    pub fn assign(self, assignment: &str) -> Result<Self> {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| Error::InvalidUpdate(format!("expected key=value, got {}", assignment)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidUpdate("empty key".to_string()));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        Ok(self.set(key, value))
    }

    /// Merge another update on top of this one
    pub fn merge(mut self, other: RecordUpdate) -> Self {
        self.fields.extend(other.fields);
        self
    }

    /// Whether the update changes nothing
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether the update touches `key`
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Keys touched by this update
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }
}

impl From<Map<String, Value>> for RecordUpdate {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drafted() -> ArticleRecord {
        ArticleRecord {
            source: Some("the transcript".to_string()),
            body: Some("draft".to_string()),
            title: Some("Council meets".to_string()),
            critique: Some("tighten the lede".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_overwrites_and_preserves() {
        let mut record = drafted();
        record
            .apply(&RecordUpdate::new().body("edited draft"))
            .unwrap();

        assert_eq!(record.body.as_deref(), Some("edited draft"));
        assert_eq!(record.title.as_deref(), Some("Council meets"));
        assert_eq!(record.critique.as_deref(), Some("tighten the lede"));
    }

    #[test]
    fn test_apply_null_clears_critique() {
        let mut record = drafted();
        record.apply(&RecordUpdate::new().accept()).unwrap();

        assert_eq!(record.critique, None);
        assert_eq!(record.review_action, Some(ReviewAction::Ok));
    }

    #[test]
    fn test_apply_keeps_unknown_fields() {
        let mut record = drafted();
        record
            .apply(&RecordUpdate::new().set("origin", "internet"))
            .unwrap();

        assert_eq!(record.extra.get("origin"), Some(&Value::from("internet")));

        let yaml = serde_yaml::to_string(&record).unwrap();
        let back: ArticleRecord = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_apply_rejects_mistyped_value() {
        let mut record = drafted();
        let err = record
            .apply(&RecordUpdate::new().set("words", "a thousand"))
            .unwrap_err();

        assert!(matches!(err, Error::InvalidUpdate(_)));
        assert_eq!(record, drafted());
    }

    #[test]
    fn test_apply_rejects_replacing_source() {
        let mut record = drafted();
        let err = record
            .apply(&RecordUpdate::new().set("source", "other words").accept())
            .unwrap_err();

        assert!(matches!(err, Error::InvalidUpdate(_)));
        assert_eq!(record, drafted());

        // Blank source may still be filled
        let mut empty = ArticleRecord {
            source: Some("  ".to_string()),
            ..Default::default()
        };
        empty
            .apply(&RecordUpdate::new().set("source", "pasted minutes"))
            .unwrap();
        assert_eq!(empty.source.as_deref(), Some("pasted minutes"));
    }

    #[test]
    fn test_upload_round_trips_bytes() {
        let mut record = ArticleRecord::new();
        record
            .apply(&RecordUpdate::new().upload("minutes.txt", b"hello"))
            .unwrap();

        assert_eq!(record.file_name.as_deref(), Some("minutes.txt"));
        assert_eq!(record.raw.as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_take_critique_ignores_blank() {
        let mut record = ArticleRecord {
            critique: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(!record.has_critique());
        assert_eq!(record.take_critique(), None);
        assert_eq!(record.critique, None);
    }

    #[test]
    fn test_assign_parses_json_or_text() {
        let update = RecordUpdate::new()
            .assign("words=1500")
            .unwrap()
            .assign("critique=name the mover")
            .unwrap()
            .assign("critique_two=null")
            .unwrap();

        let mut record = ArticleRecord::new();
        record.apply(&update).unwrap();
        assert_eq!(record.words, Some(1500));
        assert_eq!(record.critique.as_deref(), Some("name the mover"));
        assert_eq!(record.extra.get("critique_two"), Some(&Value::Null));

        assert!(RecordUpdate::new().assign("no equals sign").is_err());
    }

    #[test]
    fn test_form_number_serializes_as_integer() {
        let record = ArticleRecord {
            form_number: FormNumber::OutlineReview,
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["form_number"], Value::from(2));
    }

    #[test]
    fn test_items_text() {
        let record = ArticleRecord {
            significant_items: Some(vec![SignificantItem {
                number: 1,
                description: "Budget vote".to_string(),
                explanation: "Largest spending item".to_string(),
            }]),
            ..Default::default()
        };
        assert_eq!(
            record.items_text(),
            "1. Budget vote\n    Explanation: Largest spending item"
        );
    }
}
