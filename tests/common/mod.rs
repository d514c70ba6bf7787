//! Shared fixtures: a deterministic newsroom generator and engine builders
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use meeting_reporter::generator::GenerationOptions;
use meeting_reporter::render::HtmlRenderer;
use meeting_reporter::source::TextSourceLoader;
use meeting_reporter::steps::{pipeline_engine, prompts, StepContext, WriterSettings};
use meeting_reporter::workflow::{
    CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, WorkflowEngine,
};
use meeting_reporter::{Conversation, Error, Result, TextGenerator};

/// Answers each pipeline prompt with canned but source-dependent replies
///
/// Drafts quote the line of the source that starts with `Minutes:`, so every
/// quote verifies and each thread's article is traceable to its own source.
#[derive(Default)]
pub struct NewsroomStub {
    pub outlines: AtomicUsize,
    pub drafts: AtomicUsize,
    pub revisions: AtomicUsize,
    pub critiques: AtomicUsize,
    /// Critic reply; `None` makes the critic answer "None"
    pub critique: Mutex<Option<String>>,
    pub fail_writes: AtomicBool,
}

impl NewsroomStub {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn set_critique(&self, critique: Option<&str>) {
        *self.critique.lock().unwrap() = critique.map(str::to_string);
    }
}

fn minutes_line(conversation: &Conversation) -> String {
    conversation
        .messages()
        .iter()
        .skip(1)
        .flat_map(|m| m.content.lines())
        .find_map(|line| line.trim_start().strip_prefix("Minutes:"))
        .map(|rest| rest.trim().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl TextGenerator for NewsroomStub {
    fn name(&self) -> &str {
        "newsroom-stub"
    }

    async fn generate(
        &self,
        conversation: &Conversation,
        _options: &GenerationOptions,
    ) -> Result<String> {
        let system = conversation
            .messages()
            .first()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        if system == prompts::critic_system() {
            self.critiques.fetch_add(1, Ordering::SeqCst);
            let critique = self.critique.lock().unwrap().clone();
            return Ok(critique.unwrap_or_else(|| prompts::NO_CRITIQUE.to_string()));
        }

        if system.contains("list the ten most significant") || system.contains("previously produced") {
            let round = self.outlines.fetch_add(1, Ordering::SeqCst) + 1;
            return Ok(json!({
                "significant_items": [
                    {"number": 1, "description": format!("Main decision (outline {})", round), "explanation": "Largest effect"},
                    {"number": 2, "description": "Public comment", "explanation": "Heated"}
                ]
            })
            .to_string());
        }

        let quote = minutes_line(conversation);

        if system.contains("Rewrite the article the user supplies") {
            self.revisions.fetch_add(1, Ordering::SeqCst);
            return Ok(json!({
                "body": format!("Revised report. The council heard \"{}\"", quote),
                "message": ""
            })
            .to_string());
        }

        if system.contains("information_suggested") {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::Generation("writer unavailable".to_string()));
            }
            self.drafts.fetch_add(1, Ordering::SeqCst);
            return Ok(json!({
                "title": "Council meeting report",
                "date": "2024-03-24",
                "body": format!("The council heard \"{}\"", quote),
                "information_suggested": "Budget figures",
                "summary": "The council met."
            })
            .to_string());
        }

        Err(Error::Generation("unexpected prompt".to_string()))
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub stub: Arc<NewsroomStub>,
    pub engine: WorkflowEngine,
}

impl Fixture {
    /// Write a source document whose quotable line is `minutes`
    pub fn source(&self, name: &str, minutes: &str) -> String {
        write_source(self.dir.path(), name, minutes)
    }
}

pub fn write_source(dir: &Path, name: &str, minutes: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, format!("Regular meeting\nMinutes: {}\nAdjourned\n", minutes)).unwrap();
    path.display().to_string()
}

fn build(dir: TempDir, store: Arc<dyn CheckpointStore>) -> Fixture {
    let stub = Arc::new(NewsroomStub::default());
    let ctx = StepContext {
        generator: stub.clone(),
        loader: Arc::new(TextSourceLoader::new(Duration::from_secs(5)).unwrap()),
        renderer: Arc::new(HtmlRenderer::new()),
        settings: WriterSettings::default(),
    };
    let engine = pipeline_engine(&ctx, store).unwrap();
    Fixture { dir, stub, engine }
}

/// Pipeline over an in-memory store
pub fn memory_fixture() -> Fixture {
    build(TempDir::new().unwrap(), Arc::new(MemoryCheckpointStore::new()))
}

/// Pipeline over a file store inside the fixture's temp dir
pub fn file_fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = FileCheckpointStore::new(dir.path().join("checkpoints"));
    build(dir, Arc::new(store))
}
