//! The article pipeline
//!
//! ```text
//! start ⏸ → input → outliner ⏸ → outline_review ─accept→ write → critique ⏸ → article_review ─accept→ output ■
//!                      ▲                 │revise          ▲                          │revise
//!                      └─────────────────┘                └──────────────────────────┘
//! ```
//!
//! ⏸ marks the steps after which a run suspends for a human answer.

mod critique;
mod intake;
mod outline;
mod output;
pub mod prompts;
mod review;
mod write;

pub use critique::CritiqueStep;
pub use intake::{InputStep, StartStep};
pub use outline::OutlinerStep;
pub use output::OutputStep;
pub use review::{ReviewDecision, ReviewStep};
pub use write::WriterStep;

use std::sync::Arc;

use crate::config::{ArticleConfig, Config};
use crate::generator::{create_generator, GenerationOptions, TextGenerator};
use crate::render::{HtmlRenderer, Renderer};
use crate::source::{SourceLoader, TextSourceLoader};
use crate::workflow::{
    CheckpointStore, ConfigError, FileCheckpointStore, GraphBuilder, StepId, StepRegistry,
    WorkflowEngine, WorkflowGraph,
};
use crate::{Error, Result};

/// Generation settings shared by the writing steps
#[derive(Debug, Clone, PartialEq)]
pub struct WriterSettings {
    /// Model for outlining, writing and quote repair; generator default when `None`
    pub model: Option<String>,
    /// Model for the critic
    pub critique_model: Option<String>,
    pub writer_temperature: f32,
    pub critique_temperature: f32,
    /// Article length when the intake form gives none
    pub default_words: u32,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            model: None,
            critique_model: None,
            writer_temperature: 0.5,
            critique_temperature: 1.0,
            default_words: ArticleConfig::default().words,
        }
    }
}

impl WriterSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: Some(config.generator.model.clone()),
            critique_model: Some(config.generator.critique_model.clone()),
            writer_temperature: config.generator.writer_temperature,
            critique_temperature: config.generator.critique_temperature,
            default_words: config.article.words,
        }
    }

    pub fn writer_options(&self) -> GenerationOptions {
        let options = GenerationOptions::json(self.writer_temperature);
        match &self.model {
            Some(model) => options.with_model(model),
            None => options,
        }
    }

    pub fn critique_options(&self) -> GenerationOptions {
        let options = GenerationOptions::exact().with_temperature(self.critique_temperature);
        match &self.critique_model {
            Some(model) => options.with_model(model),
            None => options,
        }
    }
}

/// Collaborators the pipeline steps are built from
#[derive(Clone)]
pub struct StepContext {
    pub generator: Arc<dyn TextGenerator>,
    pub loader: Arc<dyn SourceLoader>,
    pub renderer: Arc<dyn Renderer>,
    pub settings: WriterSettings,
}

impl StepContext {
    /// Context backed by the configured generator and the plain-text loader
    pub fn from_config(config: &Config) -> Result<Self> {
        let generator: Arc<dyn TextGenerator> = Arc::from(create_generator(config)?);
        let loader = TextSourceLoader::new(config.source.fetch_timeout)?;
        Ok(Self {
            generator,
            loader: Arc::new(loader),
            renderer: Arc::new(HtmlRenderer::new()),
            settings: WriterSettings::from_config(config),
        })
    }
}

/// Every pipeline step, built from one context
pub fn standard_registry(ctx: &StepContext) -> StepRegistry {
    StepRegistry::new()
        .register(StepId::Start, Arc::new(StartStep))
        .register(
            StepId::Input,
            Arc::new(InputStep::new(ctx.loader.clone(), ctx.settings.default_words)),
        )
        .register(
            StepId::Outliner,
            Arc::new(OutlinerStep::new(ctx.generator.clone(), ctx.settings.clone())),
        )
        .register(
            StepId::OutlineReview,
            Arc::new(ReviewStep::new(StepId::OutlineReview)),
        )
        .register(
            StepId::Write,
            Arc::new(WriterStep::new(ctx.generator.clone(), ctx.settings.clone())),
        )
        .register(
            StepId::Critique,
            Arc::new(CritiqueStep::new(ctx.generator.clone(), ctx.settings.clone())),
        )
        .register(
            StepId::ArticleReview,
            Arc::new(ReviewStep::new(StepId::ArticleReview)),
        )
        .register(StepId::Output, Arc::new(OutputStep::new(ctx.renderer.clone())))
}

/// How a pipeline step hands over to the next
#[derive(Debug, Clone, Copy)]
pub enum Route {
    Next(StepId),
    Review { accept: StepId, revise: StepId },
    End,
}

/// The pipeline as data: step, outgoing route, suspend after it
pub const PIPELINE: &[(StepId, Route, bool)] = &[
    (StepId::Start, Route::Next(StepId::Input), true),
    (StepId::Input, Route::Next(StepId::Outliner), false),
    (StepId::Outliner, Route::Next(StepId::OutlineReview), true),
    (
        StepId::OutlineReview,
        Route::Review {
            accept: StepId::Write,
            revise: StepId::Outliner,
        },
        false,
    ),
    (StepId::Write, Route::Next(StepId::Critique), false),
    (StepId::Critique, Route::Next(StepId::ArticleReview), true),
    (
        StepId::ArticleReview,
        Route::Review {
            accept: StepId::Output,
            revise: StepId::Write,
        },
        false,
    ),
    (StepId::Output, Route::End, false),
];

/// Build a graph from a route table; the first row is the entry
pub fn graph_from_table(
    registry: &StepRegistry,
    table: &[(StepId, Route, bool)],
) -> std::result::Result<WorkflowGraph, ConfigError> {
    let ids: Vec<_> = table.iter().map(|(id, _, _)| *id).collect();
    let mut builder = GraphBuilder::new().add_steps(registry, &ids);

    if let Some((entry, _, _)) = table.first() {
        builder = builder.set_entry(*entry);
    }
    for (id, route, _) in table {
        builder = match route {
            Route::Next(to) => builder.add_edge(*id, *to),
            Route::Review { accept, revise } => builder.add_conditional_edge(
                *id,
                ReviewDecision::route,
                &[
                    (ReviewDecision::Accept, *accept),
                    (ReviewDecision::Revise, *revise),
                ],
            ),
            Route::End => builder.set_terminal(*id),
        };
    }

    let interrupts: Vec<_> = table
        .iter()
        .filter(|(_, _, interrupt)| *interrupt)
        .map(|(id, _, _)| *id)
        .collect();
    builder.set_interrupts(&interrupts).build()
}

/// The standard article graph
pub fn pipeline_graph(registry: &StepRegistry) -> std::result::Result<WorkflowGraph, ConfigError> {
    graph_from_table(registry, PIPELINE)
}

/// Engine over the standard graph with the given context and store
pub fn pipeline_engine(ctx: &StepContext, store: Arc<dyn CheckpointStore>) -> Result<WorkflowEngine> {
    let graph = pipeline_graph(&standard_registry(ctx))?;
    Ok(WorkflowEngine::new(Arc::new(graph), store))
}

/// Engine wired from configuration, checkpointing to the configured directory
pub fn engine_from_config(config: &Config) -> Result<WorkflowEngine> {
    config.validate()?;
    let ctx = StepContext::from_config(config)?;
    let store = FileCheckpointStore::new(config.checkpoint_dir());
    pipeline_engine(&ctx, Arc::new(store)).map_err(|e| match e {
        Error::Graph(inner) => Error::Config(format!("Invalid pipeline: {}", inner)),
        other => other,
    })
}
