//! Graph validation and routing through the public API

use std::sync::Arc;

use meeting_reporter::steps::{graph_from_table, Route, PIPELINE};
use meeting_reporter::workflow::{
    step_fn, BranchLabel, MemoryCheckpointStore, StepRegistry, WorkflowEngine, WorkflowGraph,
};
use meeting_reporter::{ArticleRecord, ConfigError, Error, RecordUpdate, StepId};

/// A router whose declared image omits one of the labels it can return
#[derive(Debug, Clone, Copy)]
enum Leaky {
    Known,
    Undeclared,
}

impl BranchLabel for Leaky {
    fn all() -> &'static [Self] {
        &[Leaky::Known]
    }

    fn as_str(&self) -> &'static str {
        match self {
            Leaky::Known => "known",
            Leaky::Undeclared => "undeclared",
        }
    }
}

fn stubs() -> StepRegistry {
    StepId::ALL
        .into_iter()
        .fold(StepRegistry::new(), |registry, id| registry.register(id, step_fn(Ok)))
}

#[test]
fn test_pipeline_table_builds() {
    assert!(graph_from_table(&stubs(), PIPELINE).is_ok());
}

#[test]
fn test_table_with_dangling_route() {
    let table = [
        (StepId::Start, Route::Next(StepId::Input), true),
        (StepId::Input, Route::Next(StepId::Critique), false),
        (StepId::Output, Route::End, false),
    ];
    let err = graph_from_table(&stubs(), &table).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::UnknownStep {
            step: StepId::Critique,
            ..
        }
    ));
}

#[test]
fn test_table_without_terminal() {
    let table = [
        (StepId::Start, Route::Next(StepId::Input), true),
        (StepId::Input, Route::Next(StepId::Start), false),
    ];
    assert_eq!(
        graph_from_table(&stubs(), &table).unwrap_err(),
        ConfigError::MissingTerminal
    );
}

#[test]
fn test_empty_table() {
    assert_eq!(
        graph_from_table(&stubs(), &[]).unwrap_err(),
        ConfigError::MissingEntry
    );
}

#[tokio::test]
async fn test_undeclared_label_is_fatal_at_run_time() {
    let graph = WorkflowGraph::builder()
        .add_step(StepId::Start, step_fn(Ok))
        .add_step(StepId::Input, step_fn(Ok))
        .add_step(StepId::Output, step_fn(Ok))
        .add_edge(StepId::Start, StepId::Input)
        .add_conditional_edge(
            StepId::Input,
            |record: &ArticleRecord| {
                if record.has_critique() {
                    Leaky::Undeclared
                } else {
                    Leaky::Known
                }
            },
            &[(Leaky::Known, StepId::Output)],
        )
        .set_entry(StepId::Start)
        .set_terminal(StepId::Output)
        .set_interrupts(&[StepId::Start])
        .build()
        .unwrap();

    let engine = WorkflowEngine::new(Arc::new(graph), Arc::new(MemoryCheckpointStore::new()));
    engine.start("t").await.unwrap();

    let err = engine
        .resume("t", &RecordUpdate::new().critique(Some("go elsewhere")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Graph(ConfigError::UnmappedLabel {
            from: StepId::Input,
            ..
        })
    ));
    assert!(!err.is_resumable());

    // The happy label still routes
    engine.start("u").await.unwrap();
    let outcome = engine.resume("u", &RecordUpdate::new()).await.unwrap();
    assert!(outcome.is_finished());
}
