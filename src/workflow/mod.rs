//! Checkpointed step-graph execution
//!
//! Steps are registered under a [`StepId`], joined into a validated
//! [`WorkflowGraph`] and driven by a [`WorkflowEngine`] that persists a
//! [`Checkpoint`] after every step through a [`CheckpointStore`].

mod checkpoint;
mod engine;
mod graph;
mod step;

pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use engine::{RunOutcome, WorkflowEngine, DEFAULT_MAX_STEPS};
pub use graph::{BranchLabel, ConditionalEdge, ConfigError, Edge, GraphBuilder, WorkflowGraph};
pub use step::{step_fn, FnStep, Step, StepId, StepRegistry};
