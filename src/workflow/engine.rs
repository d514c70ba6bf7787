//! Workflow execution
//!
//! The engine walks a [`WorkflowGraph`] one step at a time, checkpointing the
//! record after every completed step. A run stops when an interrupt step
//! completes (the thread is suspended, waiting for a human) or when the
//! terminal step completes. `resume` merges the human's answer into the
//! suspended record and routes onward from the step that suspended.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::checkpoint::{Checkpoint, CheckpointStore, ThreadLocks};
use super::graph::WorkflowGraph;
use super::step::StepId;
use crate::article::{ArticleRecord, FormNumber, RecordUpdate};
use crate::{Error, Result};

/// Default cap on steps run by one invocation
pub const DEFAULT_MAX_STEPS: usize = 64;

/// Where an invocation stopped
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// An interrupt step completed; the thread waits for `resume`
    Suspended { step: StepId, record: ArticleRecord },
    /// The terminal step completed
    Finished { record: ArticleRecord },
}

impl RunOutcome {
    pub fn record(&self) -> &ArticleRecord {
        match self {
            RunOutcome::Suspended { record, .. } | RunOutcome::Finished { record } => record,
        }
    }

    pub fn into_record(self) -> ArticleRecord {
        match self {
            RunOutcome::Suspended { record, .. } | RunOutcome::Finished { record } => record,
        }
    }

    /// Form the caller should present next
    pub fn form_number(&self) -> FormNumber {
        self.record().form_number
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RunOutcome::Finished { .. })
    }

    /// Step the thread is suspended after, if suspended
    pub fn suspended_at(&self) -> Option<StepId> {
        match self {
            RunOutcome::Suspended { step, .. } => Some(*step),
            RunOutcome::Finished { .. } => None,
        }
    }
}

/// Runs threads over a graph, persisting through a checkpoint store
///
/// Invocations on the same thread are serialized; invocations on different
/// threads run concurrently.
pub struct WorkflowEngine {
    graph: Arc<WorkflowGraph>,
    store: Arc<dyn CheckpointStore>,
    locks: ThreadLocks,
    max_steps: usize,
}

impl WorkflowEngine {
    pub fn new(graph: Arc<WorkflowGraph>, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            graph,
            store,
            locks: ThreadLocks::default(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Limit the steps one invocation may run before giving up
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Begin a thread from the entry step
    ///
    /// If the thread already has a checkpoint nothing runs: a suspended or
    /// finished thread reports where it stands, and a thread that stopped on
    /// a step error must be continued with `resume`.
    pub async fn start(&self, thread_id: &str) -> Result<RunOutcome> {
        let _guard = self.locks.acquire(thread_id).await;

        if let Some(checkpoint) = self.store.load(thread_id).await? {
            debug!("Thread {} already exists at {}", thread_id, checkpoint.step);
            return self.existing_outcome(checkpoint);
        }

        info!("Starting thread {}", thread_id);
        self.run_from(thread_id, self.graph.entry(), ArticleRecord::new(), None)
            .await
    }

    /// Continue a thread after merging `update` into its record
    ///
    /// The update is applied to the checkpointed record, the result is routed
    /// through the outgoing edge of the checkpointed step, and the merged
    /// record is persisted before the next step runs.
    pub async fn resume(&self, thread_id: &str, update: &RecordUpdate) -> Result<RunOutcome> {
        let _guard = self.locks.acquire(thread_id).await;

        let checkpoint = self
            .store
            .load(thread_id)
            .await?
            .filter(|c| !c.finished)
            .ok_or_else(|| Error::NoCheckpoint(thread_id.to_string()))?;

        let mut record = checkpoint.record.clone();
        record.apply(update)?;
        if !update.is_empty() {
            let keys: Vec<_> = update.keys().collect();
            debug!("Merged update into {}: {}", thread_id, keys.join(", "));
        }

        let next = self
            .graph
            .next(checkpoint.step, &record)?
            .ok_or_else(|| Error::NoCheckpoint(thread_id.to_string()))?;

        let merged = checkpoint.with_record(record.clone());
        self.store.save(&merged).await?;

        info!(
            "Resuming thread {} after {} at {}",
            thread_id, checkpoint.step, next
        );
        self.run_from(thread_id, next, record, Some(merged)).await
    }

    /// Latest checkpoint of a thread
    pub async fn status(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        self.store.load(thread_id).await
    }

    /// Forget a thread
    pub async fn discard(&self, thread_id: &str) -> Result<bool> {
        let guard = self.locks.acquire(thread_id).await;
        let removed = self.store.discard(thread_id).await?;
        drop(guard);
        self.locks.prune().await;
        if removed {
            info!("Discarded thread {}", thread_id);
        }
        Ok(removed)
    }

    /// Every known thread, most recently updated first
    pub async fn threads(&self) -> Result<Vec<Checkpoint>> {
        self.store.list().await
    }

    fn existing_outcome(&self, checkpoint: Checkpoint) -> Result<RunOutcome> {
        if checkpoint.finished {
            Ok(RunOutcome::Finished {
                record: checkpoint.record,
            })
        } else if self.graph.is_interrupt(checkpoint.step) {
            Ok(RunOutcome::Suspended {
                step: checkpoint.step,
                record: checkpoint.record,
            })
        } else {
            Err(Error::ThreadInProgress(checkpoint.thread_id))
        }
    }

    async fn run_from(
        &self,
        thread_id: &str,
        first: StepId,
        record: ArticleRecord,
        previous: Option<Checkpoint>,
    ) -> Result<RunOutcome> {
        let mut current = first;
        let mut record = record;
        let mut previous = previous;

        for _ in 0..self.max_steps {
            let step = self
                .graph
                .step(current)
                .ok_or_else(|| Error::step(current, "step is not registered"))?;

            debug!("Running step {} for {}", current, thread_id);
            record = match step.run(record).await {
                Ok(record) => record,
                Err(e) => {
                    error!("Step {} failed for {}: {}", current, thread_id, e);
                    return Err(match e {
                        Error::Step { .. } => e,
                        other => Error::step(current, other.to_string()),
                    });
                }
            };

            let finished = current == self.graph.terminal();
            let mut checkpoint = match &previous {
                Some(previous) => previous.advance(current, record.clone()),
                None => Checkpoint::new(thread_id, current, record.clone()),
            };
            checkpoint.finished = finished;
            self.store.save(&checkpoint).await?;

            if finished {
                info!("Thread {} finished", thread_id);
                return Ok(RunOutcome::Finished { record });
            }
            if self.graph.is_interrupt(current) {
                info!(
                    "Thread {} suspended after {} (form {})",
                    thread_id, current, record.form_number
                );
                return Ok(RunOutcome::Suspended {
                    step: current,
                    record,
                });
            }

            let next = self
                .graph
                .next(current, &record)?
                .ok_or_else(|| Error::step(current, "no successor for non-terminal step"))?;
            previous = Some(checkpoint);
            current = next;
        }

        warn!(
            "Thread {} ran {} steps without reaching a gate",
            thread_id, self.max_steps
        );
        Err(Error::step(
            current,
            format!("step limit of {} reached without suspending", self.max_steps),
        ))
    }
}
