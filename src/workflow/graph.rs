//! Workflow graph construction and validation
//!
//! A graph is a set of registered steps joined by edges. Every non-terminal
//! step has exactly one outgoing edge: either a plain edge to a fixed
//! successor, or a conditional edge whose router picks a label that is looked
//! up in a branch map. All structural checks happen in [`GraphBuilder::build`];
//! the only failure left for run time is a router returning a label it never
//! declared.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::step::{Step, StepId, StepRegistry};
use crate::article::ArticleRecord;

/// Structural problems found while building or routing a graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Step {0} is registered twice")]
    DuplicateStep(StepId),

    #[error("{context} refers to step {step}, which is not registered")]
    UnknownStep { context: String, step: StepId },

    #[error("Step {0} has more than one outgoing edge")]
    DuplicateEdge(StepId),

    #[error("No entry step was set")]
    MissingEntry,

    #[error("No terminal step was set")]
    MissingTerminal,

    #[error("Terminal step {0} must not have an outgoing edge")]
    TerminalHasEdge(StepId),

    #[error("Step {0} has no outgoing edge and is not the terminal step")]
    DeadEnd(StepId),

    #[error("Conditional edge from {from} has no branch for label '{label}'")]
    IncompleteBranchMap { from: StepId, label: String },

    #[error("Conditional edge from {from} maps label '{label}', which its router never returns")]
    UnknownLabel { from: StepId, label: String },

    #[error("Router for {from} returned undeclared label '{label}'")]
    UnmappedLabel { from: StepId, label: String },

    #[error("Terminal step {0} cannot be an interrupt")]
    TerminalInterrupt(StepId),
}

/// Closed set of labels a router may return
///
/// `all()` is the router's declared image; the builder checks the branch map
/// against it.
pub trait BranchLabel: Copy + Send + Sync + 'static {
    fn all() -> &'static [Self];
    fn as_str(&self) -> &'static str;
}

type Router = Arc<dyn Fn(&ArticleRecord) -> &'static str + Send + Sync>;

/// Conditional routing out of one step
#[derive(Clone)]
pub struct ConditionalEdge {
    router: Router,
    labels: Vec<&'static str>,
    branches: BTreeMap<&'static str, StepId>,
}

impl std::fmt::Debug for ConditionalEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalEdge")
            .field("labels", &self.labels)
            .field("branches", &self.branches)
            .finish()
    }
}

/// Outgoing edge of a step
#[derive(Debug, Clone)]
pub enum Edge {
    Direct(StepId),
    Conditional(ConditionalEdge),
}

impl Edge {
    fn targets(&self) -> Vec<StepId> {
        match self {
            Edge::Direct(to) => vec![*to],
            Edge::Conditional(edge) => edge.branches.values().copied().collect(),
        }
    }
}

/// Builder for [`WorkflowGraph`]
///
/// Adding things never fails; every problem is reported by `build()`.
#[derive(Default)]
pub struct GraphBuilder {
    steps: HashMap<StepId, Arc<dyn Step>>,
    edges: Vec<(StepId, Edge)>,
    entry: Option<StepId>,
    terminal: Option<StepId>,
    interrupts: Vec<StepId>,
    errors: Vec<ConfigError>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step under an id
    pub fn add_step(mut self, id: StepId, step: Arc<dyn Step>) -> Self {
        if self.steps.insert(id, step).is_some() {
            self.errors.push(ConfigError::DuplicateStep(id));
        }
        self
    }

    /// Register the named steps from a registry
    pub fn add_steps(mut self, registry: &StepRegistry, ids: &[StepId]) -> Self {
        for id in ids {
            match registry.get(*id) {
                Some(step) => self = self.add_step(*id, step),
                None => self.errors.push(ConfigError::UnknownStep {
                    context: "registry lookup".to_string(),
                    step: *id,
                }),
            }
        }
        self
    }

    /// Unconditional edge
    pub fn add_edge(mut self, from: StepId, to: StepId) -> Self {
        self.edges.push((from, Edge::Direct(to)));
        self
    }

    /// Edge whose target is chosen by `router` after `from` completes
    pub fn add_conditional_edge<L, F>(
        mut self,
        from: StepId,
        router: F,
        branches: &[(L, StepId)],
    ) -> Self
    where
        L: BranchLabel,
        F: Fn(&ArticleRecord) -> L + Send + Sync + 'static,
    {
        let edge = ConditionalEdge {
            router: Arc::new(move |record: &ArticleRecord| router(record).as_str()),
            labels: L::all().iter().map(|label| label.as_str()).collect(),
            branches: branches
                .iter()
                .map(|(label, to)| (label.as_str(), *to))
                .collect(),
        };
        self.edges.push((from, Edge::Conditional(edge)));
        self
    }

    pub fn set_entry(mut self, id: StepId) -> Self {
        self.entry = Some(id);
        self
    }

    pub fn set_terminal(mut self, id: StepId) -> Self {
        self.terminal = Some(id);
        self
    }

    /// Suspend the run after each of these steps completes
    pub fn set_interrupts(mut self, ids: &[StepId]) -> Self {
        self.interrupts = ids.to_vec();
        self
    }

    /// Validate and freeze the graph
    pub fn build(self) -> Result<WorkflowGraph, ConfigError> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        let entry = self.entry.ok_or(ConfigError::MissingEntry)?;
        let terminal = self.terminal.ok_or(ConfigError::MissingTerminal)?;

        let known = |context: &str, step: StepId| {
            if self.steps.contains_key(&step) {
                Ok(())
            } else {
                Err(ConfigError::UnknownStep {
                    context: context.to_string(),
                    step,
                })
            }
        };

        known("entry", entry)?;
        known("terminal", terminal)?;
        for id in &self.interrupts {
            known("interrupt", *id)?;
            if *id == terminal {
                return Err(ConfigError::TerminalInterrupt(*id));
            }
        }

        let mut edges = HashMap::new();
        for (from, edge) in self.edges {
            known(&format!("edge from {}", from), from)?;
            for to in edge.targets() {
                known(&format!("edge {} -> {}", from, to), to)?;
            }
            if from == terminal {
                return Err(ConfigError::TerminalHasEdge(from));
            }
            if let Edge::Conditional(conditional) = &edge {
                for label in &conditional.labels {
                    if !conditional.branches.contains_key(label) {
                        return Err(ConfigError::IncompleteBranchMap {
                            from,
                            label: label.to_string(),
                        });
                    }
                }
                for label in conditional.branches.keys() {
                    if !conditional.labels.contains(label) {
                        return Err(ConfigError::UnknownLabel {
                            from,
                            label: label.to_string(),
                        });
                    }
                }
            }
            if edges.insert(from, edge).is_some() {
                return Err(ConfigError::DuplicateEdge(from));
            }
        }

        let mut ids: Vec<_> = self.steps.keys().copied().collect();
        ids.sort();
        for id in ids {
            if id != terminal && !edges.contains_key(&id) {
                return Err(ConfigError::DeadEnd(id));
            }
        }

        debug!(
            "Built workflow graph: {} steps, entry {}, terminal {}",
            self.steps.len(),
            entry,
            terminal
        );

        Ok(WorkflowGraph {
            steps: self.steps,
            edges,
            entry,
            terminal,
            interrupts: self.interrupts.into_iter().collect(),
        })
    }
}

/// A validated, immutable workflow graph
pub struct WorkflowGraph {
    steps: HashMap<StepId, Arc<dyn Step>>,
    edges: HashMap<StepId, Edge>,
    entry: StepId,
    terminal: StepId,
    interrupts: HashSet<StepId>,
}

impl std::fmt::Debug for WorkflowGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowGraph")
            .field("entry", &self.entry)
            .field("terminal", &self.terminal)
            .field("edges", &self.edges)
            .field("interrupts", &self.interrupts)
            .finish()
    }
}

impl WorkflowGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn entry(&self) -> StepId {
        self.entry
    }

    pub fn terminal(&self) -> StepId {
        self.terminal
    }

    pub fn is_interrupt(&self, id: StepId) -> bool {
        self.interrupts.contains(&id)
    }

    pub fn step(&self, id: StepId) -> Option<&Arc<dyn Step>> {
        self.steps.get(&id)
    }

    pub fn edge(&self, from: StepId) -> Option<&Edge> {
        self.edges.get(&from)
    }

    /// Successor of `from` given the record as it stands after `from` ran
    ///
    /// `None` means `from` is the terminal step.
    pub fn next(&self, from: StepId, record: &ArticleRecord) -> Result<Option<StepId>, ConfigError> {
        match self.edges.get(&from) {
            None => Ok(None),
            Some(Edge::Direct(to)) => Ok(Some(*to)),
            Some(Edge::Conditional(edge)) => {
                let label = (edge.router)(record);
                let to = edge
                    .branches
                    .get(label)
                    .copied()
                    .ok_or_else(|| ConfigError::UnmappedLabel {
                        from,
                        label: label.to_string(),
                    })?;
                debug!("Routing {} -> {} via '{}'", from, to, label);
                Ok(Some(to))
            }
        }
    }
}
