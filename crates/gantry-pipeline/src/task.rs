//! Task definitions
//!
//! A [`Task`] is an immutable record built once at startup: a unique
//! name, its relationships to other tasks (by name), declared input and
//! output globs, and an executable action. Relationships stay plain name
//! references until the resolver turns them into a graph.

use std::fmt;

use gantry_core::BuildContext;

use crate::executor::ActionContext;
use crate::resolver::RunPlan;

/// Executable body of a task
pub type Action = Box<dyn Fn(&ActionContext) -> anyhow::Result<()> + Send + Sync>;

/// Conditional gate evaluated once before a task's action runs.
///
/// Returning false skips the task for this invocation.
pub type Gate = Box<dyn Fn(&BuildContext, &RunPlan) -> bool + Send + Sync>;

/// A named, dependency-ordered unit of work
pub struct Task {
    name: String,
    depends_on: Vec<String>,
    triggered_by: Vec<String>,
    runs_before: Vec<String>,
    consumes: Vec<String>,
    produces: Vec<String>,
    best_effort: bool,
    gate: Option<Gate>,
    action: Action,
}

impl Task {
    /// Create a task with a name and an action
    pub fn new(
        name: impl Into<String>,
        action: impl Fn(&ActionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            triggered_by: Vec::new(),
            runs_before: Vec::new(),
            consumes: Vec::new(),
            produces: Vec::new(),
            best_effort: false,
            gate: None,
            action: Box::new(action),
        }
    }

    /// Require another task to complete before this one runs
    pub fn with_dependency(mut self, task: impl Into<String>) -> Self {
        self.depends_on.push(task.into());
        self
    }

    /// Run this task whenever the named task is in the plan.
    ///
    /// The trigger orders this task after the named one but does not pull
    /// the named task into the plan by itself.
    pub fn with_trigger(mut self, task: impl Into<String>) -> Self {
        self.triggered_by.push(task.into());
        self
    }

    /// Order this task before the named one when both are in the plan,
    /// without creating a dependency
    pub fn with_runs_before(mut self, task: impl Into<String>) -> Self {
        self.runs_before.push(task.into());
        self
    }

    /// Declare an input glob consumed by this task
    pub fn with_consumes(mut self, pattern: impl Into<String>) -> Self {
        self.consumes.push(pattern.into());
        self
    }

    /// Declare an output glob produced by this task
    pub fn with_produces(mut self, pattern: impl Into<String>) -> Self {
        self.produces.push(pattern.into());
        self
    }

    /// Mark this task best-effort: its failure is logged but does not
    /// abort the remaining plan
    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    /// Attach a conditional gate evaluated once before the action runs
    pub fn with_gate(
        mut self,
        gate: impl Fn(&BuildContext, &RunPlan) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.gate = Some(Box::new(gate));
        self
    }

    /// Task name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tasks that must complete before this one
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Tasks whose presence in the plan also runs this task
    pub fn triggered_by(&self) -> &[String] {
        &self.triggered_by
    }

    /// Tasks this one is ordered before
    pub fn runs_before(&self) -> &[String] {
        &self.runs_before
    }

    /// Declared input globs
    pub fn consumes(&self) -> &[String] {
        &self.consumes
    }

    /// Declared output globs
    pub fn produces(&self) -> &[String] {
        &self.produces
    }

    /// Whether a failure of this task aborts the remaining plan
    pub fn is_best_effort(&self) -> bool {
        self.best_effort
    }

    /// Conditional gate, if any
    pub fn gate(&self) -> Option<&Gate> {
        self.gate.as_ref()
    }

    /// Executable action
    pub fn action(&self) -> &Action {
        &self.action
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .field("triggered_by", &self.triggered_by)
            .field("runs_before", &self.runs_before)
            .field("consumes", &self.consumes)
            .field("produces", &self.produces)
            .field("best_effort", &self.best_effort)
            .field("gated", &self.gate.is_some())
            .finish()
    }
}
