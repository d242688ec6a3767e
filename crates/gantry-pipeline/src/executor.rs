//! Plan execution
//!
//! Runs a resolved plan sequentially, in order. Task actions are
//! synchronous and typically block on external processes. A failing task
//! aborts everything after it unless it was marked best-effort.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gantry_core::BuildContext;
use tracing::instrument;

use crate::artifacts::ArtifactTracker;
use crate::partition::Partition;
use crate::registry::{RegistryError, TaskRegistry};
use crate::reporter::{TaskEvent, TaskReporter};
use crate::resolver::RunPlan;

/// Errors from plan execution
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The plan referenced a task missing from the registry
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A task action failed
    #[error("Task '{task}' failed: {cause}")]
    TaskFailed { task: String, cause: String },
}

/// Everything a task action may consult while running
pub struct ActionContext<'a> {
    /// Resolved build parameters
    pub build: &'a BuildContext,
    /// The plan being executed, including the satisfied set
    pub plan: &'a RunPlan,
    /// This invocation's work shard
    pub partition: Partition,
    /// Shared artifact tracker for recording and querying outputs
    pub artifacts: &'a ArtifactTracker,
}

impl ActionContext<'_> {
    /// Whether the named task already completed earlier in this run.
    ///
    /// Lets an action hand work off to a predecessor, e.g. skipping the
    /// implicit restore once the restore task has run.
    pub fn already_ran(&self, task: &str) -> bool {
        self.plan.is_satisfied(task)
    }
}

/// Final status of one task in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Action completed successfully
    Succeeded,
    /// Action failed with the given cause
    Failed(String),
    /// Task did not run (gate false, or already satisfied)
    Skipped(String),
    /// Task never started because an earlier task failed
    Aborted,
}

impl TaskStatus {
    /// Whether this status counts as a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Outcome of one task
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Task name
    pub name: String,
    /// Final status
    pub status: TaskStatus,
    /// Time the action spent running
    pub duration: Duration,
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Per-task outcomes, in plan order
    pub outcomes: Vec<TaskOutcome>,
    /// Wall-clock time for the run
    pub duration: Duration,
}

impl RunReport {
    /// Whether every task either succeeded or was legitimately skipped
    pub fn success(&self) -> bool {
        !self
            .outcomes
            .iter()
            .any(|o| o.status.is_failure() || o.status == TaskStatus::Aborted)
    }

    /// Outcomes of failed tasks
    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_failure())
    }

    /// Turn the first failure into an error, if any
    pub fn check(&self) -> Result<(), ExecError> {
        match self.failures().next() {
            None => Ok(()),
            Some(outcome) => {
                let cause = match &outcome.status {
                    TaskStatus::Failed(cause) => cause.clone(),
                    _ => String::new(),
                };
                Err(ExecError::TaskFailed {
                    task: outcome.name.clone(),
                    cause,
                })
            }
        }
    }
}

/// Sequential plan executor
pub struct Executor {
    partition: Partition,
    reporter: Arc<dyn TaskReporter>,
}

impl Executor {
    /// Create an executor for one invocation
    pub fn new(partition: Partition, reporter: Arc<dyn TaskReporter>) -> Self {
        Self {
            partition,
            reporter,
        }
    }

    /// Execute every task in the plan, in order.
    ///
    /// Dependency order is a strict precondition: a task starts only
    /// after all of its predecessors in the plan completed successfully.
    /// On a non-best-effort failure the remaining tasks are recorded as
    /// aborted and never start.
    #[instrument(skip_all, fields(tasks = plan.len(), partition = %self.partition))]
    pub fn run(
        &self,
        registry: &TaskRegistry,
        mut plan: RunPlan,
        build: &BuildContext,
        artifacts: &ArtifactTracker,
    ) -> Result<RunReport, ExecError> {
        let run_start = Instant::now();
        let names: Vec<String> = plan.tasks().to_vec();
        let mut outcomes: Vec<TaskOutcome> = Vec::with_capacity(names.len());
        let mut aborted = false;

        for name in names {
            if aborted {
                self.reporter.report(&TaskEvent::Skipped {
                    name: name.clone(),
                    reason: "aborted: an earlier task failed".to_string(),
                });
                outcomes.push(TaskOutcome {
                    name,
                    status: TaskStatus::Aborted,
                    duration: Duration::ZERO,
                });
                continue;
            }

            let task = registry.get(&name)?;

            if plan.is_satisfied(&name) {
                self.reporter.report(&TaskEvent::Skipped {
                    name: name.clone(),
                    reason: "already satisfied in this run".to_string(),
                });
                outcomes.push(TaskOutcome {
                    name,
                    status: TaskStatus::Skipped("already satisfied".to_string()),
                    duration: Duration::ZERO,
                });
                continue;
            }

            // The gate is evaluated exactly once, before the action.
            if let Some(gate) = task.gate() {
                if !gate(build, &plan) {
                    self.reporter.report(&TaskEvent::Skipped {
                        name: name.clone(),
                        reason: "condition not met".to_string(),
                    });
                    outcomes.push(TaskOutcome {
                        name,
                        status: TaskStatus::Skipped("condition not met".to_string()),
                        duration: Duration::ZERO,
                    });
                    continue;
                }
            }

            self.reporter.report(&TaskEvent::Started { name: name.clone() });
            let start = Instant::now();
            let result = {
                let ctx = ActionContext {
                    build,
                    plan: &plan,
                    partition: self.partition,
                    artifacts,
                };
                (task.action())(&ctx)
            };
            let duration = start.elapsed();

            match result {
                Ok(()) => {
                    plan.mark_satisfied(&name);
                    self.reporter.report(&TaskEvent::Completed {
                        name: name.clone(),
                        duration,
                    });
                    outcomes.push(TaskOutcome {
                        name,
                        status: TaskStatus::Succeeded,
                        duration,
                    });
                }
                Err(e) => {
                    let cause = format!("{e:#}");
                    let best_effort = task.is_best_effort();
                    self.reporter.report(&TaskEvent::Failed {
                        name: name.clone(),
                        duration,
                        error: cause.clone(),
                        best_effort,
                    });
                    outcomes.push(TaskOutcome {
                        name,
                        status: TaskStatus::Failed(cause),
                        duration,
                    });
                    if !best_effort {
                        aborted = true;
                    }
                }
            }
        }

        let duration = run_start.elapsed();
        let succeeded = outcomes
            .iter()
            .filter(|o| o.status == TaskStatus::Succeeded)
            .count();
        let failed = outcomes.iter().filter(|o| o.status.is_failure()).count();
        let skipped = outcomes.len() - succeeded - failed;

        self.reporter.report(&TaskEvent::RunCompleted {
            total: outcomes.len(),
            succeeded,
            failed,
            skipped,
            duration,
        });

        Ok(RunReport { outcomes, duration })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use gantry_core::{BuildMode, Config};

    use crate::reporter::CollectingReporter;
    use crate::resolver::resolve;
    use crate::task::Task;

    fn test_build() -> BuildContext {
        BuildContext::new(
            ".",
            Config::default(),
            BuildMode::Debug,
            false,
            false,
            false,
        )
    }

    fn logging_task(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Task {
        let log = Arc::clone(log);
        let task_name = name.to_string();
        Task::new(name, move |_| {
            log.lock().unwrap().push(task_name.clone());
            Ok(())
        })
    }

    fn run_plan(
        registry: &TaskRegistry,
        targets: &[&str],
    ) -> (RunReport, Arc<CollectingReporter>) {
        let targets: Vec<String> = targets.iter().map(|s| s.to_string()).collect();
        let plan = resolve(registry, &targets).unwrap();
        let reporter = Arc::new(CollectingReporter::default());
        let executor = Executor::new(Partition::single(), reporter.clone());
        let report = executor
            .run(registry, plan, &test_build(), &ArtifactTracker::new())
            .unwrap();
        (report, reporter)
    }

    #[test]
    fn test_tasks_run_in_dependency_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TaskRegistry::new();
        registry.define(logging_task("restore", &log)).unwrap();
        registry
            .define(logging_task("compile", &log).with_dependency("restore"))
            .unwrap();
        registry
            .define(logging_task("test", &log).with_dependency("compile"))
            .unwrap();

        let (report, _) = run_plan(&registry, &["test"]);

        assert!(report.success());
        assert_eq!(*log.lock().unwrap(), ["restore", "compile", "test"]);
    }

    #[test]
    fn test_failure_aborts_remaining_tasks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TaskRegistry::new();
        registry.define(logging_task("restore", &log)).unwrap();
        registry
            .define(
                Task::new("compile", |_| anyhow::bail!("build driver exited with status 1"))
                    .with_dependency("restore"),
            )
            .unwrap();
        registry
            .define(logging_task("test", &log).with_dependency("compile"))
            .unwrap();
        registry
            .define(
                logging_task("coverage", &log)
                    .with_dependency("test")
                    .with_trigger("test"),
            )
            .unwrap();

        let (report, _) = run_plan(&registry, &["test"]);

        assert!(!report.success());
        // restore ran, test and coverage never started
        assert_eq!(*log.lock().unwrap(), ["restore"]);
        assert_eq!(report.outcomes[2].status, TaskStatus::Aborted);
        assert_eq!(report.outcomes[3].status, TaskStatus::Aborted);

        match report.check() {
            Err(ExecError::TaskFailed { task, cause }) => {
                assert_eq!(task, "compile");
                assert!(cause.contains("status 1"));
            }
            other => panic!("expected TaskFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_best_effort_failure_continues() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TaskRegistry::new();
        registry.define(logging_task("restore", &log)).unwrap();
        registry
            .define(
                Task::new("analysis", |_| anyhow::bail!("analyzer crashed"))
                    .with_dependency("restore")
                    .best_effort(),
            )
            .unwrap();
        registry
            .define(logging_task("compile", &log).with_dependency("restore"))
            .unwrap();

        let (report, _) = run_plan(&registry, &["analysis", "compile"]);

        // compile still ran even though analysis failed
        assert!(log.lock().unwrap().contains(&"compile".to_string()));
        assert_eq!(report.failures().count(), 1);
        // the failure is still reported as such
        assert!(report.check().is_err());
    }

    #[test]
    fn test_satisfied_task_is_not_rerun() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TaskRegistry::new();
        registry.define(logging_task("restore", &log)).unwrap();
        registry
            .define(logging_task("compile", &log).with_dependency("restore"))
            .unwrap();

        let mut plan = resolve(&registry, &["compile".to_string()]).unwrap();
        plan.mark_satisfied("restore");

        let reporter = Arc::new(CollectingReporter::default());
        let executor = Executor::new(Partition::single(), reporter);
        let report = executor
            .run(&registry, plan, &test_build(), &ArtifactTracker::new())
            .unwrap();

        assert!(report.success());
        assert_eq!(*log.lock().unwrap(), ["compile"]);
        assert!(matches!(report.outcomes[0].status, TaskStatus::Skipped(_)));
    }

    #[test]
    fn test_gate_skips_task() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TaskRegistry::new();
        registry.define(logging_task("test", &log)).unwrap();
        registry
            .define(
                logging_task("coverage", &log)
                    .with_dependency("test")
                    .with_trigger("test")
                    .with_gate(|build, plan| {
                        build.coverage || build.is_ci || plan.is_target("coverage")
                    }),
            )
            .unwrap();

        // Local run without the coverage flag: gate is false
        let (report, _) = run_plan(&registry, &["test"]);
        assert_eq!(*log.lock().unwrap(), ["test"]);
        assert!(matches!(report.outcomes[1].status, TaskStatus::Skipped(_)));

        // Requesting coverage directly satisfies the gate
        log.lock().unwrap().clear();
        let (report, _) = run_plan(&registry, &["coverage"]);
        assert!(report.success());
        assert_eq!(*log.lock().unwrap(), ["test", "coverage"]);
    }

    #[test]
    fn test_actions_see_satisfied_predecessors() {
        let saw_restore = Arc::new(Mutex::new(false));
        let saw = Arc::clone(&saw_restore);

        let mut registry = TaskRegistry::new();
        registry.define(Task::new("restore", |_| Ok(()))).unwrap();
        registry
            .define(
                Task::new("compile", move |ctx| {
                    *saw.lock().unwrap() = ctx.already_ran("restore");
                    Ok(())
                })
                .with_dependency("restore"),
            )
            .unwrap();

        let (report, _) = run_plan(&registry, &["compile"]);
        assert!(report.success());
        assert!(*saw_restore.lock().unwrap());
    }

    #[test]
    fn test_reporter_receives_events() {
        let mut registry = TaskRegistry::new();
        registry.define(Task::new("restore", |_| Ok(()))).unwrap();

        let (_, reporter) = run_plan(&registry, &["restore"]);
        let events = reporter.events();

        assert!(matches!(events[0], TaskEvent::Started { .. }));
        assert!(matches!(events[1], TaskEvent::Completed { .. }));
        assert!(matches!(events.last(), Some(TaskEvent::RunCompleted { .. })));
    }

    #[test]
    fn test_actions_record_artifacts() {
        let mut registry = TaskRegistry::new();
        registry
            .define(
                Task::new("test", |ctx| {
                    ctx.artifacts
                        .record_one("test", "output/test-results/A.Tests.trx");
                    Ok(())
                })
                .with_produces("output/test-results/*.trx"),
            )
            .unwrap();

        let plan = resolve(&registry, &["test".to_string()]).unwrap();
        let artifacts = ArtifactTracker::new();
        let executor = Executor::new(
            Partition::single(),
            Arc::new(CollectingReporter::default()),
        );
        let report = executor
            .run(&registry, plan, &test_build(), &artifacts)
            .unwrap();

        assert!(report.success());
        assert_eq!(artifacts.outputs_of("test").len(), 1);
    }
}
