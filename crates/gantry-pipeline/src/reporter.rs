//! Task execution reporting

use std::time::Duration;

/// Events emitted during plan execution
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// A task is starting execution
    Started { name: String },
    /// A task completed successfully
    Completed { name: String, duration: Duration },
    /// A task failed
    Failed {
        name: String,
        duration: Duration,
        error: String,
        best_effort: bool,
    },
    /// A task was skipped without running
    Skipped { name: String, reason: String },
    /// The whole plan finished
    RunCompleted {
        total: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        duration: Duration,
    },
}

/// Trait for reporting execution progress
pub trait TaskReporter: Send + Sync {
    /// Handle an execution event
    fn report(&self, event: &TaskEvent);
}

/// Reporter that logs through tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl TaskReporter for TracingReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { name } => {
                tracing::info!("Starting {}", name);
            }
            TaskEvent::Completed { name, duration } => {
                tracing::info!("{} completed in {:.1}s", name, duration.as_secs_f64());
            }
            TaskEvent::Failed {
                name,
                duration,
                error,
                best_effort,
            } => {
                if *best_effort {
                    tracing::warn!(
                        "{} failed after {:.1}s (best effort, continuing): {}",
                        name,
                        duration.as_secs_f64(),
                        error
                    );
                } else {
                    tracing::error!(
                        "{} failed after {:.1}s: {}",
                        name,
                        duration.as_secs_f64(),
                        error
                    );
                }
            }
            TaskEvent::Skipped { name, reason } => {
                tracing::info!("{} skipped: {}", name, reason);
            }
            TaskEvent::RunCompleted {
                total,
                succeeded,
                failed,
                skipped,
                duration,
            } => {
                tracing::info!(
                    "Run complete: {}/{} succeeded, {} failed, {} skipped ({:.1}s)",
                    succeeded,
                    total,
                    failed,
                    skipped,
                    duration.as_secs_f64()
                );
            }
        }
    }
}

/// Reporter that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: std::sync::Mutex<Vec<TaskEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl TaskReporter for CollectingReporter {
    fn report(&self, event: &TaskEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}
