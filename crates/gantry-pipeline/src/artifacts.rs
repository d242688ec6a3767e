//! Artifact tracking
//!
//! Tasks record the concrete files they produced; later tasks query them
//! by glob instead of hard-coding paths. The tracker lives for one run
//! and uses interior mutability so actions record through the shared
//! reference handed to them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use globset::Glob;
use tracing::debug;

/// Errors from artifact queries
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Invalid glob pattern
    #[error("Invalid artifact glob: {0}")]
    Pattern(#[from] globset::Error),
}

/// Per-run record of which task produced which files
#[derive(Debug, Default)]
pub struct ArtifactTracker {
    outputs: Mutex<BTreeMap<String, Vec<PathBuf>>>,
}

impl ArtifactTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record files produced by a task
    pub fn record(&self, task: &str, paths: impl IntoIterator<Item = PathBuf>) {
        let mut outputs = self.outputs.lock().unwrap_or_else(|e| e.into_inner());
        let entry = outputs.entry(task.to_string()).or_default();
        for path in paths {
            debug!(task, path = %path.display(), "artifact recorded");
            entry.push(path);
        }
    }

    /// All files recorded by the named task, in recording order
    pub fn outputs_of(&self, task: &str) -> Vec<PathBuf> {
        let outputs = self.outputs.lock().unwrap_or_else(|e| e.into_inner());
        outputs.get(task).cloned().unwrap_or_default()
    }

    /// All recorded files matching a glob, across tasks, sorted
    pub fn query(&self, pattern: &str) -> Result<Vec<PathBuf>, ArtifactError> {
        let matcher = Glob::new(pattern)?.compile_matcher();
        let outputs = self.outputs.lock().unwrap_or_else(|e| e.into_inner());

        let mut matches: Vec<PathBuf> = outputs
            .values()
            .flatten()
            .filter(|p| matcher.is_match(p))
            .cloned()
            .collect();
        matches.sort();
        matches.dedup();
        Ok(matches)
    }

    /// Total number of recorded files
    pub fn len(&self) -> usize {
        let outputs = self.outputs.lock().unwrap_or_else(|e| e.into_inner());
        outputs.values().map(Vec::len).sum()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Convenience for recording a single path
impl ArtifactTracker {
    /// Record one file produced by a task
    pub fn record_one(&self, task: &str, path: impl AsRef<Path>) {
        self.record(task, [path.as_ref().to_path_buf()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_outputs_of() {
        let tracker = ArtifactTracker::new();
        tracker.record(
            "test",
            [
                PathBuf::from("output/test-results/First.Tests.trx"),
                PathBuf::from("output/test-results/First.Tests.xml"),
            ],
        );
        tracker.record_one("coverage", "output/coverage-report.zip");

        assert_eq!(tracker.outputs_of("test").len(), 2);
        assert_eq!(
            tracker.outputs_of("coverage"),
            [PathBuf::from("output/coverage-report.zip")]
        );
        assert!(tracker.outputs_of("compile").is_empty());
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_query_by_glob() {
        let tracker = ArtifactTracker::new();
        tracker.record(
            "test",
            [
                PathBuf::from("output/test-results/B.Tests.xml"),
                PathBuf::from("output/test-results/A.Tests.xml"),
                PathBuf::from("output/test-results/A.Tests.trx"),
            ],
        );

        let coverage_files = tracker.query("**/test-results/*.xml").unwrap();
        assert_eq!(
            coverage_files,
            [
                PathBuf::from("output/test-results/A.Tests.xml"),
                PathBuf::from("output/test-results/B.Tests.xml"),
            ]
        );
    }

    #[test]
    fn test_query_invalid_pattern() {
        let tracker = ArtifactTracker::new();
        assert!(matches!(
            tracker.query("a{b"),
            Err(ArtifactError::Pattern(_))
        ));
    }

    #[test]
    fn test_empty_tracker() {
        let tracker = ArtifactTracker::new();
        assert!(tracker.is_empty());
        assert!(tracker.query("**/*").unwrap().is_empty());
    }
}
