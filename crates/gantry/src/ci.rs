//! CI reporting sink
//!
//! Test results and coverage data are handed to the surrounding CI
//! system when one is present. On Azure Pipelines this means emitting
//! logging commands on stdout; everywhere else the sink is a no-op.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gantry_core::BuildContext;
use tracing::debug;

/// Sink receiving test-result and coverage files after the relevant
/// tasks produce them
pub trait CiSink: Send + Sync {
    /// Publish per-project test result files
    fn publish_test_results(&self, results: &[PathBuf]);

    /// Publish coverage summaries and the generated report directory
    fn publish_coverage(&self, summaries: &[PathBuf], report_dir: &Path);
}

/// Sink used outside CI: does nothing
pub struct NoopSink;

impl CiSink for NoopSink {
    fn publish_test_results(&self, results: &[PathBuf]) {
        debug!(count = results.len(), "not running under CI, test results not published");
    }

    fn publish_coverage(&self, _summaries: &[PathBuf], _report_dir: &Path) {
        debug!("not running under CI, coverage not published");
    }
}

/// Sink emitting Azure Pipelines logging commands
pub struct AzurePipelinesSink;

impl AzurePipelinesSink {
    fn test_results_command(file: &Path) -> String {
        let title = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(
            "##vso[results.publish type=VSTest;mergeResults=false;runTitle={title};resultFiles={}]",
            file.display()
        )
    }

    fn coverage_command(summary: &Path, report_dir: &Path) -> String {
        format!(
            "##vso[codecoverage.publish codecoveragetool=Cobertura;summaryfile={};reportdirectory={}]",
            summary.display(),
            report_dir.display()
        )
    }
}

impl CiSink for AzurePipelinesSink {
    fn publish_test_results(&self, results: &[PathBuf]) {
        for file in results {
            println!("{}", Self::test_results_command(file));
        }
    }

    fn publish_coverage(&self, summaries: &[PathBuf], report_dir: &Path) {
        for summary in summaries {
            println!("{}", Self::coverage_command(summary, report_dir));
        }
    }
}

/// Pick the sink for this invocation based on the captured environment
pub fn detect_sink(build: &BuildContext) -> Arc<dyn CiSink> {
    if build.azure_pipelines {
        Arc::new(AzurePipelinesSink)
    } else {
        Arc::new(NoopSink)
    }
}
