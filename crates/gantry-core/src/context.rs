//! Build environment capture
//!
//! All environment-derived parameters (build mode, CI detection, coverage
//! request) are resolved exactly once into a [`BuildContext`] at startup.
//! Nothing downstream reads the process environment again.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::config::Config;

/// Build configuration mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Unoptimized build with debug assertions
    Debug,
    /// Optimized build
    Release,
}

impl BuildMode {
    /// The name passed to external tools (e.g. `--configuration Release`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Release => "Release",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`BuildMode`] from a string
#[derive(Debug, Error)]
#[error("Invalid build mode '{0}' (expected 'debug' or 'release')")]
pub struct ParseBuildModeError(String);

impl FromStr for BuildMode {
    type Err = ParseBuildModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            other => Err(ParseBuildModeError(other.to_string())),
        }
    }
}

/// Resolved, read-only parameters for one build invocation.
///
/// Constructed once at process start via [`BuildContext::detect`] and
/// passed by reference into the resolver and executor.
#[derive(Debug, Clone)]
pub struct BuildContext {
    root: PathBuf,
    /// Build configuration mode
    pub mode: BuildMode,
    /// Whether the process is running under a CI system
    pub is_ci: bool,
    /// Whether the CI system is Azure Pipelines
    pub azure_pipelines: bool,
    /// Whether coverage collection was explicitly requested
    pub coverage: bool,
    /// Loaded configuration
    pub config: Config,
}

impl BuildContext {
    /// Create a context with explicit environment values (used in tests
    /// and anywhere the process environment must not be consulted).
    pub fn new(
        root: impl Into<PathBuf>,
        config: Config,
        mode: BuildMode,
        is_ci: bool,
        azure_pipelines: bool,
        coverage: bool,
    ) -> Self {
        Self {
            root: root.into(),
            mode,
            is_ci,
            azure_pipelines,
            coverage,
            config,
        }
    }

    /// Capture the process environment into a context.
    ///
    /// The mode defaults to Debug locally and Release under CI, matching
    /// the convention that automated builds are always optimized.
    pub fn detect(
        root: impl Into<PathBuf>,
        config: Config,
        mode: Option<BuildMode>,
        coverage: bool,
    ) -> Self {
        let azure_pipelines = env_flag("TF_BUILD");
        let is_ci = env_flag("CI") || env_flag("GITHUB_ACTIONS") || azure_pipelines;
        let mode = mode.unwrap_or(if is_ci {
            BuildMode::Release
        } else {
            BuildMode::Debug
        });

        debug!(%mode, is_ci, azure_pipelines, coverage, "build context captured");
        Self::new(root, config, mode, is_ci, azure_pipelines, coverage)
    }

    /// Repository root all relative paths resolve against
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory containing production code
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.source_dir)
    }

    /// Directory containing test projects
    pub fn tests_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.tests_dir)
    }

    /// Directory receiving published build artifacts
    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join(&self.config.layout.artifacts_dir)
    }

    /// Directory receiving test results and reports
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.config.layout.output_dir)
    }

    /// Directory receiving per-project test result files
    pub fn test_results_dir(&self) -> PathBuf {
        self.output_dir().join("test-results")
    }

    /// Directory receiving the generated coverage report
    pub fn coverage_report_dir(&self) -> PathBuf {
        self.output_dir().join("coverage-report")
    }

    /// Compressed archive of the coverage report
    pub fn coverage_archive(&self) -> PathBuf {
        self.output_dir().join("coverage-report.zip")
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_mode_parse() {
        assert_eq!("debug".parse::<BuildMode>().unwrap(), BuildMode::Debug);
        assert_eq!("Release".parse::<BuildMode>().unwrap(), BuildMode::Release);
        assert!("fast".parse::<BuildMode>().is_err());
    }

    #[test]
    fn test_build_mode_display() {
        assert_eq!(BuildMode::Debug.to_string(), "Debug");
        assert_eq!(BuildMode::Release.to_string(), "Release");
    }

    #[test]
    fn test_layout_paths() {
        let ctx = BuildContext::new(
            "/work",
            Config::default(),
            BuildMode::Debug,
            false,
            false,
            false,
        );

        assert_eq!(ctx.source_dir(), PathBuf::from("/work/src"));
        assert_eq!(ctx.tests_dir(), PathBuf::from("/work/tests"));
        assert_eq!(
            ctx.test_results_dir(),
            PathBuf::from("/work/output/test-results")
        );
        assert_eq!(
            ctx.coverage_archive(),
            PathBuf::from("/work/output/coverage-report.zip")
        );
    }
}
