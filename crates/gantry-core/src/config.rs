//! Configuration types and loading
//!
//! Gantry reads an optional `gantry.toml` describing the solution under
//! build. Every field has a sensible default so a bare repository works
//! without any configuration file at all.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};

/// Main configuration for Gantry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Solution and project layout
    pub project: ProjectConfig,

    /// Output directory layout
    pub layout: LayoutConfig,

    /// External tool commands
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            layout: LayoutConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Solution and project layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Solution file passed to the build driver (driver default if unset)
    pub solution: Option<String>,

    /// Directory containing production code
    pub source_dir: String,

    /// Directory containing test projects
    pub tests_dir: String,

    /// Name pattern matching test project directories (e.g. "*.Tests")
    pub test_project_pattern: String,

    /// Projects published by the publish task
    pub publish_projects: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            solution: None,
            source_dir: "src".to_string(),
            tests_dir: "tests".to_string(),
            test_project_pattern: "*.Tests".to_string(),
            publish_projects: Vec::new(),
        }
    }
}

/// Output directory layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Directory receiving published build artifacts
    pub artifacts_dir: String,

    /// Directory receiving test results and reports
    pub output_dir: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: "artifacts".to_string(),
            output_dir: "output".to_string(),
        }
    }
}

/// External tool commands
///
/// Every tool is an opaque command resolved on PATH; Gantry only
/// orchestrates, it never interprets tool output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Build driver (restore/build/test/publish)
    pub driver: String,

    /// Static analyzer
    pub analyzer: String,

    /// Coverage report generator
    pub report_generator: String,

    /// Archive utility used to compress the coverage report
    pub archiver: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            driver: "dotnet".to_string(),
            analyzer: "inspectcode".to_string(),
            report_generator: "reportgenerator".to_string(),
            archiver: "zip".to_string(),
        }
    }
}

/// Load configuration from a file
pub fn load_config(path: &Path) -> Result<Config> {
    info!(path = %path.display(), "loading config");

    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: Config = toml::from_str(&content).map_err(ConfigError::TomlError)?;

    validate_config(&config)?;
    debug!(path = %path.display(), "config loaded and validated");
    Ok(config)
}

/// Find `gantry.toml` in a directory or its parents.
///
/// Parents are walked until the filesystem root; the first match wins.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    debug!(start_dir = %start_dir.display(), "searching for config file");
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join("gantry.toml");
        if config_path.exists() {
            info!(path = %config_path.display(), "found config file");
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    debug!("no config file found");
    None
}

/// Load configuration from a directory, falling back to defaults
pub fn load_config_or_default(dir: &Path) -> (Config, Option<PathBuf>) {
    match find_config(dir) {
        Some(path) => match load_config(&path) {
            Ok(config) => (config, Some(path)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                (Config::default(), None)
            }
        },
        None => {
            debug!(dir = %dir.display(), "no config found, using defaults");
            (Config::default(), None)
        }
    }
}

fn validate_config(config: &Config) -> Result<()> {
    let non_empty = [
        ("project.source_dir", &config.project.source_dir),
        ("project.tests_dir", &config.project.tests_dir),
        (
            "project.test_project_pattern",
            &config.project.test_project_pattern,
        ),
        ("layout.artifacts_dir", &config.layout.artifacts_dir),
        ("layout.output_dir", &config.layout.output_dir),
        ("tools.driver", &config.tools.driver),
    ];

    for (field, value) in non_empty {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                message: "must not be empty".to_string(),
            });
        }
    }

    Ok(())
}
