//! Gantry Core - shared configuration and build environment
//!
//! This crate holds the pieces every other Gantry crate needs: the
//! `gantry.toml` configuration types and loader, and the [`BuildContext`]
//! that captures environment-derived parameters once at startup.

pub mod config;
pub mod context;
pub mod error;

pub use config::{
    find_config, load_config, load_config_or_default, Config, LayoutConfig, ProjectConfig,
    ToolsConfig,
};
pub use context::{BuildContext, BuildMode, ParseBuildModeError};
pub use error::{ConfigError, Result};
