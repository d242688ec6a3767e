//! CLI definition and invocation handling

pub mod pipeline;
pub mod reporter;
pub mod tools;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use console::style;

use gantry_core::{load_config_or_default, BuildContext, BuildMode};
use gantry_pipeline::{
    resolve, ArtifactTracker, Executor, Partition, TaskReporter, TracingReporter,
};

use crate::ci;
use reporter::ConsoleReporter;

/// Gantry - task-dependency build pipeline
#[derive(Debug, Parser)]
#[command(name = "gantry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Target tasks to run (default: compile)
    pub targets: Vec<String>,

    /// Build mode; defaults to debug locally and release under CI
    #[arg(long)]
    pub mode: Option<BuildMode>,

    /// Enable coverage collection during test execution
    #[arg(long)]
    pub coverage: bool,

    /// Zero-based index of this invocation's test partition
    #[arg(long, default_value_t = 0)]
    pub partition_index: usize,

    /// Total number of test partitions
    #[arg(long, default_value_t = 1)]
    pub partition_count: usize,

    /// Print the resolved plan without executing it
    #[arg(long)]
    pub plan: bool,

    /// Working directory
    #[arg(short = 'C', long)]
    pub directory: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Execute the invocation
    pub fn execute(&self) -> anyhow::Result<()> {
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }
        let root = std::env::current_dir()?;

        let (config, config_path) = load_config_or_default(&root);
        if let Some(path) = &config_path {
            tracing::debug!(path = %path.display(), "using configuration file");
        }

        let build = BuildContext::detect(root, config, self.mode, self.coverage);
        let partition = Partition::new(self.partition_index, self.partition_count)?;

        let sink = ci::detect_sink(&build);
        let registry = pipeline::standard_registry(&build, sink)?;

        let targets: Vec<String> = if self.targets.is_empty() {
            vec![pipeline::DEFAULT_TARGET.to_string()]
        } else {
            self.targets.iter().map(|t| t.to_lowercase()).collect()
        };

        let run_plan = resolve(&registry, &targets)?;

        if !self.quiet {
            println!();
            println!(
                "{} {} task{} planned, {} mode, partition {}",
                style("→").blue(),
                run_plan.len(),
                if run_plan.len() == 1 { "" } else { "s" },
                style(build.mode).cyan(),
                style(partition).cyan(),
            );
            if self.verbose || self.plan {
                println!();
                print!("{}", run_plan.describe(&registry));
            }
            println!();
        }

        if self.plan {
            return Ok(());
        }

        let task_reporter: Arc<dyn TaskReporter> = if self.quiet {
            Arc::new(TracingReporter)
        } else {
            Arc::new(ConsoleReporter::new(self.verbose))
        };

        let artifacts = ArtifactTracker::new();
        let executor = Executor::new(partition, task_reporter);
        let report = executor.run(&registry, run_plan, &build, &artifacts)?;

        if !self.quiet {
            for outcome in report.failures() {
                println!(
                    "    {} {}",
                    style("✗").red(),
                    style(&outcome.name).red()
                );
            }
        }

        report.check()?;
        Ok(())
    }
}
