//! Console reporter with styled output

use console::style;
use gantry_pipeline::{TaskEvent, TaskReporter};

/// Reporter printing one line per task to the terminal
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    /// Create a console reporter
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl TaskReporter for ConsoleReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { name } => {
                println!("  {} {}", style("▸").dim(), style(name).bold());
            }
            TaskEvent::Completed { name, duration } => {
                println!(
                    "  {} {} {}",
                    style("✓").green(),
                    style(name).green(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim()
                );
            }
            TaskEvent::Failed {
                name,
                duration,
                error,
                best_effort,
            } => {
                let marker = if *best_effort {
                    style("!").yellow()
                } else {
                    style("✗").red()
                };
                println!(
                    "  {} {} {} {}",
                    marker,
                    style(name).red(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim(),
                    style(error).red().dim()
                );
            }
            TaskEvent::Skipped { name, reason } => {
                if self.verbose {
                    println!(
                        "  {} {} {}",
                        style("○").yellow(),
                        style(name).yellow(),
                        style(format!("({reason})")).dim()
                    );
                }
            }
            TaskEvent::RunCompleted {
                total,
                succeeded,
                failed,
                skipped,
                duration,
            } => {
                println!();
                println!(
                    "  {} {}/{} succeeded, {} failed, {} skipped ({:.1}s)",
                    if *failed == 0 {
                        style("✓").green().bold()
                    } else {
                        style("✗").red().bold()
                    },
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
