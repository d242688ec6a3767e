//! The built-in build pipeline
//!
//! Registers the fixed task set once at startup: clean, restore,
//! compile, test, analysis, coverage and publish. Task bodies only
//! shell out to the configured external tools and move files around;
//! ordering, gating and sharding all live in gantry-pipeline.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use gantry_core::BuildContext;
use gantry_pipeline::{ActionContext, RegistryError, Task, TaskRegistry};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::ci::CiSink;
use crate::cli::tools::run_tool;

/// Target used when the caller names none
pub const DEFAULT_TARGET: &str = "compile";

/// Build the registry with the full built-in pipeline
pub fn standard_registry(
    build: &BuildContext,
    sink: Arc<dyn CiSink>,
) -> Result<TaskRegistry, RegistryError> {
    let output_dir = build.config.layout.output_dir.clone();
    let mut registry = TaskRegistry::new();

    registry.define(Task::new("clean", clean_action).with_runs_before("restore"))?;
    registry.define(Task::new("restore", restore_action))?;
    registry.define(Task::new("compile", compile_action).with_dependency("restore"))?;

    let test_sink = Arc::clone(&sink);
    registry.define(
        Task::new("test", move |ctx| test_action(ctx, test_sink.as_ref()))
            .with_dependency("compile")
            .with_produces(format!("{output_dir}/test-results/*.trx"))
            .with_produces(format!("{output_dir}/test-results/*.xml")),
    )?;

    registry.define(Task::new("analysis", analysis_action).with_dependency("restore"))?;

    let coverage_sink = Arc::clone(&sink);
    registry.define(
        Task::new("coverage", move |ctx| {
            coverage_action(ctx, coverage_sink.as_ref())
        })
        .with_dependency("test")
        .with_trigger("test")
        .with_consumes("**/test-results/*.xml")
        .with_produces(format!("{output_dir}/coverage-report.zip"))
        .with_gate(coverage_enabled),
    )?;

    registry.define(Task::new("publish", publish_action).with_dependency("test"))?;

    Ok(registry)
}

/// Coverage runs when explicitly requested, or always on CI.
///
/// The same predicate decides whether the test task collects coverage
/// data, so the report task never runs without its inputs.
fn coverage_enabled(build: &BuildContext, plan: &gantry_pipeline::RunPlan) -> bool {
    build.coverage || build.is_ci || plan.is_target("coverage")
}

fn clean_action(ctx: &ActionContext) -> anyhow::Result<()> {
    for dir in [ctx.build.source_dir(), ctx.build.tests_dir()] {
        remove_intermediate_dirs(&dir)?;
    }

    let artifacts_dir = ctx.build.artifacts_dir();
    if artifacts_dir.exists() {
        fs::remove_dir_all(&artifacts_dir)
            .with_context(|| format!("failed to clean {}", artifacts_dir.display()))?;
    }
    fs::create_dir_all(&artifacts_dir)?;
    Ok(())
}

/// Remove `bin` and `obj` directories anywhere under the given root
fn remove_intermediate_dirs(root: &Path) -> anyhow::Result<()> {
    if !root.exists() {
        return Ok(());
    }

    let mut walker = WalkDir::new(root).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            let name = entry.file_name().to_string_lossy();
            if name == "bin" || name == "obj" {
                debug!(path = %entry.path().display(), "removing intermediate directory");
                fs::remove_dir_all(entry.path())
                    .with_context(|| format!("failed to remove {}", entry.path().display()))?;
                walker.skip_current_dir();
            }
        }
    }
    Ok(())
}

fn restore_action(ctx: &ActionContext) -> anyhow::Result<()> {
    let mut args = vec!["restore".to_string()];
    if let Some(solution) = &ctx.build.config.project.solution {
        args.push(solution.clone());
    }
    run_tool(&ctx.build.config.tools.driver, &args, ctx.build.root())
}

fn compile_action(ctx: &ActionContext) -> anyhow::Result<()> {
    let mut args = vec!["build".to_string()];
    if let Some(solution) = &ctx.build.config.project.solution {
        args.push(solution.clone());
    }
    args.push("--configuration".to_string());
    args.push(ctx.build.mode.to_string());
    if ctx.already_ran("restore") {
        args.push("--no-restore".to_string());
    }
    run_tool(&ctx.build.config.tools.driver, &args, ctx.build.root())
}

fn test_action(ctx: &ActionContext, sink: &dyn CiSink) -> anyhow::Result<()> {
    let build = ctx.build;
    let projects = discover_test_projects(build)?;
    let shard = ctx.partition.select(&projects);
    if shard.is_empty() {
        info!(partition = %ctx.partition, "no test projects in this partition");
        return Ok(());
    }

    let collect_coverage = coverage_enabled(build, ctx.plan);
    let results_dir = build.test_results_dir();
    fs::create_dir_all(&results_dir)?;

    let mut result_files = Vec::new();
    for project in &shard {
        let name = project
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut args = vec![
            "test".to_string(),
            project.display().to_string(),
            "--configuration".to_string(),
            build.mode.to_string(),
            "--results-directory".to_string(),
            results_dir.display().to_string(),
            "--logger".to_string(),
            format!("trx;LogFileName={name}.trx"),
        ];
        if ctx.already_ran("compile") {
            args.push("--no-build".to_string());
        }
        if collect_coverage {
            args.push("-p:CollectCoverage=true".to_string());
            args.push("-p:CoverletOutputFormat=cobertura".to_string());
            args.push(format!(
                "-p:CoverletOutput={}",
                results_dir.join(format!("{name}.xml")).display()
            ));
            args.push("-p:ExcludeByFile=*Generated.cs".to_string());
        }

        run_tool(&build.config.tools.driver, &args, build.root())?;

        let trx = results_dir.join(format!("{name}.trx"));
        ctx.artifacts.record_one("test", &trx);
        result_files.push(trx);
        if collect_coverage {
            ctx.artifacts
                .record_one("test", results_dir.join(format!("{name}.xml")));
        }
    }

    sink.publish_test_results(&result_files);
    Ok(())
}

/// Test project directories under the tests dir, sorted for a stable
/// partition input
fn discover_test_projects(build: &BuildContext) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = build
        .tests_dir()
        .join(&build.config.project.test_project_pattern);
    let mut projects: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .context("invalid test project pattern")?
        .filter_map(Result::ok)
        .filter(|p| p.is_dir())
        .collect();
    projects.sort();
    Ok(projects)
}

fn analysis_action(ctx: &ActionContext) -> anyhow::Result<()> {
    let build = ctx.build;
    let output = build.output_dir().join("inspect.xml");
    fs::create_dir_all(build.output_dir())?;

    let mut args = vec![format!("--output={}", output.display())];
    if let Some(solution) = &build.config.project.solution {
        args.push(solution.clone());
    }
    run_tool(&build.config.tools.analyzer, &args, build.root())?;

    ctx.artifacts.record_one("analysis", &output);
    Ok(())
}

fn coverage_action(ctx: &ActionContext, sink: &dyn CiSink) -> anyhow::Result<()> {
    let build = ctx.build;

    // Consume exactly what the test task recorded, not hard-coded paths.
    let reports = ctx.artifacts.query("**/test-results/*.xml")?;
    if reports.is_empty() {
        info!("no coverage data recorded, skipping report generation");
        return Ok(());
    }

    let report_dir = build.coverage_report_dir();
    fs::create_dir_all(&report_dir)?;

    let joined = reports
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(";");
    let args = vec![
        format!("-reports:{joined}"),
        format!("-targetdir:{}", report_dir.display()),
        "-reporttypes:HtmlInline".to_string(),
    ];
    run_tool(&build.config.tools.report_generator, &args, build.root())?;

    // Compression is a pass-through call to the configured archiver.
    let archive = build.coverage_archive();
    if archive.exists() {
        fs::remove_file(&archive)?;
    }
    let archive_args = vec![
        "-r".to_string(),
        archive.display().to_string(),
        "coverage-report".to_string(),
    ];
    run_tool(&build.config.tools.archiver, &archive_args, &build.output_dir())?;

    ctx.artifacts.record_one("coverage", &archive);
    sink.publish_coverage(&reports, &report_dir);
    Ok(())
}

fn publish_action(ctx: &ActionContext) -> anyhow::Result<()> {
    let build = ctx.build;
    let projects = &build.config.project.publish_projects;
    if projects.is_empty() {
        info!("no publish projects configured");
        return Ok(());
    }

    for project in projects {
        let destination = build.artifacts_dir().join(project);
        let mut args = vec![
            "publish".to_string(),
            project.clone(),
            "--configuration".to_string(),
            build.mode.to_string(),
            "--output".to_string(),
            destination.display().to_string(),
        ];
        if ctx.already_ran("restore") {
            args.push("--no-restore".to_string());
        }

        run_tool(&build.config.tools.driver, &args, build.root())?;
        ctx.artifacts.record_one("publish", &destination);
    }
    Ok(())
}
