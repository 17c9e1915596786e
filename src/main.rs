//! testauto - command-line front end
//!
//! ## Usage
//!
//! ```bash
//! # Run the demo suite with four workers
//! testauto run demo --parallel 4
//!
//! # Stop at the first failing P0 case, retry the rest once at the end
//! testauto run demo -s first-p0-not-pass -r rerun-last --html report.html
//!
//! # List suites and cases
//! testauto list --detailed
//!
//! # Write an example configuration file
//! testauto config init
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, info_span};

use testauto::cli::{self, Args, Command, ConfigAction};
use testauto::config::{self, AppConfig, EnvConfig};
use testauto::executor::TestRunner;
use testauto::recorder::DefaultRecorder;
use testauto::results::{ReportFormat, ReportGenerator, StoredRun};
use testauto::suites;
use testauto::task::{CaseFilter, Comparison};
use testauto::utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Only commands that use the run configuration read it
    let resolved = match &args.command {
        Command::Run(run_args) => Some(AppConfig::resolve(run_args.config.as_deref())?),
        Command::Config(cli::ConfigArgs {
            action: ConfigAction::Show { config },
        }) => Some(AppConfig::resolve(config.as_deref())?),
        _ => None,
    };
    let (app_config, config_path) = resolved.unwrap_or_default();

    init_logger(if args.verbose {
        LogLevel::Debug
    } else {
        app_config.log_level
    });
    if let Some(path) = &config_path {
        debug!("Using configuration file {}", path.display());
    }

    match args.command {
        Command::Run(run_args) => {
            let all_passed = run_suite(run_args, app_config).await?;
            if !all_passed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::List(list_args) => {
            list_suites(list_args)?;
        }
        Command::Config(config_args) => {
            manage_config(config_args, &app_config, config_path)?;
        }
        Command::Report(report_args) => {
            render_report(report_args)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_suite(args: cli::RunArgs, mut app_config: AppConfig) -> Result<bool> {
    args.apply(&mut app_config)?;

    let suite = suites::find(&args.suite)
        .ok_or_else(|| anyhow!("Unknown suite: {} (see `testauto list`)", args.suite))?;
    let mut task = suite.build()?;

    if args.include_incomplete {
        task.remove_filters();
    }
    let priorities = args.priorities()?;
    if !priorities.is_empty() {
        task.add_filter(CaseFilter::priority(Comparison::Contains, priorities)?)?;
    }

    let cases = task.filter_test_cases();
    info!(
        "Running suite '{}': {} of {} cases selected",
        suite.name,
        cases.len(),
        task.len()
    );

    let recorder = DefaultRecorder::new()
        .with_span(info_span!("recorder", suite = suite.name))
        .with_artifacts(app_config.report.artifacts());

    let summary = TestRunner::new(app_config.run_options())?
        .run(&cases, Arc::new(recorder))
        .await?;

    Ok(summary.is_all_passed())
}

fn list_suites(args: cli::ListArgs) -> Result<()> {
    let selected: Vec<_> = match &args.suite {
        Some(name) => vec![suites::find(name).ok_or_else(|| anyhow!("Unknown suite: {name}"))?],
        None => suites::all(),
    };

    for suite in selected {
        let task = suite.build()?;
        println!("\n{} - {} ({} cases)", suite.name, suite.description, task.len());
        println!("──────────────────────────────────────────────────────────────────────");

        for case in task.test_cases() {
            let meta = case.meta();
            let draft = if meta.completed { "" } else { "  [incomplete]" };

            if args.detailed {
                println!(
                    "  [{}] {:12} {}{}",
                    meta.priority,
                    meta.module,
                    case.display_name(),
                    draft
                );
                if !meta.description.is_empty() {
                    println!("       {}", meta.description);
                }
                println!("       designer: {}, version: {}", meta.designer, meta.version);
            } else {
                println!("  [{}] {}{}", meta.priority, case.display_name(), draft);
            }
        }
    }
    println!();

    Ok(())
}

fn manage_config(
    args: cli::ConfigArgs,
    app_config: &AppConfig,
    config_path: Option<std::path::PathBuf>,
) -> Result<()> {
    match args.action {
        ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }

            AppConfig::example().save(&path)?;
            println!("✓ Configuration file created: {}", path.display());
            println!("\nEdit the file to customize your settings.");
        }

        ConfigAction::Show { .. } => {
            match &config_path {
                Some(path) => println!("# from {}", path.display()),
                None => println!("# defaults (no configuration file found)"),
            }
            let output =
                serde_yaml::to_string(app_config).context("Failed to serialize config")?;
            println!("{output}");
        }

        ConfigAction::Env => {
            config::print_env_help();
            println!();
            EnvConfig::load().print_summary();
        }
    }

    Ok(())
}

fn render_report(args: cli::ReportArgs) -> Result<()> {
    let format = ReportFormat::from_str(&args.format)
        .ok_or_else(|| anyhow!("Unknown report format: {}", args.format))?;
    let run = StoredRun::load(&args.file)
        .with_context(|| format!("Failed to load run from {}", args.file.display()))?;

    let report = ReportGenerator::render(&run, format);
    match &args.output {
        Some(path) => {
            std::fs::write(path, report)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Report written to {}", path.display());
        }
        None => print!("{report}"),
    }

    Ok(())
}
