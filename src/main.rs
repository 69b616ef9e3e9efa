//! commit-buddy - CLI entry point.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commit_buddy::config::{
    BackendKind, Config, ConfigOverrides, ConfigSource, LoadedConfig, default_config_path,
    write_default_config,
};
use commit_buddy::doctor::{megabytes, run_doctor};
use commit_buddy::error::ConfigError;
use commit_buddy::git::GitCli;
use commit_buddy::llm::build_backend;
use commit_buddy::ui::{ConsoleReporter, DialoguerPrompter, Reporter};
use commit_buddy::{CommitWorkflow, RunSummary, WorkflowOptions};

/// Generate conventional commit messages from your changes with a local model.
#[derive(Parser, Debug)]
#[command(name = "commit-buddy")]
#[command(about = "Generate conventional commit messages from your changes with a local model")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to a config file (skips the search order)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Model to use: a model name for Ollama, or a GGUF file path for the local backend
    #[arg(short = 'm', long, global = true)]
    model: Option<String>,

    /// Analyze and show proposed commits without committing
    #[arg(short = 'a', long, global = true)]
    analyze_only: bool,

    /// Use unstaged working tree changes and split them into logical commits
    #[arg(short = 'u', long, global = true)]
    unstaged: bool,

    /// Commit without asking for confirmation
    #[arg(long, global = true)]
    auto_commit: bool,

    /// Show full analysis and debug logs
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Print the effective configuration and exit
    #[arg(long, global = true)]
    show_config: bool,

    /// Number of layers to offload to the GPU
    #[arg(short = 'g', long, global = true)]
    gpu_layers: Option<i32>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Generate commit messages (default)
    Generate,
    /// Check config, git and backend readiness
    Doctor,
    /// Write the default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let command = cli.command.unwrap_or(Command::Generate);
    if let Command::Init { force } = command {
        return init_config(force);
    }

    // Step 1: Load configuration and apply CLI overrides
    let mut loaded = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    loaded.config.apply_overrides(&ConfigOverrides {
        model: cli.model.clone(),
        auto_commit: cli.auto_commit,
        verbose: cli.verbose,
        gpu_layers: cli.gpu_layers,
    });

    if cli.show_config {
        return show_config(&loaded);
    }

    if loaded.source == ConfigSource::Defaults {
        eprintln!("No config file found, using defaults. Run `commit-buddy init` to create one.");
    }

    let git = GitCli::new(loaded.config.git_command.clone());

    if command == Command::Doctor {
        return doctor(&loaded, &git).await;
    }

    generate(&cli, &loaded.config, &git).await
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("commit_buddy=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn init_config(force: bool) -> Result<()> {
    let path = default_config_path().ok_or(ConfigError::NoConfigDirectory)?;
    write_default_config(&path, force).context("Failed to write default config")?;
    println!("✓ Wrote default config to {}", path.display());
    Ok(())
}

fn show_config(loaded: &LoadedConfig) -> Result<()> {
    let yaml = loaded.config.to_yaml()?;
    println!("# Loaded from: {}", loaded.source);
    println!("{}", yaml.trim_end());

    if loaded.config.resolved_backend() == BackendKind::Local {
        let path = loaded.config.expanded_model_path();
        match std::fs::metadata(&path) {
            Ok(meta) => println!(
                "# Model file: {} (exists, {:.2} MB)",
                path.display(),
                megabytes(meta.len())
            ),
            Err(_) => println!("# Model file: {} (missing)", path.display()),
        }
    }
    Ok(())
}

async fn doctor(loaded: &LoadedConfig, git: &GitCli) -> Result<()> {
    let report = run_doctor(loaded, git).await;
    for check in &report.checks {
        println!("{check}");
    }

    if !report.passed() {
        anyhow::bail!("Some checks failed");
    }
    println!("✓ All checks passed");
    Ok(())
}

async fn generate(cli: &Cli, config: &Config, git: &GitCli) -> Result<()> {
    let reporter = ConsoleReporter;
    let prompter = DialoguerPrompter;

    // Step 2: Prepare the completion backend (loads the local model once)
    let backend = build_backend(config, cli.verbose)
        .await
        .context("Failed to prepare model backend")?;
    reporter.step(&format!("Using {}", backend.describe()));

    // Step 3: Run the workflow, stopping cleanly on Ctrl-C
    let workflow = CommitWorkflow::new(git, backend.as_ref(), config, &reporter, &prompter);
    let options = WorkflowOptions {
        include_unstaged: cli.unstaged,
        analyze_only: cli.analyze_only,
        auto_commit: config.auto_commit,
        verbose: config.chain_verbose,
    };

    let summary = tokio::select! {
        result = workflow.run(&options) => result.context("Commit generation failed")?,
        _ = tokio::signal::ctrl_c() => {
            reporter.notice("Interrupted. No further commits will be made.");
            return Ok(());
        }
    };

    print_summary(&reporter, &summary, cli.analyze_only);
    Ok(())
}

fn print_summary(reporter: &dyn Reporter, summary: &RunSummary, analyze_only: bool) {
    if analyze_only {
        reporter.success("Analysis complete. No commits were made.");
        return;
    }
    if summary.skipped == 0 && summary.failed == 0 {
        return;
    }

    let line = format!(
        "Done: {} committed, {} skipped, {} failed",
        summary.committed.len(),
        summary.skipped,
        summary.failed
    );
    if summary.failed > 0 {
        reporter.error(&line);
    } else {
        reporter.step(&line);
    }
}
