//! 🚀 dux-cli: the front door, the bouncer, the maitre d' of dux.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary parses flags, sets up logging, loads config, and lets the library do the
//! heavy lifting. Like a manager. 🦆
//!
//! Exit codes: 0 = every branch walked, 1 = report printed but some branches failed,
//! 2 = couldn't even get started.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use dux::Command;
use dux::common::NodeId;

/// 🌲 `du` and `find` for remote trees.
#[derive(Debug, Parser)]
#[command(name = "dux", version)]
struct Cli {
    /// TOML config file. Env vars (DUX_*) are read either way.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Concurrent workers. Overrides runtime.workers.
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Don't draw the spinner.
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Storage by top-level folder and by owner.
    Du {
        /// Sort folders by size, biggest first.
        #[arg(short = 's')]
        sort_by_size: bool,
        /// Node to start from. Falls back to the provider's configured root.
        root: Option<String>,
    },
    /// List every leaf's path.
    Find {
        root: Option<String>,
    },
}

impl From<CliCommand> for Command {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Du { sort_by_size, root } => Command::Du {
                root: root.map(NodeId::from),
                sort_by_size,
            },
            CliCommand::Find { root } => Command::Find {
                root: root.map(NodeId::from),
            },
        }
    }
}

/// 🚀 main(): the "I pressed enter and held my breath" moment.
#[tokio::main]
async fn main() -> ExitCode {
    // 📡 logs go to stderr; stdout belongs to the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one layer at a time
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
            }
            eprintln!("dux: {:#}", err);
            ExitCode::from(2)
        }
    }
}

/// ✅ `Ok(true)` when every branch was walked, `Ok(false)` when the report is partial.
async fn run(cli: Cli) -> Result<bool> {
    if let Some(path) = &cli.config {
        // -- 🔒 a named file that isn't there is a typo, not a request for defaults
        let exists = path
            .try_exists()
            .with_context(|| format!("💀 Couldn't check for config file '{}'", path.display()))?;
        if !exists {
            anyhow::bail!(
                "💀 Config file '{}' doesn't exist. Maybe it's a pwd/cwd thing; try an absolute path.",
                path.display()
            );
        }
    }

    let mut app_config = dux::app_config::load_config(cli.config.as_deref())
        .context("💀 Couldn't load the configuration. Check the file and any DUX_* variables.")?;
    if let Some(workers) = cli.workers {
        app_config.runtime.workers = workers;
    }
    if cli.no_progress {
        app_config.runtime.progress = false;
    }

    let outcome = dux::run(app_config, cli.command.into()).await?;
    print!("{}", outcome.report);
    for failure in &outcome.failures {
        eprintln!("dux: {}", failure);
    }
    if outcome.summary.tasks_panicked > 0 {
        eprintln!(
            "dux: {} task(s) panicked; some branches were never reported",
            outcome.summary.tasks_panicked
        );
    }
    Ok(outcome.is_complete())
}
