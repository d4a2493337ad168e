pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use accountpulse_core::config::{EngineConfig, LoadOptions, LogFormat};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "accountpulse",
    about = "Accountpulse portfolio insight CLI",
    long_about = "Score a customer portfolio snapshot, reconcile records across systems, \
                  and inspect the effective engine configuration.",
    after_help = "Examples:\n  accountpulse score --snapshot portfolio.json\n  \
                  accountpulse reconcile --sources crm.json --targets board.json\n  \
                  accountpulse doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to an accountpulse.toml configuration file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run the insight pipeline over a portfolio snapshot and emit the report")]
    Score {
        #[arg(long, help = "Path to a portfolio snapshot JSON file")]
        snapshot: PathBuf,
        #[arg(long, help = "Override the configured action list bound")]
        max_actions: Option<usize>,
    },
    #[command(about = "Fuzzy-match source records against a target record set and emit a \
                       reconciliation report")]
    Reconcile {
        #[arg(long, help = "Path to the source record JSON file")]
        sources: PathBuf,
        #[arg(long, help = "Path to the target record JSON file")]
        targets: PathBuf,
    },
    #[command(about = "Print the effective engine configuration with its source")]
    Config,
    #[command(about = "Validate configuration and run an engine self-test")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

fn init_logging(config: &EngineConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        LogFormat::Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Logging follows whatever configuration is reachable; a broken config
    // file still gets default logging so the command error is visible.
    let logging_config = EngineConfig::load(LoadOptions {
        config_path: cli.config.clone(),
        require_file: false,
    })
    .unwrap_or_default();
    init_logging(&logging_config);

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Command::Score { snapshot, max_actions } => {
            commands::score::run(&snapshot, config_path, max_actions)
        }
        Command::Reconcile { sources, targets } => {
            commands::reconcile::run(&sources, &targets, config_path)
        }
        Command::Config => commands::config::run(config_path),
        Command::Doctor { json } => commands::doctor::run(config_path, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
