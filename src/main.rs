//! fwgate entry point

use clap::{Parser, Subcommand};
use fwgate::audit::AuditLog;
use fwgate::config::{ServiceConfig, load_config, save_config};
use fwgate::core::applier::NftApplier;
use fwgate::core::gate::FirewallGate;
use fwgate::http::{ServeOutcome, serve};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "fwgate")]
#[command(about = "Firewall mode gate - maintenance/production transitions over HTTP", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gate service (the default when no subcommand is given)
    Run {
        /// Path to a configuration file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Listen address override, e.g. 127.0.0.1:3535
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,

        /// Transition window override in seconds
        #[arg(long, value_name = "SECONDS")]
        transition_duration: Option<u64>,
    },
    /// Validate all configured rule-set files with `nft --check` and exit
    Check {
        /// Path to a configuration file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Write a default configuration file and exit
    InitConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Run {
            config,
            listen,
            transition_duration,
        }) => run(config.as_deref(), listen, transition_duration).await,
        None => run(None, None, None).await,
        Some(Commands::Check { config }) => check(config.as_deref()).await,
        Some(Commands::InitConfig) => init_config().await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    config_path: Option<&Path>,
    listen: Option<String>,
    transition_duration: Option<u64>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    fwgate::utils::ensure_dirs()?;

    let mut config = load_config(config_path).await?;
    if let Some(listen) = listen {
        config.listen_addr = listen;
    }
    if let Some(secs) = transition_duration {
        config.transition_duration_secs = secs;
    }

    let applier = NftApplier::new(config.ruleset_paths());
    if config.check_rulesets_on_start {
        applier.check_all().await?;
        info!("all rule-set files passed nft --check");
    } else {
        warn!("rule-set preflight disabled by configuration");
    }

    let audit = if config.enable_audit_log {
        Some(AuditLog::new()?)
    } else {
        None
    };

    let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
    let gate = Arc::new(FirewallGate::new(
        Arc::new(applier),
        config.transition_config(),
        fatal_tx,
        audit,
    ));

    // The gate starts in maintenance; apply the matching rule-set so the
    // kernel agrees with the reported mode before accepting requests.
    gate.apply_initial_mode().await?;

    match serve(&config.listen_addr, gate, fatal_rx).await? {
        ServeOutcome::Shutdown => {
            info!("shutdown complete");
            Ok(ExitCode::SUCCESS)
        }
        ServeOutcome::Fatal(reason) => {
            error!("exiting on unrecoverable firewall state: {reason}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn check(config_path: Option<&Path>) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = load_config(config_path).await?;
    let applier = NftApplier::new(config.ruleset_paths());
    applier.check_all().await?;
    println!("All rule-set files passed nft --check.");
    Ok(ExitCode::SUCCESS)
}

async fn init_config() -> Result<ExitCode, Box<dyn std::error::Error>> {
    fwgate::utils::ensure_dirs()?;
    let path = save_config(&ServiceConfig::default(), None).await?;
    println!("Wrote default configuration to {}", path.display());
    Ok(ExitCode::SUCCESS)
}
