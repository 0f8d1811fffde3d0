//! Transaction guard CLI
//!
//! Inspect the effective limits and check one-off transaction intents.

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tx_guard::guard::{LimitsView, TestModeView};
use tx_guard::{AuditLogHook, Config, GuardedCore, Result, TransactionIntent};

#[derive(Parser)]
#[command(name = "tx-guard")]
#[command(about = "Safety governor for automated on-chain trading")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show effective configuration (file + environment)
    Config,

    /// Show the effective limits and test-mode profile a fresh guard starts with
    Limits,

    /// Validate a transaction intent against the configured limits
    Check {
        /// Trade value in USD
        #[arg(long)]
        amount: Option<Decimal>,

        /// Gas price in wei
        #[arg(long)]
        gas_price: Option<u128>,

        /// Counterparty address (exact match against the allow-list)
        #[arg(long)]
        counterparty: Option<String>,

        /// Accepted slippage in basis points
        #[arg(long)]
        slippage_bps: Option<u32>,
    },
}

#[derive(Serialize)]
struct LimitsReport<'a> {
    limits: &'a LimitsView,
    test_mode: &'a TestModeView,
    failure_threshold: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Limits => {
            // Breaker state lives in the running orchestrator's core, not here
            let snapshot = GuardedCore::new(&config).snapshot().await;
            let report = LimitsReport {
                limits: &snapshot.limits,
                test_mode: &snapshot.test_mode,
                failure_threshold: snapshot.circuit_breaker.failure_threshold,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Check {
            amount,
            gas_price,
            counterparty,
            slippage_bps,
        } => {
            let intent = TransactionIntent {
                counterparty,
                amount_usd: amount,
                gas_price,
                slippage_bps,
            };
            run_check(&config, intent).await?;
        }
    }

    Ok(())
}

fn build_core(config: &Config) -> GuardedCore {
    let core = GuardedCore::new(config);
    match &config.audit_log_path {
        Some(path) => {
            tracing::info!(audit_path = %path, "Added audit log hook");
            core.with_hook(AuditLogHook::new(path))
        }
        None => core,
    }
}

async fn run_check(config: &Config, intent: TransactionIntent) -> Result<()> {
    let core = build_core(config);

    tracing::info!(
        test_mode = config.test_mode.enabled,
        intent = ?intent,
        "Checking transaction intent"
    );

    let verdict = core.validate(&intent).await;
    match &verdict {
        Ok(()) => println!("Intent ACCEPTED"),
        Err(e) => println!("Intent REJECTED: {}", e),
    }
    println!("{}", serde_json::to_string_pretty(&core.snapshot().await)?);

    verdict
}
