//! TenantDesk sync operator tool
//!
//! Inspects and drains the offline queue of one installation against the
//! configured backend.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tenantdesk_offline::local_db::LocalDatabase;
use tenantdesk_offline::remote::RestRemote;
use tenantdesk_offline::shared::OfflineConfig;
use tenantdesk_offline::sync::{NetworkMonitor, SyncManager};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "tenantdesk-sync", about = "Inspect and drain the TenantDesk offline queue")]
struct Cli {
    /// TOML config file; TENANTDESK_* variables still apply on top
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show pending count, last sync time and failed operations
    Status,
    /// Push every pending operation now
    Sync,
    /// Drop a stuck operation without sending it
    Discard { operation_id: Uuid },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => OfflineConfig::load(path)?,
        None => OfflineConfig::from_env()?,
    };

    let store = Arc::new(LocalDatabase::open(&config).await?);
    tracing::debug!("Using local database at {}", config.database_path().display());

    let outcome = run(cli.command, &config, &store).await;
    store.close().await;
    outcome
}

async fn run(
    command: Command,
    config: &OfflineConfig,
    store: &Arc<LocalDatabase>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match command {
        Command::Status => {
            let stats = store.get_stats().await?;
            let last_sync = store.last_sync_time().await?;

            println!("pending operations: {}", stats.pending_operations);
            println!("unsynced records:   {}", stats.unsynced_records);
            println!("cached records:     {}", stats.cached_records);
            match last_sync {
                Some(time) => println!("last sync:          {}", time.to_rfc3339()),
                None => println!("last sync:          never"),
            }

            let failed = store.failed_operations().await?;
            if !failed.is_empty() {
                println!();
                println!("failed operations:");
                for op in failed {
                    println!(
                        "  {}  {} {}  attempts={}{}  {}",
                        op.operation_id,
                        op.kind,
                        op.table,
                        op.attempts,
                        if op.rejected { " rejected" } else { "" },
                        op.last_error.unwrap_or_default()
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Sync => {
            let remote = Arc::new(RestRemote::new(config)?);
            let monitor = Arc::new(NetworkMonitor::from_config(config));
            let sync = SyncManager::new(store.clone(), remote, monitor, config);

            let report = sync.sync_now().await?;
            let status = sync.refresh_status().await?;
            println!(
                "{} succeeded, {} failed, {} blocked; {} still pending",
                report.succeeded, report.failed, report.blocked, status.pending_count
            );
            Ok(if report.failed > 0 { ExitCode::from(2) } else { ExitCode::SUCCESS })
        }
        Command::Discard { operation_id } => {
            if store.remove_operation(&operation_id).await? {
                tracing::warn!("Discarded pending operation {}", operation_id);
                println!("discarded {}", operation_id);
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("no pending operation {}", operation_id);
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
