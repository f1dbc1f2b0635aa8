//! Spooltrack - Main entry point
//!
//! Filament inventory and print-job tracking engine. `run` keeps the backup
//! sync scheduler alive in the background; the other subcommands are one-shot
//! operations against the same database.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spooltrack_app::db::print_jobs::JobFilter;
use spooltrack_app::export::export_print_jobs;
use spooltrack_app::inventory::compute_inventory_status;
use spooltrack_app::reports;
use spooltrack_app::sync::{FolderBackup, RemoteBackup, SyncConfig, SyncScheduler};
use spooltrack_common::config;
use spooltrack_common::db::init_database;

/// Command-line arguments for spooltrack
#[derive(Parser, Debug)]
#[command(name = "spooltrack")]
#[command(about = "Filament inventory and print-job tracking")]
#[command(version)]
struct Args {
    /// Folder holding the database and backups
    #[arg(short, long, env = "SPOOLTRACK_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run with the background sync scheduler until interrupted (default)
    Run,
    /// Print the inventory status view
    Status,
    /// Export print job history as CSV to stdout
    Export {
        /// Substring filter on project name
        #[arg(long)]
        project: Option<String>,
        /// Electricity rate override for the cost columns
        #[arg(long)]
        rate: Option<f64>,
    },
    /// Push a backup to the remote now, regardless of schedule
    Sync,
    /// Print usage reports
    Report,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spooltrack=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let data_folder = config::resolve_data_folder(
        args.data_folder.as_deref(),
        "SPOOLTRACK_DATA_FOLDER",
    )
    .context("Failed to resolve data folder")?;
    let db_path = config::database_path(&data_folder);
    info!("Database: {}", db_path.display());

    let db = init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let remote: Arc<dyn RemoteBackup> =
        Arc::new(FolderBackup::new(config::backup_folder(&data_folder)));
    let scheduler = Arc::new(SyncScheduler::new(db.clone(), data_folder.clone(), remote));

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            let handle = Arc::clone(&scheduler).run();
            info!("Spooltrack running, press Ctrl+C to exit");
            shutdown_signal().await;
            handle.abort();
            // A failed close-time sync is logged but never blocks exit
            scheduler.close().await;
            info!("Shutdown complete");
        }
        Command::Status => {
            let rows = compute_inventory_status(&db).await?;
            for row in rows {
                let marker = if row.is_group { "[group] " } else { "" };
                match row.percentage {
                    Some(pct) => println!(
                        "{}{}: {:.0} g of {:.0} g ({:.0}%, {})",
                        marker,
                        row.label,
                        row.current_quantity,
                        row.ideal_quantity.unwrap_or(0.0),
                        pct,
                        row.band.name()
                    ),
                    None => println!(
                        "{}{}: {:.0} g ({})",
                        marker,
                        row.label,
                        row.current_quantity,
                        row.band.name()
                    ),
                }
            }
        }
        Command::Export { project, rate } => {
            let filter = JobFilter {
                project_name: project,
                ..Default::default()
            };
            let csv = export_print_jobs(&db, &filter, rate).await?;
            print!("{}", csv);
        }
        Command::Sync => {
            let sync_config = SyncConfig::from_database(&db).await?;
            scheduler.sync_now(&sync_config).await?;
        }
        Command::Report => {
            println!("Filament usage by type:");
            for (category, grams) in reports::filament_usage_by_type(&db).await? {
                println!("  {}: {:.0} g", category, grams);
            }
            println!("Printer usage:");
            for stats in reports::printer_usage_stats(&db).await? {
                println!(
                    "  {}: {} jobs, {:.1} h, {:.0} g",
                    stats.printer_name, stats.total_jobs, stats.total_hours,
                    stats.total_filament_used
                );
            }
            let due = reports::components_due_for_replacement(&db).await?;
            if !due.is_empty() {
                println!("Components due for replacement:");
                for component in due {
                    warn!(
                        "component {} has {:.0} h of use",
                        component.name, component.usage_hours
                    );
                    println!("  {} ({:.0} h)", component.name, component.usage_hours);
                }
            }
        }
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
