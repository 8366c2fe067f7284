mod chart;
mod config;
mod report;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tissue_core::repository::remote::is_unset;
use tissue_core::service::export::ExportOutcome;
use tissue_core::time::{current_month, month_name, parse_day, parse_month};
use tissue_core::{
    detect_directory_mirror, parse_toilet_type, CommandExtractor, DirectoryMirror, FileLocalStore,
    Inventory, SyncStatus,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;
use crate::report::ReportView;

const LOG_ENV: &str = "TISSUE_LOG";

type Session = Inventory<FileLocalStore, DirectoryMirror>;

#[derive(Parser)]
#[command(name = "tissue")]
#[command(about = "Track tissue roll usage per floor and toilet type", long_about = None)]
struct Cli {
    /// Directory holding the local data and config.toml
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Record the rolls used (usage: set 2 MP today 7)
    Set {
        floor: String,
        /// Toilet type: code (MP, FP, MS, FS, PR), label, or prefix
        #[arg(value_name = "TYPE")]
        kind: String,
        /// today, yesterday, -Nd or YYYY-MM-DD
        #[arg(allow_hyphen_values = true)]
        date: String,
        #[arg(allow_hyphen_values = true)]
        value: f64,
    },
    /// Show every floor and type for one day
    Day {
        /// today, yesterday, -Nd or YYYY-MM-DD
        #[arg(allow_hyphen_values = true)]
        date: Option<String>,
    },
    /// Monthly totals as tables
    Report {
        /// YYYY-MM, defaults to the current month
        #[arg(long)]
        month: Option<String>,
        #[arg(long, value_enum, default_value_t)]
        view: ReportView,
    },
    /// Open the terminal chart view
    Chart {
        #[arg(long)]
        month: Option<String>,
    },
    /// Merge a photographed paper log into the selected month
    Scan {
        image: PathBuf,
        #[arg(long)]
        month: Option<String>,
    },
    /// Write all usage to a CSV spreadsheet
    Export {
        #[arg(long)]
        month: Option<String>,
        /// Target directory, defaults to the working directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Inspect or drive the remote mirror
    Sync {
        #[command(subcommand)]
        action: SyncCommand,
    },
    /// Clear all usage data
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(clap::Subcommand)]
enum SyncCommand {
    /// Show the sync id and status
    Status,
    /// Pull the remote row for the current sync id
    Pull,
    /// Push the local records now
    Push,
    /// Switch to another device's sync id and pull its data
    Connect { id: String },
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn selected_month(month: Option<&str>) -> Result<(i32, u32)> {
    match month {
        Some(m) => Ok(parse_month(m)?),
        None => Ok(current_month()),
    }
}

/// Sync subcommands that pull on their own skip the startup pull.
fn needs_startup_pull(command: &Option<Commands>) -> bool {
    !matches!(
        command,
        Some(Commands::Sync {
            action: SyncCommand::Pull | SyncCommand::Connect { .. }
        })
    )
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_status(status: SyncStatus) {
    match status {
        SyncStatus::Error => eprintln!("warning: remote sync failed, data is kept locally"),
        _ => debug!(%status, "sync finished"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = config::resolve_data_dir(cli.data_dir)?;
    let load = config::load_or_create(&data_dir)?;
    let config = load.config.apply_env_overrides(|key| std::env::var(key).ok());
    init_tracing(&config.log_level);
    if load.created {
        info!(path = %load.file.display(), "created default config");
    }

    let local = FileLocalStore::new(Some(data_dir))?;
    let remote = detect_directory_mirror(config.remote_dir.as_deref());
    let mut inventory =
        Inventory::open(local, remote)?.with_debounce(Duration::from_millis(config.debounce_ms));

    if needs_startup_pull(&cli.command) {
        inventory.start().await?;
    }

    run(cli.command, &mut inventory, &config).await?;

    print_status(inventory.flush().await);
    Ok(())
}

async fn run(command: Option<Commands>, inventory: &mut Session, config: &CliConfig) -> Result<()> {
    match command {
        Some(Commands::Set { floor, kind, date, value }) => {
            let kind = parse_toilet_type(&kind)?;
            let date = parse_day(&date)?;
            if !inventory.set_usage(floor.trim(), kind, date, value)? {
                bail!("floor {} has no {} toilet", floor.trim(), kind);
            }
            let stored = inventory.store().value(floor.trim(), kind, date);
            println!("Recorded: floor {} / {} on {} = {} rolls", floor.trim(), kind, date, stored);
        }
        Some(Commands::Day { date }) => {
            let date = parse_day(date.as_deref().unwrap_or("today"))?;
            report::show_day_sheet(&inventory.day_sheet(date));
        }
        Some(Commands::Report { month, view }) => {
            let (year, month) = selected_month(month.as_deref())?;
            report::show_report(&inventory.report(year, month)?, view);
        }
        Some(Commands::Chart { month }) => {
            let (year, month) = selected_month(month.as_deref())?;
            chart::run(inventory.store().clone(), year, month)?;
        }
        Some(Commands::Scan { image, month }) => {
            let (year, month) = selected_month(month.as_deref())?;
            let Some(extractor) = config.extractor_command.as_deref().and_then(CommandExtractor::new) else {
                bail!("no extractor configured (set extractor_command in config.toml or {})", config::EXTRACTOR_ENV);
            };
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("read image {}", image.display()))?;
            let merged = inventory.scan(&extractor, &bytes, year, month).await?;
            println!(
                "Merged {} entries into {} {} ({} dropped)",
                merged.applied,
                month_name(month),
                year,
                merged.dropped
            );
        }
        Some(Commands::Export { month, out }) => {
            let (year, month) = selected_month(month.as_deref())?;
            let dir = match out {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            match inventory.export(year, month, &dir).context("export failed")? {
                ExportOutcome::NothingToExport => println!("No data to export."),
                ExportOutcome::Written { path, rows } => {
                    println!("Exported {} rows to {}", rows, path.display())
                }
            }
        }
        Some(Commands::Sync { action }) => run_sync(action, inventory, config).await?,
        Some(Commands::Reset { yes }) => {
            if !yes && !confirm("Reset all usage data? This cannot be undone.")? {
                println!("Reset cancelled.");
                return Ok(());
            }
            inventory.reset()?;
            println!("All usage data cleared.");
        }
        None => {
            let date = parse_day("today")?;
            report::show_day_sheet(&inventory.day_sheet(date));
        }
    }
    Ok(())
}

async fn run_sync(action: SyncCommand, inventory: &mut Session, config: &CliConfig) -> Result<()> {
    let status = match action {
        SyncCommand::Status => inventory.sync_status(),
        SyncCommand::Pull => inventory.pull().await?,
        SyncCommand::Push => inventory.push_now().await,
        SyncCommand::Connect { id } => inventory.reconnect(&id).await?,
    };

    println!("Sync ID: {}", inventory.sync().sync_id());
    match config.remote_dir.as_deref() {
        Some(dir) if !is_unset(Some(dir)) => println!("Remote:  {}", dir),
        _ => println!("Remote:  not configured (local storage only)"),
    }
    println!("Status:  {}", status);
    Ok(())
}
