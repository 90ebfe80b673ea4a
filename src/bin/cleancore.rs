//! Thin CLI adapter over [`cleancore::engine::Engine`] (SPEC_FULL §6).
//!
//! No TUI, no colored output, no tables — terminal rendering is out of
//! scope for the core (spec.md §1); this binary prints plain-text
//! progress lines and a final plain-text summary.

use std::collections::HashSet;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use cleancore::config::Config;
use cleancore::engine::Engine;
use cleancore::ipc::IpcServer;
use cleancore::model::{CleanupEvent, ScanEvent};

#[derive(Parser)]
#[command(name = "cleancore")]
#[command(about = "Scanner-orchestration and cleanup engine for a macOS disk-cleaning tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every registered scanner and mint a cleanup token.
    Scan {
        /// Category ids to drop from the final result.
        #[arg(long = "skip")]
        skip: Vec<String>,
    },
    /// Run a single scanner by id, without minting a token.
    Run {
        scanner_id: String,
    },
    /// Delete the categories selected from a prior scan's token.
    Cleanup {
        token: String,
        /// Category ids to clean; omit to clean everything the token covers.
        #[arg(long = "category")]
        category: Vec<String>,
    },
    /// Start the IPC server in the foreground.
    Serve {
        /// Override the Unix socket path.
        #[arg(long)]
        socket: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cleancore=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Scan { skip } => scan(skip).await,
        Commands::Run { scanner_id } => run_one(&scanner_id),
        Commands::Cleanup { token, category } => cleanup(token, category).await,
        Commands::Serve { socket } => serve(config, socket).await,
    }
}

async fn scan(skip: Vec<String>) -> anyhow::Result<()> {
    let engine = Engine::with_default_scanners()?;
    let skip: HashSet<String> = skip.into_iter().collect();
    let (mut events, done) = engine.scan_all(CancellationToken::new(), skip);

    while let Some(event) = events.recv().await {
        match event {
            ScanEvent::ScannerStart { scanner_id, label } => {
                println!("scanning {label} ({scanner_id})...");
            }
            ScanEvent::ScannerDone {
                scanner_id,
                results,
                ..
            } => {
                let total: u64 = results.iter().map(|c| c.total_size).sum();
                println!("  {scanner_id}: {total} bytes reclaimable across {} categor{}", results.len(), if results.len() == 1 { "y" } else { "ies" });
            }
            ScanEvent::ScannerError {
                scanner_id, err, ..
            } => {
                println!("  {scanner_id}: error: {err}");
            }
        }
    }

    let outcome = done.await?;
    let total: u64 = outcome.results.iter().map(|c| c.total_size).sum();
    println!();
    println!("scan complete: {} categories, {total} bytes reclaimable", outcome.results.len());
    for category in &outcome.results {
        println!("  {} ({}): {} bytes, {} entries", category.category, category.description, category.total_size, category.entries.len());
    }
    println!("token: {}", outcome.token);
    Ok(())
}

fn run_one(scanner_id: &str) -> anyhow::Result<()> {
    let engine = Engine::with_default_scanners()?;
    let results = engine.run(&CancellationToken::new(), scanner_id)?;
    for category in &results {
        println!("{} ({}): {} bytes, {} entries", category.category, category.description, category.total_size, category.entries.len());
        for entry in &category.entries {
            println!("  {} - {} bytes [{}]", entry.path, entry.size, entry.risk_level);
        }
    }
    Ok(())
}

async fn cleanup(token: String, category: Vec<String>) -> anyhow::Result<()> {
    let engine = Engine::with_default_scanners()?;
    let categories: HashSet<String> = category.into_iter().collect();
    let (mut events, done) = engine.cleanup(CancellationToken::new(), token, categories);

    while let Some(event) = events.recv().await {
        match event {
            CleanupEvent::CategoryStart { category_description } => {
                println!("cleaning {category_description}...");
            }
            CleanupEvent::Entry {
                entry_path,
                current_index,
                total_count,
                ..
            } => {
                println!("  [{current_index}/{total_count}] {entry_path}");
            }
        }
    }

    match done.await? {
        Ok(outcome) => {
            println!();
            println!(
                "cleanup complete: {} removed, {} failed, {} bytes freed",
                outcome.removed.len(),
                outcome.failed.len(),
                outcome.bytes_freed
            );
            for failed in &outcome.failed {
                println!("  failed: {} ({})", failed.path, failed.reason);
            }
            Ok(())
        }
        Err(token_error) => Err(anyhow::anyhow!(token_error)),
    }
}

async fn serve(config: Config, socket_override: Option<String>) -> anyhow::Result<()> {
    let socket_path = socket_override
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| config.socket_path());

    let engine = std::sync::Arc::new(Engine::with_default_scanners()?);
    let server = IpcServer::bind(&socket_path).await?;
    println!("listening on {}", server.socket_path().display());

    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown_cancel.cancel();
    });

    server.serve(engine, cancel).await;
    Ok(())
}
