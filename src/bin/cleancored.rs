//! IPC server binary (SPEC_FULL §6): binds the Unix socket per
//! spec.md §4.7 and serves forever.

use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use cleancore::config::Config;
use cleancore::engine::Engine;
use cleancore::ipc::IpcServer;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cleancored=info".parse().unwrap()),
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
    let config = Config::load()?;
    let socket_path = config.socket_path();

    let engine = Arc::new(Engine::with_default_scanners()?);
    let server = IpcServer::bind(&socket_path).await?;
    info!(path = %server.socket_path().display(), "cleancored listening");

    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown_cancel.cancel();
    });

    server.serve(engine, cancel).await;
    Ok(())
}
