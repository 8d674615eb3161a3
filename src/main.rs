//! chatterd - a multi-room WebSocket chat daemon.

use std::sync::Arc;

use chatterd::{AppContext, ChatManager, Config, Gateway};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config {config_path}: {e}");
            return Err(e.into());
        }
    };

    let default_filter = if config.server.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        name = %config.server.name,
        "starting chatterd"
    );

    let manager = Arc::new(ChatManager::new(&config));

    // SIGINT/SIGTERM fire the global done signal; the gateway drains and
    // returns, then the manager waits out the remaining tasks.
    {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint =
                signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = sigint.recv() => info!("received SIGINT, shutting down"),
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            }
            manager.begin_shutdown();
        });
    }

    let ctx = Arc::new(AppContext::new(config, Arc::clone(&manager)));
    let gateway = Gateway::bind(ctx).await.map_err(|e| {
        error!(error = %e, "cannot bind listener");
        e
    })?;
    gateway.run().await?;

    manager.shutdown().await;
    info!("server exiting");
    Ok(())
}
