//! Grid Hunt Game Server
//!
//! Loads configuration from the environment and serves the game until
//! ctrl-c.

use std::sync::Arc;
use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use grid_hunt::{GameServer, ServerConfig, VERSION, BOARD_WIDTH, BOARD_HEIGHT};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env().context("loading configuration")?;

    info!("Grid Hunt Server v{}", VERSION);
    info!("Board: {}x{}", BOARD_WIDTH, BOARD_HEIGHT);
    info!(
        "Obstacles: {} rocks, {} trees; movement points: {}",
        config.session.rocks,
        config.session.trees,
        config
            .session
            .movement_points
            .map_or_else(|| "unlimited".to_string(), |mp| mp.to_string())
    );

    let server = Arc::new(GameServer::new(config));
    let running = server.clone();
    let mut serve = tokio::spawn(async move { running.run().await });

    tokio::select! {
        result = &mut serve => {
            return result.context("server task panicked")?.context("server failed");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for ctrl-c")?;
            info!("Ctrl-C received, shutting down");
        }
    }

    server.shutdown();
    serve.await.context("server task panicked")?.context("server failed")?;

    info!("Server stopped");
    Ok(())
}
