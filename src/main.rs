use std::sync::Arc;

use tracing::info;
use vodcast::{
    common::{logger, types::AnyResult},
    configs::Config,
    server::AppState,
    transport,
};

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    logger::init(&config);

    info!("Starting vodcast {}", vodcast::update::VERSION);
    if config.transcode.enabled {
        info!(
            "Transcoding enabled: {} kbit/s via {}",
            config.transcode.bitrate_kbps, config.transcode.ffmpeg_path
        );
    }

    let (host, port) = (config.server.host.clone(), config.server.port);
    let shared_state = Arc::new(AppState::new(config)?);
    let app = transport::router(shared_state);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
