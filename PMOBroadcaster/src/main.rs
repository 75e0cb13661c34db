mod catalog;
mod openapi;
mod server;

use catalog::Catalog;
use pmoagenda::{AgendaScheduler, ScheduleSongSupplier};
use pmobroadcast::{
    AgendaPlaylistFactory, BroadcastConfig, BroadcastConfigExt, FfmpegSegmenter, FsAudioStore,
    InactivityReaper, LoggingPlayCountSink, RadioStationPool, TickerHub,
};
use pmoconfig::Config;
use server::AppState;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installe le subscriber tracing ; `RUST_LOG` prime sur la configuration
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.get_log_min_level().to_lowercase()));
    let registry = tracing_subscriber::registry().with(filter);

    if config.get_log_enable_console() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true),
            )
            .init();
    } else {
        registry.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("⚠️ Failed to listen for Ctrl+C: {}", e);
    }
    info!("🛑 Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ========== PHASE 1 : Configuration et logs ==========
    let config = pmoconfig::get_config();
    init_logging(&config);
    info!("⚙️ Configuration loaded from {}", config.config_dir().display());

    let broadcast = BroadcastConfig::from_config(&config)?;

    // ========== PHASE 2 : Catalogue et planification ==========
    info!("📚 Loading catalog...");
    let catalog = Arc::new(Catalog::load(&config.get_catalog_file()?)?);
    for slug in catalog.station_slugs() {
        info!("  - {}", slug);
    }

    let supplier = Arc::new(ScheduleSongSupplier::new(catalog.clone()));
    let scheduler = Arc::new(AgendaScheduler::new(supplier.clone(), catalog.clone()));

    // ========== PHASE 3 : Moteur de diffusion ==========
    info!("📻 Initializing broadcast engine...");
    let segmenter = FfmpegSegmenter::new(
        config.get_ffmpeg_path(),
        config.get_segment_work_dir()?,
        broadcast.hls.segment_duration_secs,
    );
    let playlists = Arc::new(AgendaPlaylistFactory::new(
        supplier,
        Arc::new(FsAudioStore::new(config.get_audio_dir()?)),
        Arc::new(segmenter),
    ));

    let tickers = Arc::new(TickerHub::from_config(&broadcast.timers));
    let pool = Arc::new(RadioStationPool::new(
        catalog,
        scheduler,
        playlists,
        Arc::new(LoggingPlayCountSink),
        tickers.clone(),
        broadcast.clone(),
    ));

    let housekeeping = CancellationToken::new();
    let reaper = InactivityReaper::new(pool.clone(), broadcast.inactivity.clone())
        .spawn(&tickers, housekeeping.clone());

    // ========== PHASE 4 : Démarrage du serveur ==========
    let port = config.get_http_port();
    let router = server::create_router(AppState::new(pool.clone()));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;

    info!("🌐 HTTP server listening on port {}", port);
    info!("✅ PMOBroadcaster is ready!");
    info!("Press Ctrl+C to stop...");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // ========== PHASE 5 : Arrêt ==========
    housekeeping.cancel();
    if let Err(e) = reaper.await {
        tracing::warn!("⚠️ Inactivity reaper ended abnormally: {}", e);
    }
    pool.shutdown_all().await;
    tickers.shutdown();
    info!("👋 PMOBroadcaster stopped");

    Ok(())
}
