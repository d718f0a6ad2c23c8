use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use cadenza_core::auth::SudoAuthorizer;
use cadenza_core::manager::{PlaybackConfig, QueueManager, SkipExhaustPolicy};
use cadenza_core::sim::SimulatedEngine;
use cadenza_core::PlaybackEventKind;
use cadenza_media::download::AttachmentDownloader;
use cadenza_media::resolver::MediaResolver;
use cadenza_media::ytdlp::YtDlpResolver;

use cadenza_server::{api, cli, config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cadenza=info,tower_http=debug")),
        )
        .init();

    let args = cli::Args::parse();
    let config = config::Config::load(&args.config)?;

    std::fs::create_dir_all(&config.media.download_dir)?;

    let engine = match config.engine.kind {
        config::EngineKind::Simulated => Arc::new(SimulatedEngine::new(Duration::from_secs(
            config.engine.track_length_secs,
        ))),
    };

    let playback = PlaybackConfig {
        skip_exhaust: if config.playback.skip_leaves_call {
            SkipExhaustPolicy::LeaveCall
        } else {
            SkipExhaustPolicy::StayInCall
        },
    };
    let manager = Arc::new(QueueManager::new(engine, playback));
    let pump = manager.spawn_stream_end_pump();
    spawn_event_logger(&manager);

    let downloader = Arc::new(AttachmentDownloader::new(
        &config.media.download_dir,
        config.media.max_download_bytes,
    ));
    let extractor: Option<Arc<dyn MediaResolver>> =
        match YtDlpResolver::discover(config.media.ytdlp_max_height) {
            Ok(resolver) => Some(Arc::new(resolver)),
            Err(e) => {
                tracing::warn!("link extraction disabled: {e}");
                None
            }
        };
    let authorizer = Arc::new(SudoAuthorizer::new(config.auth.sudo_users.iter().copied()));

    let app = api::build_router(api::AppState {
        manager: Arc::clone(&manager),
        authorizer,
        downloader,
        extractor,
    })
    .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(
        "listening on http://{} (engine: {:?}, sudo users: {})",
        config.server.bind_address,
        config.engine.kind,
        config.auth.sudo_users.len()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Best-effort: leave every live call before the process exits.
    manager.shutdown().await;
    pump.abort();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down (ctrl-c)...");
}

/// Consumes the playback event feed and turns it into log lines. A chat
/// frontend would subscribe the same way to post replies.
fn spawn_event_logger(manager: &Arc<QueueManager>) {
    let mut events = manager.events().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let conversation_id = event.conversation_id;
            match event.kind {
                PlaybackEventKind::Queued { item, position } => {
                    tracing::info!(conversation_id, position, title = %item.display_title(), "queued");
                }
                PlaybackEventKind::NowPlaying { item } => {
                    tracing::info!(conversation_id, title = %item.display_title(), "now playing");
                }
                PlaybackEventKind::Skipped { item } => {
                    tracing::info!(conversation_id, title = %item.display_title(), "skipped");
                }
                PlaybackEventKind::ItemFailed { item, reason } => {
                    tracing::warn!(conversation_id, title = %item.display_title(), %reason, "item failed");
                }
                PlaybackEventKind::QueueDrained { failures } => {
                    tracing::warn!(conversation_id, failures, "queue drained due to errors");
                }
                PlaybackEventKind::LeftCall => {
                    tracing::info!(conversation_id, "left call");
                }
                PlaybackEventKind::Stopped { cleared } => {
                    tracing::info!(conversation_id, cleared, "stopped");
                }
            }
        }
    });
}
