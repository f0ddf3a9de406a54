mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use jiseti_api::{AppStateInner, HttpMailer, Notifier};
use jiseti_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "jiseti_server=debug,jiseti_api=debug,jiseti_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::load()?;

    let db = Database::open(&config.db_path)?;

    let notifier = match &config.mail.relay_url {
        Some(url) => {
            info!("Status notifications go through mail relay {}", url);
            Notifier::new(
                HttpMailer::new(url.clone(), config.mail.api_key.clone(), config.mail.from.clone()),
                config.mail.timeout,
                config.mail.retries,
            )
        }
        None => {
            info!("JISETI_MAIL_RELAY_URL not set, status notifications are logged only");
            Notifier::log_only()
        }
    };

    let state = Arc::new(AppStateInner {
        db,
        settings: config.settings(),
        notifier,
    });

    let app = jiseti_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Jiseti server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(_) => {
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
