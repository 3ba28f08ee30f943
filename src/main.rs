//! Tradepost - a marketplace admin backend

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradepost::{
    api::{self, AppState},
    config::Config,
    db,
    services::{Mailer, SmtpMailer},
};

/// How often expired sessions and stale login attempts are purged
const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradepost=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tradepost...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let mailer: Option<Arc<dyn Mailer>> = match SmtpMailer::from_config(&config.mail)? {
        Some(mailer) => {
            tracing::info!("SMTP mailer configured for {}", config.mail.smtp_host);
            Some(Arc::new(mailer))
        }
        None => {
            tracing::warn!("No SMTP host configured, newsletter sending is disabled");
            None
        }
    };

    let state = AppState::new(pool, &config, mailer);
    state
        .storage
        .ensure_dirs()
        .await
        .context("Failed to create upload directories")?;

    // Periodic session cleanup
    let auth = state.auth.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match auth.cleanup().await {
                Ok(0) => {}
                Ok(count) => tracing::info!("Removed {} expired sessions", count),
                Err(e) => tracing::warn!("Session cleanup failed: {}", e),
            }
        }
    });

    let app = api::build_router(state, &config);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
