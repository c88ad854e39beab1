use std::net::SocketAddr;
use std::sync::Arc;

use cirplane::config::{database, Config};
use cirplane::handlers::create_router;
use cirplane::logger::{init_logger, mask_email};
use cirplane::repository::Repositories;
use cirplane::services::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::from_env()?;
    init_logger(config.log_format);

    if !config.service_fee_rate_explicit {
        // Screens have shown both 2% and 5%; operators must pick one.
        tracing::warn!(
            rate = %config.service_fee_rate.value(),
            "SERVICE_FEE_RATE not set, using default service fee rate"
        );
    }

    let repos = match config.database_url.as_deref() {
        Some(url) => {
            let pool = database::create_pool(url).await?;
            database::init_db(&pool).await?;
            tracing::info!("Connected to PostgreSQL");
            Repositories::postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, data will be kept in memory only");
            Repositories::memory()
        }
    };

    let state = Arc::new(AppState::new(repos, config.clone()));

    if let Some(admin) = &config.bootstrap_admin {
        match state.provisioning.ensure_admin(&admin.email, &admin.password).await {
            Ok(true) => tracing::info!(email = %mask_email(&admin.email), "Bootstrap admin created"),
            Ok(false) => tracing::debug!("Bootstrap admin already present"),
            Err(e) => tracing::error!(error = %e, "Failed to create bootstrap admin"),
        }
    }

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
