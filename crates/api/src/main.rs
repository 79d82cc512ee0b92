use std::net::SocketAddr;

use anyhow::Context;
use tracing::{info, warn};

use careerlink_api::app::{build_app, AppServices};
use careerlink_infra::AppConfig;
use careerlink_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    careerlink_observability::init(LogFormat::from_json_flag(config.log_json));

    if config.auth.uses_dev_secret() {
        warn!("JWT_SECRET not set; using insecure dev default");
    }

    let (services, background) = AppServices::from_config(&config).await?;
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(config.server.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.addr))?;
    info!("listening on {}", listener.local_addr()?);

    // Peer addresses key the login rate limiter.
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let stats = background.shutdown().await;
    info!(
        completed = stats.completed,
        failed = stats.failed,
        dropped = stats.dropped,
        "background queue drained"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
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
    info!("shutdown signal received");
}
