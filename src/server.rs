use crate::config::Config;
use axum::Router;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("TLS credential file not found: {}", .0.display())]
    MissingCredential(PathBuf),
    #[error("failed to load TLS credentials: {0}")]
    InvalidCredentials(io::Error),
    #[error("server error: {0}")]
    Io(#[from] io::Error),
}

fn require_file(path: &Path) -> Result<(), ServerError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ServerError::MissingCredential(path.to_path_buf()))
    }
}

/// Loads the PEM certificate chain and private key named in the config.
pub async fn load_tls(config: &Config) -> Result<RustlsConfig, ServerError> {
    require_file(&config.cert_path)?;
    require_file(&config.key_path)?;

    tracing::info!(
        cert = %config.cert_path.display(),
        key = %config.key_path.display(),
        "loading TLS credentials"
    );
    RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
        .await
        .map_err(ServerError::InvalidCredentials)
}

/// Serves `app` over HTTPS until Ctrl-C or SIGTERM.
pub async fn serve(config: &Config, tls: RustlsConfig, app: Router) -> Result<(), ServerError> {
    let addr = SocketAddr::new(config.bind_addr, config.port);
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    tracing::info!(%addr, "server started on port {}", config.port);
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
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

    tracing::info!("shutdown signal received");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
