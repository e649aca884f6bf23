pub mod api;

use crate::cli::Args;
use crate::config::ConfigError;
use self::api::AppState;
use std::error::Error;
use std::net::SocketAddr;
use std::time::Duration;
use axum_server::tls_rustls::RustlsConfig;
use log::{ info, error };

pub struct Server {
    addr: String,
    state: AppState,
    args: Args,
}

impl Server {
    pub fn new(addr: String, state: AppState, args: Args) -> Self {
        Self { addr, state, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let app = api::router(self.state.clone());

        match self.tls_paths()? {
            Some((cert_path, key_path)) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    cert_path,
                    key_path
                );
                let tls_config = RustlsConfig::from_pem_file(cert_path, key_path).await?;

                let handle = axum_server::Handle::new();
                let shutdown = handle.clone();
                tokio::spawn(async move {
                    shutdown_signal().await;
                    shutdown.graceful_shutdown(Some(Duration::from_secs(5)));
                });

                info!("HTTPS server listening on: https://{}", addr);
                axum_server::bind_rustls(addr, tls_config)
                    .handle(handle)
                    .serve(app.into_make_service()).await?;
            }
            None => {
                let listener = match tokio::net::TcpListener::bind(addr).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                        return Err(e.into());
                    }
                };

                info!("HTTP server listening on: http://{}", addr);
                axum::serve(listener, app.into_make_service())
                    .with_graceful_shutdown(shutdown_signal()).await?;
            }
        }

        info!("Server stopped");
        Ok(())
    }

    fn tls_paths(&self) -> Result<Option<(&str, &str)>, ConfigError> {
        if !self.args.enable_tls {
            info!("TLS not enabled. Running plain HTTP server.");
            return Ok(None);
        }
        match (&self.args.tls_cert_path, &self.args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => Ok(Some((cert_path.as_str(), key_path.as_str()))),
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                Err(ConfigError::Tls("missing TLS certificate or key path".into()))
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                Err(ConfigError::Tls("TLS enabled without cert/key".into()))
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
