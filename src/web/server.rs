//! Web server using Axum.

use std::net::SocketAddr;

use crate::error::{Error, Result};
use crate::whatsapp::PairingState;

use super::router::create_app_router;

/// Web server configuration.
pub struct WebServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Run the web server.
pub async fn run_server(config: WebServerConfig, pairing: PairingState) -> Result<()> {
    let app = create_app_router(pairing);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| Error::Web(format!("Invalid address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Pairing page at http://localhost:{}", config.port);

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Web(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_host_is_rejected() {
        let config = WebServerConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            run_server(config, PairingState::new()).await,
            Err(Error::Web(_))
        ));
    }
}
