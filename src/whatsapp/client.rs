//! WhatsApp bot daemon: pump bridge events into the session orchestrator.

use std::sync::Arc;

use crate::config::Settings;
use crate::core::SessionOrchestrator;
use crate::error::{Error, Result};
use crate::providers::create_gateways;

use super::bridge::{Bridge, TransportEvent};
use super::pairing::{render_terminal, PairingState};
use super::transport::{Transport, TransportError};

/// Run the bot until the bridge goes away.
pub async fn run_whatsapp_daemon(settings: Settings, pairing: PairingState) -> Result<()> {
    tracing::info!("Starting WhatsApp daemon...");

    let temp_dir = settings.bridge.temp_dir();
    tokio::fs::create_dir_all(&temp_dir).await?;

    let mut bridge = Bridge::spawn(&settings.bridge.command)?;
    let transport: Arc<dyn Transport> = bridge.client();
    let orchestrator = Arc::new(SessionOrchestrator::from_settings(
        transport,
        create_gateways(&settings),
        &settings,
    ));

    if settings.access.allowed_numbers.is_empty() {
        tracing::info!("No allow-list configured; answering every sender");
    } else {
        tracing::info!(
            "Answering only {} allowed number(s)",
            settings.access.allowed_numbers.len()
        );
    }

    pump_events(&mut bridge, orchestrator, &pairing).await;

    match bridge.wait().await {
        Ok(Some(status)) => tracing::warn!("WhatsApp bridge exited: {}", status),
        Ok(None) => {}
        Err(e) => tracing::error!("Failed to wait for WhatsApp bridge: {}", e),
    }

    Err(Error::Transport(TransportError::Closed))
}

/// Dispatch events until the bridge output ends. Each message is handled on
/// its own task so a slow request never blocks the next one.
async fn pump_events(
    bridge: &mut Bridge,
    orchestrator: Arc<SessionOrchestrator>,
    pairing: &PairingState,
) {
    while let Some(event) = bridge.next_event().await {
        match event {
            TransportEvent::Qr(code) => {
                tracing::info!("QR code received, scan it to pair");
                pairing.set_token(code.clone());
                match render_terminal(&code) {
                    Ok(qr) => println!("{}", qr),
                    Err(e) => tracing::warn!("Failed to render QR code for terminal: {}", e),
                }
            }
            TransportEvent::Authenticated => {
                tracing::info!("WhatsApp session authenticated");
                pairing.mark_connected();
            }
            TransportEvent::Ready => {
                tracing::info!("WhatsApp client is ready");
                pairing.mark_connected();
            }
            TransportEvent::Disconnected(reason) => {
                tracing::warn!(
                    "WhatsApp client disconnected: {}",
                    reason.as_deref().unwrap_or("unknown reason")
                );
                pairing.mark_disconnected();
            }
            TransportEvent::Message(msg) => {
                tracing::debug!("Message {} from {}", msg.id, msg.from);
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    orchestrator.handle(msg).await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HistoryStore;
    use crate::providers::{CompletionGateway, MediaGateway, ProviderError, Result as ProviderResult};
    use crate::whatsapp::pairing::PairingStatus;
    use crate::whatsapp::MediaPayload;
    use async_trait::async_trait;
    use std::path::Path;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    struct EchoCompletion;

    #[async_trait]
    impl CompletionGateway for EchoCompletion {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, history: &[crate::core::Turn]) -> ProviderResult<String> {
            Ok(format!("eco: {}", history.last().map(|t| t.content.as_str()).unwrap_or("")))
        }
    }

    struct NoMedia;

    #[async_trait]
    impl MediaGateway for NoMedia {
        async fn generate_image(&self, _prompt: &str) -> ProviderResult<String> {
            Err(ProviderError::NotAvailable("images".to_string()))
        }

        async fn fetch_media(&self, _url: &str) -> ProviderResult<MediaPayload> {
            Err(ProviderError::NotAvailable("media".to_string()))
        }

        async fn transcribe(&self, _path: &Path) -> ProviderResult<String> {
            Err(ProviderError::NotAvailable("transcription".to_string()))
        }
    }

    #[tokio::test]
    async fn test_pump_events_updates_pairing_and_answers() {
        crate::logging::init_test();

        let (bot_side, bridge_side) = tokio::io::duplex(64 * 1024);
        let (bot_read, bot_write) = tokio::io::split(bot_side);
        let (bridge_read, mut bridge_write) = tokio::io::split(bridge_side);

        let mut bridge = Bridge::from_io(BufReader::new(bot_read), bot_write);
        let temp = tempfile::TempDir::new().unwrap();
        let orchestrator = Arc::new(SessionOrchestrator::new(
            bridge.client(),
            Arc::new(EchoCompletion),
            Arc::new(NoMedia),
            HistoryStore::default(),
            Vec::new(),
            temp.path().to_path_buf(),
        ));
        let pairing = PairingState::new();

        let pump_pairing = pairing.clone();
        let pump = tokio::spawn(async move {
            pump_events(&mut bridge, orchestrator, &pump_pairing).await;
        });

        bridge_write
            .write_all(b"{\"type\":\"qr\",\"code\":\"2@abc\"}\n")
            .await
            .unwrap();

        let message = serde_json::json!({
            "type": "message",
            "id": "m1",
            "from": "5511999999999@c.us",
            "body": "!bot oi",
            "has_media": false,
            "media_type": "chat",
        });
        bridge_write
            .write_all(format!("{}\n", message).as_bytes())
            .await
            .unwrap();

        // The orchestrator's reply shows up as a send_text command.
        let mut commands = BufReader::new(bridge_read).lines();
        let line = commands.next_line().await.unwrap().unwrap();
        let command: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(command["type"], "send_text");
        assert_eq!(command["to"], "5511999999999@c.us");
        assert_eq!(command["text"], "eco: oi");
        assert_eq!(command["reply_to"], "m1");

        assert_eq!(pairing.status(), PairingStatus::Pending("2@abc".to_string()));

        bridge_write
            .write_all(b"{\"type\":\"ready\"}\n")
            .await
            .unwrap();
        drop(bridge_write);
        drop(commands);

        pump.await.unwrap();
        // EOF reports a disconnect after the ready event.
        assert_eq!(pairing.status(), PairingStatus::Waiting);
    }
}
