//! WhatsApp Web bridge process.
//!
//! The WhatsApp Web protocol (session storage, QR login, media encoding) lives
//! in an external bridge process. We talk to it with JSON lines: one object
//! per line, tagged by `type`.
//!
//! Bridge -> bot:
//! - `{"type":"qr","code":"..."}`
//! - `{"type":"ready"}` / `{"type":"authenticated"}`
//! - `{"type":"disconnected","reason":"..."}`
//! - `{"type":"message","id":"...","from":"...","body":"...","has_media":false,"media_type":"chat"}`
//! - `{"type":"response","request_id":1,"ok":true,"media":{...}}`
//!
//! Bot -> bridge:
//! - `{"type":"send_text","request_id":1,"to":"...","text":"...","reply_to":"..."}`
//! - `{"type":"send_media","request_id":2,"to":"...","media":{...},"caption":"..."}`
//! - `{"type":"download_media","request_id":3,"message_id":"..."}`
//!
//! Media objects are `{"mimetype":"...","data":"<base64>","filename":"..."}`.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use crate::core::InboundMessage;

use super::transport::{MediaPayload, Result, Transport, TransportError};

/// Capacity of the event channel between the reader task and the daemon.
const EVENT_BUFFER: usize = 256;

/// Something the bridge reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// New pairing code to scan.
    Qr(String),
    Authenticated,
    Ready,
    Disconnected(Option<String>),
    Message(InboundMessage),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct WireMedia {
    mimetype: String,
    data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
}

impl From<&MediaPayload> for WireMedia {
    fn from(media: &MediaPayload) -> Self {
        Self {
            mimetype: media.mimetype.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(&media.data),
            filename: media.filename.clone(),
        }
    }
}

impl TryFrom<WireMedia> for MediaPayload {
    type Error = TransportError;

    fn try_from(wire: WireMedia) -> Result<Self> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(wire.data.trim())
            .map_err(|e| TransportError::Media(format!("bad base64: {}", e)))?;

        Ok(MediaPayload {
            mimetype: wire.mimetype,
            data,
            filename: wire.filename,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeOutput {
    Qr {
        code: String,
    },
    Authenticated,
    Ready,
    Disconnected {
        #[serde(default)]
        reason: Option<String>,
    },
    Message {
        id: String,
        from: String,
        #[serde(default)]
        body: String,
        #[serde(default)]
        has_media: bool,
        #[serde(default)]
        media_type: Option<String>,
    },
    Response {
        request_id: u64,
        ok: bool,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        media: Option<WireMedia>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeCommand<'a> {
    SendText {
        request_id: u64,
        to: &'a str,
        text: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_to: Option<&'a str>,
    },
    SendMedia {
        request_id: u64,
        to: &'a str,
        media: WireMedia,
        #[serde(skip_serializing_if = "Option::is_none")]
        caption: Option<&'a str>,
    },
    DownloadMedia {
        request_id: u64,
        message_id: &'a str,
    },
}

#[derive(Debug)]
struct BridgeReply {
    ok: bool,
    error: Option<String>,
    media: Option<WireMedia>,
}

type PendingMap = Arc<StdMutex<HashMap<u64, oneshot::Sender<BridgeReply>>>>;

/// Sending half of the bridge; implements [`Transport`].
pub struct BridgeClient {
    writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    pending: PendingMap,
    next_id: AtomicU64,
}

impl BridgeClient {
    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn request(&self, request_id: u64, command: &BridgeCommand<'_>) -> Result<BridgeReply> {
        let mut line = serde_json::to_string(command)?;
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        lock_pending(&self.pending).insert(request_id, tx);

        let written = {
            let mut writer = self.writer.lock().await;
            match writer.write_all(line.as_bytes()).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            }
        };

        if let Err(e) = written {
            lock_pending(&self.pending).remove(&request_id);
            return Err(TransportError::Io(e));
        }

        let reply = rx.await.map_err(|_| TransportError::Closed)?;
        if !reply.ok {
            return Err(TransportError::Remote(
                reply.error.unwrap_or_else(|| "unknown bridge error".to_string()),
            ));
        }
        Ok(reply)
    }
}

#[async_trait]
impl Transport for BridgeClient {
    async fn send_text(&self, to: &str, text: &str, reply_to: Option<&str>) -> Result<()> {
        let request_id = self.next_request_id();
        let command = BridgeCommand::SendText {
            request_id,
            to,
            text,
            reply_to,
        };
        self.request(request_id, &command).await?;
        Ok(())
    }

    async fn send_media(&self, to: &str, media: MediaPayload, caption: Option<&str>) -> Result<()> {
        let request_id = self.next_request_id();
        let command = BridgeCommand::SendMedia {
            request_id,
            to,
            media: WireMedia::from(&media),
            caption,
        };
        self.request(request_id, &command).await?;
        Ok(())
    }

    async fn download_media(&self, message_id: &str) -> Result<MediaPayload> {
        let request_id = self.next_request_id();
        let command = BridgeCommand::DownloadMedia {
            request_id,
            message_id,
        };
        let reply = self.request(request_id, &command).await?;

        let wire = reply
            .media
            .ok_or_else(|| TransportError::Media("response carried no media".to_string()))?;
        MediaPayload::try_from(wire)
    }
}

/// A running bridge: the client half plus the event stream.
pub struct Bridge {
    client: Arc<BridgeClient>,
    events: mpsc::Receiver<TransportEvent>,
    child: Option<Child>,
}

impl Bridge {
    /// Start the bridge process and attach to its stdin/stdout.
    pub fn spawn(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| TransportError::Spawn("empty bridge command".to_string()))?;

        tracing::info!("Starting WhatsApp bridge: {}", command.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransportError::Spawn(format!("{}: {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("bridge stdout unavailable".to_string()))?;

        let mut bridge = Self::from_io(BufReader::new(stdout), stdin);
        bridge.child = Some(child);
        Ok(bridge)
    }

    /// Attach to an already-open line stream pair.
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: PendingMap = Arc::new(StdMutex::new(HashMap::new()));
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(read_bridge_output(reader, pending.clone(), tx));

        let client = Arc::new(BridgeClient {
            writer: Mutex::new(Box::new(writer)),
            pending,
            next_id: AtomicU64::new(1),
        });

        Self {
            client,
            events: rx,
            child: None,
        }
    }

    pub fn client(&self) -> Arc<BridgeClient> {
        self.client.clone()
    }

    /// Next event, `None` once the bridge output is exhausted.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Wait for the bridge process to exit.
    pub async fn wait(&mut self) -> Result<Option<std::process::ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => Ok(Some(child.wait().await?)),
            None => Ok(None),
        }
    }
}

fn lock_pending(
    pending: &PendingMap,
) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<BridgeReply>>> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

async fn read_bridge_output<R>(reader: R, pending: PendingMap, events: mpsc::Sender<TransportEvent>)
where
    R: AsyncBufRead + Send + Unpin,
{
    let mut lines = LinesStream::new(reader.lines());

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::error!("Failed to read bridge output: {}", e);
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let output: BridgeOutput = match serde_json::from_str(trimmed) {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!("Ignoring malformed bridge line ({}): {}", e, trimmed);
                continue;
            }
        };

        let event = match output {
            BridgeOutput::Response {
                request_id,
                ok,
                error,
                media,
            } => {
                let waiter = lock_pending(&pending).remove(&request_id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(BridgeReply { ok, error, media });
                    }
                    None => tracing::warn!("Response for unknown request {}", request_id),
                }
                continue;
            }
            BridgeOutput::Qr { code } => TransportEvent::Qr(code),
            BridgeOutput::Authenticated => TransportEvent::Authenticated,
            BridgeOutput::Ready => TransportEvent::Ready,
            BridgeOutput::Disconnected { reason } => TransportEvent::Disconnected(reason),
            BridgeOutput::Message {
                id,
                from,
                body,
                has_media,
                media_type,
            } => TransportEvent::Message(InboundMessage {
                id,
                from,
                body,
                has_media,
                media_type: media_type.unwrap_or_else(|| "chat".to_string()),
            }),
        };

        if events.send(event).await.is_err() {
            tracing::debug!("Event receiver dropped, stopping bridge reader");
            break;
        }
    }

    // Fail whoever is still waiting for an answer.
    lock_pending(&pending).clear();

    let _ = events
        .send(TransportEvent::Disconnected(Some("bridge output closed".to_string())))
        .await;
}
