//! WhatsApp channel: bridge transport, pairing state and the bot daemon.

pub mod bridge;
pub mod client;
pub mod pairing;
pub mod transport;

pub use bridge::{Bridge, BridgeClient, TransportEvent};
pub use client::run_whatsapp_daemon;
pub use pairing::{PairingState, PairingStatus};
pub use transport::{MediaPayload, Transport, TransportError};
