//! zapgpt library root.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod providers;
pub mod web;
pub mod whatsapp;

pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use self::core::{InboundMessage, RoutedAction, SessionOrchestrator};
pub use error::{Error, Result};
pub use providers::{CompletionGateway, MediaGateway};
pub use web::{run_server, WebServerConfig};
pub use whatsapp::{run_whatsapp_daemon, PairingState, Transport};
