//! CLI commands for zapgpt using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{load_settings, Settings};
use crate::core::{classify, AllowList, InboundMessage, RoutedAction};
use crate::whatsapp::{run_whatsapp_daemon, PairingState};
use crate::web::{run_server, WebServerConfig};

/// zapgpt - WhatsApp assistant backed by an OpenAI-compatible API.
#[derive(Parser)]
#[command(name = "zapgpt")]
#[command(version = "0.1.0")]
#[command(about = "zapgpt - WhatsApp AI assistant", long_about = None)]
pub struct Commands {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the WhatsApp bot and the pairing page
    Start {
        /// Port for the pairing page
        #[arg(long)]
        port: Option<u16>,
    },

    /// Serve the pairing page only
    Web {
        /// Port number
        #[arg(long)]
        port: Option<u16>,
    },

    /// Ask the model a single question
    Ask {
        /// Message to send
        message: String,
    },

    /// Show how a message would be routed
    Route {
        /// Message body
        body: String,

        /// Sender identifier
        #[arg(long, default_value = "cli@c.us")]
        from: String,

        /// Media type; marks the message as carrying media
        #[arg(long = "media-type")]
        media_type: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

impl Commands {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Command::Start { port } => cmd_start(*port).await,
            Command::Web { port } => cmd_web(*port).await,
            Command::Ask { message } => cmd_ask(message).await,
            Command::Route {
                body,
                from,
                media_type,
            } => cmd_route(body, from, media_type.as_deref()),
            Command::Config => cmd_config(),
        }
    }
}

// Command implementations

fn server_config(settings: &Settings, port: Option<u16>) -> WebServerConfig {
    WebServerConfig {
        port: port.unwrap_or(settings.server.port),
        host: settings.server.host.clone(),
    }
}

async fn cmd_start(port: Option<u16>) -> Result<()> {
    let settings = load_settings()?;
    let pairing = PairingState::new();
    let web = server_config(&settings, port);

    tracing::info!("Starting zapgpt...");

    // Either service stopping ends the process.
    tokio::select! {
        result = run_server(web, pairing.clone()) => {
            if let Err(e) = result {
                tracing::error!("Web server error: {}", e);
                return Err(e.into());
            }
        }
        result = run_whatsapp_daemon(settings, pairing) => {
            if let Err(e) = result {
                tracing::error!("WhatsApp daemon error: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}

async fn cmd_web(port: Option<u16>) -> Result<()> {
    let settings = load_settings()?;
    let web = server_config(&settings, port);

    println!("Starting pairing page on port {}...", web.port);
    println!("  http://localhost:{}/", web.port);
    println!("  http://localhost:{}/health", web.port);
    println!();
    println!("Press Ctrl+C to stop");

    run_server(web, PairingState::new()).await?;
    Ok(())
}

async fn cmd_ask(message: &str) -> Result<()> {
    let settings = load_settings()?;
    let response = crate::providers::complete(message, &settings).await?;
    println!("{}", response);
    Ok(())
}

fn describe_action(action: &RoutedAction) -> String {
    match action {
        RoutedAction::Ignore => "ignore".to_string(),
        RoutedAction::TextRequest { prompt } => format!("text: {}", prompt),
        RoutedAction::ImageRequest { prompt } => format!("image: {}", prompt),
        RoutedAction::AudioRequest => "audio".to_string(),
    }
}

fn cmd_route(body: &str, from: &str, media_type: Option<&str>) -> Result<()> {
    let settings = load_settings()?;
    let msg = match media_type {
        Some(kind) => InboundMessage::media("cli", from, body, kind),
        None => InboundMessage::text("cli", from, body),
    };
    let allow_list = AllowList::from_entries(&settings.access.allowed_numbers);

    println!("{}", describe_action(&classify(&msg, allow_list.as_ref())));
    Ok(())
}

fn cmd_config() -> Result<()> {
    let settings = load_settings()?;
    println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
    Ok(())
}
