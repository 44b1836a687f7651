//! Web server module (Axum pairing page).

pub mod pairing_page;
pub mod router;
pub mod server;

pub use server::{run_server, WebServerConfig};
