//! Pairing state shared between the bridge daemon and the pairing page.
//!
//! Only the latest pairing code is kept; a new one overwrites the old.

use qrcode::render::{svg, unicode};
use qrcode::types::QrError;
use qrcode::QrCode;
use std::sync::{Arc, RwLock};

/// What the pairing page should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingStatus {
    /// No code received yet.
    Waiting,
    /// A code is waiting to be scanned.
    Pending(String),
    /// Session authenticated.
    Connected,
}

#[derive(Debug, Default)]
struct PairingInner {
    token: Option<String>,
    connected: bool,
}

/// Process-wide pairing state, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct PairingState {
    inner: Arc<RwLock<PairingInner>>,
}

impl PairingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly issued pairing code.
    pub fn set_token(&self, token: impl Into<String>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.token = Some(token.into());
        inner.connected = false;
    }

    /// Latest pairing code, if any.
    pub fn token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .token
            .clone()
    }

    /// Session authenticated: the code is spent.
    pub fn mark_connected(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.token = None;
        inner.connected = true;
    }

    /// Session lost: wait for a new code.
    pub fn mark_disconnected(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.connected = false;
    }

    pub fn status(&self) -> PairingStatus {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        match (&inner.token, inner.connected) {
            (_, true) => PairingStatus::Connected,
            (Some(token), false) => PairingStatus::Pending(token.clone()),
            (None, false) => PairingStatus::Waiting,
        }
    }
}

/// Render a pairing code as an SVG document.
pub fn render_svg(code: &str) -> Result<String, QrError> {
    let qr = QrCode::new(code.as_bytes())?;
    Ok(qr
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

/// Render a pairing code for a terminal.
pub fn render_terminal(code: &str) -> Result<String, QrError> {
    let qr = QrCode::new(code.as_bytes())?;
    Ok(qr
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}
