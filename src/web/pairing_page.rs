//! Pairing page: shows the current WhatsApp QR code.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use base64::Engine;

use crate::whatsapp::pairing::{render_svg, PairingState, PairingStatus};

/// Inline script reloading the page after `ms` milliseconds.
fn reload_script(ms: u32) -> String {
    format!(
        "<script>setTimeout(() => window.location.reload(), {});</script>",
        ms
    )
}

pub fn waiting_page() -> String {
    format!("<h1>Aguardando QR Code...</h1>{}", reload_script(2000))
}

pub const CONNECTED_PAGE: &str = "<h1>WhatsApp conectado</h1>";

pub const QR_ERROR_BODY: &str = "Erro ao gerar QR Code";

/// QR page for a pending code. The SVG is inlined as a data URL.
pub fn pending_page(svg: &str) -> String {
    let data_url = format!(
        "data:image/svg+xml;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(svg.as_bytes())
    );
    format!(
        "<div style=\"display:flex; justify-content:center; align-items:center; height:100vh; flex-direction:column;\">\
<h1>Escaneie para conectar</h1>\
<img src=\"{}\" alt=\"QR Code\" />\
<p>Atualiza automaticamente.</p>\
{}\
</div>",
        data_url,
        reload_script(5000)
    )
}

pub async fn pairing_page(State(pairing): State<PairingState>) -> Response {
    match pairing.status() {
        PairingStatus::Waiting => Html(waiting_page()).into_response(),
        PairingStatus::Connected => Html(CONNECTED_PAGE).into_response(),
        PairingStatus::Pending(code) => match render_svg(&code) {
            Ok(svg) => Html(pending_page(&svg)).into_response(),
            Err(e) => {
                tracing::error!("Failed to render QR code: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, QR_ERROR_BODY).into_response()
            }
        },
    }
}
