pub mod feed;
pub mod info;
pub mod transcode;

use axum::http::{HeaderMap, header};

use crate::server::AppState;

/// Scheme, host and base path that links in responses should start with.
pub fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(public) = &state.config.server.public_url {
        return public.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}
