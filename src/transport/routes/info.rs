use std::sync::Arc;

use axum::{extract::State, http::header, response::IntoResponse};

use crate::{server::AppState, update::VERSION};

/// GET /
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("GET /");

    let mut body = format!(
        "vodcast {VERSION}\n\n\
         Podcast feeds of Twitch channel videos.\n\n\
         GET /vod/<channel>       all videos, live recordings with ?include_streaming=true\n\
         GET /vodonly/<channel>   finished videos only\n\n\
         Query options: sort_by=<field>, desc=true, links_only=true, transcode=true\n"
    );

    if state.transcoder.config().enabled {
        body.push_str("Transcoded mp3 enclosures are available.\n");
    }

    if let Some(latest) = state.updates.available_update().await {
        body.push_str(&format!("\nA newer version is available: {latest}\n"));
    }

    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body)
}

/// GET /version
pub async fn version() -> impl IntoResponse {
    tracing::debug!("GET /version");
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], VERSION)
}
