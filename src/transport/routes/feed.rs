use std::{
    io::Write,
    sync::{Arc, LazyLock},
};

use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use flate2::{Compression, write::GzEncoder};
use regex::Regex;

use super::base_url;
use crate::{
    common::errors::ErrorBody,
    feed::{FeedError, FeedOptions},
    server::AppState,
};

static CHANNEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{2,25}$").expect("static channel pattern"));

pub fn is_valid_channel(name: &str) -> bool {
    CHANNEL_RE.is_match(name)
}

/// GET /vod/{channel}
pub async fn vod(
    Path(channel): Path<String>,
    Query(options): Query<FeedOptions>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    serve_feed(&state, &channel, &options, uri.path(), &headers, true).await
}

/// GET /vodonly/{channel}
pub async fn vod_only(
    Path(channel): Path<String>,
    Query(options): Query<FeedOptions>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    serve_feed(&state, &channel, &options, uri.path(), &headers, false).await
}

async fn serve_feed(
    state: &AppState,
    channel: &str,
    options: &FeedOptions,
    path: &str,
    headers: &HeaderMap,
    allow_live: bool,
) -> Response {
    tracing::info!("GET {} {:?}", path, options);

    if !is_valid_channel(channel) {
        return ErrorBody::not_found(format!("Invalid channel name: {channel}"), path)
            .into_response();
    }

    let base = base_url(state, headers);
    let self_link = format!("{base}{path}");

    let rss = match state
        .feeds
        .build(channel, options, &base, self_link, allow_live)
        .await
    {
        Ok(rss) => rss,
        Err(FeedError::ChannelNotFound(name)) => {
            tracing::debug!("{}: channel {} not found", path, name);
            return ErrorBody::not_found(format!("Channel {name} not found"), path)
                .into_response();
        }
        Err(FeedError::Upstream(e)) => {
            tracing::error!("{}: {}", path, e);
            return ErrorBody::service_unavailable(e.to_string(), path).into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/rss+xml; charset=utf-8"),
    );

    if accepts_gzip(headers) {
        match gzip(rss.as_bytes()) {
            Ok(body) => {
                response_headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                return (StatusCode::OK, response_headers, body).into_response();
            }
            Err(e) => tracing::warn!("{}: gzip failed, sending plain body: {}", path, e),
        }
    }

    (StatusCode::OK, response_headers, rss).into_response()
}

fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"))
}

pub fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    #[test]
    fn validates_channel_names() {
        assert!(is_valid_channel("teststreamer"));
        assert!(is_valid_channel("a_1"));
        assert!(!is_valid_channel("x"));
        assert!(!is_valid_channel("bad-name"));
        assert!(!is_valid_channel(&"a".repeat(26)));
    }

    #[test]
    fn gzip_round_trips() {
        let packed = gzip(b"<rss/>").unwrap();
        let mut out = String::new();
        GzDecoder::new(&packed[..]).read_to_string(&mut out).unwrap();
        assert_eq!(out, "<rss/>");
    }

    #[test]
    fn detects_gzip_acceptance() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_gzip(&headers));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("br, gzip"));
        assert!(accepts_gzip(&headers));
    }
}
