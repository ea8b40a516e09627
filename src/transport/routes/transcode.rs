use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    common::{errors::ErrorBody, types::SessionId},
    server::AppState,
    transcode::{PreparedTranscode, TranscodeError, parse_range_start},
};

pub const SESSION_COOKIE: &str = "vodcast_session";

/// Reads the session token from the request cookies.
pub fn session_from_cookies(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| SessionId::parse(value.trim()))
}

/// Numeric video id from `{id}.mp3`.
fn video_id_from_file(file: &str) -> Option<&str> {
    let id = file.strip_suffix(".mp3").unwrap_or(file);
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then_some(id)
}

/// GET /transcode/{videoId}.mp3
pub async fn transcode(
    Path(file): Path<String>,
    method: Method,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let path = format!("/transcode/{file}");
    tracing::info!("{} {} Range={:?}", method, path, headers.get(header::RANGE));

    if !state.transcoder.config().enabled {
        return ErrorBody::not_found("Transcoding is disabled", path).into_response();
    }

    let Some(video_id) = video_id_from_file(&file) else {
        return ErrorBody::not_found(format!("Invalid video id: {file}"), path).into_response();
    };

    let (session, issued) = match session_from_cookies(&headers) {
        Some(session) => (session, false),
        None => (SessionId::generate(), true),
    };

    let range_start = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range_start);

    let prepared = match state.transcoder.prepare(video_id, range_start).await {
        Ok(prepared) => prepared,
        Err(e) => return error_response(e, &path),
    };

    let mut response_headers = stream_headers(&prepared);
    if issued {
        let cookie = format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response_headers.insert(header::SET_COOKIE, value);
        }
    }

    let status = if prepared.plan.partial {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    if method == Method::HEAD {
        return (status, response_headers, Body::empty()).into_response();
    }

    match state.transcoder.launch(&session, &prepared).await {
        Ok(output) => (
            status,
            response_headers,
            Body::from_stream(output.into_stream()),
        )
            .into_response(),
        Err(e) => error_response(e, &path),
    }
}

fn stream_headers(prepared: &PreparedTranscode) -> HeaderMap {
    let plan = &prepared.plan;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(plan.content_length()));
    if let Some(range) = plan.content_range() {
        if let Ok(value) = HeaderValue::from_str(&range) {
            headers.insert(header::CONTENT_RANGE, value);
        }
    }
    headers
}

fn error_response(error: TranscodeError, path: &str) -> Response {
    match error {
        TranscodeError::Range(e) => {
            tracing::debug!("{}: {}", path, e);
            let mut response = ErrorBody::range_not_satisfiable(e.to_string(), path).into_response();
            if let Ok(value) = HeaderValue::from_str(&e.content_range()) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
            response
        }
        TranscodeError::NoMediaStream(e) => {
            tracing::warn!("{}: {}", path, e);
            ErrorBody::not_found(e.to_string(), path).into_response()
        }
        TranscodeError::Playlist(reason) => {
            tracing::error!("{}: {}", path, reason);
            ErrorBody::service_unavailable(reason, path).into_response()
        }
        TranscodeError::Spawn(e) => {
            tracing::error!("{}: failed to start transcoder: {}", path, e);
            ErrorBody::internal("Failed to start transcoder", path).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_session_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; vodcast_session=abc123; other=1"),
        );
        assert_eq!(
            session_from_cookies(&headers),
            Some(SessionId::from("abc123".to_string()))
        );

        headers.insert(header::COOKIE, HeaderValue::from_static("vodcast_session=bad!value"));
        assert_eq!(session_from_cookies(&headers), None);
    }

    #[test]
    fn accepts_only_numeric_mp3_names() {
        assert_eq!(video_id_from_file("123.mp3"), Some("123"));
        assert_eq!(video_id_from_file("123"), Some("123"));
        assert_eq!(video_id_from_file("abc.mp3"), None);
        assert_eq!(video_id_from_file(".mp3"), None);
    }
}
