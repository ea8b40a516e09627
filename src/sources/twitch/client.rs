use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::{
    ratelimit::RateLimiter,
    token::{AccessToken, AuthError, TwitchTokenTracker},
};
use crate::common::types::Records;

/// Attempts per data fetch before giving up.
const MAX_ATTEMPTS: usize = 3;

pub const USERS_BY_LOGIN: &str = "/users?login={}";
pub const VIDEOS_BY_USER: &str = "/videos?user_id={}&type=all&first=100";
pub const STREAMS_BY_USER: &str = "/streams?user_id={}";

#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("fetch of {url} failed after {attempts} attempts: {reason}")]
    Exhausted {
        url: String,
        attempts: usize,
        reason: String,
    },
    #[error("unexpected response body from {url}: {reason}")]
    Decode { url: String, reason: String },
}

#[derive(Deserialize)]
struct Envelope {
    data: Vec<serde_json::Value>,
}

/// Authenticated, rate-limited, retrying GET client for the Helix API.
pub struct UpstreamClient {
    http: reqwest::Client,
    api_base: String,
    tokens: Arc<TwitchTokenTracker>,
    limiter: Arc<RateLimiter>,
}

impl UpstreamClient {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        tokens: Arc<TwitchTokenTracker>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            tokens,
            limiter,
        }
    }

    /// Fetches `template` with `{}` replaced by the url-encoded `resource_id`.
    /// Returns the decoded (gunzipped) body.
    pub async fn fetch(&self, resource_id: &str, template: &str) -> Result<Bytes, UpstreamError> {
        self.limiter.acquire().await;
        let token = self.tokens.get_token().await?;

        let url = format!(
            "{}{}",
            self.api_base,
            template.replace("{}", &urlencoding::encode(resource_id))
        );

        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.get_once(&url, &token).await {
                Ok(body) => {
                    debug!("Fetched {} bytes from twitch for {}", body.len(), resource_id);
                    return Ok(body);
                }
                Err(e) => {
                    warn!("Fetch attempt {}/{} for {} failed: {}", attempt, MAX_ATTEMPTS, url, e);
                    last_error = e.to_string();
                }
            }
        }

        error!("Giving up on {}: {}", url, last_error);
        Err(UpstreamError::Exhausted {
            url,
            attempts: MAX_ATTEMPTS,
            reason: last_error,
        })
    }

    /// Fetches and unwraps the `data` array of a Helix response.
    pub async fn fetch_records(
        &self,
        resource_id: &str,
        template: &str,
    ) -> Result<Records, UpstreamError> {
        let body = self.fetch(resource_id, template).await?;
        let envelope: Envelope =
            serde_json::from_slice(&body).map_err(|e| UpstreamError::Decode {
                url: template.replace("{}", resource_id),
                reason: e.to_string(),
            })?;
        Ok(Arc::new(envelope.data))
    }

    async fn get_once(&self, url: &str, token: &AccessToken) -> Result<Bytes, reqwest::Error> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&token.value)
            .header("Client-Id", self.tokens.client_id())
            .send()
            .await?
            .error_for_status()?;
        debug!("Fetch from twitch {} with code {}", url, resp.status());
        resp.bytes().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{io::Write, time::Duration};

    use flate2::{Compression, write::GzEncoder};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, query_param},
    };

    use super::*;
    use crate::common::http::HttpClient;

    pub(crate) async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "expires_in": 3600,
                "token_type": "bearer"
            })))
            .mount(server)
            .await;
    }

    pub(crate) fn client(server: &MockServer) -> UpstreamClient {
        let http = HttpClient::upstream().unwrap();
        let tokens = Arc::new(TwitchTokenTracker::new(
            http.clone(),
            format!("{}/oauth2/token", server.uri()),
            "client",
            "secret",
        ));
        let limiter = Arc::new(RateLimiter::new(800, Duration::from_secs(60)));
        UpstreamClient::new(http, format!("{}/helix", server.uri()), tokens, limiter)
    }

    #[tokio::test]
    async fn sends_credentials_and_unwraps_data() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/helix/users"))
            .and(query_param("login", "teststreamer"))
            .and(header("Authorization", "Bearer tok-1"))
            .and(header("Client-Id", "client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "42", "login": "teststreamer"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = client(&server)
            .fetch_records("teststreamer", USERS_BY_LOGIN)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], "42");
    }

    #[tokio::test]
    async fn decompresses_gzip_bodies() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"data":[{"id":"7"}]}"#).unwrap();
        let compressed = encoder.finish().unwrap();

        Mock::given(method("GET"))
            .and(path("/helix/streams"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Encoding", "gzip")
                    .insert_header("Content-Type", "application/json")
                    .set_body_bytes(compressed),
            )
            .mount(&server)
            .await;

        let body = client(&server).fetch("7", STREAMS_BY_USER).await.unwrap();
        assert_eq!(&body[..], br#"{"data":[{"id":"7"}]}"#);
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/helix/videos"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/helix/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":[]}"#))
            .mount(&server)
            .await;

        let records = client(&server)
            .fetch_records("42", VIDEOS_BY_USER)
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn gives_up_after_three_attempts() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/helix/videos"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server).fetch("42", VIDEOS_BY_USER).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Exhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn auth_failure_surfaces_as_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).fetch("42", VIDEOS_BY_USER).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Auth(_)));
    }
}
