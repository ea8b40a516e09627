use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::common::types::now_secs;

/// Attempts per credential exchange before giving up.
const MAX_ATTEMPTS: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    /// Unix epoch seconds after which the token must not be used.
    pub expires_at: u64,
}

impl AccessToken {
    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, Error)]
#[error("credential exchange failed after {attempts} attempts: {reason}")]
pub struct AuthError {
    pub attempts: usize,
    pub reason: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Holds the app access token and refreshes it with the client-credentials grant.
pub struct TwitchTokenTracker {
    client: reqwest::Client,
    auth_url: String,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<AccessToken>>,
    refresh_gate: Mutex<()>,
}

impl TwitchTokenTracker {
    pub fn new(
        client: reqwest::Client,
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth_url: auth_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the held token while it is unexpired, otherwise exchanges
    /// the client credentials for a new one.
    pub async fn get_token(&self) -> Result<AccessToken, AuthError> {
        if let Some(token) = self.current() {
            return Ok(token);
        }
        self.refresh_token().await
    }

    fn current(&self) -> Option<AccessToken> {
        let lock = self.token.read();
        lock.as_ref()
            .filter(|t| t.is_valid_at(now_secs()))
            .cloned()
    }

    async fn refresh_token(&self) -> Result<AccessToken, AuthError> {
        let _gate = self.refresh_gate.lock().await;

        // Another caller may have refreshed while we waited for the gate.
        if let Some(token) = self.current() {
            return Ok(token);
        }

        debug!("Requesting a new Twitch app access token");

        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let issued_at = now_secs();
            match self.exchange().await {
                Ok(resp) => {
                    let token = AccessToken {
                        value: resp.access_token,
                        expires_at: issued_at + resp.expires_in,
                    };
                    *self.token.write() = Some(token.clone());
                    debug!("Twitch access token acquired, expires at {}", token.expires_at);
                    return Ok(token);
                }
                Err(e) => {
                    warn!(
                        "Token exchange attempt {}/{} failed: {}",
                        attempt, MAX_ATTEMPTS, e
                    );
                    last_error = e.to_string();
                }
            }
        }

        error!("Giving up on Twitch token exchange: {}", last_error);
        Err(AuthError {
            attempts: MAX_ATTEMPTS,
            reason: last_error,
        })
    }

    async fn exchange(&self) -> Result<TokenResponse, reqwest::Error> {
        self.client
            .post(&self.auth_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<TokenResponse>()
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method, path},
    };

    use super::*;
    use crate::common::http::HttpClient;

    fn tracker(server: &MockServer) -> TwitchTokenTracker {
        TwitchTokenTracker::new(
            HttpClient::upstream().unwrap(),
            format!("{}/oauth2/token", server.uri()),
            "client",
            "secret",
        )
    }

    fn token_body(expires_in: u64) -> serde_json::Value {
        serde_json::json!({
            "access_token": "tok-1",
            "expires_in": expires_in,
            "token_type": "bearer"
        })
    }

    #[tokio::test]
    async fn reuses_unexpired_token_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(3600)))
            .expect(1)
            .mount(&server)
            .await;

        let tracker = tracker(&server);
        let first = tracker.get_token().await.unwrap();
        let second = tracker.get_token().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.value, "tok-1");
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(3600)))
            .expect(1)
            .mount(&server)
            .await;

        let tracker = Arc::new(tracker(&server));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let t = tracker.clone();
                tokio::spawn(async move { t.get_token().await })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn expired_token_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body(0)))
            .expect(2)
            .mount(&server)
            .await;

        let tracker = tracker(&server);
        tracker.get_token().await.unwrap();
        tracker.get_token().await.unwrap();
    }

    #[tokio::test]
    async fn fails_after_three_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = tracker(&server).get_token().await.unwrap_err();
        assert_eq!(err.attempts, 3);
    }
}
