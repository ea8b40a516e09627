use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TwitchConfig {
    /// Application client id for the Helix API. Required.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Application secret for the client-credentials exchange. Required.
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_gql_url")]
    pub gql_url: String,
    #[serde(default = "default_usher_base")]
    pub usher_base: String,
    /// Public web-player client id used for playback access tokens.
    #[serde(default = "default_gql_client_id")]
    pub gql_client_id: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: usize,
    #[serde(default = "default_rate_period_secs")]
    pub rate_period_secs: u64,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base: default_api_base(),
            auth_url: default_auth_url(),
            gql_url: default_gql_url(),
            usher_base: default_usher_base(),
            gql_client_id: default_gql_client_id(),
            rate_limit: default_rate_limit(),
            rate_period_secs: default_rate_period_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.twitch.tv/helix".to_string()
}

fn default_auth_url() -> String {
    "https://id.twitch.tv/oauth2/token".to_string()
}

fn default_gql_url() -> String {
    "https://gql.twitch.tv/gql".to_string()
}

fn default_usher_base() -> String {
    "https://usher.ttvnw.net".to_string()
}

fn default_gql_client_id() -> String {
    "kimne78kx3ncx6brgo4mv6wki5h1ko".to_string()
}

fn default_rate_limit() -> usize {
    800
}

fn default_rate_period_secs() -> u64 {
    60
}
