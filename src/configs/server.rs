use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public scheme, host and base path used when building feed links,
    /// e.g. `https://example.org/podcasts`. Falls back to the request's Host header.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub filters: Option<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            filters: None,
            debug: false,
            ansi: default_ansi(),
        }
    }
}

fn default_ansi() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedConfig {
    /// How many media URLs one feed request resolves at the same time.
    #[serde(default = "default_resolve_concurrency")]
    pub resolve_concurrency: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            resolve_concurrency: default_resolve_concurrency(),
        }
    }
}

fn default_resolve_concurrency() -> usize {
    8
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct UpdateConfig {
    /// Releases endpoint returning `{"tag_name": "..."}`. Update checks are off when unset.
    #[serde(default)]
    pub releases_url: Option<String>,
}
