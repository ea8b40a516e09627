use std::time::Duration;

use reqwest::{Client, Error};

/// Per-call timeout for every upstream API request.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(3);

pub struct HttpClient;

impl HttpClient {
  pub fn user_agent() -> String {
    format!("vodcast/{}", env!("CARGO_PKG_VERSION"))
  }

  /// Client for the metadata API and the token endpoint. Gzip bodies are
  /// requested and decoded by reqwest itself.
  pub fn upstream() -> Result<Client, Error> {
    Client::builder()
      .user_agent(Self::user_agent())
      .timeout(UPSTREAM_TIMEOUT)
      .gzip(true)
      .build()
  }

  /// Client for playback negotiation and playlist loads, which can be slower.
  pub fn media() -> Result<Client, Error> {
    Client::builder()
      .user_agent(Self::user_agent())
      .timeout(Duration::from_secs(10))
      .gzip(true)
      .build()
  }
}
