use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::configs::*;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
  #[serde(default)]
  pub twitch: TwitchConfig,
  #[serde(default)]
  pub transcode: TranscodeConfig,
  #[serde(default)]
  pub feed: FeedConfig,
  #[serde(default)]
  pub updates: UpdateConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: toml::de::Error,
  },
  #[error("{0} is not set")]
  MissingCredential(&'static str),
  #[error("invalid value for {key}: {value:?}")]
  InvalidValue { key: &'static str, value: String },
}

impl Config {
  /// Reads `config.toml` (or `config.default.toml`) when present, applies
  /// environment overrides, and validates. A missing file is not an error:
  /// the service can be configured through the environment alone.
  pub fn load() -> Result<Self, ConfigError> {
    let config_path = ["config.toml", "config.default.toml"]
      .into_iter()
      .find(|p| std::path::Path::new(p).exists());

    let mut config = match config_path {
      Some(path) => {
        tracing::debug!("Loading configuration from: {}", path);
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
          path: path.to_string(),
          source,
        })?;
        Self::from_toml(path, &config_str)?
      }
      None => Config::default(),
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_toml(path: &str, config_str: &str) -> Result<Self, ConfigError> {
    toml::from_str(config_str).map_err(|source| ConfigError::Parse {
      path: path.to_string(),
      source,
    })
  }

  /// Overlays recognized environment variables onto the file configuration.
  pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    if let Some(v) = lookup("TWITCH_CLIENT_ID") {
      self.twitch.client_id = Some(v);
    }
    if let Some(v) = lookup("TWITCH_SECRET") {
      self.twitch.client_secret = Some(v);
    }
    if let Some(v) = lookup("TRANSCODE") {
      self.transcode.enabled = parse_bool("TRANSCODE", &v)?;
    }
    if let Some(v) = lookup("TRANSCODE_BITRATE") {
      self.transcode.bitrate_kbps = parse_num("TRANSCODE_BITRATE", &v)?;
    }
    if let Some(v) = lookup("TRANSCODE_BUFFER_SECONDS") {
      self.transcode.buffer_seconds = parse_num("TRANSCODE_BUFFER_SECONDS", &v)?;
    }
    if let Some(v) = lookup("TRANSCODE_MAX_BANDWIDTH") {
      self.transcode.max_bandwidth_kbps = parse_num("TRANSCODE_MAX_BANDWIDTH", &v)?;
    }
    if let Some(v) = lookup("FFMPEG_PATH") {
      self.transcode.ffmpeg_path = v;
    }
    if let Some(v) = lookup("PUBLIC_URL") {
      self.server.public_url = Some(v.trim_end_matches('/').to_string());
    }
    if let Some(v) = lookup("HOST") {
      self.server.host = v;
    }
    if let Some(v) = lookup("PORT") {
      self.server.port = parse_num("PORT", &v)?;
    }
    if let Some(v) = lookup("DEBUG") {
      self.logging.debug = parse_bool("DEBUG", &v)?;
    }
    Ok(())
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.twitch.client_id.as_deref().is_none_or(str::is_empty) {
      return Err(ConfigError::MissingCredential("TWITCH_CLIENT_ID"));
    }
    if self.twitch.client_secret.as_deref().is_none_or(str::is_empty) {
      return Err(ConfigError::MissingCredential("TWITCH_SECRET"));
    }
    if self.transcode.bitrate_kbps == 0 {
      return Err(ConfigError::InvalidValue {
        key: "TRANSCODE_BITRATE",
        value: "0".into(),
      });
    }
    if self.twitch.rate_limit == 0 {
      return Err(ConfigError::InvalidValue {
        key: "twitch.rate_limit",
        value: "0".into(),
      });
    }
    Ok(())
  }

  pub fn client_id(&self) -> &str {
    self.twitch.client_id.as_deref().unwrap_or_default()
  }

  pub fn client_secret(&self) -> &str {
    self.twitch.client_secret.as_deref().unwrap_or_default()
  }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
  match value.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Ok(true),
    "" | "0" | "false" | "no" | "off" => Ok(false),
    _ => Err(ConfigError::InvalidValue {
      key,
      value: value.to_string(),
    }),
  }
}

fn parse_num<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
  value.trim().parse().map_err(|_| ConfigError::InvalidValue {
    key,
    value: value.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;

  fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |key| map.get(key).cloned()
  }

  #[test]
  fn missing_credentials_are_fatal() {
    let config = Config::default();
    assert!(matches!(
      config.validate(),
      Err(ConfigError::MissingCredential("TWITCH_CLIENT_ID"))
    ));

    let mut config = Config::default();
    config.apply_env(env(&[("TWITCH_CLIENT_ID", "abc")])).unwrap();
    assert!(matches!(
      config.validate(),
      Err(ConfigError::MissingCredential("TWITCH_SECRET"))
    ));
  }

  #[test]
  fn environment_overrides_file_values() {
    let mut config = Config::from_toml(
      "config.toml",
      r#"
        [server]
        port = 9000

        [transcode]
        enabled = false
        bitrate_kbps = 96
      "#,
    )
    .unwrap();

    config
      .apply_env(env(&[
        ("TWITCH_CLIENT_ID", "id"),
        ("TWITCH_SECRET", "secret"),
        ("TRANSCODE", "true"),
        ("TRANSCODE_BITRATE", "128"),
        ("PUBLIC_URL", "https://example.org/pods/"),
      ]))
      .unwrap();

    assert!(config.validate().is_ok());
    assert_eq!(config.server.port, 9000);
    assert!(config.transcode.enabled);
    assert_eq!(config.transcode.bitrate_kbps, 128);
    assert_eq!(config.transcode.buffer_seconds, 10);
    assert_eq!(config.server.public_url.as_deref(), Some("https://example.org/pods"));
  }

  #[test]
  fn rejects_unparseable_numbers() {
    let mut config = Config::default();
    let err = config
      .apply_env(env(&[("TRANSCODE_BITRATE", "fast")]))
      .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { key: "TRANSCODE_BITRATE", .. }));
  }
}
