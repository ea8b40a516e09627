use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    cache::{CacheSpec, TtlCache},
    common::types::AnyResult,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Deserialize)]
struct Release {
    tag_name: String,
}

/// Latest released version, looked up at most once a day.
pub struct UpdateChecker {
    http: reqwest::Client,
    releases_url: Option<String>,
    latest: TtlCache<(), String>,
}

impl UpdateChecker {
    pub fn new(http: reqwest::Client, releases_url: Option<String>) -> Self {
        Self {
            http,
            releases_url,
            latest: TtlCache::new(CacheSpec::UPDATE_CHECK),
        }
    }

    /// Latest released tag, or `None` when checks are disabled or the
    /// lookup failed.
    pub async fn latest(&self) -> Option<String> {
        let url = self.releases_url.as_deref()?;
        match self
            .latest
            .get_or_try_insert_with((), self.fetch_latest(url))
            .await
        {
            Ok(tag) => Some(tag),
            Err(e) => {
                warn!("Update check failed: {}", e);
                None
            }
        }
    }

    /// The latest tag when it is newer than the running version.
    pub async fn available_update(&self) -> Option<String> {
        self.latest()
            .await
            .filter(|tag| is_newer(tag, VERSION))
    }

    async fn fetch_latest(&self, url: &str) -> AnyResult<String> {
        debug!("Checking for updates at {}", url);
        let release: Release = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(release.tag_name)
    }
}

fn version_parts(v: &str) -> Vec<u64> {
    v.trim()
        .trim_start_matches(['v', 'V'])
        .split(['.', '-', '+'])
        .map_while(|p| p.parse().ok())
        .collect()
}

pub fn is_newer(candidate: &str, current: &str) -> bool {
    let candidate = version_parts(candidate);
    !candidate.is_empty() && candidate > version_parts(current)
}
