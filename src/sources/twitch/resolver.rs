use std::sync::LazyLock;

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use serde_json::{Value, json};
use tracing::debug;

use super::hls::fetch_playlist;
use crate::{
    common::types::AnyResult,
    configs::TwitchConfig,
    sources::plugin::{MediaResolver, ResolveError},
};

static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://(?:www\.|m\.)?twitch\.tv/videos/)?(\d+)(?:[/?#].*)?$")
        .expect("static video id pattern")
});

const VOD_TOKEN_QUERY: &str = "query PlaybackAccessToken_Template($vodID: ID!) { \
    videoPlaybackAccessToken(id: $vodID, params: {platform: \"web\", playerBackend: \"mediaplayer\", playerType: \"site\"}) \
    { value signature } }";

/// Extracts the numeric id from a video page URL or a bare id.
pub fn video_id(video_url: &str) -> Option<&str> {
    VIDEO_ID_RE
        .captures(video_url.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

struct PlaybackToken {
    value: String,
    signature: String,
}

/// Resolves VOD pages to their audio-only HLS rendition through the web
/// player's playback-token and usher endpoints.
pub struct TwitchResolver {
    http: reqwest::Client,
    gql_url: String,
    usher_base: String,
    gql_client_id: String,
}

impl TwitchResolver {
    pub fn new(http: reqwest::Client, config: &TwitchConfig) -> Self {
        Self {
            http,
            gql_url: config.gql_url.clone(),
            usher_base: config.usher_base.trim_end_matches('/').to_string(),
            gql_client_id: config.gql_client_id.clone(),
        }
    }

    async fn playback_token(&self, id: &str) -> AnyResult<PlaybackToken> {
        let body = json!({
            "operationName": "PlaybackAccessToken_Template",
            "query": VOD_TOKEN_QUERY,
            "variables": { "vodID": id }
        });

        let resp = self
            .http
            .post(&self.gql_url)
            .header("Client-Id", &self.gql_client_id)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let data: Value = resp.json().await?;
        let token = &data["data"]["videoPlaybackAccessToken"];
        let value = token["value"].as_str().ok_or("missing token value")?;
        let signature = token["signature"]
            .as_str()
            .ok_or("missing token signature")?;

        Ok(PlaybackToken {
            value: value.to_string(),
            signature: signature.to_string(),
        })
    }

    async fn audio_playlist_url(&self, id: &str) -> AnyResult<String> {
        let token = self.playback_token(id).await?;
        let p = rand::thread_rng().gen_range(0..1_000_000u32).to_string();
        let master_url = format!("{}/vod/{}.m3u8", self.usher_base, id);

        let resp = self
            .http
            .get(&master_url)
            .query(&[
                ("allow_source", "true"),
                ("allow_audio_only", "true"),
                ("player", "twitchweb"),
                ("playlist_include_framerate", "true"),
                ("p", p.as_str()),
                ("nauth", token.value.as_str()),
                ("nauthsig", token.signature.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(format!("usher returned HTTP {}", resp.status()).into());
        }

        let text = resp.text().await?;
        let playlist = super::hls::parse_m3u8(&text, &master_url);
        let variant = playlist
            .audio_variant()
            .ok_or("master playlist has no variants")?;

        debug!(
            "Picked {} variant ({} bps) for video {}",
            variant.group.as_deref().unwrap_or("unnamed"),
            variant.bandwidth,
            id
        );
        Ok(variant.url.clone())
    }
}

#[async_trait]
impl MediaResolver for TwitchResolver {
    fn name(&self) -> &str {
        "twitch"
    }

    async fn resolve(&self, video_url: &str) -> Result<String, ResolveError> {
        let id = video_id(video_url)
            .ok_or_else(|| ResolveError::no_stream(video_url, "not a video URL"))?;

        self.audio_playlist_url(id)
            .await
            .map_err(|e| ResolveError::no_stream(video_url, e))
    }
}

/// Total seconds of the media playlist at `url`.
pub async fn playlist_duration(http: &reqwest::Client, url: &str) -> AnyResult<f64> {
    let playlist = fetch_playlist(http, url).await?;
    playlist
        .duration_secs()
        .ok_or_else(|| format!("no duration in playlist {url}").into())
}
