use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The video has no playable stream, or the provider refused to hand one out.
    #[error("no media stream for {url}: {reason}")]
    NoMediaStream { url: String, reason: String },
}

impl ResolveError {
    pub fn no_stream(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::NoMediaStream {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Turns a video page URL into a playable media URL.
///
/// The shipped implementation talks to Twitch; tests and alternative
/// providers plug in their own.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    /// Resolve the page URL of one video (e.g. `https://www.twitch.tv/videos/123`)
    /// into the URL of an audio-capable HLS playlist.
    async fn resolve(&self, video_url: &str) -> Result<String, ResolveError>;
}

pub type BoxedResolver = std::sync::Arc<dyn MediaResolver>;
