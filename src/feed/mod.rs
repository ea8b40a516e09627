pub mod builder;
pub mod sort;

use std::{collections::HashSet, sync::Arc};

use futures::{StreamExt, stream};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

pub use builder::{Enclosure, FeedHeader, FeedItem};

use crate::{
    cache::MediaUrlService,
    sources::twitch::{Channel, TwitchApi, UpstreamError, Video},
    transcode::estimated_bytes,
};

const MPEG: &str = "audio/mpeg";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("channel {0} not found")]
    ChannelNotFound(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Query options of a feed request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedOptions {
    pub include_streaming: bool,
    pub sort_by: String,
    pub desc: bool,
    pub links_only: bool,
    /// Transcode-proxy enclosures; unset means the configured default.
    pub transcode: Option<bool>,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            include_streaming: false,
            sort_by: "published_at".to_string(),
            desc: false,
            links_only: false,
            transcode: None,
        }
    }
}

/// Settings of the transcode proxy that shape enclosures.
#[derive(Debug, Clone, Copy)]
pub struct TranscodeLinks {
    pub enabled: bool,
    pub bitrate_bps: u64,
}

pub struct FeedAssembler {
    api: Arc<TwitchApi>,
    media: Arc<MediaUrlService>,
    transcode: TranscodeLinks,
    resolve_concurrency: usize,
}

impl FeedAssembler {
    pub fn new(
        api: Arc<TwitchApi>,
        media: Arc<MediaUrlService>,
        transcode: TranscodeLinks,
        resolve_concurrency: usize,
    ) -> Self {
        Self {
            api,
            media,
            transcode,
            resolve_concurrency: resolve_concurrency.max(1),
        }
    }

    /// Builds the RSS document for `login`.
    ///
    /// `base_url` is the public origin and base path of this service and
    /// `allow_live` is false on the vod-only route.
    pub async fn build(
        &self,
        login: &str,
        options: &FeedOptions,
        base_url: &str,
        self_link: String,
        allow_live: bool,
    ) -> Result<String, FeedError> {
        let channel = self
            .api
            .channel(login)
            .await?
            .ok_or_else(|| FeedError::ChannelNotFound(login.to_string()))?;

        let records = self.api.video_records(&channel.id).await?;
        let live = self.api.live_stream_ids(&channel.id).await?;

        let include_live = allow_live && options.include_streaming;
        let transcode = self.transcode.enabled && options.transcode.unwrap_or(self.transcode.enabled);
        if options.transcode == Some(true) && !self.transcode.enabled {
            debug!("Transcode links requested but transcoding is disabled");
        }

        // Malformed records are dropped before sorting so they cannot force
        // the id fallback on the rest of the feed.
        let valid: Vec<(&serde_json::Value, Video)> = records
            .iter()
            .filter_map(|record| match Video::try_from(record) {
                Ok(video) => Some((record, video)),
                Err(e) => {
                    warn!("Dropping video record of {}: {}", login, e);
                    None
                }
            })
            .collect();

        let videos: Vec<(Video, bool)> =
            sort::sort_records(valid, |(record, _)| *record, &options.sort_by, options.desc)
                .into_iter()
                .filter_map(|(_, video)| {
                    let is_live = is_recording(&video, &live);
                    (!is_live || include_live).then_some((video, is_live))
                })
                .collect();

        debug!("Assembling {} entries for {}", videos.len(), login);

        let items: Vec<FeedItem> = stream::iter(videos)
            .map(|(video, is_live)| {
                self.item(&channel, video, is_live, options.links_only, transcode, base_url)
            })
            .buffered(self.resolve_concurrency)
            .collect()
            .await;

        let header = FeedHeader {
            channel: &channel,
            self_link,
        };
        Ok(builder::render(&header, &items))
    }

    async fn item(
        &self,
        channel: &Channel,
        video: Video,
        is_live: bool,
        links_only: bool,
        transcode: bool,
        base_url: &str,
    ) -> FeedItem {
        let thumb = video.thumbnail();
        let mut description = format!(r#"<a href="{}"><img src="{}" /></a>"#, video.url, thumb);
        if !video.description.is_empty() {
            description.push_str("<br/>");
            description.push_str(&video.description);
        }

        let enclosure = if links_only {
            None
        } else if transcode {
            Some(Enclosure {
                url: format!("{}/transcode/{}.mp3", base_url, video.id),
                length: estimated_bytes(video.duration_secs() as f64, self.transcode.bitrate_bps),
                mime: MPEG,
            })
        } else {
            match self.media.resolve(&video.url).await {
                Ok(url) => Some(Enclosure {
                    url,
                    length: 0,
                    mime: MPEG,
                }),
                Err(e) => {
                    debug!("No enclosure for {}: {}", video.id, e);
                    description.push_str("<br/>Audio is not available for this video.");
                    None
                }
            }
        };

        let image = (thumb.ends_with(".jpg") || thumb.ends_with(".png")).then(|| thumb.clone());

        FeedItem {
            title: if is_live {
                format!("{} - LIVE", video.title)
            } else {
                video.title.clone()
            },
            link: video.url.clone(),
            description,
            guid: if is_live {
                format!("{}_live", video.id)
            } else {
                video.id.clone()
            },
            pub_date: video.pub_date(),
            duration: video.itunes_duration(),
            author: channel.login.clone(),
            image,
            category: is_live.then(|| "live".to_string()),
            enclosure,
        }
    }
}

/// A video whose broadcast is still running.
fn is_recording(video: &Video, live: &HashSet<String>) -> bool {
    video
        .stream_id
        .as_ref()
        .is_some_and(|id| live.contains(id))
}
