use std::{collections::HashSet, sync::Arc};

use tracing::warn;

use super::{
    client::{STREAMS_BY_USER, USERS_BY_LOGIN, UpstreamClient, UpstreamError, VIDEOS_BY_USER},
    models::{Channel, LiveStream},
};
use crate::{
    cache::{CacheSpec, TtlCache},
    common::types::Records,
};

/// Cached Helix lookups: channels by login, videos and live streams by channel id.
pub struct TwitchApi {
    client: UpstreamClient,
    channels: TtlCache<String, Records>,
    videos: TtlCache<String, Records>,
    streams: TtlCache<String, Records>,
}

impl TwitchApi {
    pub fn new(client: UpstreamClient) -> Self {
        Self {
            client,
            channels: TtlCache::new(CacheSpec::CHANNEL_LOOKUP),
            videos: TtlCache::new(CacheSpec::VIDEO_LIST),
            streams: TtlCache::new(CacheSpec::LIVE_STREAMS),
        }
    }

    async fn cached(
        &self,
        cache: &TtlCache<String, Records>,
        key: &str,
        template: &'static str,
    ) -> Result<Records, UpstreamError> {
        cache
            .get_or_try_insert_with(key.to_string(), self.client.fetch_records(key, template))
            .await
            .map_err(|e| (*e).clone())
    }

    pub async fn channel_records(&self, login: &str) -> Result<Records, UpstreamError> {
        self.cached(&self.channels, &login.to_ascii_lowercase(), USERS_BY_LOGIN)
            .await
    }

    pub async fn video_records(&self, channel_id: &str) -> Result<Records, UpstreamError> {
        self.cached(&self.videos, channel_id, VIDEOS_BY_USER).await
    }

    pub async fn live_stream_records(&self, channel_id: &str) -> Result<Records, UpstreamError> {
        self.cached(&self.streams, channel_id, STREAMS_BY_USER).await
    }

    /// The channel for `login`, or `None` when it does not exist or its
    /// record is unusable.
    pub async fn channel(&self, login: &str) -> Result<Option<Channel>, UpstreamError> {
        let records = self.channel_records(login).await?;
        let Some(first) = records.first() else {
            return Ok(None);
        };
        match Channel::try_from(first) {
            Ok(channel) => Ok(Some(channel)),
            Err(e) => {
                warn!("Dropping channel record for {}: {}", login, e);
                Ok(None)
            }
        }
    }

    /// Ids of the streams currently live on the channel.
    pub async fn live_stream_ids(&self, channel_id: &str) -> Result<HashSet<String>, UpstreamError> {
        let records = self.live_stream_records(channel_id).await?;
        Ok(records
            .iter()
            .filter_map(|r| match LiveStream::try_from(r) {
                Ok(s) => Some(s.id),
                Err(e) => {
                    warn!("Dropping live stream record: {}", e);
                    None
                }
            })
            .collect())
    }
}

pub type SharedTwitchApi = Arc<TwitchApi>;
