use std::{sync::Arc, time::Duration};

use crate::{
    cache::MediaUrlService,
    common::{http::HttpClient, types::AnyResult},
    configs::Config,
    feed::{FeedAssembler, TranscodeLinks},
    sources::{
        BoxedResolver,
        twitch::{RateLimiter, TwitchApi, TwitchResolver, TwitchTokenTracker, UpstreamClient},
    },
    transcode::{FfmpegLauncher, Launcher, TranscodeManager},
    update::UpdateChecker,
};

/// Top-level application state.
pub struct AppState {
    pub config: Config,
    pub feeds: FeedAssembler,
    pub transcoder: TranscodeManager,
    pub updates: UpdateChecker,
}

impl AppState {
    /// Wires the Twitch-backed components described by `config`.
    pub fn new(config: Config) -> AnyResult<Self> {
        let resolver: BoxedResolver =
            Arc::new(TwitchResolver::new(HttpClient::media()?, &config.twitch));
        let launcher: Arc<dyn Launcher> =
            Arc::new(FfmpegLauncher::new(config.transcode.ffmpeg_path.clone()));
        Self::with_parts(config, resolver, launcher)
    }

    /// Like [`AppState::new`] with a custom media resolver and transcoder launcher.
    pub fn with_parts(
        config: Config,
        resolver: BoxedResolver,
        launcher: Arc<dyn Launcher>,
    ) -> AnyResult<Self> {
        let upstream = HttpClient::upstream()?;

        let tokens = Arc::new(TwitchTokenTracker::new(
            upstream.clone(),
            config.twitch.auth_url.clone(),
            config.client_id(),
            config.client_secret(),
        ));
        let limiter = Arc::new(RateLimiter::new(
            config.twitch.rate_limit,
            Duration::from_secs(config.twitch.rate_period_secs),
        ));
        let client = UpstreamClient::new(
            upstream.clone(),
            config.twitch.api_base.clone(),
            tokens,
            limiter,
        );

        let api = Arc::new(TwitchApi::new(client));
        let media = Arc::new(MediaUrlService::new(resolver.clone()));
        let feeds = FeedAssembler::new(
            api,
            media,
            TranscodeLinks {
                enabled: config.transcode.enabled,
                bitrate_bps: config.transcode.bitrate_bps(),
            },
            config.feed.resolve_concurrency,
        );
        let transcoder = TranscodeManager::new(
            resolver,
            HttpClient::media()?,
            launcher,
            config.transcode.clone(),
        );
        let updates = UpdateChecker::new(upstream, config.updates.releases_url.clone());

        Ok(Self {
            config,
            feeds,
            transcoder,
            updates,
        })
    }
}
