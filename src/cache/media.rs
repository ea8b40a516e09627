use tracing::{debug, warn};

use super::{CacheSpec, ResolutionCoalescer, TtlCache};
use crate::sources::{BoxedResolver, ResolveError};

/// Resolved media URLs, cached per video page URL, with at most one
/// resolution in flight per video.
pub struct MediaUrlService {
    resolver: BoxedResolver,
    cache: TtlCache<String, String>,
    coalescer: ResolutionCoalescer<ResolveError>,
}

impl MediaUrlService {
    pub fn new(resolver: BoxedResolver) -> Self {
        Self {
            resolver,
            cache: TtlCache::new(CacheSpec::MEDIA_URL),
            coalescer: ResolutionCoalescer::new(),
        }
    }

    pub async fn resolve(&self, video_url: &str) -> Result<String, ResolveError> {
        let mut guard = self.coalescer.enter(video_url).await;

        if let Some(failure) = guard.failure() {
            debug!("Sharing failed resolution of {}", video_url);
            return Err(failure);
        }

        let key = video_url.to_string();
        if let Some(url) = self.cache.get(&key).await {
            return Ok(url);
        }

        match self.resolver.resolve(video_url).await {
            Ok(url) => {
                self.cache.insert(key, url.clone()).await;
                Ok(url)
            }
            Err(e) => {
                warn!("{} could not resolve {}: {}", self.resolver.name(), video_url, e);
                guard.record_failure(e.clone());
                Err(e)
            }
        }
    }
}
