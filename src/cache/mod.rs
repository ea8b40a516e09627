pub mod coalescer;
pub mod media;

use std::{
    future::Future,
    hash::Hash,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use moka::{future::Cache, policy::EvictionPolicy};
use tracing::debug;

pub use coalescer::{ResolutionCoalescer, ResolutionGuard};
pub use media::MediaUrlService;

/// Capacity and lifetime of one cache tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSpec {
    pub name: &'static str,
    pub capacity: u64,
    pub ttl: Duration,
}

const HOUR: u64 = 60 * 60;

impl CacheSpec {
    pub const CHANNEL_LOOKUP: Self = Self {
        name: "channel-lookup",
        capacity: 3000,
        ttl: Duration::from_secs(24 * HOUR),
    };
    pub const VIDEO_LIST: Self = Self {
        name: "video-list",
        capacity: 500,
        ttl: Duration::from_secs(10 * 60),
    };
    pub const LIVE_STREAMS: Self = Self {
        name: "live-streams",
        capacity: 500,
        ttl: Duration::from_secs(10 * 60),
    };
    pub const MEDIA_URL: Self = Self {
        name: "media-url",
        capacity: 3000,
        ttl: Duration::from_secs(24 * HOUR),
    };
    pub const UPDATE_CHECK: Self = Self {
        name: "update-check",
        capacity: 1,
        ttl: Duration::from_secs(24 * HOUR),
    };
}

/// Bounded, time-expiring, least-recently-used cache.
///
/// Entries older than the tier's TTL are never returned. Every write runs
/// moka's maintenance pass before returning, so no more than `capacity`
/// entries are readable at any time.
#[derive(Clone)]
pub struct TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    name: &'static str,
    inner: Cache<K, V>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(spec: CacheSpec) -> Self {
        Self {
            name: spec.name,
            inner: Cache::builder()
                .name(spec.name)
                .max_capacity(spec.capacity)
                .time_to_live(spec.ttl)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let hit = self.inner.get(key).await;
        debug!(
            "cache {} {}",
            self.name,
            if hit.is_some() { "hit" } else { "miss" }
        );
        hit
    }

    pub async fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
        self.inner.run_pending_tasks().await;
    }

    /// Returns the cached value or runs `init` once for all concurrent
    /// callers missing the same key. Errors are shared with those callers
    /// and never stored.
    pub async fn get_or_try_insert_with<F, E>(&self, key: K, init: F) -> Result<V, Arc<E>>
    where
        F: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        let name = self.name;
        let filled = AtomicBool::new(false);
        let result = self
            .inner
            .try_get_with(key, async {
                debug!("cache {} miss, computing", name);
                let value = init.await;
                filled.store(value.is_ok(), Ordering::Release);
                value
            })
            .await;
        if filled.load(Ordering::Acquire) {
            self.inner.run_pending_tasks().await;
        }
        result
    }
}
