use std::{collections::VecDeque, time::Duration};

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Sliding-window limiter shared by every Helix call site.
///
/// Keeps the grant time of each call still inside the window. A caller that
/// finds the window full sleeps until the oldest grant ages out and tries
/// again, so excess load turns into latency rather than errors.
pub struct RateLimiter {
    limit: usize,
    period: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: usize, period: Duration) -> Self {
        Self {
            limit: limit.max(1),
            period,
            grants: Mutex::new(VecDeque::with_capacity(limit.max(1))),
        }
    }

    /// Waits for a slot and returns the instant it was granted.
    pub async fn acquire(&self) -> Instant {
        loop {
            let wait = {
                let mut grants = self.grants.lock();
                let now = Instant::now();
                while grants
                    .front()
                    .is_some_and(|oldest| now.duration_since(*oldest) >= self.period)
                {
                    grants.pop_front();
                }

                if grants.len() < self.limit {
                    grants.push_back(now);
                    return now;
                }

                grants
                    .front()
                    .map_or(Duration::ZERO, |oldest| {
                        self.period.saturating_sub(now.duration_since(*oldest))
                    })
            };

            debug!("Upstream rate limit reached, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of grants still inside the current window.
    #[cfg(test)]
    pub(crate) fn in_window(&self) -> usize {
        let grants = self.grants.lock();
        let now = Instant::now();
        grants
            .iter()
            .filter(|g| now.duration_since(**g) < self.period)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn call_over_the_limit_waits_for_the_window() {
        let limiter = RateLimiter::new(3, Duration::from_millis(300));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(limiter.in_window(), 3);

        let granted = limiter.acquire().await;
        assert!(granted.duration_since(start) >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn concurrent_callers_never_exceed_limit_in_any_window() {
        let limit = 5;
        let period = Duration::from_millis(200);
        let limiter = Arc::new(RateLimiter::new(limit, period));

        let tasks: Vec<_> = (0..12)
            .map(|_| {
                let l = limiter.clone();
                tokio::spawn(async move { l.acquire().await })
            })
            .collect();

        let mut grants = Vec::new();
        for task in tasks {
            grants.push(task.await.unwrap());
        }
        grants.sort();

        for pair in grants.windows(limit + 1) {
            assert!(pair[limit].duration_since(pair[0]) >= period);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn production_limit_holds_the_801st_call_until_the_window_rolls() {
        let limiter = RateLimiter::new(800, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..800 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.in_window(), 800);

        let early = tokio::time::timeout(Duration::from_secs(59), limiter.acquire()).await;
        assert!(early.is_err());
        assert_eq!(limiter.in_window(), 800);

        let granted = limiter.acquire().await;
        assert!(granted.duration_since(start) >= Duration::from_secs(60));
        assert_eq!(limiter.in_window(), 1);
    }
}
