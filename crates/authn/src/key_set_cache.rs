//! Time-based cache for the issuer's key set.
//!
//! [`KeySetCache`] owns the most recently fetched [`JwkSet`] together with
//! the instant after which it is stale, and refreshes it lazily through a
//! [`KeySetFetcher`].
//!
//! # Architecture
//!
//! ```text
//! validate(token) → KeySetCache::get(url)
//!                 → fresh? return cached set
//!                 → stale/empty: take refresh gate (single flight)
//!                 → re-check (another caller may have refreshed)
//!                 → fetch with deadline
//!                 → success: store set, expires_at = now + ttl
//!                 → failure: serve stale set within grace, else KeyFetchFailed
//! ```
//!
//! Callers that waited on the gate while an attempt failed share that
//! attempt's outcome instead of fetching again, so an outage costs one
//! fetch (and at most one `fetch_timeout` of latency) per burst.
//!
//! # Cache Strategy
//!
//! - **TTL**: Default 3600 seconds
//! - **Single flight**: Concurrent stale callers wait for one fetch, successful or not
//! - **Failure**: A failed fetch never overwrites the cached set
//! - **Stale grace**: Default zero (fail closed)

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use fail::fail_point;
use parking_lot::RwLock;
use tokio::{sync::Mutex, time::Instant};

use crate::{
    error::{AuthError, Result},
    jwks::{FetchError, JwkSet, KeySetFetcher},
};

/// Default key set TTL (1 hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3_600);

/// Default deadline for a single key set fetch (10 seconds).
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A fetched key set and its freshness window.
///
/// `expires_at` is `None` when `fetched_at + ttl` is not representable; such
/// a set never goes stale.
struct CachedKeySet {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
    expires_at: Option<Instant>,
}

/// Outcome of the most recent completed fetch attempt.
struct LastAttempt {
    generation: u64,
    failure: Option<FetchError>,
}

/// Lazily refreshed cache for one key set.
///
/// # Thread Safety
///
/// State sits behind a [`parking_lot::RwLock`] that is never held across an
/// await. Refreshes are serialized by an async mutex, so at most one fetch
/// is in flight per cache.
pub struct KeySetCache {
    fetcher: Arc<dyn KeySetFetcher>,
    ttl: Duration,
    fetch_timeout: Duration,
    stale_grace: Duration,
    state: RwLock<Option<CachedKeySet>>,
    refresh_gate: Mutex<()>,
    last_attempt: RwLock<LastAttempt>,
    fetch_count: AtomicU64,
}

impl KeySetCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(fetcher: Arc<dyn KeySetFetcher>, ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            stale_grace: Duration::ZERO,
            state: RwLock::new(None),
            refresh_gate: Mutex::new(()),
            last_attempt: RwLock::new(LastAttempt { generation: 0, failure: None }),
            fetch_count: AtomicU64::new(0),
        }
    }

    /// Sets the deadline for each fetch.
    #[must_use]
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Sets how long past expiry a stale set may be served after a failed
    /// refresh.
    ///
    /// A longer window keeps validation available through issuer outages,
    /// at the cost of trusting rotated-out keys for longer.
    #[must_use]
    pub fn with_stale_grace(mut self, stale_grace: Duration) -> Self {
        self.stale_grace = stale_grace;
        self
    }

    /// Returns the key set for `url`, fetching it if the cache is empty or
    /// stale.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyFetchFailed`] if a needed fetch fails and no
    /// cached set is within the stale grace window.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, url: &str) -> Result<Arc<JwkSet>> {
        if let Some(keys) = self.fresh_keys() {
            tracing::debug!(cache = "hit", "key set served from cache");
            return Ok(keys);
        }

        let seen_generation = self.last_attempt.read().generation;
        let _gate = self.refresh_gate.lock().await;

        // Another caller may have refreshed while we waited for the gate.
        if let Some(keys) = self.fresh_keys() {
            tracing::debug!(cache = "hit", "key set refreshed by concurrent caller");
            return Ok(keys);
        }

        // An attempt failed while we waited: share its outcome.
        let shared_failure = {
            let last = self.last_attempt.read();
            if last.generation == seen_generation { None } else { last.failure.clone() }
        };
        if let Some(source) = shared_failure {
            tracing::debug!(cache = "miss", "concurrent key set refresh failed");
            return self.fallback(url, source);
        }
        tracing::debug!(cache = "miss", "fetching key set");

        let result = self.fetch(url).await;
        {
            let mut last = self.last_attempt.write();
            last.generation += 1;
            last.failure = result.as_ref().err().cloned();
        }

        match result {
            Ok(fetched) => {
                let keys = Arc::new(fetched);
                let now = Instant::now();
                *self.state.write() = Some(CachedKeySet {
                    keys: Arc::clone(&keys),
                    fetched_at: now,
                    expires_at: now.checked_add(self.ttl),
                });
                tracing::debug!(keys = keys.len(), "key set cached");
                Ok(keys)
            },
            Err(source) => self.fallback(url, source),
        }
    }

    /// Serves the stale set within the grace window, else reports `source`.
    fn fallback(&self, url: &str, source: FetchError) -> Result<Arc<JwkSet>> {
        if let Some((keys, age)) = self.stale_keys() {
            tracing::warn!(
                cache = "stale",
                age_secs = age.as_secs(),
                error = %source,
                "key set refresh failed; serving stale key set"
            );
            return Ok(keys);
        }
        Err(AuthError::key_fetch_failed(url, source))
    }

    /// Drops the cached set so the next [`get`](Self::get) fetches.
    #[tracing::instrument(skip(self))]
    pub fn invalidate(&self) {
        let previous = self.state.write().take();
        tracing::info!(had_keys = previous.is_some(), "key set cache invalidated");
    }

    /// Returns `true` if a set is cached and not yet stale.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.fresh_keys().is_some()
    }

    /// Returns the number of fetches attempted so far.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    /// Returns the configured TTL.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn fresh_keys(&self) -> Option<Arc<JwkSet>> {
        let state = self.state.read();
        let cached = state.as_ref()?;
        let fresh = cached.expires_at.is_none_or(|expires_at| Instant::now() <= expires_at);
        fresh.then(|| Arc::clone(&cached.keys))
    }

    fn stale_keys(&self) -> Option<(Arc<JwkSet>, Duration)> {
        if self.stale_grace.is_zero() {
            return None;
        }
        let state = self.state.read();
        let cached = state.as_ref()?;
        let now = Instant::now();
        // An unrepresentable grace deadline means the grace never runs out.
        let within_grace = cached
            .expires_at
            .and_then(|expires_at| expires_at.checked_add(self.stale_grace))
            .is_none_or(|deadline| now <= deadline);
        within_grace.then(|| (Arc::clone(&cached.keys), now.duration_since(cached.fetched_at)))
    }

    async fn fetch(&self, url: &str) -> std::result::Result<JwkSet, FetchError> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        fail_point!("jwks-before-fetch", |_| {
            Err(FetchError::transport("injected failure before key set fetch"))
        });

        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout { timeout: self.fetch_timeout }),
        }
    }
}

impl std::fmt::Debug for KeySetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySetCache")
            .field("ttl", &self.ttl)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("stale_grace", &self.stale_grace)
            .field("fresh", &self.is_fresh())
            .field("fetch_count", &self.fetch_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::jwks::Jwk;

    const URL: &str = "https://issuer.example/.well-known/jwks.json";

    /// Fetcher that serves a fixed set until told to fail.
    struct ScriptedFetcher {
        keys: JwkSet,
        failing: parking_lot::Mutex<bool>,
        delay: Duration,
    }

    impl ScriptedFetcher {
        fn new(kids: &[&str]) -> Self {
            let keys = kids
                .iter()
                .map(|kid| Jwk {
                    kty: "RSA".into(),
                    kid: Some((*kid).into()),
                    key_use: Some("sig".into()),
                    n: "AQAB".into(),
                    e: "AQAB".into(),
                })
                .collect();
            Self {
                keys: JwkSet { keys },
                failing: parking_lot::Mutex::new(false),
                delay: Duration::ZERO,
            }
        }

        fn set_failing(&self, failing: bool) {
            *self.failing.lock() = failing;
        }
    }

    #[async_trait]
    impl KeySetFetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &str) -> std::result::Result<JwkSet, FetchError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if *self.failing.lock() {
                return Err(FetchError::Status { status: 503 });
            }
            Ok(self.keys.clone())
        }
    }

    fn cache_with(fetcher: &Arc<ScriptedFetcher>) -> KeySetCache {
        KeySetCache::new(Arc::clone(fetcher) as Arc<dyn KeySetFetcher>, DEFAULT_CACHE_TTL)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_once_within_ttl() {
        let fetcher = Arc::new(ScriptedFetcher::new(&["k1"]));
        let cache = cache_with(&fetcher);

        assert!(!cache.is_fresh());
        let first = cache.get(URL).await.expect("first get");
        tokio::time::advance(Duration::from_secs(1800)).await;
        let second = cache.get(URL).await.expect("second get");

        assert_eq!(cache.fetch_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.is_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetches_after_ttl() {
        let fetcher = Arc::new(ScriptedFetcher::new(&["k1"]));
        let cache = cache_with(&fetcher);

        cache.get(URL).await.expect("first get");
        tokio::time::advance(DEFAULT_CACHE_TTL + Duration::from_secs(1)).await;
        assert!(!cache.is_fresh());

        cache.get(URL).await.expect("second get");
        assert_eq!(cache.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_on_empty_cache() {
        let fetcher = Arc::new(ScriptedFetcher::new(&["k1"]));
        fetcher.set_failing(true);
        let cache = cache_with(&fetcher);

        let result = cache.get(URL).await;
        assert!(
            matches!(result, Err(AuthError::KeyFetchFailed { ref url, source: FetchError::Status { status: 503 } }) if url == URL)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_fails_closed_by_default() {
        let fetcher = Arc::new(ScriptedFetcher::new(&["k1"]));
        let cache = cache_with(&fetcher);

        cache.get(URL).await.expect("populate");
        fetcher.set_failing(true);
        tokio::time::advance(DEFAULT_CACHE_TTL + Duration::from_secs(1)).await;

        let result = cache.get(URL).await;
        assert!(matches!(result, Err(AuthError::KeyFetchFailed { .. })));

        // The old entry survives the failure and is used once the issuer recovers.
        fetcher.set_failing(false);
        cache.get(URL).await.expect("recovered");
        assert_eq!(cache.fetch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_serves_stale_within_grace() {
        let fetcher = Arc::new(ScriptedFetcher::new(&["k1"]));
        let cache = cache_with(&fetcher).with_stale_grace(Duration::from_secs(600));

        let original = cache.get(URL).await.expect("populate");
        fetcher.set_failing(true);

        tokio::time::advance(DEFAULT_CACHE_TTL + Duration::from_secs(300)).await;
        let stale = cache.get(URL).await.expect("stale set within grace");
        assert!(Arc::ptr_eq(&original, &stale));

        tokio::time::advance(Duration::from_secs(600)).await;
        let result = cache.get(URL).await;
        assert!(matches!(result, Err(AuthError::KeyFetchFailed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out() {
        let mut fetcher = ScriptedFetcher::new(&["k1"]);
        fetcher.delay = Duration::from_secs(30);
        let fetcher = Arc::new(fetcher);
        let cache = cache_with(&fetcher).with_fetch_timeout(Duration::from_secs(5));

        let result = cache.get(URL).await;
        assert!(matches!(
            result,
            Err(AuthError::KeyFetchFailed { source: FetchError::Timeout { .. }, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let mut fetcher = ScriptedFetcher::new(&["k1"]);
        fetcher.delay = Duration::from_millis(200);
        let fetcher = Arc::new(fetcher);
        let cache = Arc::new(cache_with(&fetcher));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move { cache.get(URL).await }));
        }
        for handle in handles {
            handle.await.expect("task").expect("get");
        }

        assert_eq!(cache.fetch_count(), 1);
    }

    type TimedGet = tokio::task::JoinHandle<(Result<Arc<JwkSet>>, Duration)>;

    fn spawn_gets(cache: &Arc<KeySetCache>, callers: usize) -> Vec<TimedGet> {
        (0..callers)
            .map(|_| {
                let cache = Arc::clone(cache);
                tokio::spawn(async move {
                    let started = Instant::now();
                    let result = cache.get(URL).await;
                    (result, started.elapsed())
                })
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_failed_fetch() {
        let mut fetcher = ScriptedFetcher::new(&["k1"]);
        fetcher.delay = Duration::from_millis(200);
        let fetcher = Arc::new(fetcher);
        fetcher.set_failing(true);
        let cache = Arc::new(cache_with(&fetcher));

        for handle in spawn_gets(&cache, 8) {
            let (result, _) = handle.await.expect("task");
            assert!(matches!(
                result,
                Err(AuthError::KeyFetchFailed { source: FetchError::Status { status: 503 }, .. })
            ));
        }
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_timed_out_fetch() {
        let mut fetcher = ScriptedFetcher::new(&["k1"]);
        fetcher.delay = Duration::from_secs(60);
        let fetcher = Arc::new(fetcher);
        let cache = Arc::new(cache_with(&fetcher).with_fetch_timeout(Duration::from_secs(5)));

        for handle in spawn_gets(&cache, 8) {
            let (result, elapsed) = handle.await.expect("task");
            assert!(matches!(
                result,
                Err(AuthError::KeyFetchFailed { source: FetchError::Timeout { .. }, .. })
            ));
            assert!(elapsed <= Duration::from_secs(6), "caller waited {elapsed:?}");
        }
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_stale_set_after_failed_refresh() {
        let mut fetcher = ScriptedFetcher::new(&["k1"]);
        fetcher.delay = Duration::from_millis(200);
        let fetcher = Arc::new(fetcher);
        let cache = Arc::new(cache_with(&fetcher).with_stale_grace(Duration::from_secs(600)));

        let original = cache.get(URL).await.expect("populate");
        fetcher.set_failing(true);
        tokio::time::advance(DEFAULT_CACHE_TTL + Duration::from_secs(1)).await;

        for handle in spawn_gets(&cache, 4) {
            let (result, _) = handle.await.expect("task");
            assert!(Arc::ptr_eq(&original, &result.expect("stale set within grace")));
        }
        assert_eq!(cache.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_after_failed_attempt_fetches_again() {
        let fetcher = Arc::new(ScriptedFetcher::new(&["k1"]));
        fetcher.set_failing(true);
        let cache = cache_with(&fetcher);

        assert!(cache.get(URL).await.is_err());
        fetcher.set_failing(false);

        cache.get(URL).await.expect("later caller retries");
        assert_eq!(cache.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_ttl_never_expires() {
        let fetcher = Arc::new(ScriptedFetcher::new(&["k1"]));
        let cache = KeySetCache::new(Arc::clone(&fetcher) as Arc<dyn KeySetFetcher>, Duration::MAX);

        cache.get(URL).await.expect("populate");
        tokio::time::advance(Duration::from_secs(10 * 365 * 24 * 3600)).await;

        cache.get(URL).await.expect("still cached");
        assert!(cache.is_fresh());
        assert_eq!(cache.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_stale_grace_serves_stale_set() {
        let fetcher = Arc::new(ScriptedFetcher::new(&["k1"]));
        let cache = KeySetCache::new(
            Arc::clone(&fetcher) as Arc<dyn KeySetFetcher>,
            Duration::from_secs(60),
        )
        .with_stale_grace(Duration::MAX);

        cache.get(URL).await.expect("populate");
        fetcher.set_failing(true);
        tokio::time::advance(Duration::from_secs(24 * 3600)).await;

        cache.get(URL).await.expect("stale set within unbounded grace");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let fetcher = Arc::new(ScriptedFetcher::new(&["k1"]));
        let cache = cache_with(&fetcher);

        cache.get(URL).await.expect("populate");
        cache.invalidate();
        assert!(!cache.is_fresh());

        cache.get(URL).await.expect("refetch");
        assert_eq!(cache.fetch_count(), 2);
    }
}
