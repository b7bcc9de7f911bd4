//! Generation cache with in-flight deduplication and LRU eviction
//!
//! **Guarantees:**
//! - At most one concurrent generation per key. Callers arriving while a generation is
//!   running join it and observe its exact outcome (value or error).
//! - Failures are never cached; the next request for the key starts over.
//! - Entry count is bounded: once it strictly exceeds `max_cache_size`, least-recently
//!   accessed entries are removed down to `max_cache_size - overflow_buffer`.
//!
//! **Locking:** one `std::sync::Mutex` guards entries, in-flight registry and the access
//! clock. The cache check, the in-flight check and the in-flight registration happen in
//! a single critical section that never awaits. Generation itself runs in a spawned task
//! outside the lock and publishes its outcome through a `watch` channel that every joined
//! caller awaits.
//!
//! **Cancellation:** none. The spawned generation runs to completion even if every caller
//! stops waiting, so its result still lands in the cache.

use crate::error::GenerationError;
use crate::services::cache_key::CacheKey;
use chrono::{DateTime, Utc};
use mdc_common::config::CacheConfig;
use mdc_common::events::{EventBus, MdcEvent};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

/// Outcome published to joined callers; `None` until the generation settles
type SharedOutcome<T> = Option<Result<T, GenerationError>>;

/// Cache sizing and concurrency settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Eviction runs when the entry count strictly exceeds this
    pub max_cache_size: usize,
    /// Extra entries removed per eviction pass
    pub overflow_buffer: usize,
    /// Global cap on concurrently running generations (None = unlimited)
    pub max_concurrent_generations: Option<usize>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_cache_size: 50,
            overflow_buffer: 10,
            max_concurrent_generations: None,
        }
    }
}

impl CacheSettings {
    /// Validate configuration values
    ///
    /// `max_cache_size` must be at least 1. An `overflow_buffer` that would empty the
    /// cache on every pass is clamped to `max_cache_size - 1`. A concurrency cap of 0 is
    /// rejected since no generation could ever run.
    pub fn from_config(config: &CacheConfig) -> mdc_common::Result<Self> {
        if config.max_cache_size == 0 {
            return Err(mdc_common::Error::Config(
                "cache.max_cache_size must be at least 1".to_string(),
            ));
        }
        if config.max_concurrent_generations == Some(0) {
            return Err(mdc_common::Error::Config(
                "cache.max_concurrent_generations must be at least 1 when set".to_string(),
            ));
        }

        Ok(Self {
            max_cache_size: config.max_cache_size,
            overflow_buffer: config.overflow_buffer,
            max_concurrent_generations: config.max_concurrent_generations,
        }
        .clamped())
    }

    /// Bring out-of-range values back into range
    ///
    /// `max_cache_size` is at least 1, `overflow_buffer` at most `max_cache_size - 1` so an
    /// eviction pass never empties the cache, and a concurrency cap is at least 1.
    pub fn clamped(self) -> Self {
        let max_cache_size = self.max_cache_size.max(1);
        let overflow_buffer = self.overflow_buffer.min(max_cache_size - 1);
        let max_concurrent_generations = self.max_concurrent_generations.map(|cap| cap.max(1));

        let clamped = Self {
            max_cache_size,
            overflow_buffer,
            max_concurrent_generations,
        };
        if clamped != self {
            warn!(
                configured = ?self,
                clamped = ?clamped,
                "Cache settings out of range, clamping"
            );
        }
        clamped
    }

    /// Entry count an eviction pass shrinks the cache to
    pub fn eviction_target(&self) -> usize {
        self.max_cache_size.saturating_sub(self.overflow_buffer)
    }
}

/// A cached generation result
struct CacheEntry<T> {
    value: T,
    last_accessed_at: DateTime<Utc>,
    /// Logical access clock; exact ordering even when timestamps tie
    access_seq: u64,
}

/// Public view of an entry's bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub key: CacheKey,
    pub last_accessed_at: DateTime<Utc>,
}

/// Counters and sizes at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests and lookups answered from the cache
    pub hits: u64,
    /// Requests that started a new generation
    pub misses: u64,
    /// Requests that joined an already running generation
    pub coalesced: u64,
    /// Generations that settled with an error
    pub failures: u64,
    /// Entries removed by eviction passes
    pub evictions: u64,
    pub entries: usize,
    pub in_flight: usize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
}

struct CacheState<T> {
    entries: HashMap<CacheKey, CacheEntry<T>>,
    in_flight: HashMap<CacheKey, watch::Receiver<SharedOutcome<T>>>,
    clock: u64,
}

impl<T: Clone> CacheState<T> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Return a copy of the value and refresh its recency
    fn touch(&mut self, key: &CacheKey) -> Option<T> {
        let seq = self.tick();
        let entry = self.entries.get_mut(key)?;
        entry.access_seq = seq;
        entry.last_accessed_at = mdc_common::time::now();
        Some(entry.value.clone())
    }

    fn insert(&mut self, key: CacheKey, value: T) {
        let seq = self.tick();
        self.entries.insert(
            key,
            CacheEntry {
                value,
                last_accessed_at: mdc_common::time::now(),
                access_seq: seq,
            },
        );
    }

    /// Remove least-recently-accessed entries if over the bound
    fn evict(&mut self, settings: &CacheSettings) -> usize {
        if self.entries.len() <= settings.max_cache_size {
            return 0;
        }

        let target = settings.eviction_target();
        let mut by_age: Vec<(u64, CacheKey)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.access_seq, key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(seq, _)| *seq);

        let excess = self.entries.len() - target;
        for (_, key) in by_age.into_iter().take(excess) {
            self.entries.remove(&key);
        }
        excess
    }
}

/// Session-scoped generation cache
///
/// Cloning yields another handle to the same cache.
pub struct GenerationCache<T> {
    state: Arc<Mutex<CacheState<T>>>,
    settings: CacheSettings,
    limiter: Option<Arc<Semaphore>>,
    counters: Arc<Counters>,
    events: Option<EventBus>,
}

impl<T> Clone for GenerationCache<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            settings: self.settings,
            limiter: self.limiter.clone(),
            counters: Arc::clone(&self.counters),
            events: self.events.clone(),
        }
    }
}

impl<T> GenerationCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty cache
    ///
    /// Out-of-range settings are clamped (see [`CacheSettings::clamped`]).
    pub fn new(settings: CacheSettings) -> Self {
        let settings = settings.clamped();
        let limiter = settings
            .max_concurrent_generations
            .map(|permits| Arc::new(Semaphore::new(permits)));

        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                clock: 0,
            })),
            settings,
            limiter,
            counters: Arc::new(Counters::default()),
            events: None,
        }
    }

    /// Publish generation and eviction events on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    // No code that can panic runs under this lock, so a poisoned guard still holds
    // consistent state.
    fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a cached value without ever generating
    ///
    /// A hit refreshes the entry's access time and returns a copy of the value.
    pub fn lookup(&self, key: &CacheKey) -> Option<T> {
        let value = self.lock().touch(key);
        if value.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Return the cached value for `key`, generating it at most once
    ///
    /// **Algorithm:**
    /// 1. Cache hit: return a copy immediately
    /// 2. Generation already running for `key`: join it
    /// 3. Otherwise register a new in-flight task, then start `generate` in the background
    /// 4. Await the shared outcome
    ///
    /// Steps 1-3 form one critical section with no suspension point.
    pub async fn request<F, Fut>(&self, key: CacheKey, generate: F) -> Result<T, GenerationError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, GenerationError>> + Send + 'static,
    {
        enum Admission<T> {
            Hit(T),
            Joined(watch::Receiver<SharedOutcome<T>>),
            Started(watch::Receiver<SharedOutcome<T>>),
        }

        let admission = {
            let mut state = self.lock();
            if let Some(value) = state.touch(&key) {
                Admission::Hit(value)
            } else if let Some(rx) = state.in_flight.get(&key) {
                Admission::Joined(rx.clone())
            } else {
                let (tx, rx) = watch::channel(None);
                state.in_flight.insert(key.clone(), rx.clone());
                self.spawn_generation(key.clone(), generate, tx);
                Admission::Started(rx)
            }
        };

        let rx = match admission {
            Admission::Hit(value) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Cache hit");
                return Ok(value);
            }
            Admission::Joined(rx) => {
                self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Joined in-flight generation");
                rx
            }
            Admission::Started(rx) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Cache miss, generation started");
                rx
            }
        };

        wait_for_outcome(rx).await
    }

    /// Spawn the generation task for a freshly registered key
    ///
    /// Only spawns; never awaits, so it is safe to call under the state lock.
    fn spawn_generation<F, Fut>(
        &self,
        key: CacheKey,
        generate: F,
        tx: watch::Sender<SharedOutcome<T>>,
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, GenerationError>> + Send + 'static,
    {
        let cache = self.clone();

        tokio::spawn(async move {
            let _permit = match &cache.limiter {
                Some(limiter) => match Arc::clone(limiter).acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        cache.settle(&key, Err(GenerationError::LimiterClosed), 0, &tx);
                        return;
                    }
                },
                None => None,
            };

            cache.emit(MdcEvent::GenerationStarted {
                key: key.to_string(),
                timestamp: mdc_common::time::now(),
            });

            let started = Instant::now();
            // Run in its own task so a panicking generator still settles the key
            let outcome = match tokio::spawn(async move { generate().await }).await {
                Ok(outcome) => outcome,
                Err(join_err) if join_err.is_panic() => {
                    Err(GenerationError::Panicked(panic_message(join_err.into_panic())))
                }
                Err(join_err) => Err(GenerationError::Failed(join_err.to_string())),
            };

            cache.settle(&key, outcome, mdc_common::time::elapsed_ms(started), &tx);
        });
    }

    /// Record the outcome, clear the in-flight task, then publish to joined callers
    fn settle(
        &self,
        key: &CacheKey,
        outcome: Result<T, GenerationError>,
        duration_ms: u64,
        tx: &watch::Sender<SharedOutcome<T>>,
    ) {
        let (evicted, remaining) = {
            let mut state = self.lock();
            state.in_flight.remove(key);
            match &outcome {
                Ok(value) => {
                    state.insert(key.clone(), value.clone());
                    let evicted = state.evict(&self.settings);
                    (evicted, state.entries.len())
                }
                Err(_) => (0, state.entries.len()),
            }
        };

        match &outcome {
            Ok(_) => {
                debug!(key = %key, duration_ms, "Generation completed");
                self.emit(MdcEvent::GenerationCompleted {
                    key: key.to_string(),
                    duration_ms,
                    timestamp: mdc_common::time::now(),
                });
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "Generation failed, nothing cached");
                self.emit(MdcEvent::GenerationFailed {
                    key: key.to_string(),
                    error: e.to_string(),
                    timestamp: mdc_common::time::now(),
                });
            }
        }

        if evicted > 0 {
            self.record_eviction(evicted, remaining);
        }

        // Receivers may all be gone; the value is cached regardless
        tx.send_replace(Some(outcome));
    }

    /// Enforce the size bound
    ///
    /// No-op unless the entry count strictly exceeds `max_cache_size`. Returns the
    /// number of entries removed. In-flight generations are never affected: they have
    /// no entry until they settle.
    pub fn evict(&self) -> usize {
        let (evicted, remaining) = {
            let mut state = self.lock();
            let evicted = state.evict(&self.settings);
            (evicted, state.entries.len())
        };
        if evicted > 0 {
            self.record_eviction(evicted, remaining);
        }
        evicted
    }

    fn record_eviction(&self, evicted: usize, remaining: usize) {
        self.counters
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
        info!(evicted, remaining, "Evicted least-recently-used entries");
        self.emit(MdcEvent::CacheEvicted {
            removed: evicted,
            remaining,
            timestamp: mdc_common::time::now(),
        });
    }

    /// Remove one entry
    pub fn remove(&self, key: &CacheKey) -> Option<T> {
        self.lock().entries.remove(key).map(|entry| entry.value)
    }

    /// Remove every entry
    ///
    /// Running generations are unaffected and will still store their results.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let removed = state.entries.len();
        state.entries.clear();
        removed
    }

    /// Remove every entry for which `predicate` returns true
    pub fn remove_entries_matching<P>(&self, predicate: P) -> usize
    where
        P: Fn(&CacheKey, &T) -> bool,
    {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|key, entry| !predicate(key, &entry.value));
        before - state.entries.len()
    }

    /// Drop all entries and this handle; returns how many entries were dropped
    pub fn dispose(self) -> usize {
        let removed = self.clear();
        debug!(removed, "Generation cache disposed");
        removed
    }

    /// True if `key` is cached (does not refresh recency)
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Number of generations currently running
    pub fn in_flight_len(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// True if a generation for `key` is currently running
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.lock().in_flight.contains_key(key)
    }

    /// Bookkeeping for one entry (does not refresh recency)
    pub fn entry_info(&self, key: &CacheKey) -> Option<CacheEntryInfo> {
        self.lock().entries.get(key).map(|entry| CacheEntryInfo {
            key: key.clone(),
            last_accessed_at: entry.last_accessed_at,
        })
    }

    /// Keys ordered from least to most recently accessed
    pub fn keys_by_recency(&self) -> Vec<CacheKey> {
        let state = self.lock();
        let mut keys: Vec<(u64, CacheKey)> = state
            .entries
            .iter()
            .map(|(key, entry)| (entry.access_seq, key.clone()))
            .collect();
        keys.sort_unstable_by_key(|(seq, _)| *seq);
        keys.into_iter().map(|(_, key)| key).collect()
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, in_flight) = {
            let state = self.lock();
            (state.entries.len(), state.in_flight.len())
        };
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            entries,
            in_flight,
        }
    }

    fn emit(&self, event: MdcEvent) {
        if let Some(events) = &self.events {
            events.emit_lossy(event);
        }
    }
}

/// Wait until the generation behind `rx` publishes its outcome
async fn wait_for_outcome<T: Clone>(
    mut rx: watch::Receiver<SharedOutcome<T>>,
) -> Result<T, GenerationError> {
    loop {
        if let Some(outcome) = rx.borrow_and_update().as_ref() {
            return outcome.clone();
        }
        if rx.changed().await.is_err() {
            // Sender gone: take whatever was last published
            return match rx.borrow().as_ref() {
                Some(outcome) => outcome.clone(),
                None => Err(GenerationError::Abandoned),
            };
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn key(n: usize) -> CacheKey {
        CacheKey::from_raw(format!("thumbnails:clip{}.mp4", n))
    }

    fn small_cache(max: usize, buffer: usize) -> GenerationCache<usize> {
        GenerationCache::new(CacheSettings {
            max_cache_size: max,
            overflow_buffer: buffer,
            max_concurrent_generations: None,
        })
    }

    #[test]
    fn test_settings_from_config() {
        let settings = CacheSettings::from_config(&CacheConfig::default()).unwrap();
        assert_eq!(settings, CacheSettings::default());
        assert_eq!(settings.eviction_target(), 40);
    }

    #[test]
    fn test_settings_clamp_and_reject() {
        let clamped = CacheSettings::from_config(&CacheConfig {
            max_cache_size: 5,
            overflow_buffer: 9,
            max_concurrent_generations: None,
        })
        .unwrap();
        assert_eq!(clamped.overflow_buffer, 4);
        assert_eq!(clamped.eviction_target(), 1);

        assert!(CacheSettings::from_config(&CacheConfig {
            max_cache_size: 0,
            ..CacheConfig::default()
        })
        .is_err());

        assert!(CacheSettings::from_config(&CacheConfig {
            max_concurrent_generations: Some(0),
            ..CacheConfig::default()
        })
        .is_err());
    }

    #[tokio::test]
    async fn test_lookup_miss_never_generates() {
        let cache = small_cache(10, 2);
        assert!(cache.lookup(&key(1)).is_none());
        assert_eq!(cache.in_flight_len(), 0);
        assert_eq!(cache.stats().hits, 0);
    }

    #[tokio::test]
    async fn test_sequential_requests_generate_once() {
        let cache = small_cache(10, 2);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let value = cache
                .request(key(1), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(cache.lookup(&key(1)), Some(42));
    }

    #[tokio::test]
    async fn test_failure_not_cached_and_retried() {
        let cache = small_cache(10, 2);

        let err = cache
            .request(key(1), || async { Err(GenerationError::Failed("decoder crashed".into())) })
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Failed("decoder crashed".into()));
        assert!(!cache.contains(&key(1)));
        assert!(!cache.is_in_flight(&key(1)));

        let value = cache.request(key(1), || async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(cache.stats().failures, 1);
        assert_eq!(cache.stats().misses, 2);
    }

    #[tokio::test]
    async fn test_panicking_generator_settles_key() {
        let cache = small_cache(10, 2);

        let err = cache
            .request(key(1), || async {
                if true {
                    panic!("frame extractor blew up");
                }
                Ok(0)
            })
            .await
            .unwrap_err();

        assert_eq!(err, GenerationError::Panicked("frame extractor blew up".into()));
        assert_eq!(cache.in_flight_len(), 0);
        assert!(cache.request(key(1), || async { Ok(1) }).await.is_ok());
    }

    #[tokio::test]
    async fn test_eviction_keeps_most_recent() {
        let cache = small_cache(50, 10);
        for n in 1..=60 {
            cache.request(key(n), move || async move { Ok(n) }).await.unwrap();
        }

        assert!(cache.len() <= 50);
        // Inserting #51 evicted #1..#11 down to 40 entries; #52..#60 followed
        assert_eq!(cache.len(), 49);
        for n in 1..=11 {
            assert!(!cache.contains(&key(n)), "entry {} should be evicted", n);
        }
        for n in 12..=60 {
            assert!(cache.contains(&key(n)), "entry {} should be kept", n);
        }
        assert_eq!(cache.stats().evictions, 11);
    }

    #[tokio::test]
    async fn test_lookup_protects_from_eviction() {
        let cache = small_cache(5, 2);
        for n in 1..=5 {
            cache.request(key(n), move || async move { Ok(n) }).await.unwrap();
        }

        // Oldest entry becomes most recent
        assert_eq!(cache.lookup(&key(1)), Some(1));

        cache.request(key(6), || async { Ok(6) }).await.unwrap();

        // 6 entries > 5: shrink to 3, removing #2, #3, #4
        assert_eq!(cache.len(), 3);
        assert!(cache.contains(&key(1)));
        assert!(cache.contains(&key(5)));
        assert!(cache.contains(&key(6)));
        assert_eq!(cache.keys_by_recency(), vec![key(5), key(1), key(6)]);
    }

    #[tokio::test]
    async fn test_manual_evict_noop_within_bound() {
        let cache = small_cache(3, 1);
        cache.request(key(1), || async { Ok(1) }).await.unwrap();
        assert_eq!(cache.evict(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_direct_settings_clamped_keep_fresh_entry() {
        // Buffer equal to the bound would otherwise shrink the cache to nothing
        let cache = small_cache(5, 5);
        assert_eq!(cache.settings().overflow_buffer, 4);
        assert_eq!(cache.settings().eviction_target(), 1);

        for n in 1..=6 {
            cache.request(key(n), move || async move { Ok(n) }).await.unwrap();
        }

        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key(6)));
    }

    #[test]
    fn test_clamped_settings() {
        let clamped = CacheSettings {
            max_cache_size: 0,
            overflow_buffer: 3,
            max_concurrent_generations: Some(0),
        }
        .clamped();
        assert_eq!(clamped.max_cache_size, 1);
        assert_eq!(clamped.overflow_buffer, 0);
        assert_eq!(clamped.max_concurrent_generations, Some(1));

        assert_eq!(CacheSettings::default().clamped(), CacheSettings::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_cap_limits_running_generations() {
        let cache: GenerationCache<usize> = GenerationCache::new(CacheSettings {
            max_cache_size: 50,
            overflow_buffer: 10,
            max_concurrent_generations: Some(2),
        });
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (1..=8)
            .map(|n| {
                let cache = cache.clone();
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    cache
                        .request(key(n), move || async move {
                            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(30)).await;
                            running.fetch_sub(1, Ordering::SeqCst);
                            Ok(n)
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2, "peak {}", peak.load(Ordering::SeqCst));
        assert!(peak.load(Ordering::SeqCst) >= 1);
        assert_eq!(cache.len(), 8);
        for n in 1..=8 {
            assert_eq!(cache.lookup(&key(n)), Some(n));
        }
    }

    #[tokio::test]
    async fn test_remove_clear_and_matching() {
        let cache = small_cache(10, 2);
        for n in 1..=6 {
            cache.request(key(n), move || async move { Ok(n) }).await.unwrap();
        }

        assert_eq!(cache.remove(&key(1)), Some(1));
        assert_eq!(cache.remove(&key(1)), None);

        let removed = cache.remove_entries_matching(|_, value| value % 2 == 0);
        assert_eq!(removed, 3);
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_entry_info_tracks_access_time() {
        let cache = small_cache(10, 2);
        cache.request(key(1), || async { Ok(1) }).await.unwrap();
        let first = cache.entry_info(&key(1)).unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.lookup(&key(1));
        let second = cache.entry_info(&key(1)).unwrap();

        assert!(second.last_accessed_at > first.last_accessed_at);
        assert!(cache.entry_info(&key(2)).is_none());
    }

    #[tokio::test]
    async fn test_events_published() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let cache = small_cache(10, 2).with_events(bus);

        cache.request(key(1), || async { Ok(1) }).await.unwrap();
        let _ = cache
            .request(key(2), || async { Err(GenerationError::InvalidOutput("0 frames".into())) })
            .await;

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event.event_type());
        }
        assert_eq!(
            seen,
            vec![
                "GenerationStarted",
                "GenerationCompleted",
                "GenerationStarted",
                "GenerationFailed"
            ]
        );
    }

    #[tokio::test]
    async fn test_dispose_returns_entry_count() {
        let cache = small_cache(10, 2);
        cache.request(key(1), || async { Ok(1) }).await.unwrap();
        cache.request(key(2), || async { Ok(2) }).await.unwrap();
        assert_eq!(cache.dispose(), 2);
    }
}
