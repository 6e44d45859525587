//! Content-addressed result cache with time-based expiry.
//!
//! Keys are the SHA-256 of the input bytes combined with the output format,
//! compression mode, byte target and tolerance, so the same upload under
//! different settings never collides, even when engines with different
//! targets share one cache. Entries live in process memory only.
//!
//! Expired entries are dropped lazily when looked up, and in bulk by
//! [`ResultCache::cleanup`], which the engine runs every few jobs rather than
//! on every request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::encode::OutputFormat;
use crate::engine::CompressionMode;

/// Source of the current time for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A previously produced output and the settings it was made with.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedOutput {
    pub buffer: Vec<u8>,
    pub quality: u8,
    pub scale_factor: Option<f32>,
    pub width: u32,
    pub height: u32,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry {
    value: Arc<CachedOutput>,
    inserted_at: Instant,
}

/// Thread-safe in-memory result cache.
pub struct ResultCache {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    /// Create an empty cache using the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create an empty cache with an injected clock.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Deterministic key for an input under the given output settings.
    pub fn generate_key(
        bytes: &[u8],
        format: OutputFormat,
        mode: CompressionMode,
        target_bytes: u64,
        tolerance: u64,
    ) -> String {
        let digest = Sha256::digest(bytes);
        format!(
            "{}:{}:{}:{}:{}",
            hex::encode(digest),
            format.as_str(),
            mode.as_str(),
            target_bytes,
            tolerance
        )
    }

    /// Look up a live entry.
    ///
    /// An expired entry is evicted and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Arc<CachedOutput>> {
        let now = self.clock.now();
        let mut entries = self.lock();

        let expired = match entries.get(key) {
            Some(entry) if !self.is_expired(entry, now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.value));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.remove(key);
            debug!(key, "evicted expired cache entry on lookup");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or overwrite an entry.
    pub fn set(&self, key: impl Into<String>, value: CachedOutput) {
        let entry = Entry {
            value: Arc::new(value),
            inserted_at: self.clock.now(),
        };
        self.lock().insert(key.into(), entry);
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "cache cleanup");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) > self.ttl
    }

    // A panic while holding the lock cannot leave a half-written HashMap entry,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn output(fill: u8) -> CachedOutput {
        CachedOutput {
            buffer: vec![fill; 16],
            quality: 80,
            scale_factor: None,
            width: 4,
            height: 4,
        }
    }

    fn manual_cache() -> (ResultCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (ResultCache::with_clock(DAY, clock.clone()), clock)
    }

    fn key(format: OutputFormat, mode: CompressionMode, target: u64, tolerance: u64) -> String {
        ResultCache::generate_key(b"abc", format, mode, target, tolerance)
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = key(OutputFormat::Jpeg, CompressionMode::Exact, 80_000, 0);
        let b = key(OutputFormat::Jpeg, CompressionMode::Exact, 80_000, 0);
        assert_eq!(a, b);
        assert!(a.starts_with("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"));
    }

    #[test]
    fn test_key_separates_settings() {
        let base = key(OutputFormat::Jpeg, CompressionMode::Exact, 80_000, 0);
        let others = [
            key(OutputFormat::Avif, CompressionMode::Exact, 80_000, 0),
            key(OutputFormat::Jpeg, CompressionMode::Balanced, 80_000, 0),
            key(OutputFormat::Jpeg, CompressionMode::Exact, 20_000, 0),
            key(OutputFormat::Jpeg, CompressionMode::Exact, 80_000, 500),
        ];

        for (i, other) in others.iter().enumerate() {
            assert_ne!(&base, other);
            for later in &others[i + 1..] {
                assert_ne!(other, later);
            }
        }
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let (cache, _clock) = manual_cache();

        assert!(cache.get("k").is_none());
        cache.set("k", output(1));
        assert_eq!(cache.get("k").unwrap().buffer, vec![1; 16]);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_set_overwrites() {
        let (cache, _clock) = manual_cache();

        cache.set("k", output(1));
        cache.set("k", output(2));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k").unwrap().buffer, vec![2; 16]);
    }

    #[test]
    fn test_expired_lookup_evicts() {
        let (cache, clock) = manual_cache();
        cache.set("k", output(1));

        clock.advance(DAY + Duration::from_secs(1));

        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
        // Nothing left for the sweep to remove
        assert_eq!(cache.cleanup(), 0);
    }

    #[test]
    fn test_entry_alive_at_exact_ttl() {
        let (cache, clock) = manual_cache();
        cache.set("k", output(1));

        clock.advance(DAY);
        assert!(cache.get("k").is_some());
    }

    #[test]
    fn test_cleanup_removes_only_expired() {
        let (cache, clock) = manual_cache();
        cache.set("old", output(1));
        clock.advance(DAY / 2);
        cache.set("fresh", output(2));
        clock.advance(DAY / 2 + Duration::from_secs(1));

        assert_eq!(cache.cleanup(), 1);
        assert!(cache.get("old").is_none());
        assert!(cache.get("fresh").is_some());
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(ResultCache::new(DAY));

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for round in 0..50 {
                        let key = format!("k{}", (i as usize + round) % 4);
                        cache.set(key.clone(), output(i));
                        let _ = cache.get(&key);
                        if round % 10 == 0 {
                            cache.cleanup();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.entries, 4);
        assert_eq!(stats.hits + stats.misses, 8 * 50);
    }
}
