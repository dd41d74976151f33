//! Bounded, TTL-limited cache of opened grid handles and their value ranges.
//!
//! Handle I/O never happens under the cache lock. Two concurrent misses on
//! the same path may both open it; the later insert wins.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::debug;

use geogrid::{GridHandle, GridSource};
use tile_common::{TileResult, ValueRange};

/// Cache configuration.
#[derive(Debug, Clone, Copy)]
pub struct ResourceCacheConfig {
    pub max_entries: usize,
    /// Maximum age of a handle, counted from when it was opened.
    pub ttl: Duration,
}

impl Default for ResourceCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 8,
            ttl: Duration::from_secs(3600),
        }
    }
}

struct CacheEntry {
    handle: Arc<dyn GridHandle>,
    /// Distinguishes this open from earlier opens of the same path.
    generation: u64,
    opened_at: Instant,
    last_access: Instant,
}

impl CacheEntry {
    fn expired(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.opened_at) > ttl
    }
}

/// Statistics for the resource cache
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResourceCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub opens: u64,
    pub evictions: u64,
    pub entries: usize,
    pub stats_entries: usize,
}

impl ResourceCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

pub struct ResourceCache {
    source: Arc<dyn GridSource>,
    config: ResourceCacheConfig,
    handles: Mutex<LruCache<PathBuf, CacheEntry>>,
    /// (path, stats key) -> (handle generation, range); entries live until
    /// `path` leaves `handles` and only serve the generation they came from
    stats: Mutex<HashMap<(PathBuf, String), (u64, ValueRange)>>,
    next_generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    opens: AtomicU64,
    evictions: AtomicU64,
}

impl ResourceCache {
    pub fn new(source: Arc<dyn GridSource>, config: ResourceCacheConfig) -> Self {
        Self {
            source,
            config: ResourceCacheConfig {
                max_entries: config.max_entries.max(1),
                ..config
            },
            // Capacity is enforced by `evict_locked`, not by the LRU itself
            handles: Mutex::new(LruCache::unbounded()),
            stats: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            opens: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Return the cached handle for `path`, opening it on a miss or when the
    /// cached one has outlived its TTL.
    pub fn open(&self, path: &Path) -> TileResult<Arc<dyn GridHandle>> {
        let now = Instant::now();
        let expired = {
            let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            let expired = match handles.get_mut(path) {
                Some(entry) if !entry.expired(self.config.ttl, now) => {
                    entry.last_access = now;
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.handle.clone());
                }
                Some(_) => true,
                None => false,
            };
            if expired {
                handles.pop(path);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
            expired
        };
        if expired {
            self.forget_stats(path);
            debug!(path = %path.display(), "Cached handle expired");
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let handle = self.source.open(path)?;
        self.opens.fetch_add(1, Ordering::Relaxed);

        let opened_at = Instant::now();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let evicted = {
            let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            handles.put(
                path.to_path_buf(),
                CacheEntry {
                    handle: handle.clone(),
                    generation,
                    opened_at,
                    last_access: opened_at,
                },
            );
            self.evict_locked(&mut handles, opened_at)
        };

        for old in &evicted {
            self.forget_stats(old);
        }

        Ok(handle)
    }

    /// Pop least-recently-used entries while over capacity or while the
    /// LRU entry is past its TTL. Returns the evicted paths.
    fn evict_locked(
        &self,
        handles: &mut LruCache<PathBuf, CacheEntry>,
        now: Instant,
    ) -> Vec<PathBuf> {
        let mut evicted = Vec::new();
        while let Some((_, lru)) = handles.peek_lru() {
            let over_capacity = handles.len() > self.config.max_entries;
            if !over_capacity && !lru.expired(self.config.ttl, now) {
                break;
            }
            if let Some((path, entry)) = handles.pop_lru() {
                debug!(
                    path = %path.display(),
                    idle_ms = now.duration_since(entry.last_access).as_millis() as u64,
                    "Evicted grid handle"
                );
                self.evictions.fetch_add(1, Ordering::Relaxed);
                evicted.push(path);
            }
        }
        evicted
    }

    /// Memoised value range for (`path`, `key`) computed from `handle`, the
    /// handle previously returned by [`open`](Self::open).
    ///
    /// Ranges are tied to the cached handle they were computed from. When
    /// `handle` is no longer the cached handle for `path` (invalidated,
    /// evicted or reopened), the range is computed and returned but not
    /// stored, and a stored range from another open is never served.
    /// `compute` runs outside any lock; failures are returned and not cached.
    pub fn get_or_compute_stats<F>(
        &self,
        path: &Path,
        handle: &Arc<dyn GridHandle>,
        key: &str,
        compute: F,
    ) -> TileResult<ValueRange>
    where
        F: FnOnce() -> TileResult<ValueRange>,
    {
        let cache_key = (path.to_path_buf(), key.to_string());
        let generation = self.generation_of(path, handle);
        if let Some(generation) = generation {
            let stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((stored, range)) = stats.get(&cache_key) {
                if *stored == generation {
                    return Ok(*range);
                }
            }
        }

        let range = compute()?;
        match generation {
            Some(generation) if self.generation_of(path, handle) == Some(generation) => {
                self.stats
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(cache_key, (generation, range));
            }
            _ => debug!(path = %path.display(), key, "Handle no longer cached, range not stored"),
        }
        Ok(range)
    }

    /// Generation of the cached entry for `path` if it still holds `handle`.
    fn generation_of(&self, path: &Path, handle: &Arc<dyn GridHandle>) -> Option<u64> {
        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .peek(path)
            .filter(|entry| Arc::ptr_eq(&entry.handle, handle))
            .map(|entry| entry.generation)
    }

    /// Drop the handle and value ranges for `path`.
    pub fn invalidate(&self, path: &Path) -> bool {
        let removed = self
            .handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop(path)
            .is_some();
        self.forget_stats(path);
        if removed {
            debug!(path = %path.display(), "Invalidated grid handle");
        }
        removed
    }

    fn forget_stats(&self, path: &Path) {
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(p, _), _| p != path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(path)
    }

    pub fn stats(&self) -> ResourceCacheStats {
        let entries = self.handles.lock().unwrap_or_else(|e| e.into_inner()).len();
        let stats_entries = self.stats.lock().unwrap_or_else(|e| e.into_inner()).len();
        ResourceCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            opens: self.opens.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries,
            stats_entries,
        }
    }
}
