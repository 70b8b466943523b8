//! Keyed TTL memoizer placed in front of every adapter call and the confidence scorer.
//!
//! TTL is a parameter of each call, not of the cache. Failed computations are never
//! stored, so a transient upstream error cannot poison a key. Concurrent misses on the
//! same key are serialized through a per-key gate so the value is computed once.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

pub const SCORE_TTL: Duration = DAY;
pub const TRIALS_TTL: Duration = DAY;
pub const MOLECULAR_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const INTERACTIONS_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Score,
    Molecular,
    Trials,
    Interactions,
}

impl CacheKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Score => "score",
            Self::Molecular => "molecular",
            Self::Trials => "trials",
            Self::Interactions => "interactions",
        }
    }
}

/// Structured cache key: operation kind plus every discriminating input, kept as
/// separate parts so no two distinct inputs can concatenate to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: CacheKind,
    parts: Vec<String>,
}

impl CacheKey {
    pub fn new(kind: CacheKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            parts: vec![name.into()],
        }
    }

    pub fn with_part(mut self, part: impl Into<String>) -> Self {
        self.parts.push(part.into());
        self
    }

    pub fn kind(&self) -> CacheKind {
        self.kind
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.parts.join("|"))
    }
}

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

enum Lookup<T> {
    Hit(T),
    Miss,
    Unavailable,
}

type Gate = Arc<tokio::sync::Mutex<()>>;

pub struct TtlCache {
    enabled: bool,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    inflight: Mutex<HashMap<CacheKey, Gate>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("enabled", &self.enabled)
            .field("stats", &self.stats())
            .finish()
    }
}

impl TtlCache {
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    /// A cache that never stores anything; every call computes fresh.
    pub fn disabled() -> Self {
        Self::with_enabled(false)
    }

    fn with_enabled(enabled: bool) -> Self {
        Self {
            enabled,
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the live value for `key`, or runs `compute` once and stores its
    /// successful result for `ttl`. Errors from `compute` are returned uncached.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.enabled {
            return compute().await;
        }

        match self.lookup::<T>(key) {
            Lookup::Hit(value) => return Ok(value),
            Lookup::Unavailable => return compute().await,
            Lookup::Miss => {}
        }

        let gate = self.gate(key);
        let guard = match gate.clone() {
            Some(gate) => Some(gate.lock_owned().await),
            None => None,
        };

        // Another caller may have filled the slot while we waited on the gate.
        if guard.is_some()
            && let Lookup::Hit(value) = self.lookup::<T>(key)
        {
            drop(guard);
            self.release_gate(key, gate);
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "cache miss");
        let result = compute().await;
        if let Ok(value) = &result {
            self.store(key, value.clone(), ttl);
        }

        drop(guard);
        self.release_gate(key, gate);
        result
    }

    /// Infallible variant of [`TtlCache::get_or_compute`].
    pub async fn get_or_insert_with<T, F, Fut>(&self, key: &CacheKey, ttl: Duration, compute: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let result: Result<T, std::convert::Infallible> = self
            .get_or_compute(key, ttl, move || async move { Ok(compute().await) })
            .await;
        let Ok(value) = result;
        value
    }

    /// Evicts every entry. Lookups already in flight still complete and may
    /// repopulate their key afterwards.
    pub fn clear(&self) -> usize {
        let evicted = {
            let mut entries = self
                .entries
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let evicted = entries.len();
            entries.clear();
            evicted
        };
        self.entries.clear_poison();
        debug!(evicted, "cache cleared");
        evicted
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = match self.entries.read() {
            Ok(entries) => entries.values().filter(|e| e.is_live(now)).count(),
            Err(_) => 0,
        };
        CacheStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn lookup<T: Clone + 'static>(&self, key: &CacheKey) -> Lookup<T> {
        let Ok(entries) = self.entries.read() else {
            warn!(key = %key, "cache store unavailable; computing uncached");
            return Lookup::Unavailable;
        };

        match entries.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => {
                match entry.value.downcast_ref::<T>() {
                    Some(value) => {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        debug!(key = %key, "cache hit");
                        Lookup::Hit(value.clone())
                    }
                    None => {
                        warn!(key = %key, "cached value has unexpected type; recomputing");
                        Lookup::Miss
                    }
                }
            }
            _ => Lookup::Miss,
        }
    }

    fn store<T: Send + Sync + 'static>(&self, key: &CacheKey, value: T, ttl: Duration) {
        let Ok(mut entries) = self.entries.write() else {
            warn!(key = %key, "cache store unavailable; result not cached");
            return;
        };
        entries.insert(
            key.clone(),
            CacheEntry {
                value: Arc::new(value),
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    fn gate(&self, key: &CacheKey) -> Option<Gate> {
        let mut inflight = self.inflight.lock().ok()?;
        Some(inflight.entry(key.clone()).or_default().clone())
    }

    fn release_gate(&self, key: &CacheKey, gate: Option<Gate>) {
        let Some(gate) = gate else {
            return;
        };
        let Ok(mut inflight) = self.inflight.lock() else {
            return;
        };
        // Map + this handle; anything above that is a waiter still queued on the gate.
        let idle = inflight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &gate) && Arc::strong_count(current) <= 2);
        if idle {
            inflight.remove(key);
        }
    }
}
