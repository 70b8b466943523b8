//! Domain records and the adapter seam that turns upstream lookups into
//! always-available values.
//!
//! Every upstream source implements [`Source`] and reports failures as
//! [`RepurposeError`]. The [`Adapter`] in front of it adds the cache, a bounded
//! timeout and the documented [`Fallback`] value, so nothing above this layer
//! ever observes an upstream failure.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::cache::{CacheKey, CacheKind, TtlCache};
use crate::error::RepurposeError;

pub mod interaction;
pub mod molecular;
pub mod record;
pub mod trial;

/// Sentinel for descriptive fields an upstream could not provide.
pub const UNKNOWN: &str = "unknown";

pub(crate) fn known_or_unknown(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("n/a"))
        .unwrap_or(UNKNOWN)
        .to_string()
}

/// A drug name as typed by the user plus its normalized lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrugQuery {
    display: String,
    key: String,
}

impl DrugQuery {
    /// Trims the input and rejects blank names.
    pub fn parse(raw: &str) -> Result<Self, RepurposeError> {
        let display = raw.trim();
        if display.is_empty() {
            return Err(RepurposeError::InvalidArgument(
                "Drug name is required".into(),
            ));
        }
        Ok(Self {
            display: display.to_string(),
            key: display.to_lowercase(),
        })
    }

    /// Original casing, for display.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Trimmed, lower-cased form used for cache keys and upstream lookups.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Deterministic value substituted when a lookup is unavailable.
pub trait Fallback {
    fn fallback(query: &DrugQuery) -> Self;
}

#[async_trait]
pub trait Source<T>: Send + Sync {
    /// Upstream name used in logs.
    fn api(&self) -> &'static str;

    async fn fetch(&self, query: &DrugQuery) -> Result<T, RepurposeError>;
}

/// An adapter result plus whether it is the fallback value.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub degraded: bool,
}

pub struct Adapter<T> {
    source: Arc<dyn Source<T>>,
    cache: Arc<TtlCache>,
    kind: CacheKind,
    ttl: Duration,
    timeout: Duration,
    fallbacks: AtomicU64,
}

impl<T> Adapter<T>
where
    T: Fallback + Clone + Send + Sync + 'static,
{
    pub fn new(
        source: Arc<dyn Source<T>>,
        cache: Arc<TtlCache>,
        kind: CacheKind,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            kind,
            ttl,
            timeout,
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Cached lookup. Failures (including timeouts) are logged, counted and
    /// resolved into `T::fallback`, which is never cached.
    pub async fn fetch(&self, query: &DrugQuery) -> T {
        self.fetch_tracked(query).await.value
    }

    /// Like [`Adapter::fetch`], but reports whether the value is the fallback so
    /// callers can avoid caching anything derived from it.
    pub async fn fetch_tracked(&self, query: &DrugQuery) -> Fetched<T> {
        let key = CacheKey::new(self.kind, query.key());
        let api = self.source.api();

        let result = self
            .cache
            .get_or_compute(&key, self.ttl, || async {
                match tokio::time::timeout(self.timeout, self.source.fetch(query)).await {
                    Ok(result) => result,
                    Err(_) => Err(RepurposeError::Timeout {
                        api: api.to_string(),
                        after: self.timeout,
                    }),
                }
            })
            .await;

        match result {
            Ok(value) => Fetched {
                value,
                degraded: false,
            },
            Err(err) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                warn!(
                    source = api,
                    drug = query.display(),
                    kind = %err.kind(),
                    error = %err,
                    "Upstream lookup failed; using fallback"
                );
                Fetched {
                    value: T::fallback(query),
                    degraded: true,
                }
            }
        }
    }

    /// Number of lookups answered with the fallback value.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    pub fn api(&self) -> &'static str {
        self.source.api()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stub sources shared by unit tests across the crate.

    use std::sync::atomic::AtomicUsize;

    use super::*;

    pub(crate) struct StubSource<T> {
        pub calls: AtomicUsize,
        pub outcome: Box<dyn Fn(&DrugQuery) -> Result<T, RepurposeError> + Send + Sync>,
        pub delay: Option<Duration>,
    }

    impl<T> StubSource<T> {
        pub(crate) fn new(
            outcome: impl Fn(&DrugQuery) -> Result<T, RepurposeError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome: Box::new(outcome),
                delay: None,
            }
        }

        pub(crate) fn failing() -> Self {
            Self::new(|query| {
                Err(RepurposeError::Api {
                    api: "stub".into(),
                    message: format!("HTTP 503 for {}", query.key()),
                })
            })
        }

        pub(crate) fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl<T: Send + Sync + 'static> Source<T> for StubSource<T> {
        fn api(&self) -> &'static str {
            "stub"
        }

        async fn fetch(&self, query: &DrugQuery) -> Result<T, RepurposeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.outcome)(query)
        }
    }
}
