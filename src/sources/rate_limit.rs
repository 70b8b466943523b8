//! Per-upstream request spacing, applied as `reqwest-middleware` middleware.
//!
//! Each request reserves the next free slot for its upstream and sleeps until
//! that slot, so concurrent callers queue in arrival order instead of racing.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use http::Extensions;
use reqwest::Url;
use reqwest_middleware::{Middleware, Next};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

const DEFAULT_SPACING: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub(crate) struct Spacing {
    pub upstream: &'static str,
    pub prefix: Cow<'static, str>,
    pub interval: Duration,
}

impl Spacing {
    fn configured(
        upstream: &'static str,
        env_var: &'static str,
        default_base: &'static str,
        interval: Duration,
    ) -> Self {
        Self {
            upstream,
            prefix: crate::sources::env_base(default_base, env_var),
            interval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Lane {
    Upstream(&'static str),
    Origin(String),
}

#[derive(Debug)]
pub(crate) struct RateLimiter {
    spacings: Vec<Spacing>,
    fallback_interval: Duration,
    next_slot: Mutex<HashMap<Lane, Instant>>,
}

impl RateLimiter {
    pub(crate) fn from_env() -> Self {
        use super::{clinicaltrials, mychem, pubchem};

        Self::new(
            vec![
                // PUG-REST allows at most 5 requests per second.
                Spacing::configured(
                    "pubchem",
                    pubchem::PUBCHEM_BASE_ENV,
                    pubchem::PUBCHEM_BASE,
                    Duration::from_millis(200),
                ),
                Spacing::configured(
                    "clinicaltrials",
                    clinicaltrials::CTGOV_BASE_ENV,
                    clinicaltrials::CTGOV_BASE,
                    Duration::from_millis(250),
                ),
                Spacing::configured(
                    "mychem",
                    mychem::MYCHEM_BASE_ENV,
                    mychem::MYCHEM_BASE,
                    Duration::from_millis(100),
                ),
            ],
            DEFAULT_SPACING,
        )
    }

    pub(crate) fn new(spacings: Vec<Spacing>, fallback_interval: Duration) -> Self {
        Self {
            spacings,
            fallback_interval,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Longest configured prefix wins; anything else is spaced per origin.
    fn lane(&self, url: &Url) -> (Lane, Duration) {
        let raw = url.as_str();
        match self
            .spacings
            .iter()
            .filter(|s| raw.starts_with(s.prefix.as_ref()))
            .max_by_key(|s| s.prefix.len())
        {
            Some(spacing) => (Lane::Upstream(spacing.upstream), spacing.interval),
            None => (
                Lane::Origin(format!(
                    "{}://{}",
                    url.scheme(),
                    url.host_str().unwrap_or("unknown-host")
                )),
                self.fallback_interval,
            ),
        }
    }

    /// Reserves the next slot for `url`'s lane and sleeps until it arrives.
    pub(crate) async fn acquire(&self, url: &Url) {
        let (lane, interval) = self.lane(url);
        let slot = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots.get(&lane).copied().filter(|s| *s > now).unwrap_or(now);
            slots.insert(lane, slot + interval);
            slot
        };
        sleep_until(slot).await;
    }
}

static LIMITER: OnceLock<Arc<RateLimiter>> = OnceLock::new();

#[derive(Clone, Debug)]
pub(crate) struct RateLimitMiddleware {
    limiter: Arc<RateLimiter>,
}

impl RateLimitMiddleware {
    pub(crate) fn new() -> Self {
        Self {
            limiter: LIMITER
                .get_or_init(|| Arc::new(RateLimiter::from_env()))
                .clone(),
        }
    }
}

#[async_trait::async_trait]
impl Middleware for RateLimitMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<reqwest::Response> {
        self.limiter.acquire(req.url()).await;
        next.run(req, extensions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spacing(upstream: &'static str, prefix: &str, ms: u64) -> Spacing {
        Spacing {
            upstream,
            prefix: Cow::Owned(prefix.to_string()),
            interval: Duration::from_millis(ms),
        }
    }

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_requests_are_spaced_by_interval() {
        let limiter = RateLimiter::new(
            vec![spacing("pubchem", "https://pubchem.example/rest/pug", 200)],
            Duration::from_millis(1),
        );
        let target = url("https://pubchem.example/rest/pug/compound/name/aspirin/JSON");

        let start = Instant::now();
        limiter.acquire(&target).await;
        limiter.acquire(&target).await;
        limiter.acquire(&target).await;

        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_queue_in_distinct_slots() {
        let limiter = Arc::new(RateLimiter::new(Vec::new(), Duration::from_millis(100)));
        let target = url("https://mychem.example/v1/query");

        let start = Instant::now();
        let handles = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                let target = target.clone();
                tokio::spawn(async move {
                    limiter.acquire(&target).await;
                    Instant::now()
                })
            })
            .collect::<Vec<_>>();

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap() - start);
        }
        finished.sort();
        assert_eq!(
            finished,
            vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_millis(200)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn separate_lanes_do_not_block_each_other() {
        let limiter = RateLimiter::new(
            vec![
                spacing("pug", "https://pubchem.example/rest/pug", 500),
                spacing("pug_view", "https://pubchem.example/rest/pug_view", 500),
            ],
            Duration::from_millis(1),
        );

        let start = Instant::now();
        limiter
            .acquire(&url("https://pubchem.example/rest/pug/compound/name/aspirin/JSON"))
            .await;
        limiter
            .acquire(&url("https://pubchem.example/rest/pug_view/data/compound/2244/JSON"))
            .await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_lane_does_not_accumulate_debt() {
        let limiter = RateLimiter::new(Vec::new(), Duration::from_millis(100));
        let target = url("https://ctgov.example/api/v2/studies");

        limiter.acquire(&target).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        let start = Instant::now();
        limiter.acquire(&target).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn longest_prefix_selects_lane() {
        let limiter = RateLimiter::new(
            vec![
                spacing("short", "https://example.org/api", 10),
                spacing("long", "https://example.org/api/v1", 20),
            ],
            Duration::from_millis(1),
        );

        let (lane, interval) = limiter.lane(&url("https://example.org/api/v1/resource"));
        assert_eq!(lane, Lane::Upstream("long"));
        assert_eq!(interval, Duration::from_millis(20));
    }

    #[test]
    fn built_in_spacings_cover_each_upstream() {
        let limiter = RateLimiter::from_env();
        let lane = |raw: &str| limiter.lane(&url(raw)).0;

        assert_eq!(
            lane("https://pubchem.ncbi.nlm.nih.gov/rest/pug/compound/name/aspirin/JSON"),
            Lane::Upstream("pubchem")
        );
        assert_eq!(
            lane("https://clinicaltrials.gov/api/v2/studies?query.term=aspirin"),
            Lane::Upstream("clinicaltrials")
        );
        assert_eq!(
            lane("https://mychem.info/v1/query?q=aspirin"),
            Lane::Upstream("mychem")
        );
        assert_eq!(
            lane("http://127.0.0.1:8080/anything"),
            Lane::Origin("http://127.0.0.1".into())
        );
    }
}
