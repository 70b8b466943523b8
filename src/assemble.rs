//! Per-drug orchestration: score plus the three adapter lookups, assembled
//! into one read-only [`ResultRecord`].

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{
    CacheKind, CacheStats, INTERACTIONS_TTL, MOLECULAR_TTL, TRIALS_TTL, TtlCache,
};
use crate::config::Settings;
use crate::entities::interaction::{InteractionList, MyChemInteractionSource};
use crate::entities::molecular::{MolecularProfile, PubChemSource};
use crate::entities::record::{PLACEHOLDER_INDICATION, ResultRecord, SearchHit};
use crate::entities::trial::{ClinicalTrialsSource, TrialsSummary};
use crate::entities::{Adapter, DrugQuery, Source};
use crate::error::RepurposeError;
use crate::scoring::{ConfidenceScore, ConfidenceScorer, IndicationSource, StaticIndicationCorpus};
use crate::similarity::{SimilarityEngine, SimilarityPair};

/// Upper bound on drugs in one comparison.
pub const MAX_COMPARE: usize = 3;

/// Drugs pre-populated by `serve --warm`.
pub const WARM_DRUGS: [&str; 3] = ["Metformin", "Aspirin", "Sildenafil"];

/// Upstream sources behind the three adapters.
pub struct Sources {
    pub molecular: Arc<dyn Source<MolecularProfile>>,
    pub trials: Arc<dyn Source<TrialsSummary>>,
    pub interactions: Arc<dyn Source<InteractionList>>,
}

impl Sources {
    /// PubChem, ClinicalTrials.gov and MyChem clients on the shared HTTP stack.
    pub fn live() -> Result<Self, RepurposeError> {
        Ok(Self {
            molecular: Arc::new(PubChemSource::new()?),
            trials: Arc::new(ClinicalTrialsSource::new()?),
            interactions: Arc::new(MyChemInteractionSource::new()?),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    #[serde(flatten)]
    pub cache: CacheStats,
    /// Lookups answered with a fallback value, per upstream.
    pub fallbacks: BTreeMap<&'static str, u64>,
}

pub struct Assembler {
    cache: Arc<TtlCache>,
    scorer: ConfidenceScorer,
    molecular: Arc<Adapter<MolecularProfile>>,
    trials: Adapter<TrialsSummary>,
    interactions: Adapter<InteractionList>,
}

impl Assembler {
    pub fn new(
        settings: &Settings,
        sources: Sources,
        indications: Arc<dyn IndicationSource>,
    ) -> Result<Self, RepurposeError> {
        let cache = Arc::new(if settings.cache_enabled {
            TtlCache::new()
        } else {
            TtlCache::disabled()
        });
        let reference = DrugQuery::parse(&settings.reference_drug)?;

        let molecular = Arc::new(Adapter::new(
            sources.molecular,
            cache.clone(),
            CacheKind::Molecular,
            MOLECULAR_TTL,
            settings.timeout,
        ));
        let trials = Adapter::new(
            sources.trials,
            cache.clone(),
            CacheKind::Trials,
            TRIALS_TTL,
            settings.timeout,
        );
        let interactions = Adapter::new(
            sources.interactions,
            cache.clone(),
            CacheKind::Interactions,
            INTERACTIONS_TTL,
            settings.timeout,
        );
        let scorer = ConfidenceScorer::new(
            cache.clone(),
            molecular.clone(),
            indications,
            SimilarityEngine::from_mode(settings.structural),
            reference,
        );

        Ok(Self {
            cache,
            scorer,
            molecular,
            trials,
            interactions,
        })
    }

    /// Live upstream sources and the built-in indication corpus.
    pub fn from_settings(settings: &Settings) -> Result<Self, RepurposeError> {
        Self::new(
            settings,
            Sources::live()?,
            Arc::new(StaticIndicationCorpus::builtin()),
        )
    }

    /// Full record for a user-supplied name. Only a blank name is an error.
    pub async fn record(&self, name: &str) -> Result<ResultRecord, RepurposeError> {
        let query = DrugQuery::parse(name)?;
        Ok(self.assemble(&query).await)
    }

    pub async fn assemble(&self, query: &DrugQuery) -> ResultRecord {
        let (confidence, molecular, trials, interactions) = tokio::join!(
            self.scorer.score(query),
            self.molecular.fetch(query),
            self.trials.fetch(query),
            self.interactions.fetch(query),
        );
        ResultRecord {
            name: query.display().to_string(),
            confidence,
            indication: PLACEHOLDER_INDICATION.to_string(),
            molecular,
            trials,
            interactions,
        }
    }

    /// Score-only lookup. A blank query yields no hits.
    pub async fn search(&self, q: &str) -> Vec<SearchHit> {
        let Ok(query) = DrugQuery::parse(q) else {
            return Vec::new();
        };
        vec![SearchHit {
            name: query.display().to_string(),
            confidence: self.scorer.score(&query).await,
            indication: PLACEHOLDER_INDICATION.to_string(),
        }]
    }

    /// Cached score plus the uncached similarity breakdown behind it.
    pub async fn score(
        &self,
        name: &str,
    ) -> Result<(ConfidenceScore, SimilarityPair), RepurposeError> {
        let query = DrugQuery::parse(name)?;
        let (score, pair) = tokio::join!(self.scorer.score(&query), self.scorer.similarity(&query));
        Ok((score, pair))
    }

    /// Records in input order. Blank names are skipped; at least one and at
    /// most [`MAX_COMPARE`] names must remain.
    pub async fn compare<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<ResultRecord>, RepurposeError> {
        let queries = names
            .iter()
            .filter_map(|name| DrugQuery::parse(name.as_ref()).ok())
            .collect::<Vec<_>>();
        if queries.is_empty() {
            return Err(RepurposeError::InvalidArgument(
                "At least one drug name is required".into(),
            ));
        }
        if queries.len() > MAX_COMPARE {
            return Err(RepurposeError::InvalidArgument(format!(
                "At most {MAX_COMPARE} drugs can be compared"
            )));
        }
        debug!(count = queries.len(), "comparing drugs");
        Ok(join_all(queries.iter().map(|q| self.assemble(q))).await)
    }

    /// Pre-populates the cache for `names`. Failures resolve to fallbacks and
    /// are not cached, so warming never fails.
    pub async fn warm(&self, names: &[&str]) {
        for name in names {
            if let Ok(query) = DrugQuery::parse(name) {
                self.assemble(&query).await;
            }
        }
        info!(drugs = names.len(), entries = self.cache.stats().entries, "cache warmed");
    }

    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    pub fn stats(&self) -> ServiceStats {
        let mut fallbacks = BTreeMap::new();
        for (api, count) in [
            (self.molecular.api(), self.molecular.fallback_count()),
            (self.trials.api(), self.trials.fallback_count()),
            (self.interactions.api(), self.interactions.fallback_count()),
        ] {
            *fallbacks.entry(api).or_insert(0) += count;
        }
        ServiceStats {
            cache: self.cache.stats(),
            fallbacks,
        }
    }

    pub fn reference(&self) -> &str {
        self.scorer.reference().display()
    }
}
