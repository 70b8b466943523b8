//! Confidence scoring: molecular and indication-text similarity against a
//! reference drug, combined with fixed weights into an integer in `[0, 100]`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheKey, CacheKind, SCORE_TTL, TtlCache};
use crate::entities::molecular::MolecularProfile;
use crate::entities::{Adapter, DrugQuery, Fetched};
use crate::error::RepurposeError;
use crate::similarity::{SimilarityEngine, SimilarityPair};

pub const MOLECULAR_WEIGHT: f64 = 0.6;
pub const TEXT_WEIGHT: f64 = 0.3;
pub const BASE_WEIGHT: f64 = 0.1;

/// Structure used for Sildenafil when PubChem cannot supply one.
pub const SILDENAFIL_SMILES: &str =
    "CCCC1=NN(C2=C1N=C(NC2=O)C3=C(C=CC(=C3)S(=O)(=O)N4CCN(CC4)C)OCC)C";

/// Integer confidence in `[0, 100]`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u8")]
pub struct ConfidenceScore(u8);

impl ConfidenceScore {
    pub const MAX: u8 = 100;

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u32> for ConfidenceScore {
    type Error = RepurposeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(v) if v <= Self::MAX => Ok(Self(v)),
            _ => Err(RepurposeError::InvalidArgument(format!(
                "confidence must be between 0 and {}, got {value}",
                Self::MAX
            ))),
        }
    }
}

impl From<ConfidenceScore> for u8 {
    fn from(score: ConfidenceScore) -> Self {
        score.0
    }
}

impl fmt::Display for ConfidenceScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `round(clamp(0.6*m + 0.3*t + 0.1, 0, 1) * 100)`.
pub fn combine(pair: SimilarityPair) -> ConfidenceScore {
    let raw = MOLECULAR_WEIGHT * pair.molecular + TEXT_WEIGHT * pair.text + BASE_WEIGHT;
    let scaled = (raw.clamp(0.0, 1.0) * 100.0).round();
    ConfidenceScore(scaled as u8)
}

/// Supplies the indication text compared by the text-similarity term.
pub trait IndicationSource: Send + Sync {
    fn indication(&self, query: &DrugQuery) -> Option<String>;
}

/// Built-in indication table for commonly queried drugs.
#[derive(Debug, Clone)]
pub struct StaticIndicationCorpus {
    entries: HashMap<String, String>,
}

const BUILTIN_INDICATIONS: &[(&str, &str)] = &[
    ("Metformin", "Type 2 Diabetes Mellitus"),
    ("Aspirin", "Pain, Fever, Inflammation, Cardiovascular"),
    (
        "Sildenafil",
        "Erectile Dysfunction, Pulmonary Arterial Hypertension",
    ),
    ("Rapamycin", "Immunosuppression, mTOR Inhibition"),
    ("Thalidomide", "Multiple Myeloma, Leprosy"),
    ("Doxycycline", "Bacterial Infections"),
    ("Losartan", "Hypertension, Diabetic Nephropathy"),
    ("Atorvastatin", "Hypercholesterolemia, Cardiovascular Risk"),
    ("Levothyroxine", "Hypothyroidism"),
    ("Amlodipine", "Hypertension, Angina"),
    ("Simvastatin", "Hypercholesterolemia"),
    (
        "Omeprazole",
        "Gastroesophageal Reflux Disease, Peptic Ulcer",
    ),
    ("Sertraline", "Depression, Anxiety Disorders"),
];

impl StaticIndicationCorpus {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.as_ref().trim().to_lowercase(), v.into()))
                .collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN_INDICATIONS.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StaticIndicationCorpus {
    fn default() -> Self {
        Self::builtin()
    }
}

impl IndicationSource for StaticIndicationCorpus {
    fn indication(&self, query: &DrugQuery) -> Option<String> {
        self.entries.get(query.key()).cloned()
    }
}

pub struct ConfidenceScorer {
    cache: Arc<TtlCache>,
    molecular: Arc<Adapter<MolecularProfile>>,
    indications: Arc<dyn IndicationSource>,
    engine: SimilarityEngine,
    reference: DrugQuery,
}

impl ConfidenceScorer {
    pub fn new(
        cache: Arc<TtlCache>,
        molecular: Arc<Adapter<MolecularProfile>>,
        indications: Arc<dyn IndicationSource>,
        engine: SimilarityEngine,
        reference: DrugQuery,
    ) -> Self {
        Self {
            cache,
            molecular,
            indications,
            engine,
            reference,
        }
    }

    pub fn reference(&self) -> &DrugQuery {
        &self.reference
    }

    /// Cached score for `query`. Never fails: every missing input degrades to
    /// the similarity engine's fallback values. A score built on a fallback
    /// profile is returned but not cached, so it is recomputed once the
    /// upstream recovers.
    pub async fn score(&self, query: &DrugQuery) -> ConfidenceScore {
        let key = CacheKey::new(CacheKind::Score, query.key())
            .with_part(self.reference.key())
            .with_part(self.engine.structural_name());
        self.cache
            .get_or_compute(&key, SCORE_TTL, || async {
                let (pair, degraded) = self.assess(query).await;
                let score = combine(pair);
                debug!(
                    drug = query.display(),
                    molecular = pair.molecular,
                    text = pair.text,
                    score = score.value(),
                    degraded,
                    "confidence computed"
                );
                if degraded {
                    Err(Provisional(score))
                } else {
                    Ok(score)
                }
            })
            .await
            .unwrap_or_else(|Provisional(score)| score)
    }

    /// Uncached similarity breakdown behind [`ConfidenceScorer::score`].
    pub async fn similarity(&self, query: &DrugQuery) -> SimilarityPair {
        self.assess(query).await.0
    }

    async fn assess(&self, query: &DrugQuery) -> (SimilarityPair, bool) {
        let (profile, reference) =
            tokio::join!(self.molecular.fetch_tracked(query), self.reference_profile());
        let indication = self.indications.indication(query);
        let reference_indication = self.indications.indication(&self.reference);
        let pair = self.engine.pair(
            &profile.value,
            &reference.value,
            indication.as_deref(),
            reference_indication.as_deref(),
        );
        (pair, profile.degraded || reference.degraded)
    }

    async fn reference_profile(&self) -> Fetched<MolecularProfile> {
        let fetched = self.molecular.fetch_tracked(&self.reference).await;
        if fetched.value.structure().is_none() && self.reference.key() == "sildenafil" {
            return Fetched {
                value: MolecularProfile::from_structure(SILDENAFIL_SMILES),
                degraded: false,
            };
        }
        fetched
    }
}

/// Score computed from at least one fallback input; kept out of the cache.
struct Provisional(ConfidenceScore);
