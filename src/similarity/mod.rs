//! Molecular and indication-text similarity.
//!
//! Structural comparison goes through [`StructuralSimilarity`], chosen once at
//! startup from [`StructuralMode`]. Both measures are pure and bounded to
//! `[0, 1]`; caching happens in the scorer.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::StructuralMode;
use crate::entities::molecular::MolecularProfile;

pub mod fingerprint;

use fingerprint::Fingerprint;

/// Molecular similarity used when either structure is unknown, and by the
/// constant variant.
pub const FALLBACK_MOLECULAR_SIMILARITY: f64 = 0.2;

/// Compares two structural identifiers (SMILES).
pub trait StructuralSimilarity: Send + Sync {
    fn name(&self) -> &'static str;

    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Tanimoto overlap of circular fingerprints. Unparsable structures score 0.0.
#[derive(Debug, Default, Clone, Copy)]
pub struct FingerprintSimilarity;

impl StructuralSimilarity for FingerprintSimilarity {
    fn name(&self) -> &'static str {
        "fingerprint"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        let parsed = Fingerprint::from_smiles(a).and_then(|fa| {
            let fb = Fingerprint::from_smiles(b)?;
            Ok(fa.tanimoto(&fb))
        });
        match parsed {
            Ok(value) => value,
            Err(err) => {
                debug!(error = %err, "Structure could not be fingerprinted");
                0.0
            }
        }
    }
}

/// Deterministic stand-in when fingerprinting is disabled.
#[derive(Debug, Clone, Copy)]
pub struct ConstantSimilarity(pub f64);

impl Default for ConstantSimilarity {
    fn default() -> Self {
        Self(FALLBACK_MOLECULAR_SIMILARITY)
    }
}

impl StructuralSimilarity for ConstantSimilarity {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn similarity(&self, _a: &str, _b: &str) -> f64 {
        self.0
    }
}

/// Molecular and text similarity of one drug against the reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityPair {
    pub molecular: f64,
    pub text: f64,
}

impl SimilarityPair {
    pub fn new(molecular: f64, text: f64) -> Self {
        Self {
            molecular: unit(molecular),
            text: unit(text),
        }
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+").expect("valid regex"))
}

fn tokens(text: &str) -> HashSet<String> {
    word_re()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Jaccard overlap of lower-cased word sets; 0.0 when either side has no words.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let a = tokens(a);
    let b = tokens(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    intersection as f64 / union as f64
}

#[derive(Clone)]
pub struct SimilarityEngine {
    structural: Arc<dyn StructuralSimilarity>,
}

impl SimilarityEngine {
    pub fn new(structural: Arc<dyn StructuralSimilarity>) -> Self {
        Self { structural }
    }

    pub fn from_mode(mode: StructuralMode) -> Self {
        let structural: Arc<dyn StructuralSimilarity> = match mode {
            StructuralMode::Fingerprint => Arc::new(FingerprintSimilarity),
            StructuralMode::Constant => {
                info!(
                    value = FALLBACK_MOLECULAR_SIMILARITY,
                    "Structural fingerprinting disabled; molecular similarity is constant"
                );
                Arc::new(ConstantSimilarity::default())
            }
        };
        Self::new(structural)
    }

    pub fn structural_name(&self) -> &'static str {
        self.structural.name()
    }

    pub fn molecular_similarity(&self, a: &MolecularProfile, b: &MolecularProfile) -> f64 {
        match (a.structure(), b.structure()) {
            (Some(a), Some(b)) => unit(self.structural.similarity(a, b)),
            _ => FALLBACK_MOLECULAR_SIMILARITY,
        }
    }

    /// Missing indication text on either side yields 0.0 for the text term.
    pub fn pair(
        &self,
        profile: &MolecularProfile,
        reference: &MolecularProfile,
        indication: Option<&str>,
        reference_indication: Option<&str>,
    ) -> SimilarityPair {
        let text = match (indication, reference_indication) {
            (Some(a), Some(b)) => text_similarity(a, b),
            _ => 0.0,
        };
        SimilarityPair::new(self.molecular_similarity(profile, reference), text)
    }
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::from_mode(StructuralMode::default())
    }
}
