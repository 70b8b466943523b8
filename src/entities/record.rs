use serde::{Deserialize, Serialize};

use super::interaction::InteractionList;
use super::molecular::MolecularProfile;
use super::trial::TrialsSummary;
use crate::scoring::ConfidenceScore;

/// Fixed indication label attached to every assembled record.
pub const PLACEHOLDER_INDICATION: &str = "New therapeutic use";

fn placeholder_indication() -> String {
    PLACEHOLDER_INDICATION.to_string()
}

/// One drug's assembled result. Built once per query and never mutated.
///
/// Deserialization is lenient so report payloads posted by clients may omit
/// any section except the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: String,
    #[serde(default)]
    pub confidence: ConfidenceScore,
    #[serde(default = "placeholder_indication")]
    pub indication: String,
    #[serde(default)]
    pub molecular: MolecularProfile,
    #[serde(default)]
    pub trials: TrialsSummary,
    #[serde(default)]
    pub interactions: InteractionList,
}

/// Row returned by the search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub name: String,
    pub confidence: ConfidenceScore,
    pub indication: String,
}

impl From<&ResultRecord> for SearchHit {
    fn from(record: &ResultRecord) -> Self {
        Self {
            name: record.name.clone(),
            confidence: record.confidence,
            indication: record.indication.clone(),
        }
    }
}
