use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{DrugQuery, Fallback, Source};
use crate::error::RepurposeError;
use crate::sources::clinicaltrials::ClinicalTrialsClient;

/// Studies requested per drug.
pub const TRIALS_PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub id: String,
    pub title: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialsSummary {
    pub count: usize,
    pub trials: Vec<TrialRecord>,
}

impl TrialsSummary {
    pub fn from_records(trials: Vec<TrialRecord>) -> Self {
        Self {
            count: trials.len(),
            trials,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }
}

impl Fallback for TrialsSummary {
    fn fallback(_query: &DrugQuery) -> Self {
        Self::default()
    }
}

pub struct ClinicalTrialsSource {
    client: ClinicalTrialsClient,
}

impl ClinicalTrialsSource {
    pub fn new() -> Result<Self, RepurposeError> {
        Ok(Self {
            client: ClinicalTrialsClient::new()?,
        })
    }

    pub fn with_client(client: ClinicalTrialsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Source<TrialsSummary> for ClinicalTrialsSource {
    fn api(&self) -> &'static str {
        "clinicaltrials.gov"
    }

    async fn fetch(&self, query: &DrugQuery) -> Result<TrialsSummary, RepurposeError> {
        let studies = self
            .client
            .search_studies(query.key(), TRIALS_PAGE_SIZE)
            .await?;
        Ok(TrialsSummary::from_records(
            studies
                .iter()
                .map(crate::transform::trial::from_ctgov_study)
                .collect(),
        ))
    }
}
