use std::borrow::Cow;

use serde::Deserialize;

use crate::error::RepurposeError;

pub(crate) const CTGOV_BASE: &str = "https://clinicaltrials.gov/api/v2";
pub(crate) const CTGOV_BASE_ENV: &str = "REPURPOSE_CTGOV_BASE";
const CTGOV_API: &str = "clinicaltrials.gov";

pub struct ClinicalTrialsClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: Cow<'static, str>,
}

impl ClinicalTrialsClient {
    pub fn new() -> Result<Self, RepurposeError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: crate::sources::env_base(CTGOV_BASE, CTGOV_BASE_ENV),
        })
    }

    pub fn with_base(base: impl Into<String>) -> Result<Self, RepurposeError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: Cow::Owned(base.into()),
        })
    }

    pub async fn search_studies(
        &self,
        term: &str,
        page_size: usize,
    ) -> Result<Vec<CtGovStudy>, RepurposeError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(RepurposeError::InvalidArgument(
                "Search term is required".into(),
            ));
        }

        let url = crate::sources::join_endpoint(self.base.as_ref(), "studies");
        let page_size = page_size.clamp(1, 100).to_string();
        let resp: CtGovSearchResponse = crate::sources::get_json(
            CTGOV_API,
            self.client.get(&url).query(&[
                ("query.term", term),
                ("pageSize", page_size.as_str()),
                ("format", "json"),
            ]),
        )
        .await?;

        Ok(resp.studies)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CtGovSearchResponse {
    #[serde(default)]
    studies: Vec<CtGovStudy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CtGovStudy {
    #[serde(default)]
    pub protocol_section: CtGovProtocolSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CtGovProtocolSection {
    pub identification_module: Option<CtGovIdentification>,
    pub status_module: Option<CtGovStatus>,
    pub design_module: Option<CtGovDesign>,
    pub sponsor_collaborators_module: Option<CtGovSponsors>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CtGovIdentification {
    pub nct_id: Option<String>,
    pub brief_title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CtGovStatus {
    pub overall_status: Option<String>,
    pub start_date_struct: Option<CtGovDate>,
    pub completion_date_struct: Option<CtGovDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CtGovDate {
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CtGovDesign {
    #[serde(default)]
    pub phases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CtGovSponsors {
    pub lead_sponsor: Option<CtGovSponsor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CtGovSponsor {
    pub name: Option<String>,
}
