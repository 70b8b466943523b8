use std::borrow::Cow;

use serde::{Deserialize, Deserializer};

use crate::error::RepurposeError;

pub(crate) const MYCHEM_BASE: &str = "https://mychem.info/v1";
pub(crate) const MYCHEM_BASE_ENV: &str = "REPURPOSE_MYCHEM_BASE";
const MYCHEM_API: &str = "mychem.info";

pub(crate) const MYCHEM_FIELDS_INTERACTIONS: &str =
    "_id,_score,drugbank.id,drugbank.name,drugbank.drug_interactions";

fn de_json_vec_or_single<'de, D>(deserializer: D) -> Result<Vec<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(v)) => v,
        Some(serde_json::Value::Null) | None => Vec::new(),
        Some(v) => vec![v],
    })
}

pub struct MyChemClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: Cow<'static, str>,
}

impl MyChemClient {
    pub fn new() -> Result<Self, RepurposeError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: crate::sources::env_base(MYCHEM_BASE, MYCHEM_BASE_ENV),
        })
    }

    pub fn with_base(base: impl Into<String>) -> Result<Self, RepurposeError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: Cow::Owned(base.into()),
        })
    }

    /// Looks a drug up by DrugBank name and returns the best-scoring hits.
    pub async fn drugbank_by_name(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Vec<MyChemHit>, RepurposeError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepurposeError::InvalidArgument("Drug name is required".into()));
        }
        if name.len() > 256 {
            return Err(RepurposeError::InvalidArgument("Drug name is too long.".into()));
        }

        let q = format!(
            "drugbank.name:\"{}\"",
            crate::utils::query::escape_lucene_value(name)
        );
        let url = crate::sources::join_endpoint(self.base.as_ref(), "query");
        let size = limit.clamp(1, 10).to_string();
        let resp: MyChemQueryResponse = crate::sources::get_json(
            MYCHEM_API,
            self.client.get(&url).query(&[
                ("q", q.as_str()),
                ("size", size.as_str()),
                ("fields", MYCHEM_FIELDS_INTERACTIONS),
            ]),
        )
        .await?;

        Ok(resp.hits)
    }
}

#[derive(Debug, Deserialize)]
struct MyChemQueryResponse {
    #[serde(default)]
    hits: Vec<MyChemHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MyChemHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub drugbank: Option<MyChemDrugBank>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MyChemDrugBank {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_json_vec_or_single")]
    pub drug_interactions: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn drugbank_interactions_support_object_and_list() {
        let single: MyChemDrugBank = serde_json::from_value(serde_json::json!({
            "name": "Aspirin",
            "drug_interactions": {"name": "Warfarin", "description": "Bleeding risk"}
        }))
        .unwrap();
        assert_eq!(single.drug_interactions.len(), 1);

        let many: MyChemDrugBank = serde_json::from_value(serde_json::json!({
            "name": "Aspirin",
            "drug_interactions": [{"name": "Warfarin"}, {"name": "Ibuprofen"}]
        }))
        .unwrap();
        assert_eq!(many.drug_interactions.len(), 2);

        let none: MyChemDrugBank =
            serde_json::from_value(serde_json::json!({"name": "Aspirin"})).unwrap();
        assert!(none.drug_interactions.is_empty());
    }

    #[tokio::test]
    async fn drugbank_by_name_queries_exact_name_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("q", "drugbank.name:\"metformin\""))
            .and(query_param("size", "1"))
            .and(query_param("fields", MYCHEM_FIELDS_INTERACTIONS))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": 1,
                "hits": [{
                    "_id": "ZTGEJFUJ",
                    "_score": 14.2,
                    "drugbank": {
                        "id": "DB00331",
                        "name": "Metformin",
                        "drug_interactions": [{"name": "Cimetidine", "description": "Increased metformin levels"}]
                    }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MyChemClient::with_base(server.uri()).unwrap();
        let hits = client.drugbank_by_name("metformin", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        let drugbank = hits[0].drugbank.as_ref().unwrap();
        assert_eq!(drugbank.id.as_deref(), Some("DB00331"));
        assert_eq!(drugbank.drug_interactions.len(), 1);
    }

    #[tokio::test]
    async fn drugbank_by_name_rejects_blank_name() {
        let client = MyChemClient::with_base("http://127.0.0.1").unwrap();
        let err = client.drugbank_by_name(" ", 1).await.unwrap_err();
        assert!(matches!(err, RepurposeError::InvalidArgument(_)));
    }
}
