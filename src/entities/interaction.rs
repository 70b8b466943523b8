use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{DrugQuery, Fallback, Source};
use crate::error::RepurposeError;
use crate::sources::mychem::MyChemClient;

/// Hits requested from MyChem per drug; their interaction lists are merged.
const MYCHEM_HIT_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub drug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Interaction {
    fn known(drug: &str, severity: &str, description: &str) -> Self {
        Self {
            drug: drug.to_string(),
            severity: Some(severity.to_string()),
            description: Some(description.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionList(pub Vec<Interaction>);

impl InteractionList {
    pub fn iter(&self) -> std::slice::Iter<'_, Interaction> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Fallback for InteractionList {
    /// Curated interactions for well-known drugs, otherwise two generic entries.
    fn fallback(query: &DrugQuery) -> Self {
        let rows = match query.key() {
            "metformin" => vec![
                Interaction::known(
                    "Contrast agents",
                    "High",
                    "Temporary discontinuation recommended",
                ),
                Interaction::known("Cimetidine", "Moderate", "Increased metformin levels"),
            ],
            "aspirin" => vec![
                Interaction::known("Warfarin", "High", "Increased bleeding risk"),
                Interaction::known("Ibuprofen", "Moderate", "Reduced aspirin effectiveness"),
            ],
            "sildenafil" => vec![
                Interaction::known("Nitrates", "High", "Severe hypotension"),
                Interaction::known("Alpha-blockers", "Moderate", "Increased hypotension risk"),
            ],
            _ => vec![
                Interaction::known("Drug A", "Moderate", "Potential interaction"),
                Interaction::known("Drug B", "Low", "Minor interaction possible"),
            ],
        };
        Self(rows)
    }
}

pub struct MyChemInteractionSource {
    client: MyChemClient,
}

impl MyChemInteractionSource {
    pub fn new() -> Result<Self, RepurposeError> {
        Ok(Self {
            client: MyChemClient::new()?,
        })
    }

    pub fn with_client(client: MyChemClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Source<InteractionList> for MyChemInteractionSource {
    fn api(&self) -> &'static str {
        "mychem.info"
    }

    async fn fetch(&self, query: &DrugQuery) -> Result<InteractionList, RepurposeError> {
        let hits = self
            .client
            .drugbank_by_name(query.key(), MYCHEM_HIT_LIMIT)
            .await?;
        if hits.is_empty() {
            return Err(RepurposeError::NotFound {
                entity: "drug".into(),
                id: query.display().to_string(),
            });
        }
        Ok(crate::transform::interaction::from_mychem_hits(&hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn query(name: &str) -> DrugQuery {
        DrugQuery::parse(name).unwrap()
    }

    #[test]
    fn fallback_uses_curated_table_case_insensitively() {
        let list = InteractionList::fallback(&query("SILDENAFIL"));
        assert_eq!(list.len(), 2);
        assert_eq!(list.0[0].drug, "Nitrates");
        assert_eq!(list.0[0].severity.as_deref(), Some("High"));
    }

    #[test]
    fn fallback_for_unlisted_drug_is_generic() {
        let list = InteractionList::fallback(&query("Unknown123"));
        let drugs: Vec<_> = list.iter().map(|i| i.drug.as_str()).collect();
        assert_eq!(drugs, vec!["Drug A", "Drug B"]);
    }

    #[test]
    fn list_serializes_as_plain_array() {
        let list = InteractionList(vec![Interaction {
            drug: "Warfarin".into(),
            severity: None,
            description: None,
        }]);
        assert_eq!(
            serde_json::to_value(&list).unwrap(),
            serde_json::json!([{"drug": "Warfarin"}])
        );
    }

    #[tokio::test]
    async fn no_hits_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"total": 0, "hits": []})),
            )
            .mount(&server)
            .await;

        let source =
            MyChemInteractionSource::with_client(MyChemClient::with_base(server.uri()).unwrap());
        let err = source.fetch(&query("Unknown123")).await.unwrap_err();
        assert!(matches!(err, RepurposeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn hit_without_interactions_is_an_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hits": [{"_id": "X", "drugbank": {"id": "DB00001", "name": "Lepirudin"}}]
            })))
            .mount(&server)
            .await;

        let source =
            MyChemInteractionSource::with_client(MyChemClient::with_base(server.uri()).unwrap());
        let list = source.fetch(&query("Lepirudin")).await.unwrap();
        assert!(list.is_empty());
    }
}
