use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{DrugQuery, Fallback, Source, UNKNOWN};
use crate::error::RepurposeError;
use crate::sources::pubchem::{
    PUBCHEM_BASE, PUBCHEM_BASE_ENV, PubChemClient, compound_image_url,
};

/// Descriptive molecular properties. Fields the upstream could not supply hold
/// [`UNKNOWN`]; scoring reads the structure only through [`MolecularProfile::structure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MolecularProfile {
    pub formula: String,
    pub weight: String,
    /// Canonical SMILES.
    pub identifier: String,
    pub iupac_name: String,
    pub inchi_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Default for MolecularProfile {
    fn default() -> Self {
        Self::unknown()
    }
}

impl MolecularProfile {
    pub fn unknown() -> Self {
        Self {
            formula: UNKNOWN.to_string(),
            weight: UNKNOWN.to_string(),
            identifier: UNKNOWN.to_string(),
            iupac_name: UNKNOWN.to_string(),
            inchi_key: UNKNOWN.to_string(),
            cid: None,
            image_url: None,
        }
    }

    /// Profile carrying only a structure, for reference compounds and tests.
    pub fn from_structure(smiles: &str) -> Self {
        Self {
            identifier: super::known_or_unknown(Some(smiles)),
            ..Self::unknown()
        }
    }

    pub fn structure(&self) -> Option<&str> {
        let id = self.identifier.trim();
        (!id.is_empty() && id != UNKNOWN).then_some(id)
    }

    pub fn is_unknown(&self) -> bool {
        self.structure().is_none() && self.formula == UNKNOWN && self.weight == UNKNOWN
    }
}

impl Fallback for MolecularProfile {
    /// Every field unknown, but the depiction URL is still derived from the name.
    fn fallback(query: &DrugQuery) -> Self {
        let base = crate::sources::env_base(PUBCHEM_BASE, PUBCHEM_BASE_ENV);
        Self {
            image_url: compound_image_url(&base, query.key()),
            ..Self::unknown()
        }
    }
}

pub struct PubChemSource {
    client: PubChemClient,
}

impl PubChemSource {
    pub fn new() -> Result<Self, RepurposeError> {
        Ok(Self {
            client: PubChemClient::new()?,
        })
    }

    pub fn with_client(client: PubChemClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Source<MolecularProfile> for PubChemSource {
    fn api(&self) -> &'static str {
        "pubchem"
    }

    async fn fetch(&self, query: &DrugQuery) -> Result<MolecularProfile, RepurposeError> {
        let props = self.client.compound_properties(query.key()).await?;
        Ok(crate::transform::molecular::from_pubchem(
            &props,
            self.client.image_url(query.key()),
        ))
    }
}
