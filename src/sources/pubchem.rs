use std::borrow::Cow;

use reqwest::Url;
use serde::Deserialize;

use crate::error::RepurposeError;
use crate::utils::serde::StringOrNumber;

pub(crate) const PUBCHEM_BASE: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";
pub(crate) const PUBCHEM_BASE_ENV: &str = "REPURPOSE_PUBCHEM_BASE";
const PUBCHEM_API: &str = "pubchem";
const PUBCHEM_PROPERTIES: &str =
    "MolecularFormula,MolecularWeight,CanonicalSMILES,IUPACName,InChIKey";

/// Builds `{base}/compound/name/{name}/{tail..}` with the name percent-encoded
/// as a single path segment.
fn compound_url(base: &str, name: &str, tail: &[&str]) -> Result<Url, RepurposeError> {
    let mut url = Url::parse(base).map_err(|err| {
        RepurposeError::InvalidArgument(format!("Invalid PubChem base URL: {err}"))
    })?;
    url.path_segments_mut()
        .map_err(|_| RepurposeError::InvalidArgument("PubChem base URL cannot be a base".into()))?
        .pop_if_empty()
        .extend(["compound", "name", name])
        .extend(tail);
    Ok(url)
}

/// Structure depiction URL for `name`; needs no request, so it is available
/// even when the property lookup fails.
pub(crate) fn compound_image_url(base: &str, name: &str) -> Option<String> {
    compound_url(base, name, &["PNG"]).ok().map(String::from)
}

pub struct PubChemClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: Cow<'static, str>,
}

impl PubChemClient {
    pub fn new() -> Result<Self, RepurposeError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: crate::sources::env_base(PUBCHEM_BASE, PUBCHEM_BASE_ENV),
        })
    }

    pub fn with_base(base: impl Into<String>) -> Result<Self, RepurposeError> {
        Ok(Self {
            client: crate::sources::shared_client()?,
            base: Cow::Owned(base.into()),
        })
    }

    pub fn image_url(&self, name: &str) -> Option<String> {
        compound_image_url(self.base.as_ref(), name)
    }

    pub async fn compound_properties(
        &self,
        name: &str,
    ) -> Result<PubChemProperties, RepurposeError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepurposeError::InvalidArgument(
                "Compound name is required".into(),
            ));
        }

        let url = compound_url(self.base.as_ref(), name, &["property", PUBCHEM_PROPERTIES, "JSON"])?;
        let resp: Option<PubChemPropertyResponse> =
            crate::sources::get_json_opt(PUBCHEM_API, self.client.get(url)).await?;

        resp.and_then(|r| r.property_table.properties.into_iter().next())
            .ok_or_else(|| RepurposeError::NotFound {
                entity: "compound".into(),
                id: name.to_string(),
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PubChemPropertyResponse {
    #[serde(rename = "PropertyTable")]
    property_table: PubChemPropertyTable,
}

#[derive(Debug, Clone, Deserialize)]
struct PubChemPropertyTable {
    #[serde(rename = "Properties", default)]
    properties: Vec<PubChemProperties>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PubChemProperties {
    #[serde(rename = "CID")]
    pub cid: Option<u64>,
    #[serde(rename = "MolecularFormula")]
    pub molecular_formula: Option<String>,
    #[serde(rename = "MolecularWeight")]
    pub molecular_weight: Option<StringOrNumber>,
    #[serde(rename = "CanonicalSMILES")]
    pub canonical_smiles: Option<String>,
    #[serde(rename = "ConnectivitySMILES")]
    pub connectivity_smiles: Option<String>,
    #[serde(rename = "SMILES")]
    pub smiles: Option<String>,
    #[serde(rename = "IUPACName")]
    pub iupac_name: Option<String>,
    #[serde(rename = "InChIKey")]
    pub inchi_key: Option<String>,
}

impl PubChemProperties {
    /// First non-blank SMILES among the legacy and current property names.
    pub fn structure(&self) -> Option<&str> {
        [&self.canonical_smiles, &self.connectivity_smiles, &self.smiles]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty() && !v.eq_ignore_ascii_case("n/a"))
    }
}
