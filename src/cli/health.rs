//! `repurpose health`: upstream reachability plus the local pieces the scorer
//! depends on (cache, structural fingerprinting, reports directory).

use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::{Settings, StructuralMode};
use crate::error::RepurposeError;
use crate::scoring::SILDENAFIL_SMILES;
use crate::similarity::FALLBACK_MOLECULAR_SIMILARITY;
use crate::similarity::fingerprint::Fingerprint;
use crate::sources::clinicaltrials::{CTGOV_BASE, CTGOV_BASE_ENV};
use crate::sources::mychem::{MYCHEM_BASE, MYCHEM_BASE_ENV};
use crate::sources::pubchem::{PUBCHEM_BASE, PUBCHEM_BASE_ENV};
use crate::sources::{env_base, join_endpoint};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    /// Deliberately disabled; lookups degrade to fallbacks but nothing is broken.
    Off,
    Error,
}

impl CheckStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Off => "off",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl Check {
    fn new(name: impl Into<String>, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub reference_drug: String,
    pub checks: Vec<Check>,
}

impl HealthReport {
    pub fn failures(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Error)
            .count()
    }

    pub fn all_healthy(&self) -> bool {
        self.failures() == 0
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "# Repurpose Health Check\n\nReference drug: {}\n\n| Check | Status | Detail |\n|-------|--------|--------|\n",
            self.reference_drug
        );
        for check in &self.checks {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                check.name,
                check.status.as_str(),
                check.detail
            ));
        }
        let failures = self.failures();
        if failures == 0 {
            out.push_str("\nAll checks passed; scores use live data.\n");
        } else {
            out.push_str(&format!(
                "\n{failures} of {} checks failed; affected lookups will use fallback values.\n",
                self.checks.len()
            ));
        }
        out
    }
}

fn probe_client() -> Result<reqwest::Client, RepurposeError> {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    if let Some(client) = CLIENT.get() {
        return Ok(client.clone());
    }
    let client = reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("repurpose/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(RepurposeError::HttpClientInit)?;
    Ok(CLIENT.get_or_init(|| client).clone())
}

/// One GET against an upstream; any non-2xx or transport failure is an error row.
async fn probe_upstream(client: &reqwest::Client, name: &str, url: &str) -> Check {
    let start = Instant::now();
    let outcome = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await;
    let ms = start.elapsed().as_millis();

    match outcome {
        Ok(resp) if resp.status().is_success() => Check::new(name, CheckStatus::Ok, format!("{ms}ms")),
        Ok(resp) => Check::new(
            name,
            CheckStatus::Error,
            format!("HTTP {} after {ms}ms", resp.status().as_u16()),
        ),
        Err(err) if err.is_timeout() => Check::new(name, CheckStatus::Error, "timeout"),
        Err(err) if err.is_connect() => Check::new(name, CheckStatus::Error, "unreachable"),
        Err(err) => Check::new(name, CheckStatus::Error, err.to_string()),
    }
}

fn cache_check(settings: &Settings) -> Check {
    if settings.cache_enabled {
        Check::new("Cache", CheckStatus::Ok, "in-process, score TTL 24h")
    } else {
        Check::new("Cache", CheckStatus::Off, "disabled; every lookup hits the upstream")
    }
}

/// Confirms the fingerprint engine can parse the built-in reference structure.
fn structural_check(mode: StructuralMode) -> Check {
    match mode {
        StructuralMode::Constant => Check::new(
            "Structural similarity",
            CheckStatus::Off,
            format!("constant {FALLBACK_MOLECULAR_SIMILARITY}"),
        ),
        StructuralMode::Fingerprint => match Fingerprint::from_smiles(SILDENAFIL_SMILES) {
            Ok(fp) => Check::new(
                "Structural similarity",
                CheckStatus::Ok,
                format!("fingerprint, {} reference features", fp.len()),
            ),
            Err(err) => Check::new("Structural similarity", CheckStatus::Error, err.to_string()),
        },
    }
}

async fn reports_dir_check(dir: &Path) -> Check {
    let name = format!("Reports dir ({})", dir.display());
    let probe = dir.join(format!(".repurpose-health-{}.tmp", std::process::id()));

    let result = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&probe, b"ok").await?;
        tokio::fs::remove_file(&probe).await
    }
    .await;

    match result {
        Ok(()) => Check::new(name, CheckStatus::Ok, "writable"),
        Err(err) => Check::new(name, CheckStatus::Error, format!("{:?}", err.kind())),
    }
}

/// Probes the three upstreams (honouring base URL overrides) and the local
/// scoring setup. With `apis_only`, the reports directory is skipped.
///
/// # Errors
///
/// Returns an error when the probe HTTP client cannot be created.
pub async fn check(settings: &Settings, apis_only: bool) -> Result<HealthReport, RepurposeError> {
    let client = probe_client()?;

    let pubchem = join_endpoint(
        &env_base(PUBCHEM_BASE, PUBCHEM_BASE_ENV),
        "compound/name/aspirin/property/MolecularFormula/JSON",
    );
    let ctgov = format!(
        "{}?query.term=aspirin&pageSize=1",
        join_endpoint(&env_base(CTGOV_BASE, CTGOV_BASE_ENV), "studies")
    );
    let mychem = format!(
        "{}?q=aspirin&size=1",
        join_endpoint(&env_base(MYCHEM_BASE, MYCHEM_BASE_ENV), "query")
    );

    let (pubchem, ctgov, mychem) = tokio::join!(
        probe_upstream(&client, "PubChem", &pubchem),
        probe_upstream(&client, "ClinicalTrials.gov", &ctgov),
        probe_upstream(&client, "MyChem.info", &mychem),
    );

    let mut checks = vec![
        pubchem,
        ctgov,
        mychem,
        cache_check(settings),
        structural_check(settings.structural),
    ];
    if !apis_only {
        checks.push(reports_dir_check(&settings.reports_dir).await);
    }
    Ok(HealthReport {
        reference_drug: settings.reference_drug.clone(),
        checks,
    })
}
