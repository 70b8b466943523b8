//! Runtime settings resolved from `REPURPOSE_*` environment variables and CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REFERENCE_DRUG: &str = "Sildenafil";

const TIMEOUT_ENV: &str = "REPURPOSE_TIMEOUT_SECS";
const STRUCTURAL_ENV: &str = "REPURPOSE_STRUCTURAL";
const REFERENCE_ENV: &str = "REPURPOSE_REFERENCE_DRUG";
const NO_CACHE_ENV: &str = "REPURPOSE_NO_CACHE";
const REPORTS_DIR_ENV: &str = "REPURPOSE_REPORTS_DIR";

/// Which structural-similarity capability the engine is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StructuralMode {
    /// SMILES fingerprint comparison (Tanimoto).
    #[default]
    Fingerprint,
    /// Fixed fallback constant.
    Constant,
}

impl StructuralMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fingerprint" | "tanimoto" => Some(Self::Fingerprint),
            "constant" | "off" | "none" => Some(Self::Constant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Upper bound for a single adapter call, retries included.
    pub timeout: Duration,
    pub structural: StructuralMode,
    pub reference_drug: String,
    pub cache_enabled: bool,
    pub reports_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            structural: StructuralMode::default(),
            reference_drug: DEFAULT_REFERENCE_DRUG.to_string(),
            cache_enabled: true,
            reports_dir: default_reports_dir(),
        }
    }
}

pub(crate) fn env_value(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_flag(var: &str) -> bool {
    env_value(var).is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

pub fn default_reports_dir() -> PathBuf {
    match dirs::cache_dir() {
        Some(dir) => dir.join("repurpose").join("reports"),
        None => std::env::temp_dir().join("repurpose").join("reports"),
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Some(raw) = env_value(TIMEOUT_ENV) {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => settings.timeout = Duration::from_secs(secs),
                _ => warn!(var = TIMEOUT_ENV, value = %raw, "Ignoring invalid timeout"),
            }
        }
        if let Some(raw) = env_value(STRUCTURAL_ENV) {
            match StructuralMode::parse(&raw) {
                Some(mode) => settings.structural = mode,
                None => warn!(var = STRUCTURAL_ENV, value = %raw, "Ignoring unknown structural mode"),
            }
        }
        if let Some(reference) = env_value(REFERENCE_ENV) {
            settings.reference_drug = reference;
        }
        if env_flag(NO_CACHE_ENV) {
            settings.cache_enabled = false;
        }
        if let Some(dir) = env_value(REPORTS_DIR_ENV) {
            settings.reports_dir = PathBuf::from(dir);
        }

        settings
    }

    pub fn with_no_cache(mut self, no_cache: bool) -> Self {
        if no_cache {
            self.cache_enabled = false;
        }
        self
    }

    pub fn with_structural(mut self, mode: Option<StructuralMode>) -> Self {
        if let Some(mode) = mode {
            self.structural = mode;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_mode_parses_aliases() {
        assert_eq!(StructuralMode::parse("Fingerprint"), Some(StructuralMode::Fingerprint));
        assert_eq!(StructuralMode::parse(" off "), Some(StructuralMode::Constant));
        assert_eq!(StructuralMode::parse("rdkit"), None);
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.timeout, Duration::from_secs(10));
        assert_eq!(settings.reference_drug, "Sildenafil");
        assert!(settings.cache_enabled);
        assert!(settings.reports_dir.ends_with("reports"));
    }

    #[test]
    fn cli_overrides_only_apply_when_set() {
        let settings = Settings::default()
            .with_no_cache(false)
            .with_structural(None);
        assert!(settings.cache_enabled);
        assert_eq!(settings.structural, StructuralMode::Fingerprint);

        let settings = settings
            .with_no_cache(true)
            .with_structural(Some(StructuralMode::Constant));
        assert!(!settings.cache_enabled);
        assert_eq!(settings.structural, StructuralMode::Constant);
    }
}
