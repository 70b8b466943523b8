//! Report artifact written for the report endpoint. The PDF writer consumes
//! the same records elsewhere; this crate produces the Markdown artifact.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::entities::interaction::InteractionList;
use crate::entities::record::ResultRecord;
use crate::error::RepurposeError;

/// Trials and interactions listed per drug.
pub const REPORT_SECTION_LIMIT: usize = 3;

const REPORT_STEM: &str = "drug_repurposing_report";

fn trimmed(record: &ResultRecord) -> ResultRecord {
    let mut record = record.clone();
    record.trials.trials.truncate(REPORT_SECTION_LIMIT);
    record.interactions = InteractionList(
        record
            .interactions
            .iter()
            .take(REPORT_SECTION_LIMIT)
            .cloned()
            .collect(),
    );
    record
}

pub(crate) fn report_body(drugs: &[ResultRecord], generated_at: &str) -> Result<String, RepurposeError> {
    let drugs = drugs.iter().map(trimmed).collect::<Vec<_>>();
    super::markdown::report_markdown(&drugs, generated_at)
}

/// Renders and writes a report for `drugs` under `dir`, returning its path.
pub async fn write_report(dir: &Path, drugs: &[ResultRecord]) -> Result<PathBuf, RepurposeError> {
    if drugs.is_empty() {
        return Err(RepurposeError::InvalidArgument(
            "At least one drug is required for a report".into(),
        ));
    }
    let now = crate::utils::date::now_utc();
    let body = report_body(drugs, &crate::utils::date::rfc3339(now)?)?;
    let stem = format!("{REPORT_STEM}_{}", crate::utils::date::file_stamp(now));
    let path = crate::utils::fs::save_atomic(dir, &stem, "md", &body).await?;
    info!(path = %path.display(), drugs = drugs.len(), "report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::interaction::Interaction;
    use crate::entities::trial::{TrialRecord, TrialsSummary};

    fn record(name: &str, trials: usize, interactions: usize) -> ResultRecord {
        let mut record: ResultRecord =
            serde_json::from_value(serde_json::json!({"name": name, "confidence": 64})).unwrap();
        record.trials = TrialsSummary::from_records(
            (0..trials)
                .map(|i| TrialRecord {
                    id: format!("NCT{i:08}"),
                    title: format!("{name} trial {i}"),
                    status: "COMPLETED".into(),
                    phase: None,
                    start_date: None,
                    completion_date: None,
                    sponsor: None,
                })
                .collect(),
        );
        record.interactions = InteractionList(
            (0..interactions)
                .map(|i| Interaction {
                    drug: format!("Partner {i}"),
                    severity: Some("Moderate".into()),
                    description: None,
                })
                .collect(),
        );
        record
    }

    #[test]
    fn report_lists_at_most_three_trials_and_interactions() {
        let body = report_body(&[record("Aspirin", 5, 4)], "2026-10-16T00:00:00Z").unwrap();
        assert!(body.starts_with("# Drug Repurposing Report"));
        assert!(body.contains("## Aspirin"));
        assert!(body.contains("- Confidence Score: 64%"));
        assert!(body.contains("Total trials: 5"));
        assert!(body.contains("NCT00000002"));
        assert!(!body.contains("NCT00000003"));
        assert!(body.contains("- Partner 2: Moderate - N/A"));
        assert!(!body.contains("Partner 3"));
    }

    #[test]
    fn report_marks_missing_interactions() {
        let body = report_body(&[record("Unknown123", 0, 0)], "now").unwrap();
        assert!(body.contains("Total trials: 0"));
        assert!(body.contains("None reported."));
    }

    #[tokio::test]
    async fn write_report_creates_markdown_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_report(dir.path(), &[record("Metformin", 1, 1)])
            .await
            .unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("drug_repurposing_report_"));
        assert!(name.ends_with(".md"));
        let body = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(body.contains("## Metformin"));
    }

    #[tokio::test]
    async fn write_report_rejects_empty_payload() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_report(dir.path(), &[]).await.unwrap_err();
        assert!(matches!(err, RepurposeError::InvalidArgument(_)));
    }
}
