use crate::entities::trial::TrialRecord;
use crate::sources::clinicaltrials::{CtGovDate, CtGovStudy};

const TITLE_MAX_BYTES: usize = 300;

pub(crate) fn truncate_utf8(s: &str, max_bytes: usize, suffix: &str) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }

    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    let mut out = s[..boundary].trim_end().to_string();
    out.push_str(suffix);
    out
}

fn normalize_phase(phases: &[String]) -> Option<String> {
    let phases = phases
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("NA"))
        .collect::<Vec<_>>();
    if phases.is_empty() {
        return None;
    }
    Some(phases.join("/"))
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn date(value: Option<&CtGovDate>) -> Option<String> {
    clean(value.and_then(|d| d.date.as_deref()))
}

pub fn from_ctgov_study(study: &CtGovStudy) -> TrialRecord {
    let p = &study.protocol_section;
    let ident = p.identification_module.as_ref();
    let status = p.status_module.as_ref();

    let id = clean(ident.and_then(|m| m.nct_id.as_deref())).unwrap_or_default();
    let title = clean(ident.and_then(|m| m.brief_title.as_deref()))
        .map(|t| truncate_utf8(&t, TITLE_MAX_BYTES, "…"))
        .unwrap_or_default();
    let overall = clean(status.and_then(|m| m.overall_status.as_deref()))
        .unwrap_or_else(|| crate::entities::UNKNOWN.to_string());

    TrialRecord {
        id,
        title,
        status: overall,
        phase: p
            .design_module
            .as_ref()
            .and_then(|m| normalize_phase(&m.phases)),
        start_date: date(status.and_then(|m| m.start_date_struct.as_ref())),
        completion_date: date(status.and_then(|m| m.completion_date_struct.as_ref())),
        sponsor: clean(
            p.sponsor_collaborators_module
                .as_ref()
                .and_then(|m| m.lead_sponsor.as_ref())
                .and_then(|s| s.name.as_deref()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn study(value: serde_json::Value) -> CtGovStudy {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn maps_full_protocol_section() {
        let record = from_ctgov_study(&study(serde_json::json!({
            "protocolSection": {
                "identificationModule": {"nctId": "NCT01234567", "briefTitle": " Metformin in Prostate Cancer "},
                "statusModule": {
                    "overallStatus": "RECRUITING",
                    "startDateStruct": {"date": "2021-03"},
                    "completionDateStruct": {"date": "2026-12-31"}
                },
                "designModule": {"phases": ["PHASE2", "PHASE3"]},
                "sponsorCollaboratorsModule": {"leadSponsor": {"name": "NCI"}}
            }
        })));
        assert_eq!(record.id, "NCT01234567");
        assert_eq!(record.title, "Metformin in Prostate Cancer");
        assert_eq!(record.phase.as_deref(), Some("PHASE2/PHASE3"));
        assert_eq!(record.start_date.as_deref(), Some("2021-03"));
        assert_eq!(record.completion_date.as_deref(), Some("2026-12-31"));
        assert_eq!(record.sponsor.as_deref(), Some("NCI"));
    }

    #[test]
    fn missing_modules_leave_optional_fields_empty() {
        let record = from_ctgov_study(&study(serde_json::json!({"protocolSection": {}})));
        assert_eq!(record.id, "");
        assert_eq!(record.status, "unknown");
        assert_eq!(record.phase, None);
        assert_eq!(record.sponsor, None);
    }

    #[test]
    fn not_applicable_phase_is_dropped() {
        assert_eq!(normalize_phase(&["NA".into()]), None);
        assert_eq!(normalize_phase(&["PHASE1".into()]).as_deref(), Some("PHASE1"));
    }

    #[test]
    fn truncate_utf8_respects_char_boundaries() {
        assert_eq!(truncate_utf8("short", 10, "…"), "short");
        assert_eq!(truncate_utf8("αβγδ", 3, "…"), "α…");
    }
}
