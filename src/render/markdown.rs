use std::sync::OnceLock;

use minijinja::{Environment, context};

use crate::entities::record::{ResultRecord, SearchHit};
use crate::error::RepurposeError;
use crate::scoring::{BASE_WEIGHT, ConfidenceScore, MOLECULAR_WEIGHT, TEXT_WEIGHT};
use crate::similarity::SimilarityPair;

static ENV: OnceLock<Environment<'static>> = OnceLock::new();

fn env() -> Result<&'static Environment<'static>, RepurposeError> {
    if let Some(env) = ENV.get() {
        return Ok(env);
    }

    let mut env = Environment::new();
    env.add_filter("truncate", |s: String, max_bytes: usize| -> String {
        crate::transform::trial::truncate_utf8(&s, max_bytes, "…")
    });
    env.add_filter("phase_short", |phase: String| -> String {
        let parts = phase
            .to_ascii_uppercase()
            .split('/')
            .map(|seg| {
                let seg = seg.trim();
                seg.strip_prefix("PHASE")
                    .unwrap_or(seg)
                    .trim_matches(|c: char| c == '_' || c.is_whitespace())
                    .to_string()
            })
            .filter(|seg| !seg.is_empty() && seg != "-")
            .collect::<Vec<_>>();
        if parts.is_empty() {
            "-".to_string()
        } else {
            parts.join("/")
        }
    });
    env.add_filter("score", |v: f64| -> String { format!("{v:.3}") });
    env.add_template("record.md.j2", include_str!("../../templates/record.md.j2"))?;
    env.add_template("compare.md.j2", include_str!("../../templates/compare.md.j2"))?;
    env.add_template("search.md.j2", include_str!("../../templates/search.md.j2"))?;
    env.add_template("score.md.j2", include_str!("../../templates/score.md.j2"))?;
    env.add_template("report.md.j2", include_str!("../../templates/report.md.j2"))?;

    Ok(ENV.get_or_init(move || env))
}

pub fn record_markdown(record: &ResultRecord) -> Result<String, RepurposeError> {
    let tmpl = env()?.get_template("record.md.j2")?;
    Ok(tmpl.render(context! {
        name => &record.name,
        confidence => record.confidence,
        indication => &record.indication,
        molecular => &record.molecular,
        trials => &record.trials,
        interactions => &record.interactions,
    })?)
}

pub fn compare_markdown(records: &[ResultRecord]) -> Result<String, RepurposeError> {
    let tmpl = env()?.get_template("compare.md.j2")?;
    Ok(tmpl.render(context! { records => records })?)
}

pub fn search_markdown(query: &str, hits: &[SearchHit]) -> Result<String, RepurposeError> {
    let tmpl = env()?.get_template("search.md.j2")?;
    Ok(tmpl.render(context! { query => query.trim(), hits => hits })?)
}

pub fn score_markdown(
    name: &str,
    reference: &str,
    confidence: ConfidenceScore,
    pair: SimilarityPair,
) -> Result<String, RepurposeError> {
    let tmpl = env()?.get_template("score.md.j2")?;
    Ok(tmpl.render(context! {
        name => name.trim(),
        reference => reference,
        confidence => confidence,
        molecular => pair.molecular,
        text => pair.text,
        molecular_weight => MOLECULAR_WEIGHT,
        text_weight => TEXT_WEIGHT,
        base_weight => BASE_WEIGHT,
    })?)
}

pub(crate) fn report_markdown(
    drugs: &[ResultRecord],
    generated_at: &str,
) -> Result<String, RepurposeError> {
    let tmpl = env()?.get_template("report.md.j2")?;
    Ok(tmpl.render(context! { drugs => drugs, generated_at => generated_at })?)
}
