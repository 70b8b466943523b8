use std::collections::HashSet;

use crate::entities::interaction::{Interaction, InteractionList};
use crate::sources::mychem::MyChemHit;

pub(crate) const MAX_INTERACTIONS: usize = 15;

fn json_first_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.trim().to_string()).filter(|v| !v.is_empty()),
        serde_json::Value::Array(arr) => arr.iter().find_map(json_first_string),
        serde_json::Value::Object(obj) => obj.values().find_map(json_first_string),
        _ => None,
    }
}

fn interactions_from_hit(hit: &MyChemHit) -> Vec<Interaction> {
    let Some(drugbank) = hit.drugbank.as_ref() else {
        return Vec::new();
    };

    let mut out: Vec<Interaction> = Vec::new();
    for row in &drugbank.drug_interactions {
        let Some(obj) = row.as_object() else { continue };
        let drug = obj
            .get("name")
            .or_else(|| obj.get("drug"))
            .or_else(|| obj.get("drug_name"))
            .or_else(|| obj.get("drugbank_name"))
            .and_then(json_first_string);
        let Some(drug) = drug else { continue };
        let severity = obj
            .get("severity")
            .or_else(|| obj.get("level"))
            .and_then(json_first_string);
        let description = obj
            .get("description")
            .or_else(|| obj.get("interaction"))
            .or_else(|| obj.get("comment"))
            .and_then(json_first_string);
        out.push(Interaction {
            drug,
            severity,
            description,
        });
    }

    out
}

/// Merges interaction rows across hits, keeping the first occurrence of each
/// partner drug (case-insensitive), in upstream order.
pub fn from_mychem_hits(hits: &[MyChemHit]) -> InteractionList {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<Interaction> = Vec::new();

    for row in hits.iter().flat_map(interactions_from_hit) {
        if !seen.insert(row.drug.to_ascii_lowercase()) {
            continue;
        }
        out.push(row);
        if out.len() >= MAX_INTERACTIONS {
            break;
        }
    }

    InteractionList(out)
}
