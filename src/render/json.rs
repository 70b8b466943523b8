use serde::Serialize;

use crate::error::RepurposeError;

pub fn to_pretty<T: Serialize>(value: &T) -> Result<String, RepurposeError> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::to_pretty;
    use crate::entities::record::SearchHit;
    use crate::scoring::ConfidenceScore;

    #[test]
    fn to_pretty_serializes_with_indentation() {
        let hit = SearchHit {
            name: "Metformin".to_string(),
            confidence: ConfidenceScore::try_from(75u32).unwrap(),
            indication: "New therapeutic use".to_string(),
        };
        let json = to_pretty(&vec![hit]).expect("json");
        assert!(json.contains('\n'));
        assert!(json.contains("\"name\": \"Metformin\""));
        assert!(json.contains("\"confidence\": 75"));
    }
}
