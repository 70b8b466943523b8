use serde::{Deserialize, Serialize};

/// A scalar that upstream APIs send either as a JSON string or a JSON number
/// (PubChem switched `MolecularWeight` from number to string).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl StringOrNumber {
    pub fn to_display(&self) -> Option<String> {
        let value = match self {
            Self::String(value) => value.trim().to_string(),
            Self::Number(value) => value.to_string(),
        };
        Some(value).filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::StringOrNumber;

    #[test]
    fn string_or_number_accepts_both_shapes() {
        let text: StringOrNumber = serde_json::from_str("\"180.16\"").unwrap();
        let number: StringOrNumber = serde_json::from_str("180.16").unwrap();
        assert_eq!(text.to_display().as_deref(), Some("180.16"));
        assert_eq!(number.to_display().as_deref(), Some("180.16"));
    }

    #[test]
    fn blank_string_has_no_display_value() {
        let blank: StringOrNumber = serde_json::from_str("\"  \"").unwrap();
        assert_eq!(blank.to_display(), None);
    }
}
