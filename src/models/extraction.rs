//! Structured field extraction output types.

use serde::{Deserialize, Serialize};

/// One extracted field.
///
/// A field that was not found is still present, with no value and
/// confidence 0; required fields are never omitted from the set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub name: String,
    pub value: Option<String>,
    pub confidence: f64,
    /// Index of the OCR region the value was found in. A back-reference,
    /// not ownership: the regions live on the record's OCR output.
    pub source_region: Option<usize>,
}

impl ExtractedField {
    pub fn found(
        name: impl Into<String>,
        value: impl Into<String>,
        confidence: f64,
        source_region: Option<usize>,
    ) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            confidence: confidence.clamp(0.0, 1.0),
            source_region,
        }
    }

    pub fn missing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            confidence: 0.0,
            source_region: None,
        }
    }

    pub fn is_populated(&self) -> bool {
        self.value.is_some()
    }
}

/// The structured field set extracted for a document.
///
/// The field list exactly matches the taxonomy's required fields for
/// `label` (or the generic fallback fields for `unknown`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    /// Label the extraction was conditioned on.
    pub label: String,
    pub fields: Vec<ExtractedField>,
}

impl ExtractionOutcome {
    pub fn field(&self, name: &str) -> Option<&ExtractedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of all fields in the set, in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_shape() {
        let field = ExtractedField::missing("total_amount");
        assert_eq!(field.value, None);
        assert_eq!(field.confidence, 0.0);
        assert_eq!(field.source_region, None);
        assert!(!field.is_populated());
    }

    #[test]
    fn test_field_lookup() {
        let outcome = ExtractionOutcome {
            label: "invoice".to_string(),
            fields: vec![
                ExtractedField::found("invoice_number", "INV-1", 0.9, Some(0)),
                ExtractedField::missing("date"),
            ],
        };
        assert!(outcome.field("invoice_number").unwrap().is_populated());
        assert!(!outcome.field("date").unwrap().is_populated());
        assert!(outcome.field("nope").is_none());
    }
}
