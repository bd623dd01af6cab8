//! Document type taxonomy: labels, priority order, and extraction fields.
//!
//! The taxonomy is versioned configuration, supplied at pipeline
//! construction and never mutated at runtime. Label declaration order is
//! the priority order used to break classification ties, so it must be
//! stable across runs.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label used when classification is inconclusive. Always a valid label;
/// it is never declared in the taxonomy itself.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Date pattern shared by several default field specs. Matches ISO and
/// US-style dates: 2024-03-15, 2024/03/15, 3/15/2024, 15-03-2024.
const DATE_PATTERN: &str = r"(\d{4}[-/]\d{1,2}[-/]\d{1,2}|\d{1,2}[-/]\d{1,2}[-/]\d{2,4})";

/// A field to extract for a label.
///
/// `pattern` is a regex run against the recognized text; capture group 1
/// (or the whole match) becomes the field value. A spec with no pattern
/// captures the entire recognized text, which is how the generic
/// `free_text` fallback works.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub pattern: Option<String>,
}

impl FieldSpec {
    pub fn new(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: Some(pattern.to_string()),
        }
    }

    pub fn whole_text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: None,
        }
    }
}

/// One document type in the taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelSpec {
    pub name: String,
    /// Lowercase phrases whose presence in the text votes for this label.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Fields every extraction for this label must produce.
    #[serde(default)]
    pub required_fields: Vec<FieldSpec>,
}

/// The full, versioned taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxonomy {
    pub version: String,
    /// Declaration order is the priority order for tie-breaking.
    pub labels: Vec<LabelSpec>,
    /// Generic field set used when the label is `unknown`.
    #[serde(default)]
    pub fallback_fields: Vec<FieldSpec>,
}

/// Taxonomy configuration problems detected at construction.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("taxonomy version must not be empty")]
    EmptyVersion,

    #[error("duplicate label: {0}")]
    DuplicateLabel(String),

    #[error("label `{0}` is reserved")]
    ReservedLabel(String),

    #[error("invalid pattern for field `{field}`: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },
}

impl Taxonomy {
    /// Whether `label` is valid input for extraction (`unknown` included).
    pub fn is_valid_label(&self, label: &str) -> bool {
        label == UNKNOWN_LABEL || self.get(label).is_some()
    }

    /// Look up a declared label.
    pub fn get(&self, label: &str) -> Option<&LabelSpec> {
        self.labels.iter().find(|l| l.name == label)
    }

    /// Priority rank for tie-breaking: lower wins. `unknown` ranks last.
    pub fn priority(&self, label: &str) -> usize {
        self.labels
            .iter()
            .position(|l| l.name == label)
            .unwrap_or(self.labels.len())
    }

    /// The field specs extraction must produce for `label`.
    ///
    /// Returns `None` when the label is not a taxonomy member at all.
    pub fn fields_for(&self, label: &str) -> Option<&[FieldSpec]> {
        if label == UNKNOWN_LABEL {
            return Some(&self.fallback_fields);
        }
        self.get(label).map(|l| l.required_fields.as_slice())
    }

    /// Validate version, label uniqueness, and field patterns.
    pub fn validate(&self) -> Result<(), TaxonomyError> {
        if self.version.trim().is_empty() {
            return Err(TaxonomyError::EmptyVersion);
        }

        let mut seen = std::collections::HashSet::new();
        for label in &self.labels {
            if label.name == UNKNOWN_LABEL {
                return Err(TaxonomyError::ReservedLabel(label.name.clone()));
            }
            if !seen.insert(label.name.as_str()) {
                return Err(TaxonomyError::DuplicateLabel(label.name.clone()));
            }
        }

        let all_fields = self
            .labels
            .iter()
            .flat_map(|l| l.required_fields.iter())
            .chain(self.fallback_fields.iter());
        for field in all_fields {
            if let Some(pattern) = &field.pattern {
                Regex::new(pattern).map_err(|source| TaxonomyError::InvalidPattern {
                    field: field.name.clone(),
                    source,
                })?;
            }
        }

        Ok(())
    }
}

impl Default for Taxonomy {
    /// The built-in taxonomy: the document types the keyword classifier
    /// can separate with rule-based matching. Deployments with different
    /// document mixes override this from configuration.
    fn default() -> Self {
        Self {
            version: "2024.1".to_string(),
            labels: vec![
                LabelSpec {
                    name: "invoice".to_string(),
                    keywords: vec![
                        "invoice".to_string(),
                        "bill to".to_string(),
                        "amount due".to_string(),
                        "total".to_string(),
                    ],
                    required_fields: vec![
                        FieldSpec::new(
                            "invoice_number",
                            r"(?i)(?:invoice|inv)\.?\s*(?:no\.?|number|#)?\s*[:#]?\s*([A-Z0-9][A-Z0-9-]{2,})",
                        ),
                        FieldSpec::new("date", DATE_PATTERN),
                        FieldSpec::new(
                            "total_amount",
                            r"(?i)(?:total|amount due|balance)\s*:?\s*[$€£]?\s*([\d,]+\.\d{2}|[\d,]+)",
                        ),
                    ],
                },
                LabelSpec {
                    name: "receipt".to_string(),
                    keywords: vec![
                        "receipt".to_string(),
                        "payment".to_string(),
                        "thank you for your purchase".to_string(),
                        "change due".to_string(),
                    ],
                    required_fields: vec![
                        FieldSpec::new("date", DATE_PATTERN),
                        FieldSpec::new(
                            "total_amount",
                            r"(?i)(?:total|amount)\s*:?\s*[$€£]?\s*([\d,]+\.\d{2}|[\d,]+)",
                        ),
                        FieldSpec::new(
                            "payment_method",
                            r"(?i)\b(cash|credit|debit|visa|mastercard|amex|check)\b",
                        ),
                    ],
                },
                LabelSpec {
                    name: "contract".to_string(),
                    keywords: vec![
                        "agreement".to_string(),
                        "contract".to_string(),
                        "terms and conditions".to_string(),
                        "hereinafter".to_string(),
                    ],
                    required_fields: vec![
                        FieldSpec::new("effective_date", DATE_PATTERN),
                        FieldSpec::new(
                            "parties",
                            r"(?i)between\s+(.{3,80}?)\s+and\b",
                        ),
                    ],
                },
                LabelSpec {
                    name: "resume".to_string(),
                    keywords: vec![
                        "experience".to_string(),
                        "education".to_string(),
                        "skills".to_string(),
                        "curriculum vitae".to_string(),
                    ],
                    required_fields: vec![
                        FieldSpec::new(
                            "email",
                            r"([A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,})",
                        ),
                        FieldSpec::new("phone", r"(\+?\d[\d\s().-]{7,}\d)"),
                    ],
                },
            ],
            fallback_fields: vec![
                FieldSpec::new("document_date", DATE_PATTERN),
                FieldSpec::whole_text("free_text"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_taxonomy_validates() {
        Taxonomy::default().validate().unwrap();
    }

    #[test]
    fn test_priority_follows_declaration_order() {
        let taxonomy = Taxonomy::default();
        assert!(taxonomy.priority("invoice") < taxonomy.priority("receipt"));
        assert!(taxonomy.priority("receipt") < taxonomy.priority("contract"));
        // Unknown ranks behind every declared label.
        assert_eq!(taxonomy.priority(UNKNOWN_LABEL), taxonomy.labels.len());
    }

    #[test]
    fn test_unknown_is_valid_but_not_declared() {
        let taxonomy = Taxonomy::default();
        assert!(taxonomy.is_valid_label(UNKNOWN_LABEL));
        assert!(taxonomy.get(UNKNOWN_LABEL).is_none());
        assert!(!taxonomy.is_valid_label("memo"));
    }

    #[test]
    fn test_fields_for_unknown_returns_fallback() {
        let taxonomy = Taxonomy::default();
        let fields = taxonomy.fields_for(UNKNOWN_LABEL).unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["document_date", "free_text"]);
        assert!(taxonomy.fields_for("memo").is_none());
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut taxonomy = Taxonomy::default();
        taxonomy.labels.push(LabelSpec {
            name: "invoice".to_string(),
            keywords: vec![],
            required_fields: vec![],
        });
        assert!(matches!(
            taxonomy.validate(),
            Err(TaxonomyError::DuplicateLabel(_))
        ));
    }

    #[test]
    fn test_reserved_label_rejected() {
        let mut taxonomy = Taxonomy::default();
        taxonomy.labels.push(LabelSpec {
            name: UNKNOWN_LABEL.to_string(),
            keywords: vec![],
            required_fields: vec![],
        });
        assert!(matches!(
            taxonomy.validate(),
            Err(TaxonomyError::ReservedLabel(_))
        ));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let mut taxonomy = Taxonomy::default();
        taxonomy.fallback_fields.push(FieldSpec::new("broken", r"(["));
        assert!(matches!(
            taxonomy.validate(),
            Err(TaxonomyError::InvalidPattern { .. })
        ));
    }
}
