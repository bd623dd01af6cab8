//! Per-label field extraction strategies.

use regex::Regex;

use crate::error::StageError;
use crate::models::{ExtractedField, OcrOutput};
use crate::taxonomy::{FieldSpec, Taxonomy, UNKNOWN_LABEL};

/// A field spec with its pattern compiled. `None` means the field
/// captures the whole recognized text.
#[derive(Debug)]
struct CompiledField {
    name: String,
    pattern: Option<Regex>,
}

/// Region text joined into one searchable string, with the byte span each
/// region occupies so matches can be traced back to their source region.
struct JoinedText {
    text: String,
    spans: Vec<(usize, usize)>,
}

impl JoinedText {
    fn build(ocr: &OcrOutput) -> Self {
        let mut text = String::new();
        let mut spans = Vec::with_capacity(ocr.regions.len());

        for (idx, region) in ocr.regions.iter().enumerate() {
            if idx > 0 {
                text.push('\n');
            }
            let start = text.len();
            text.push_str(&region.text);
            spans.push((start, text.len()));
        }

        Self { text, spans }
    }

    /// Index of the region containing the byte offset.
    fn region_at(&self, offset: usize) -> Option<usize> {
        self.spans
            .iter()
            .position(|(start, end)| (*start..=*end).contains(&offset))
    }
}

/// A compiled set of field matchers for one label.
#[derive(Debug)]
pub struct PatternSet {
    fields: Vec<CompiledField>,
}

impl PatternSet {
    fn compile(specs: &[FieldSpec]) -> Result<Self, StageError> {
        let fields = specs
            .iter()
            .map(|spec| {
                let pattern = spec
                    .pattern
                    .as_deref()
                    .map(Regex::new)
                    .transpose()
                    .map_err(|e| {
                        StageError::Internal(format!("field `{}` pattern: {e}", spec.name))
                    })?;
                Ok(CompiledField {
                    name: spec.name.clone(),
                    pattern,
                })
            })
            .collect::<Result<Vec<_>, StageError>>()?;
        Ok(Self { fields })
    }

    /// Extract every field in the set.
    ///
    /// The returned list matches the spec list exactly, in order; fields
    /// without a match are present with no value at confidence 0. A found
    /// value's confidence is the OCR confidence of its source region.
    fn extract(&self, ocr: &OcrOutput) -> Vec<ExtractedField> {
        let joined = JoinedText::build(ocr);

        self.fields
            .iter()
            .map(|field| match &field.pattern {
                Some(regex) => match regex.captures(&joined.text) {
                    Some(caps) => {
                        let m = caps.get(1).or_else(|| caps.get(0));
                        match m {
                            Some(m) if !m.as_str().trim().is_empty() => {
                                let region = joined.region_at(m.start());
                                let confidence = region
                                    .and_then(|idx| ocr.regions.get(idx))
                                    .map(|r| r.confidence)
                                    .unwrap_or(0.0);
                                ExtractedField::found(
                                    &field.name,
                                    m.as_str().trim(),
                                    confidence,
                                    region,
                                )
                            }
                            _ => ExtractedField::missing(&field.name),
                        }
                    }
                    None => ExtractedField::missing(&field.name),
                },
                None => {
                    // Whole-text capture spans every region; confidence is
                    // the mean across them.
                    let trimmed = joined.text.trim();
                    if trimmed.is_empty() {
                        ExtractedField::missing(&field.name)
                    } else {
                        ExtractedField::found(&field.name, trimmed, ocr.mean_confidence(), None)
                    }
                }
            })
            .collect()
    }
}

/// The extraction strategy for a label: a closed set dispatched by label
/// value, all returning through the same field-set shape.
#[derive(Debug)]
pub enum FieldStrategy {
    /// Regex field matchers compiled from a declared label's specs.
    Patterns(PatternSet),
    /// The generic fallback set used for `unknown` documents.
    Generic(PatternSet),
}

impl FieldStrategy {
    /// Resolve the strategy for a label.
    ///
    /// `unknown` is valid and resolves to the generic strategy; a label
    /// absent from the taxonomy entirely is `InvalidLabel`.
    pub fn for_label(taxonomy: &Taxonomy, label: &str) -> Result<Self, StageError> {
        if label == UNKNOWN_LABEL {
            return Ok(Self::Generic(PatternSet::compile(
                &taxonomy.fallback_fields,
            )?));
        }
        match taxonomy.fields_for(label) {
            Some(specs) => Ok(Self::Patterns(PatternSet::compile(specs)?)),
            None => Err(StageError::InvalidLabel(label.to_string())),
        }
    }

    pub fn extract(&self, ocr: &OcrOutput) -> Vec<ExtractedField> {
        match self {
            Self::Patterns(set) | Self::Generic(set) => set.extract(ocr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, TextRegion};

    fn ocr(lines: &[(&str, f64)]) -> OcrOutput {
        OcrOutput {
            media_type: "image/png".to_string(),
            regions: lines
                .iter()
                .map(|(text, conf)| {
                    TextRegion::new(BoundingBox::new(0, 0, 100, 16), *text, *conf)
                })
                .collect(),
            page_count: None,
            engine: "test".to_string(),
        }
    }

    #[test]
    fn test_match_maps_to_source_region() {
        let set = PatternSet::compile(&[FieldSpec::new("total", r"Total:\s*\$([\d.]+)")]).unwrap();
        let output = ocr(&[("Header line", 0.5), ("Total: $12.50", 0.87)]);
        let fields = set.extract(&output);

        assert_eq!(fields[0].value.as_deref(), Some("12.50"));
        assert_eq!(fields[0].source_region, Some(1));
        assert_eq!(fields[0].confidence, 0.87);
    }

    #[test]
    fn test_missing_field_present_at_zero() {
        let set = PatternSet::compile(&[FieldSpec::new("total", r"Total:\s*\$([\d.]+)")]).unwrap();
        let fields = set.extract(&ocr(&[("no amounts here", 0.9)]));

        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "total");
        assert_eq!(fields[0].value, None);
        assert_eq!(fields[0].confidence, 0.0);
    }

    #[test]
    fn test_whole_text_field() {
        let set = PatternSet::compile(&[FieldSpec::whole_text("free_text")]).unwrap();
        let fields = set.extract(&ocr(&[("line one", 0.8), ("line two", 0.6)]));

        assert_eq!(fields[0].value.as_deref(), Some("line one\nline two"));
        assert_eq!(fields[0].source_region, None);
        assert!((fields[0].confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_resolves_to_generic() {
        let taxonomy = Taxonomy::default();
        let strategy = FieldStrategy::for_label(&taxonomy, UNKNOWN_LABEL).unwrap();
        assert!(matches!(strategy, FieldStrategy::Generic(_)));
    }

    #[test]
    fn test_unrecognized_label_invalid() {
        let taxonomy = Taxonomy::default();
        let err = FieldStrategy::for_label(&taxonomy, "memo").unwrap_err();
        assert!(matches!(err, StageError::InvalidLabel(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_field_order_matches_specs() {
        let set = PatternSet::compile(&[
            FieldSpec::new("b", r"(beta)"),
            FieldSpec::new("a", r"(alpha)"),
        ])
        .unwrap();
        let fields = set.extract(&ocr(&[("alpha beta", 0.9)]));
        assert_eq!(fields[0].name, "b");
        assert_eq!(fields[1].name, "a");
    }
}
