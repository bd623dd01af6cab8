//! Rule-based keyword classifier.

use super::Classifier;
use crate::models::{OcrOutput, RankedLabel};
use crate::taxonomy::Taxonomy;

/// Scores each label by the fraction of its keywords present in the
/// lowercased document text.
///
/// Deterministic by construction: scoring is pure, and the ranking sort
/// is stable over taxonomy declaration order, so equal scores resolve to
/// the higher-priority label.
#[derive(Debug, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn score(text: &str, keywords: &[String]) -> f64 {
        if keywords.is_empty() {
            return 0.0;
        }
        let hits = keywords
            .iter()
            .filter(|k| text.contains(k.to_lowercase().as_str()))
            .count();
        hits as f64 / keywords.len() as f64
    }
}

impl Classifier for KeywordClassifier {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn rank(&self, ocr: &OcrOutput, taxonomy: &Taxonomy) -> Vec<RankedLabel> {
        let text = ocr.full_text().to_lowercase();

        // Iterate in declaration (priority) order, then sort stably so
        // ties keep that order.
        let mut ranked: Vec<RankedLabel> = taxonomy
            .labels
            .iter()
            .map(|label| RankedLabel::new(label.name.clone(), Self::score(&text, &label.keywords)))
            .collect();

        ranked.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }
}
