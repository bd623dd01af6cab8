//! Classification stage: map OCR output to one taxonomy label.
//!
//! The decision mechanism is pluggable behind `Classifier`; the stage
//! fixes the contract: at least one region in, a full ranking out, ties
//! broken by taxonomy priority, and sub-threshold confidence resolving to
//! `unknown` rather than an error.

mod keyword;

pub use keyword::KeywordClassifier;

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::models::{ClassificationOutcome, OcrOutput, RankedLabel};
use crate::taxonomy::{Taxonomy, UNKNOWN_LABEL};

/// A classification mechanism.
///
/// Implementations score every declared taxonomy label against the OCR
/// output and return the full ranking, best first. Ranking must be
/// deterministic for identical input and taxonomy; the stage relies on
/// declaration order surviving stable sorts for tie-breaking.
pub trait Classifier: Send + Sync {
    /// Short mechanism name for logging.
    fn name(&self) -> &'static str;

    /// Rank all declared labels against the OCR output, best first.
    fn rank(&self, ocr: &OcrOutput, taxonomy: &Taxonomy) -> Vec<RankedLabel>;
}

/// The classification stage.
pub struct ClassificationStage {
    classifier: Arc<dyn Classifier>,
    taxonomy: Taxonomy,
    confidence_threshold: f64,
}

impl ClassificationStage {
    pub fn new(classifier: Arc<dyn Classifier>, config: &PipelineConfig) -> Self {
        Self {
            classifier,
            taxonomy: config.taxonomy.clone(),
            confidence_threshold: config.confidence_threshold,
        }
    }

    /// Classify OCR output into a taxonomy label.
    ///
    /// Fails with `InsufficientText` when there are no regions. A top
    /// confidence below the threshold is not an error: the outcome is
    /// `unknown` at that confidence, a valid terminal classification.
    pub fn classify(&self, ocr: &OcrOutput) -> Result<ClassificationOutcome, StageError> {
        if ocr.regions.is_empty() {
            return Err(StageError::InsufficientText);
        }

        let ranked = self.classifier.rank(ocr, &self.taxonomy);
        let version = self.taxonomy.version.clone();

        let outcome = if ranked.is_empty() {
            ClassificationOutcome::new(UNKNOWN_LABEL, 0.0, vec![], version)
        } else {
            let best_confidence = ranked[0].confidence;
            if best_confidence >= self.confidence_threshold {
                let best_label = ranked[0].label.clone();
                ClassificationOutcome::new(
                    best_label,
                    best_confidence,
                    ranked[1..].to_vec(),
                    version,
                )
            } else {
                // Below threshold the whole ranking, best included, is
                // kept as runner-ups under the unknown outcome.
                ClassificationOutcome::new(UNKNOWN_LABEL, best_confidence, ranked, version)
            }
        };

        tracing::debug!(
            label = %outcome.label,
            confidence = outcome.confidence,
            mechanism = self.classifier.name(),
            "classification complete"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, TextRegion};

    fn ocr_with_text(text: &str) -> OcrOutput {
        OcrOutput {
            media_type: "image/png".to_string(),
            regions: text
                .lines()
                .map(|l| TextRegion::new(BoundingBox::new(0, 0, 100, 16), l, 0.9))
                .collect(),
            page_count: None,
            engine: "test".to_string(),
        }
    }

    fn stage() -> ClassificationStage {
        ClassificationStage::new(
            Arc::new(KeywordClassifier::new()),
            &PipelineConfig::default(),
        )
    }

    #[test]
    fn test_empty_regions_is_insufficient_text() {
        let ocr = OcrOutput {
            media_type: "image/png".to_string(),
            regions: vec![],
            page_count: None,
            engine: "test".to_string(),
        };
        assert!(matches!(
            stage().classify(&ocr),
            Err(StageError::InsufficientText)
        ));
    }

    #[test]
    fn test_any_region_never_insufficient() {
        // A single region, even meaningless, must classify (to unknown).
        let outcome = stage().classify(&ocr_with_text("zzzz")).unwrap();
        assert_eq!(outcome.label, UNKNOWN_LABEL);
    }

    #[test]
    fn test_invoice_text_classifies_as_invoice() {
        let outcome = stage()
            .classify(&ocr_with_text(
                "Invoice No: INV-2041\nBill To: Wayne Enterprises\nTotal: $1,249.50",
            ))
            .unwrap();
        assert_eq!(outcome.label, "invoice");
        assert!(outcome.confidence >= 0.35);
    }

    #[test]
    fn test_sub_threshold_yields_unknown_with_confidence() {
        // One weak keyword hit out of four stays below the threshold.
        let outcome = stage()
            .classify(&ocr_with_text("the total eclipse of the heart"))
            .unwrap();
        assert_eq!(outcome.label, UNKNOWN_LABEL);
        assert!(outcome.confidence > 0.0);
        assert!(outcome.confidence < 0.35);
    }

    #[test]
    fn test_runner_ups_non_increasing() {
        let outcome = stage()
            .classify(&ocr_with_text(
                "Invoice total payment agreement experience education",
            ))
            .unwrap();
        let mut prev = outcome.confidence;
        for runner_up in &outcome.runner_ups {
            assert!(runner_up.confidence <= prev);
            prev = runner_up.confidence;
        }
    }

    #[test]
    fn test_deterministic() {
        let ocr = ocr_with_text("Invoice No: 1\nTotal: $5.00");
        let stage = stage();
        let a = stage.classify(&ocr).unwrap();
        let b = stage.classify(&ocr).unwrap();
        assert_eq!(a.label, b.label);
        assert_eq!(a.confidence, b.confidence);
    }
}
