//! Extraction stage: structured fields conditioned on a document label.
//!
//! Each label owns a field-extraction strategy, but every strategy
//! returns the same shape: the taxonomy's field list for that label,
//! complete, with unfound fields present at confidence 0. `unknown` is a
//! first-class input; inconclusive classification never fails
//! extraction, it just narrows the field set to the generic fallback.

mod strategy;

pub use strategy::FieldStrategy;

use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::models::{ExtractionOutcome, OcrOutput};
use crate::taxonomy::Taxonomy;

/// The extraction stage.
pub struct ExtractionStage {
    taxonomy: Taxonomy,
}

impl ExtractionStage {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            taxonomy: config.taxonomy.clone(),
        }
    }

    /// Extract the field set for `label` from OCR output.
    ///
    /// Fails with `InvalidLabel` only when the label is not a taxonomy
    /// member at all (`unknown` included).
    pub fn extract(&self, ocr: &OcrOutput, label: &str) -> Result<ExtractionOutcome, StageError> {
        let strategy = FieldStrategy::for_label(&self.taxonomy, label)?;
        let fields = strategy.extract(ocr);

        tracing::debug!(
            label,
            fields = fields.len(),
            populated = fields.iter().filter(|f| f.is_populated()).count(),
            "extraction complete"
        );

        Ok(ExtractionOutcome {
            label: label.to_string(),
            fields,
        })
    }
}
