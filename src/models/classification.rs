//! Classification output types.

use serde::{Deserialize, Serialize};

/// A label with its classification confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedLabel {
    pub label: String,
    pub confidence: f64,
}

impl RankedLabel {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Result of classifying a document's OCR output.
///
/// Runner-up confidences are non-increasing: the constructor stably sorts
/// by confidence, so ties keep the order the classifier ranked them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    /// The chosen label. `unknown` is a valid terminal classification.
    pub label: String,
    pub confidence: f64,
    /// Remaining candidates, best first.
    pub runner_ups: Vec<RankedLabel>,
    /// Taxonomy version this outcome was produced against.
    pub taxonomy_version: String,
}

impl ClassificationOutcome {
    pub fn new(
        label: impl Into<String>,
        confidence: f64,
        mut runner_ups: Vec<RankedLabel>,
        taxonomy_version: impl Into<String>,
    ) -> Self {
        runner_ups.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            runner_ups,
            taxonomy_version: taxonomy_version.into(),
        }
    }
}
