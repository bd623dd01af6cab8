//! OCR output types: recognized text regions with geometry and confidence.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A single recognized text region.
///
/// Groups geometry, text, and recognition confidence together so callers
/// never juggle parallel vectors. Confidence is reported as-is; filtering
/// low-confidence regions is a downstream policy decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRegion {
    pub bounding_box: BoundingBox,
    pub text: String,
    /// Recognition confidence in [0, 1].
    pub confidence: f64,
}

impl TextRegion {
    /// Create a region, clamping confidence into [0, 1].
    pub fn new(bounding_box: BoundingBox, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            bounding_box,
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Ordered OCR output for one document. Immutable once attached to a
/// processing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrOutput {
    /// MIME type detected from the payload's magic bytes.
    pub media_type: String,
    /// Recognized regions in reading order.
    pub regions: Vec<TextRegion>,
    /// Page count for paginated formats.
    pub page_count: Option<u32>,
    /// Name of the engine that produced this output.
    pub engine: String,
}

impl OcrOutput {
    /// All region text joined with newlines, in reading order.
    pub fn full_text(&self) -> String {
        self.regions
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Mean confidence across regions, 0.0 when empty.
    pub fn mean_confidence(&self) -> f64 {
        if self.regions.is_empty() {
            return 0.0;
        }
        self.regions.iter().map(|r| r.confidence).sum::<f64>() / self.regions.len() as f64
    }

    /// Whether any region carries non-whitespace text.
    pub fn has_text(&self) -> bool {
        self.regions.iter().any(|r| r.has_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(text: &str, confidence: f64) -> TextRegion {
        TextRegion::new(BoundingBox::new(0, 0, 100, 20), text, confidence)
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(region("a", 1.7).confidence, 1.0);
        assert_eq!(region("a", -0.2).confidence, 0.0);
    }

    #[test]
    fn test_full_text_ordering() {
        let out = OcrOutput {
            media_type: "image/png".to_string(),
            regions: vec![region("first", 0.9), region("second", 0.8)],
            page_count: None,
            engine: "test".to_string(),
        };
        assert_eq!(out.full_text(), "first\nsecond");
        assert!((out.mean_confidence() - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_has_text_ignores_whitespace() {
        let out = OcrOutput {
            media_type: "image/png".to_string(),
            regions: vec![region("   ", 0.9)],
            page_count: None,
            engine: "test".to_string(),
        };
        assert!(!out.has_text());
    }
}
