//! OCR stage: media-type sniffing plus pluggable text recognition.
//!
//! The stage validates the payload before any engine work: the media type
//! is detected from magic bytes and checked against the configured
//! supported set, so structurally wrong input fails fast and terminally.
//! Engine output with no usable region is a recognition failure, which is
//! retryable. Confidence is reported as-is; filtering low-confidence
//! regions is downstream policy.

mod engine;
mod tesseract;

pub use engine::{EngineError, OcrEngine, Recognition};
pub use tesseract::TesseractEngine;

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::models::OcrOutput;

/// Detect the payload's MIME type from its magic bytes.
pub fn detect_media_type(payload: &[u8]) -> Option<&'static str> {
    infer::get(payload).map(|t| t.mime_type())
}

/// The OCR stage.
pub struct OcrStage {
    engine: Arc<dyn OcrEngine>,
    supported_media_types: Vec<String>,
}

impl OcrStage {
    pub fn new(engine: Arc<dyn OcrEngine>, config: &PipelineConfig) -> Self {
        Self {
            engine,
            supported_media_types: config.supported_media_types.clone(),
        }
    }

    pub fn engine(&self) -> &dyn OcrEngine {
        self.engine.as_ref()
    }

    /// Recognize text in a raw payload.
    ///
    /// Fails with `UnsupportedFormat` before the engine is invoked when
    /// the sniffed media type is unknown or not in the supported set, and
    /// with `RecognitionFailure` when the engine produces no region with
    /// any text.
    pub fn recognize(&self, payload: &[u8]) -> Result<OcrOutput, StageError> {
        let media_type = detect_media_type(payload)
            .ok_or_else(|| StageError::UnsupportedFormat("unrecognized content".to_string()))?;

        if !self
            .supported_media_types
            .iter()
            .any(|m| m == media_type)
        {
            return Err(StageError::UnsupportedFormat(media_type.to_string()));
        }

        tracing::debug!(media_type, engine = self.engine.name(), "running ocr");

        let recognition = self
            .engine
            .recognize(payload, media_type)
            .map_err(|e| match e {
                EngineError::Failed(msg) => StageError::RecognitionFailure(msg),
                EngineError::NotAvailable(msg) => StageError::Internal(msg),
                EngineError::Io(e) => StageError::Internal(e.to_string()),
            })?;

        let output = OcrOutput {
            media_type: media_type.to_string(),
            regions: recognition.regions,
            page_count: recognition.page_count,
            engine: self.engine.name().to_string(),
        };

        if !output.has_text() {
            return Err(StageError::RecognitionFailure(
                "no text regions recognized".to_string(),
            ));
        }

        tracing::debug!(
            regions = output.regions.len(),
            mean_confidence = output.mean_confidence(),
            "ocr complete"
        );

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, TextRegion};

    /// Engine returning a fixed region list.
    struct FixedEngine(Vec<TextRegion>);

    impl OcrEngine for FixedEngine {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            "always available".to_string()
        }

        fn recognize(&self, _: &[u8], _: &str) -> Result<Recognition, EngineError> {
            Ok(Recognition::single_page(self.0.clone()))
        }
    }

    /// Engine that panics if invoked, for asserting sniffing short-circuits.
    struct UnreachableEngine;

    impl OcrEngine for UnreachableEngine {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            String::new()
        }

        fn recognize(&self, _: &[u8], _: &str) -> Result<Recognition, EngineError> {
            panic!("engine must not be invoked for unsupported payloads");
        }
    }

    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn png_payload() -> Vec<u8> {
        let mut payload = PNG_MAGIC.to_vec();
        payload.extend_from_slice(b"not really pixels");
        payload
    }

    fn region(text: &str) -> TextRegion {
        TextRegion::new(BoundingBox::new(0, 0, 10, 10), text, 0.9)
    }

    #[test]
    fn test_detects_png() {
        assert_eq!(detect_media_type(&png_payload()), Some("image/png"));
        assert_eq!(detect_media_type(b"plain text here"), None);
    }

    #[test]
    fn test_unsupported_before_engine() {
        let stage = OcrStage::new(Arc::new(UnreachableEngine), &PipelineConfig::default());
        let err = stage.recognize(b"just some plain text").unwrap_err();
        assert!(matches!(err, StageError::UnsupportedFormat(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_type_outside_supported_set() {
        let config = PipelineConfig {
            supported_media_types: vec!["application/pdf".to_string()],
            ..Default::default()
        };
        let stage = OcrStage::new(Arc::new(UnreachableEngine), &config);
        let err = stage.recognize(&png_payload()).unwrap_err();
        assert!(matches!(err, StageError::UnsupportedFormat(m) if m == "image/png"));
    }

    #[test]
    fn test_empty_output_is_recognition_failure() {
        let stage = OcrStage::new(Arc::new(FixedEngine(vec![])), &PipelineConfig::default());
        let err = stage.recognize(&png_payload()).unwrap_err();
        assert!(matches!(err, StageError::RecognitionFailure(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_low_confidence_not_filtered() {
        let stage = OcrStage::new(
            Arc::new(FixedEngine(vec![TextRegion::new(
                BoundingBox::new(0, 0, 10, 10),
                "barely legible",
                0.01,
            )])),
            &PipelineConfig::default(),
        );
        let output = stage.recognize(&png_payload()).unwrap();
        assert_eq!(output.regions.len(), 1);
        assert!(output.regions[0].confidence > 0.0);
    }

    #[test]
    fn test_successful_recognition() {
        let stage = OcrStage::new(
            Arc::new(FixedEngine(vec![region("hello"), region("world")])),
            &PipelineConfig::default(),
        );
        let output = stage.recognize(&png_payload()).unwrap();
        assert_eq!(output.media_type, "image/png");
        assert_eq!(output.engine, "fixed");
        assert_eq!(output.full_text(), "hello\nworld");
    }
}
