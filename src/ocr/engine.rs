//! OCR engine abstraction.
//!
//! The stage contract is fixed; the recognition mechanism is pluggable.
//! Engines receive the raw payload plus its sniffed media type and return
//! text regions. Engine warm-up or caching must not be observable to the
//! caller.

use thiserror::Error;

use crate::models::TextRegion;

/// Errors an engine can produce. The OCR stage maps these onto the
/// pipeline's error taxonomy.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine's backing binary or model is not installed.
    #[error("engine not available: {0}")]
    NotAvailable(String),

    /// The engine ran but could not read the payload.
    #[error("recognition failed: {0}")]
    Failed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw engine output before the stage wraps it into `OcrOutput`.
#[derive(Debug, Clone)]
pub struct Recognition {
    /// Regions in reading order.
    pub regions: Vec<TextRegion>,
    /// Page count for paginated formats.
    pub page_count: Option<u32>,
}

impl Recognition {
    pub fn single_page(regions: Vec<TextRegion>) -> Self {
        Self {
            regions,
            page_count: None,
        }
    }
}

/// A recognition backend.
pub trait OcrEngine: Send + Sync {
    /// Short backend name, recorded on OCR output.
    fn name(&self) -> &'static str;

    /// Whether the backend is ready to run.
    fn is_available(&self) -> bool;

    /// Human-readable install hint when `is_available` is false.
    fn availability_hint(&self) -> String;

    /// Recognize text regions in the payload.
    ///
    /// `media_type` is the MIME type sniffed from the payload's magic
    /// bytes; the stage has already verified it is supported. Low
    /// confidence must be reported, never filtered.
    fn recognize(&self, payload: &[u8], media_type: &str) -> Result<Recognition, EngineError>;
}
