//! Data models for the document processing pipeline.

mod classification;
mod document;
mod extraction;
mod ocr;

pub use classification::{ClassificationOutcome, RankedLabel};
pub use document::{
    content_hash, document_id, Document, DocumentState, FailureInfo, ProcessingRecord,
};
pub use extraction::{ExtractedField, ExtractionOutcome};
pub use ocr::{BoundingBox, OcrOutput, TextRegion};
