//! docpipe: a document processing pipeline.
//!
//! Uploaded documents flow through three stages: OCR recognizes text
//! regions with geometry and confidence, classification maps the text to
//! one label from a configured taxonomy, and extraction produces the
//! structured field set that label requires. The orchestrator sequences
//! the stages per document, serializes concurrent runs for the same
//! document id, and records failures with a retryable/terminal tag so
//! callers own retry policy.
//!
//! The HTTP layer, persistence, and retry logic live with the caller;
//! this crate exposes `Pipeline::submit`/`get_status`/`get_result` plus
//! the `ByteStore`, `OcrEngine`, and `Classifier` seams to plug them in.

pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod storage;
pub mod taxonomy;

pub use classify::{Classifier, KeywordClassifier};
pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError, PipelineStage, StageError};
pub use models::{
    BoundingBox, ClassificationOutcome, Document, DocumentState, ExtractedField,
    ExtractionOutcome, FailureInfo, OcrOutput, ProcessingRecord, RankedLabel, TextRegion,
};
pub use ocr::{OcrEngine, TesseractEngine};
pub use pipeline::Pipeline;
pub use storage::{ByteStore, FsByteStore, MemoryByteStore};
pub use taxonomy::{Taxonomy, UNKNOWN_LABEL};
