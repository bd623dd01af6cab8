//! Error types for pipeline stages and the caller-facing API.
//!
//! Stage failures carry a retryable/terminal tag so callers can decide
//! whether resubmitting a document is worthwhile. The orchestrator never
//! retries on its own.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DocumentState;
use crate::storage::StoreError;

/// Pipeline stage names, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Ocr,
    Classification,
    Extraction,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ocr => "ocr",
            Self::Classification => "classification",
            Self::Extraction => "extraction",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable failure kind, persisted in the processing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    RecognitionFailure,
    InsufficientText,
    InvalidLabel,
    Timeout,
    Internal,
}

impl ErrorKind {
    /// Whether resubmitting the same document could succeed.
    ///
    /// Structurally wrong input (unsupported format, unrecognized label)
    /// is terminal; engine, resource, and timing failures are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UnsupportedFormat | Self::InvalidLabel => false,
            Self::RecognitionFailure | Self::InsufficientText | Self::Timeout | Self::Internal => {
                true
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "unsupported_format",
            Self::RecognitionFailure => "recognition_failure",
            Self::InsufficientText => "insufficient_text",
            Self::InvalidLabel => "invalid_label",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

/// Errors produced by individual pipeline stages.
///
/// Every stage call resolves to a typed result or one of these kinds;
/// stage-internal faults never cross the stage boundary uncaught.
#[derive(Debug, Error)]
pub enum StageError {
    /// The payload's detected media type is not in the supported set.
    #[error("unsupported media type: {0}")]
    UnsupportedFormat(String),

    /// The recognition engine could not produce any usable region.
    #[error("recognition produced no usable output: {0}")]
    RecognitionFailure(String),

    /// Classification requires at least one recognized region.
    #[error("no recognized text to classify")]
    InsufficientText,

    /// The label is not a taxonomy member (not even `unknown`).
    #[error("label not in taxonomy: {0}")]
    InvalidLabel(String),

    /// The stage exceeded its configured time budget.
    #[error("stage timed out after {0:?}")]
    Timeout(Duration),

    /// Unexpected engine or runtime failure within a stage.
    #[error("internal stage error: {0}")]
    Internal(String),
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::RecognitionFailure(_) => ErrorKind::RecognitionFailure,
            Self::InsufficientText => ErrorKind::InsufficientText,
            Self::InvalidLabel(_) => ErrorKind::InvalidLabel,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Errors returned by the pipeline's caller-facing interface.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown document: {0}")]
    NotFound(String),

    #[error("document {id} is not finished processing (state: {state})")]
    NotReady { id: String, state: DocumentState },

    #[error("document {id} failed in {stage}: {message}")]
    Failed {
        id: String,
        stage: PipelineStage,
        kind: ErrorKind,
        retryable: bool,
        message: String,
    },

    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("empty payload")]
    EmptyPayload,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}
