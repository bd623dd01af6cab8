//! Document identity, processing state, and the per-document record.
//!
//! Documents are content-addressed: identity derives from a SHA-256 hash
//! of the payload, so resubmitting the same bytes resolves to the same
//! document rather than a duplicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ErrorKind, PipelineStage, StageError};
use crate::models::{ClassificationOutcome, ExtractionOutcome, OcrOutput};

/// Number of hash hex characters used as the document id.
const ID_PREFIX_LEN: usize = 16;

/// Processing state of a document.
///
/// Transitions run strictly `received → ocr_done → classified → extracted`,
/// with a side transition to `failed` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Received,
    OcrDone,
    Classified,
    Extracted,
    Failed,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::OcrDone => "ocr_done",
            Self::Classified => "classified",
            Self::Extracted => "extracted",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "received" => Some(Self::Received),
            "ocr_done" => Some(Self::OcrDone),
            "classified" => Some(Self::Classified),
            "extracted" => Some(Self::Extracted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Extracted | Self::Failed)
    }
}

impl std::fmt::Display for DocumentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the SHA-256 hash of document content.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Derive a document id from its content.
pub fn document_id(content: &[u8]) -> String {
    content_hash(content)[..ID_PREFIX_LEN].to_string()
}

/// An uploaded document awaiting or undergoing processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Content-derived identifier.
    pub id: String,
    /// Full SHA-256 hash of the payload.
    pub content_hash: String,
    /// Payload size in bytes.
    pub size: u64,
    /// MIME type detected from magic bytes, filled once OCR has run.
    pub media_type: Option<String>,
    /// When the document was submitted.
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    /// Create a document record for a payload.
    pub fn from_content(content: &[u8]) -> Self {
        Self {
            id: document_id(content),
            content_hash: content_hash(content),
            size: content.len() as u64,
            media_type: None,
            ingested_at: Utc::now(),
        }
    }
}

/// Details of a failed stage, recorded on the processing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    /// The stage that failed.
    pub stage: PipelineStage,
    pub kind: ErrorKind,
    /// Whether resubmitting the document could succeed.
    pub retryable: bool,
    pub message: String,
}

impl FailureInfo {
    pub fn from_stage_error(stage: PipelineStage, err: &StageError) -> Self {
        Self {
            stage,
            kind: err.kind(),
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

/// The aggregate record of one document's progress through the pipeline.
///
/// Stage results attach incrementally; the record is terminal on
/// `extracted` or `failed`. State is an explicit tag plus per-stage
/// optional results, so a later stage's output can never exist without
/// the earlier stage's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub document: Document,
    pub state: DocumentState,
    pub ocr: Option<OcrOutput>,
    pub classification: Option<ClassificationOutcome>,
    pub extraction: Option<ExtractionOutcome>,
    pub failure: Option<FailureInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingRecord {
    /// Create a fresh record in the `received` state.
    pub fn new(document: Document) -> Self {
        let now = Utc::now();
        Self {
            document,
            state: DocumentState::Received,
            ocr: None,
            classification: None,
            extraction: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Attach OCR output, advancing `received → ocr_done`.
    pub fn attach_ocr(&mut self, output: OcrOutput) {
        debug_assert_eq!(self.state, DocumentState::Received);
        self.document.media_type = Some(output.media_type.clone());
        self.ocr = Some(output);
        self.state = DocumentState::OcrDone;
        self.touch();
    }

    /// Attach a classification, advancing `ocr_done → classified`.
    pub fn attach_classification(&mut self, outcome: ClassificationOutcome) {
        debug_assert_eq!(self.state, DocumentState::OcrDone);
        debug_assert!(self.ocr.is_some());
        self.classification = Some(outcome);
        self.state = DocumentState::Classified;
        self.touch();
    }

    /// Attach extraction output, advancing `classified → extracted`.
    pub fn attach_extraction(&mut self, outcome: ExtractionOutcome) {
        debug_assert_eq!(self.state, DocumentState::Classified);
        debug_assert!(self.classification.is_some());
        self.extraction = Some(outcome);
        self.state = DocumentState::Extracted;
        self.touch();
    }

    /// Transition to `failed`, recording the cause.
    pub fn fail(&mut self, failure: FailureInfo) {
        debug_assert!(!self.is_terminal());
        self.failure = Some(failure);
        self.state = DocumentState::Failed;
        self.touch();
    }

    /// Clear a retryable failure so a new run can resume.
    ///
    /// The state falls back to the last completed stage; results already
    /// attached are kept. Terminal (non-retryable) failures are left alone.
    pub fn clear_retryable_failure(&mut self) -> bool {
        match &self.failure {
            Some(failure) if failure.retryable => {
                self.failure = None;
                self.state = if self.extraction.is_some() {
                    DocumentState::Extracted
                } else if self.classification.is_some() {
                    DocumentState::Classified
                } else if self.ocr.is_some() {
                    DocumentState::OcrDone
                } else {
                    DocumentState::Received
                };
                self.touch();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, TextRegion};

    fn ocr_output() -> OcrOutput {
        OcrOutput {
            media_type: "image/png".to_string(),
            regions: vec![TextRegion::new(
                BoundingBox::new(0, 0, 100, 20),
                "hello",
                0.9,
            )],
            page_count: None,
            engine: "test".to_string(),
        }
    }

    #[test]
    fn test_content_addressed_id() {
        let a = document_id(b"same bytes");
        let b = document_id(b"same bytes");
        let c = document_id(b"other bytes");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_state_roundtrip() {
        for state in [
            DocumentState::Received,
            DocumentState::OcrDone,
            DocumentState::Classified,
            DocumentState::Extracted,
            DocumentState::Failed,
        ] {
            assert_eq!(DocumentState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(DocumentState::from_str("bogus"), None);
    }

    #[test]
    fn test_record_advances_through_states() {
        let mut record = ProcessingRecord::new(Document::from_content(b"payload"));
        assert_eq!(record.state, DocumentState::Received);

        record.attach_ocr(ocr_output());
        assert_eq!(record.state, DocumentState::OcrDone);
        assert_eq!(record.document.media_type.as_deref(), Some("image/png"));

        record.attach_classification(ClassificationOutcome::new("invoice", 0.8, vec![], "1"));
        assert_eq!(record.state, DocumentState::Classified);

        record.attach_extraction(ExtractionOutcome {
            label: "invoice".to_string(),
            fields: vec![],
        });
        assert_eq!(record.state, DocumentState::Extracted);
        assert!(record.is_terminal());
    }

    #[test]
    fn test_clear_retryable_failure_resumes_from_last_stage() {
        let mut record = ProcessingRecord::new(Document::from_content(b"payload"));
        record.attach_ocr(ocr_output());
        record.fail(FailureInfo {
            stage: PipelineStage::Classification,
            kind: ErrorKind::Timeout,
            retryable: true,
            message: "timed out".to_string(),
        });
        assert_eq!(record.state, DocumentState::Failed);

        assert!(record.clear_retryable_failure());
        assert_eq!(record.state, DocumentState::OcrDone);
        assert!(record.ocr.is_some());
        assert!(record.failure.is_none());
    }

    #[test]
    fn test_terminal_failure_not_cleared() {
        let mut record = ProcessingRecord::new(Document::from_content(b"payload"));
        record.fail(FailureInfo {
            stage: PipelineStage::Ocr,
            kind: ErrorKind::UnsupportedFormat,
            retryable: false,
            message: "text/plain".to_string(),
        });
        assert!(!record.clear_retryable_failure());
        assert_eq!(record.state, DocumentState::Failed);
    }
}
