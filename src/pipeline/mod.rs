//! Pipeline orchestrator.
//!
//! Sequences OCR, classification, and extraction per document. Distinct
//! documents process concurrently with no shared mutable state; runs for
//! the same document id serialize behind a per-id lock. Within one run
//! stages execute strictly in order, each consuming the previous stage's
//! output, and a failure records the stage and error kind, then stops.
//! The orchestrator never retries; the retryable tag on the recorded
//! failure is the caller's signal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::classify::{ClassificationStage, Classifier};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineStage, StageError};
use crate::extract::ExtractionStage;
use crate::models::{Document, DocumentState, ExtractionOutcome, FailureInfo, ProcessingRecord};
use crate::ocr::{OcrEngine, OcrStage};
use crate::storage::ByteStore;

/// Per-document arena entry.
///
/// Each document id gets its own record lock, run lock, and cancellation
/// flag, so cross-document parallelism never contends on a global lock.
struct DocEntry {
    record: Mutex<ProcessingRecord>,
    run_lock: tokio::sync::Mutex<()>,
    cancel: AtomicBool,
}

impl DocEntry {
    fn new(document: Document) -> Self {
        Self {
            record: Mutex::new(ProcessingRecord::new(document)),
            run_lock: tokio::sync::Mutex::new(()),
            cancel: AtomicBool::new(false),
        }
    }

    fn record(&self) -> std::sync::MutexGuard<'_, ProcessingRecord> {
        self.record.lock().expect("record lock poisoned")
    }
}

struct PipelineInner {
    config: PipelineConfig,
    store: Arc<dyn ByteStore>,
    ocr: Arc<OcrStage>,
    classification: ClassificationStage,
    extraction: Arc<ExtractionStage>,
    entries: Mutex<HashMap<String, Arc<DocEntry>>>,
}

/// The document processing pipeline.
///
/// Cheap to clone; clones share the same document arena and stages.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        engine: Arc<dyn OcrEngine>,
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn ByteStore>,
    ) -> Self {
        let ocr = Arc::new(OcrStage::new(engine, &config));
        let classification = ClassificationStage::new(classifier, &config);
        let extraction = Arc::new(ExtractionStage::new(&config));
        Self {
            inner: Arc::new(PipelineInner {
                config,
                store,
                ocr,
                classification,
                extraction,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// The OCR engine behind the pipeline, for availability checks.
    pub fn engine(&self) -> &dyn OcrEngine {
        self.inner.ocr.engine()
    }

    fn entry(&self, id: &str) -> Option<Arc<DocEntry>> {
        self.inner
            .entries
            .lock()
            .expect("entry arena lock poisoned")
            .get(id)
            .cloned()
    }

    /// Validate and store a payload, creating (or revisiting) its record.
    async fn ingest(&self, payload: &[u8]) -> Result<String, PipelineError> {
        if payload.is_empty() {
            return Err(PipelineError::EmptyPayload);
        }
        let limit = self.inner.config.max_payload_bytes;
        if payload.len() as u64 > limit {
            return Err(PipelineError::PayloadTooLarge {
                size: payload.len() as u64,
                limit,
            });
        }

        let document = Document::from_content(payload);
        let id = document.id.clone();
        self.inner.store.save(&id, payload).await?;

        let entry = {
            let mut entries = self
                .inner
                .entries
                .lock()
                .expect("entry arena lock poisoned");
            entries
                .entry(id.clone())
                .or_insert_with(|| Arc::new(DocEntry::new(document)))
                .clone()
        };

        // A fresh submission supersedes any earlier cancellation request.
        entry.cancel.store(false, Ordering::SeqCst);

        // Resubmission after a retryable failure clears it so the next
        // run resumes from the last completed stage. Terminal failures
        // stay put: the input itself is wrong.
        if entry.record().clear_retryable_failure() {
            tracing::info!(document_id = %id, "cleared retryable failure on resubmission");
        }

        Ok(id)
    }

    /// Enqueue processing and return immediately with the document id.
    pub async fn submit(&self, payload: &[u8]) -> Result<String, PipelineError> {
        let id = self.ingest(payload).await?;
        let pipeline = self.clone();
        let run_id = id.clone();
        tokio::spawn(async move {
            pipeline.run(&run_id).await;
        });
        Ok(id)
    }

    /// Submit and wait for the run to finish, returning the final record.
    pub async fn process(&self, payload: &[u8]) -> Result<ProcessingRecord, PipelineError> {
        let id = self.ingest(payload).await?;
        self.run(&id).await;
        self.get_status(&id)
    }

    /// Current processing record for a document.
    pub fn get_status(&self, id: &str) -> Result<ProcessingRecord, PipelineError> {
        let entry = self
            .entry(id)
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))?;
        let record = entry.record().clone();
        Ok(record)
    }

    /// Extraction result for a fully processed document.
    pub fn get_result(&self, id: &str) -> Result<ExtractionOutcome, PipelineError> {
        let record = self.get_status(id)?;
        match (record.state, record.extraction, record.failure) {
            (DocumentState::Extracted, Some(extraction), _) => Ok(extraction),
            (DocumentState::Failed, _, Some(failure)) => Err(PipelineError::Failed {
                id: id.to_string(),
                stage: failure.stage,
                kind: failure.kind,
                retryable: failure.retryable,
                message: failure.message,
            }),
            (state, _, _) => Err(PipelineError::NotReady {
                id: id.to_string(),
                state,
            }),
        }
    }

    /// Request cooperative cancellation of the document's active run.
    ///
    /// Takes effect between stage boundaries: a stage already executing
    /// completes and its result is kept.
    pub fn cancel(&self, id: &str) -> Result<(), PipelineError> {
        let entry = self
            .entry(id)
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))?;
        entry.cancel.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Execute one serialized run of the document's state machine.
    ///
    /// Resumes from the last completed stage, so partial work from a
    /// cancelled or retryably-failed run is never redone.
    async fn run(&self, id: &str) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        let _guard = entry.run_lock.lock().await;

        loop {
            let state = entry.record().state;
            let stage = match state {
                DocumentState::Received => PipelineStage::Ocr,
                DocumentState::OcrDone => PipelineStage::Classification,
                DocumentState::Classified => PipelineStage::Extraction,
                DocumentState::Extracted | DocumentState::Failed => break,
            };

            let result = match stage {
                PipelineStage::Ocr => self.run_ocr(&entry, id).await,
                PipelineStage::Classification => self.run_classification(&entry),
                PipelineStage::Extraction => self.run_extraction(&entry).await,
            };

            if let Err(err) = result {
                let failure = FailureInfo::from_stage_error(stage, &err);
                tracing::warn!(
                    document_id = %id,
                    stage = %stage,
                    kind = failure.kind.as_str(),
                    retryable = failure.retryable,
                    "stage failed: {err}"
                );
                entry.record().fail(failure);
                break;
            }

            // Consume a pending cancellation; the stage that just ran
            // completed and its result is kept.
            if entry.cancel.swap(false, Ordering::SeqCst) {
                tracing::info!(document_id = %id, "run cancelled between stages");
                break;
            }
        }
    }

    async fn run_ocr(&self, entry: &DocEntry, id: &str) -> Result<(), StageError> {
        let payload = self
            .inner
            .store
            .load(id)
            .await
            .map_err(|e| StageError::Internal(e.to_string()))?;

        let stage = self.inner.ocr.clone();
        let output = run_bounded(self.inner.config.timeouts.ocr(), move || {
            stage.recognize(&payload)
        })
        .await?;

        entry.record().attach_ocr(output);
        Ok(())
    }

    fn run_classification(&self, entry: &DocEntry) -> Result<(), StageError> {
        let ocr = entry
            .record()
            .ocr
            .clone()
            .ok_or_else(|| StageError::Internal("classification without ocr output".to_string()))?;

        let outcome = self.inner.classification.classify(&ocr)?;
        entry.record().attach_classification(outcome);
        Ok(())
    }

    async fn run_extraction(&self, entry: &DocEntry) -> Result<(), StageError> {
        let (ocr, label) = {
            let record = entry.record();
            let ocr = record
                .ocr
                .clone()
                .ok_or_else(|| StageError::Internal("extraction without ocr output".to_string()))?;
            let label = record
                .classification
                .as_ref()
                .map(|c| c.label.clone())
                .ok_or_else(|| {
                    StageError::Internal("extraction without classification".to_string())
                })?;
            (ocr, label)
        };

        let stage = self.inner.extraction.clone();
        let outcome = run_bounded(self.inner.config.timeouts.extraction(), move || {
            stage.extract(&ocr, &label)
        })
        .await?;

        entry.record().attach_extraction(outcome);
        Ok(())
    }
}

/// Run blocking stage work on the blocking pool under a time budget.
///
/// A blown budget is a retryable `Timeout`; a panicked stage surfaces as
/// an internal error instead of crossing the boundary.
async fn run_bounded<T, F>(budget: Duration, work: F) -> Result<T, StageError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StageError> + Send + 'static,
{
    match tokio::time::timeout(budget, tokio::task::spawn_blocking(work)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(StageError::Internal(format!("stage task died: {join_err}"))),
        Err(_) => Err(StageError::Timeout(budget)),
    }
}
