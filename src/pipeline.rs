//! Document ingestion pipeline.
//!
//! Orchestrates: extract → idempotency check → classify (or ruling parse)
//! → chunk build → origin classification → citation extraction → invariant
//! gate. Each stage is a pure function over immutable inputs; the whole run
//! is all-or-nothing per document. Failures surface as a structured error
//! object inside [`IngestResult`]; no chunks are ever emitted for a failed
//! document.
//!
//! Per-document processing is strictly sequential. Parallelism, if wanted,
//! happens between documents: each worker builds on one shared [`Pipeline`]
//! (all members are immutable after construction) and runs its own
//! document.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::chunk::{ChunkBuilder, DocumentIdentity, DocumentType, ProcessedChunk};
use crate::cite::CitationExtractor;
use crate::classify::Classifier;
use crate::error::{LexError, LexResult};
use crate::extract::{ExtractionMode, ExtractionResult, NativeExtractor, TextExtractor};
use crate::origin::OriginClassifier;
use crate::registry::NormRegistry;
use crate::ruling::{RulingChunker, RulingParser};
use crate::validate::{self, ValidationSummary};

/// One ingestion request: a single document, by value.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub pdf_bytes: Vec<u8>,
    /// Raw document id; normalized before identity construction.
    pub document_id: String,
    pub document_type: DocumentType,
    pub number: String,
    pub year: i32,
    pub extraction_mode: ExtractionMode,
    /// Honored by external sinks; the core always builds the baseline
    /// retrieval text.
    pub skip_embeddings: bool,
    pub validate_articles: bool,
    pub expected_first_article: Option<u32>,
    pub expected_last_article: Option<u32>,
}

impl IngestRequest {
    pub fn new(
        pdf_bytes: Vec<u8>,
        document_id: impl Into<String>,
        document_type: DocumentType,
        number: impl Into<String>,
        year: i32,
    ) -> Self {
        Self {
            pdf_bytes,
            document_id: document_id.into(),
            document_type,
            number: number.into(),
            year,
            extraction_mode: ExtractionMode::NativeRegex,
            skip_embeddings: false,
            validate_articles: false,
            expected_first_article: None,
            expected_last_article: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Completed,
    Failed,
}

/// Wall-clock duration of one pipeline phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub name: String,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalMaterialSummary {
    pub count: usize,
    pub target_documents: Vec<String>,
}

/// Span accounting handed to sinks alongside the chunks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub total_spans: usize,
    pub by_type: BTreeMap<String, usize>,
    pub external_material: ExternalMaterialSummary,
}

/// Structured error object for a failed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offending_chunk: Option<String>,
}

/// Result of one ingestion run, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub status: IngestStatus,
    pub document_id: String,
    pub canonical_hash: String,
    /// The canonical text, byte-for-byte the `canonical.md` artifact. Kept
    /// out of JSON serializations; the external uploader takes it from the
    /// in-memory result.
    #[serde(skip)]
    pub canonical_text: String,
    pub total_chunks: usize,
    pub chunks: Vec<ProcessedChunk>,
    pub manifest: Manifest,
    pub phases: Vec<PhaseTiming>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSummary>,
    /// Opaque struct for the downstream inspection UI.
    pub inspection_snapshot: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl IngestResult {
    fn failed(document_id: String, error: &LexError) -> Self {
        Self {
            status: IngestStatus::Failed,
            document_id: document_id.clone(),
            canonical_hash: String::new(),
            canonical_text: String::new(),
            total_chunks: 0,
            chunks: Vec::new(),
            manifest: Manifest::default(),
            phases: Vec::new(),
            validation: None,
            inspection_snapshot: serde_json::Value::Null,
            error: Some(ErrorInfo {
                kind: error.kind().to_string(),
                message: error.to_string(),
                document_id,
                offending_chunk: error.offending_chunk(),
            }),
        }
    }
}

/// The staged single-document pipeline. Immutable after construction; share
/// one instance across worker threads.
pub struct Pipeline {
    classifier: Classifier,
    ruling_parser: RulingParser,
    chunk_builder: ChunkBuilder,
    ruling_chunker: RulingChunker,
    registry: NormRegistry,
    native: NativeExtractor,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            classifier: Classifier::new(),
            ruling_parser: RulingParser::new(),
            chunk_builder: ChunkBuilder::new(),
            ruling_chunker: RulingChunker::new(),
            registry: NormRegistry::builtin(),
            native: NativeExtractor::new(),
        }
    }

    /// Replace the native extractor (library path, rendering knobs).
    pub fn with_native_extractor(mut self, native: NativeExtractor) -> Self {
        self.native = native;
        self
    }

    /// The norm registry in use (shared with origin and citation stages).
    pub fn registry(&self) -> &NormRegistry {
        &self.registry
    }

    /// Ingest a document with the built-in native extractor.
    pub fn ingest(&self, request: IngestRequest) -> IngestResult {
        match request.extraction_mode {
            ExtractionMode::NativeRegex => self.ingest_with_extractor(&self.native, request),
            ExtractionMode::VlmOcr => {
                let document_id = crate::chunk::normalize_document_id(&request.document_id);
                IngestResult::failed(
                    document_id,
                    &LexError::UnsupportedMode {
                        mode: request.extraction_mode.to_string(),
                    },
                )
            }
        }
    }

    /// Ingest through any [`TextExtractor`] — the seam for the external OCR
    /// front-end and for test doubles.
    pub fn ingest_with_extractor(
        &self,
        extractor: &dyn TextExtractor,
        request: IngestRequest,
    ) -> IngestResult {
        let identity = DocumentIdentity::new(
            &request.document_id,
            request.document_type,
            &request.number,
            request.year,
        );
        tracing::info!(
            document_id = %identity.document_id,
            document_type = %identity.document_type,
            mode = %extractor.mode(),
            "ingest start"
        );
        match self.run(extractor, &identity, &request) {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(
                    document_id = %identity.document_id,
                    kind = error.kind(),
                    error = %error,
                    "ingest failed"
                );
                IngestResult::failed(identity.document_id, &error)
            }
        }
    }

    /// Ingest a document from a filesystem path.
    pub fn ingest_file(&self, path: &Path, mut request: IngestRequest) -> IngestResult {
        match std::fs::read(path) {
            Ok(bytes) => {
                request.pdf_bytes = bytes;
                self.ingest(request)
            }
            Err(source) => {
                let document_id = crate::chunk::normalize_document_id(&request.document_id);
                IngestResult::failed(document_id, &LexError::Io { source })
            }
        }
    }

    /// Ingest a document fetched from a URL via HTTP GET.
    pub fn ingest_url(&self, url: &str, mut request: IngestRequest) -> IngestResult {
        let document_id = crate::chunk::normalize_document_id(&request.document_id);
        let response = match ureq::get(url).call() {
            Ok(r) => r,
            Err(e) => {
                return IngestResult::failed(
                    document_id,
                    &LexError::Fetch {
                        url: url.into(),
                        message: e.to_string(),
                    },
                );
            }
        };
        let mut bytes = Vec::new();
        if let Err(e) = response.into_reader().read_to_end(&mut bytes) {
            return IngestResult::failed(
                document_id,
                &LexError::Fetch {
                    url: url.into(),
                    message: format!("read body: {e}"),
                },
            );
        }
        request.pdf_bytes = bytes;
        self.ingest(request)
    }

    fn run(
        &self,
        extractor: &dyn TextExtractor,
        identity: &DocumentIdentity,
        request: &IngestRequest,
    ) -> LexResult<IngestResult> {
        let mut phases: Vec<PhaseTiming> = Vec::new();

        let started = Instant::now();
        let extraction = extractor.extract(&request.pdf_bytes)?;
        push_phase(&mut phases, "extract", started);

        // Idempotency check: the canonical text must be a fixed point of
        // normalization, or every downstream offset is suspect.
        if extraction.canonical_text != canonical::normalize(&extraction.canonical_text) {
            return Err(crate::extract::ExtractError::NonDeterministic {
                page: 0,
                reason: "canonical text is not normalization-idempotent".into(),
            }
            .into());
        }

        let mut chunks = if identity.document_type.is_law_family() {
            let started = Instant::now();
            let devices = self.classifier.classify(&extraction)?;
            push_phase(&mut phases, "classify", started);

            let started = Instant::now();
            let chunks =
                self.chunk_builder
                    .build(identity, &devices, &extraction.canonical_hash)?;
            push_phase(&mut phases, "chunk", started);

            let started = Instant::now();
            let mut chunks = chunks;
            OriginClassifier::new(&self.registry).annotate(&mut chunks);
            push_phase(&mut phases, "origin", started);
            chunks
        } else {
            let started = Instant::now();
            let document = self.ruling_parser.parse(&extraction)?;
            push_phase(&mut phases, "classify", started);

            let started = Instant::now();
            let chunks = self
                .ruling_chunker
                .build(identity, &document, &extraction.canonical_hash);
            push_phase(&mut phases, "chunk", started);
            chunks
        };

        let started = Instant::now();
        CitationExtractor::new(&self.registry).annotate(identity, &mut chunks);
        push_phase(&mut phases, "cite", started);

        let started = Instant::now();
        validate::validate_chunks(&identity.document_id, &extraction.canonical_text, &chunks)?;
        canonical::validate_offsets_hash(&extraction.canonical_text, chunks.iter())?;
        push_phase(&mut phases, "validate", started);

        let validation = if request.validate_articles {
            Some(validate::validate_article_coverage(
                &chunks,
                request.expected_first_article,
                request.expected_last_article,
            ))
        } else {
            None
        };

        let manifest = build_manifest(&chunks);
        let inspection_snapshot = inspection_snapshot(identity, &extraction, &chunks);

        tracing::info!(
            document_id = %identity.document_id,
            chunks = chunks.len(),
            "ingest complete"
        );

        Ok(IngestResult {
            status: IngestStatus::Completed,
            document_id: identity.document_id.clone(),
            canonical_hash: extraction.canonical_hash.clone(),
            canonical_text: extraction.canonical_text.clone(),
            total_chunks: chunks.len(),
            chunks,
            manifest,
            phases,
            validation,
            inspection_snapshot,
            error: None,
        })
    }
}

fn push_phase(phases: &mut Vec<PhaseTiming>, name: &str, started: Instant) {
    phases.push(PhaseTiming {
        name: name.to_string(),
        duration_seconds: started.elapsed().as_secs_f64(),
    });
}

fn build_manifest(chunks: &[ProcessedChunk]) -> Manifest {
    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut external = ExternalMaterialSummary::default();
    for chunk in chunks {
        *by_type
            .entry(chunk.device_type.as_str().to_string())
            .or_insert(0) += 1;
        if chunk.is_external_material {
            external.count += 1;
            if !chunk.origin_reference.is_empty()
                && !external
                    .target_documents
                    .contains(&chunk.origin_reference)
            {
                external.target_documents.push(chunk.origin_reference.clone());
            }
        }
    }
    Manifest {
        total_spans: chunks.len(),
        by_type,
        external_material: external,
    }
}

fn inspection_snapshot(
    identity: &DocumentIdentity,
    extraction: &ExtractionResult,
    chunks: &[ProcessedChunk],
) -> serde_json::Value {
    serde_json::json!({
        "document_id": identity.document_id,
        "canonical_hash": extraction.canonical_hash,
        "canonical_bytes": extraction.canonical_text.len(),
        "pages": extraction.pages.iter().map(|p| serde_json::json!({
            "page_number": p.page_number,
            "width_pt": p.width_pt,
            "height_pt": p.height_pt,
            "image_width_px": p.image_width_px,
            "image_height_px": p.image_height_px,
            "blocks": p.blocks.len(),
        })).collect::<Vec<_>>(),
        "chunks": chunks.iter().map(|c| serde_json::json!({
            "node_id": c.node_id,
            "device_type": c.device_type.as_str(),
            "start": c.canonical_start,
            "end": c.canonical_end,
            "page_number": c.page_number,
            "indexable": c.indexable,
            "origin_type": c.origin_type.as_str(),
            "citations": c.citations_count,
        })).collect::<Vec<_>>(),
    })
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// `canonical.md`: the canonical text byte-for-byte, terminating in a
/// single LF. Its SHA-256 equals every chunk's `canonical_hash`.
pub fn canonical_artifact(result: &IngestResult) -> &[u8] {
    result.canonical_text.as_bytes()
}

/// `offsets.json`: one entry per chunk keyed by node id.
pub fn offsets_artifact(chunks: &[ProcessedChunk], mode: ExtractionMode) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for chunk in chunks {
        map.insert(
            chunk.node_id.clone(),
            serde_json::json!({
                "start": chunk.canonical_start,
                "end": chunk.canonical_end,
                "page_number": chunk.page_number,
                "bbox": chunk.bbox,
                "confidence": 1.0,
                "device_type": chunk.device_type.as_str(),
                "parent_id": chunk.parent_node_id,
                "extraction_method": mode.as_str(),
            }),
        );
    }
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vlm_ocr_without_extractor_is_a_structured_failure() {
        let pipeline = Pipeline::new();
        let mut request =
            IngestRequest::new(Vec::new(), "LEI 1/2020", DocumentType::Law, "1", 2020);
        request.extraction_mode = ExtractionMode::VlmOcr;
        let result = pipeline.ingest(request);
        assert_eq!(result.status, IngestStatus::Failed);
        let error = result.error.unwrap();
        assert_eq!(error.kind, "unsupported_extraction_mode");
        assert_eq!(error.document_id, "LEI-1-2020");
        assert!(result.chunks.is_empty());
    }

    #[test]
    fn missing_file_is_an_io_failure() {
        let pipeline = Pipeline::new();
        let request = IngestRequest::new(Vec::new(), "LEI 1/2020", DocumentType::Law, "1", 2020);
        let result = pipeline.ingest_file(Path::new("/nonexistent/file.pdf"), request);
        assert_eq!(result.status, IngestStatus::Failed);
        assert_eq!(result.error.unwrap().kind, "io");
    }
}
