//! # lexcanon
//!
//! Deterministic ingestion of Brazilian legal documents (laws, decrees,
//! normative instructions, court rulings) from PDF bytes into indexable,
//! addressable chunks — one per legal device — each carrying a verifiable
//! `(canonical_start, canonical_end, canonical_hash)` evidence triple into
//! a normalized canonical text.
//!
//! ## Architecture
//!
//! - **Extraction** (`extract`): Pdfium-backed native text + layout, page
//!   rasters, byte-exact block offsets, behind the `TextExtractor` seam
//! - **Classification** (`classify`): regex-driven hierarchy of articles,
//!   paragraphs, items, and sub-items, verified against slicing invariants
//! - **Rulings** (`ruling`): section parser and overlap chunker for court
//!   rulings
//! - **Chunks** (`chunk`): stable identity, document-id normalization,
//!   large-device splitting, baseline retrieval text
//! - **Provenance & citations** (`origin`, `cite`): self/external material
//!   annotation and canonical citation edges, never self- or parent-loops
//! - **The gate** (`validate`): all-or-nothing invariant checkpoint before
//!   any external persistence
//!
//! ## Library usage
//!
//! ```no_run
//! use lexcanon::chunk::DocumentType;
//! use lexcanon::pipeline::{IngestRequest, Pipeline};
//!
//! let pipeline = Pipeline::new();
//! let bytes = std::fs::read("lei-14133.pdf").unwrap();
//! let request = IngestRequest::new(bytes, "LEI 14133/2021", DocumentType::Law, "14133", 2021);
//! let result = pipeline.ingest(request);
//! assert_eq!(result.total_chunks, result.chunks.len());
//! ```

pub mod canonical;
pub mod chunk;
pub mod cite;
pub mod classify;
pub mod error;
pub mod extract;
pub mod origin;
pub mod pipeline;
pub mod registry;
pub mod ruling;
pub mod validate;
