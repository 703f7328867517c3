//! Extraction stage: PDF bytes to canonical text, offsets, and page images.
//!
//! Extractor variants (native, the external OCR front-end, the test suite's
//! synthetic extractor) all expose one narrow capability: [`TextExtractor`].
//! The downstream pipeline is agnostic to which one produced the
//! [`ExtractionResult`].

pub mod model;
pub mod native;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use model::{BlockRecord, ExtractionResult, PageRecord};
pub use native::NativeExtractor;

/// Which front-end produced (or should produce) the extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Deterministic native-text extraction (this crate).
    NativeRegex,
    /// Vision-language OCR front-end (external collaborator with the same
    /// downstream contract).
    VlmOcr,
}

impl ExtractionMode {
    /// Wire name, as written into `offsets.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NativeRegex => "native_regex",
            Self::VlmOcr => "vlm_ocr",
        }
    }
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from the extraction stage. All fatal, document-level.
#[derive(Debug, Error, Diagnostic)]
pub enum ExtractError {
    #[error("document is encrypted")]
    #[diagnostic(
        code(lexcanon::extract::encrypted),
        help("Decrypt the PDF before ingestion; the pipeline never guesses passwords.")
    )]
    Encrypted,

    #[error("document has no pages")]
    #[diagnostic(
        code(lexcanon::extract::empty),
        help("The PDF parsed but contains zero pages. Check the source file.")
    )]
    Empty,

    #[error("non-deterministic extraction on page {page}: {reason}")]
    #[diagnostic(
        code(lexcanon::extract::non_deterministic),
        help(
            "Block offsets recorded during extraction no longer slice the final \
             canonical text. This breaks the evidence contract and aborts the \
             document. File a bug with the offending PDF."
        )
    )]
    NonDeterministic { page: u32, reason: String },

    #[error("failed to parse PDF: {message}")]
    #[diagnostic(
        code(lexcanon::extract::parse),
        help("The bytes are not a readable PDF. Verify the file is valid and not truncated.")
    )]
    Pdf { message: String },

    #[error("failed to render page {page}: {message}")]
    #[diagnostic(
        code(lexcanon::extract::render),
        help("Page rasterization failed. Check the Pdfium library installation.")
    )]
    Render { page: u32, message: String },

    #[error("Pdfium library unavailable: {message}")]
    #[diagnostic(
        code(lexcanon::extract::pdfium_load),
        help(
            "The native extractor needs the Pdfium dynamic library. Install it \
             system-wide or point LEXCANON_PDFIUM_PATH / the CLI flag at the \
             library file."
        )
    )]
    PdfiumLoad { message: String },
}

/// Convenience alias for extraction results.
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

/// The one capability every extractor variant exposes.
pub trait TextExtractor {
    /// Extract canonical text, offsets, and page records from PDF bytes.
    /// Deterministic: identical input bytes must yield byte-identical output.
    fn extract(&self, data: &[u8]) -> ExtractResult<ExtractionResult>;

    /// The mode this extractor implements, recorded in `offsets.json`.
    fn mode(&self) -> ExtractionMode;
}
