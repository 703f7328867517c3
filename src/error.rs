//! Top-level error type for the ingestion pipeline.
//!
//! Each subsystem defines its own error enum with miette `#[diagnostic]`
//! derives (error codes, help text, source chains); this module wraps them
//! into one [`LexError`] so the pipeline boundary handles a single type.
//! Every variant is fatal at document level: the pipeline emits no chunks
//! for a failed document.

use miette::Diagnostic;
use thiserror::Error;

pub use crate::canonical::CanonicalError;
pub use crate::chunk::OffsetResolutionError;
pub use crate::classify::ClassifyError;
pub use crate::extract::ExtractError;
pub use crate::registry::RegistryError;
pub use crate::validate::ContractViolationError;

/// Top-level error type for document ingestion.
#[derive(Debug, Error, Diagnostic)]
pub enum LexError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Offsets(#[from] OffsetResolutionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Canonical(#[from] CanonicalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Contract(#[from] ContractViolationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error("unsupported extraction mode \"{mode}\"")]
    #[diagnostic(
        code(lexcanon::pipeline::unsupported_mode),
        help(
            "The vlm_ocr front-end lives outside this crate. Supply its \
             extractor through `Pipeline::ingest_with_extractor`, or use \
             native_regex."
        )
    )]
    UnsupportedMode { mode: String },

    #[error("I/O error: {source}")]
    #[diagnostic(
        code(lexcanon::pipeline::io),
        help("A filesystem operation failed. Check the path and permissions.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("fetch error for URL \"{url}\": {message}")]
    #[diagnostic(
        code(lexcanon::pipeline::fetch),
        help("Failed to download the URL. Check that it is reachable.")
    )]
    Fetch { url: String, message: String },
}

impl LexError {
    /// Stable machine-readable kind, surfaced in `IngestResult.error`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Extract(ExtractError::Encrypted) => "extract_encrypted",
            Self::Extract(ExtractError::Empty) => "extract_empty",
            Self::Extract(ExtractError::NonDeterministic { .. }) => "extract_non_deterministic",
            Self::Extract(_) => "extract_failed",
            Self::Classify(ClassifyError::Inconsistent { .. }) => "classify_inconsistent",
            Self::Classify(ClassifyError::EmptyDocument) => "classify_empty_document",
            Self::Offsets(_) => "offset_resolution",
            Self::Canonical(_) => "canonical_hash_mismatch",
            Self::Contract(_) => "contract_violation",
            Self::Registry(_) => "registry",
            Self::UnsupportedMode { .. } => "unsupported_extraction_mode",
            Self::Io { .. } => "io",
            Self::Fetch { .. } => "fetch",
        }
    }

    /// The offending chunk for contract violations, when known.
    pub fn offending_chunk(&self) -> Option<String> {
        match self {
            Self::Contract(violation) => Some(violation.node_id.clone()),
            _ => None,
        }
    }
}

/// Convenience alias for pipeline results.
pub type LexResult<T> = std::result::Result<T, LexError>;
