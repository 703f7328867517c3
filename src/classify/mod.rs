//! Regex-driven hierarchical classifier for laws, decrees, and normative
//! instructions.
//!
//! Translates the flat, ordered list of extracted blocks into a validated
//! tree of [`ClassifiedDevice`]s. This is the hardest part of the law
//! pipeline: a single marker misfire creates a chunk whose span id does not
//! match its text, a fatal data-integrity defect, so the output is verified
//! against the slicing, containment and ordering invariants before anything
//! leaves this module.

mod builder;
pub mod device;
pub mod markers;

use miette::Diagnostic;
use thiserror::Error;

pub use device::{article_token, ClassifiedDevice, DeviceType};
pub use markers::{BlockLabel, MarkerSet};

use crate::extract::ExtractionResult;

/// Errors from the classification stage. All fatal, document-level.
#[derive(Debug, Error, Diagnostic)]
pub enum ClassifyError {
    #[error("inconsistent device structure at {span_id}: {reason}")]
    #[diagnostic(
        code(lexcanon::classify::inconsistent),
        help(
            "The classified tree violates a structural invariant (ordering, \
             containment, or exact slicing). The document is aborted rather \
             than persisted with a broken evidence link."
        )
    )]
    Inconsistent { span_id: String, reason: String },

    #[error("no legal devices recognized in document")]
    #[diagnostic(
        code(lexcanon::classify::empty_document),
        help(
            "No article marker matched any block. Either the document is not \
             a law-family text (use the ruling pipeline for court rulings) or \
             extraction produced unusable text."
        )
    )]
    EmptyDocument,
}

/// Convenience alias for classification results.
pub type ClassifyResult<T> = std::result::Result<T, ClassifyError>;

/// The law-family classifier. Holds the compiled marker set; build once,
/// reuse across documents.
pub struct Classifier {
    markers: MarkerSet,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            markers: MarkerSet::new(),
        }
    }

    /// Classify an extraction into an ordered list of devices.
    ///
    /// The returned list is in document order; every device satisfies
    /// `canonical_text[char_start..char_end] == text`, siblings are
    /// monotonic and disjoint, and children lie inside their parents.
    pub fn classify(&self, extraction: &ExtractionResult) -> ClassifyResult<Vec<ClassifiedDevice>> {
        let devices = builder::build_devices(&self.markers, extraction)?;
        tracing::debug!(devices = devices.len(), "classification complete");
        Ok(devices)
    }
}
