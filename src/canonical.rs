//! Canonical text utilities: the normalization and hashing functions on
//! which the entire evidence contract depends.
//!
//! Every chunk the pipeline emits carries a `(canonical_start, canonical_end,
//! canonical_hash)` triple into a single normalized document text. The
//! guarantee is that pure slicing of that text reconstructs the chunk's
//! source exactly, on any platform, forever. That only works if
//! [`normalize`] is idempotent and [`hash`] is stable, so both live here,
//! alone, with no configuration knobs.

use miette::Diagnostic;
use sha2::{Digest, Sha256};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::chunk::ProcessedChunk;

/// Errors from canonical-text verification.
#[derive(Debug, Error, Diagnostic)]
pub enum CanonicalError {
    #[error("canonical hash mismatch on chunk \"{node_id}\": chunk carries {carried}, document text hashes to {derived}")]
    #[diagnostic(
        code(lexcanon::canonical::hash_mismatch),
        help(
            "The chunk was built against a different canonical text than the one \
             being validated. Re-run extraction; if the mismatch persists the \
             extractor is non-deterministic."
        )
    )]
    HashMismatch {
        node_id: String,
        carried: String,
        derived: String,
    },
}

/// Convenience alias for canonical-utility results.
pub type CanonicalResult<T> = std::result::Result<T, CanonicalError>;

/// Normalize a document text into canonical form.
///
/// Enforces, in order:
/// 1. Unicode NFC composition.
/// 2. Line endings reduced to LF only.
/// 3. Trailing whitespace stripped from each line.
/// 4. Exactly one terminating LF.
///
/// Idempotent: `normalize(normalize(s)) == normalize(s)` for all `s`.
pub fn normalize(s: &str) -> String {
    let composed: String = s.nfc().collect();
    let unified = composed.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len() + 1);
    for line in unified.split('\n') {
        out.push_str(line.trim_end());
        out.push('\n');
    }
    // Collapse any run of terminating LFs to exactly one.
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

/// Normalize a single text block before it is appended to the canonical text.
///
/// Same rules as [`normalize`] except the block never carries a terminating
/// LF of its own: the extractor inserts block and page separators itself, so
/// offsets recorded at append time survive the final document-level
/// normalization pass.
pub fn normalize_block(s: &str) -> String {
    let composed: String = s.nfc().collect();
    let unified = composed.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    for (i, line) in unified.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(line.trim_end());
    }
    while out.ends_with('\n') {
        out.pop();
    }
    out
}

/// Lowercase hex SHA-256 of the UTF-8 bytes of `s`.
pub fn hash(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// Re-derive the canonical hash and verify it matches every chunk.
///
/// A mismatch means a chunk was built against a different text than the one
/// about to be persisted, which would silently break every evidence link in
/// the document. Mismatch is fatal.
pub fn validate_offsets_hash<'a, I>(canonical_text: &str, chunks: I) -> CanonicalResult<()>
where
    I: IntoIterator<Item = &'a ProcessedChunk>,
{
    let derived = hash(canonical_text);
    for chunk in chunks {
        if chunk.canonical_hash != derived {
            return Err(CanonicalError::HashMismatch {
                node_id: chunk.node_id.clone(),
                carried: chunk.canonical_hash.clone(),
                derived,
            });
        }
    }
    Ok(())
}
