//! Output types of the extraction stage.
//!
//! A [`BlockRecord`] is a physically located run of text on a page whose
//! `(char_start, char_end)` offsets point into the document's canonical
//! text. The slicing invariant `canonical_text[char_start..char_end] ==
//! text` is established by the extractor and re-checked by the invariant
//! gate before anything is persisted.

use serde::{Deserialize, Serialize};

/// A physically located run of text on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Page-local block index, in reading order.
    pub block_index: usize,
    /// The exact substring written into the canonical text.
    pub text: String,
    /// Bounding box `[x0, y0, x1, y1]` in PDF points (72 dpi).
    pub bbox: [f32; 4],
    /// Global byte offset of this block's text in the canonical text.
    pub char_start: usize,
    /// Global end offset (exclusive).
    pub char_end: usize,
}

/// Immutable per-page record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// 1-indexed page number.
    pub page_number: u32,
    /// Page width in PDF points.
    pub width_pt: f32,
    /// Page height in PDF points.
    pub height_pt: f32,
    /// Rendered page image (PNG, 300 dpi) for downstream visual inspection.
    /// Empty when rendering is disabled (synthetic extractors, tests).
    #[serde(skip)]
    pub png: Vec<u8>,
    /// Rendered image width in pixels.
    pub image_width_px: u32,
    /// Rendered image height in pixels.
    pub image_height_px: u32,
    /// Text blocks on this page, in reading order.
    pub blocks: Vec<BlockRecord>,
}

/// Result of extracting one document.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// The entire document after normalization. Invariant:
    /// `canonical_text == normalize(canonical_text)`.
    pub canonical_text: String,
    /// Lowercase hex SHA-256 of the canonical text bytes.
    pub canonical_hash: String,
    /// Per-page records in page order.
    pub pages: Vec<PageRecord>,
}

impl ExtractionResult {
    /// All blocks of the document in reading order, paired with their
    /// 1-indexed page number. The flat view the classifier walks.
    pub fn flat_blocks(&self) -> impl Iterator<Item = (u32, &BlockRecord)> {
        self.pages
            .iter()
            .flat_map(|p| p.blocks.iter().map(move |b| (p.page_number, b)))
    }

    /// Total block count across all pages.
    pub fn block_count(&self) -> usize {
        self.pages.iter().map(|p| p.blocks.len()).sum()
    }
}
