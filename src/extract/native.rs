//! Native deterministic extractor backed by Pdfium.
//!
//! Preflight runs on `lopdf` (cheap structural checks: encryption, page
//! count) before the heavy Pdfium pass. Pdfium then supplies per-page text
//! segments in reading order, each with a bounding box in PDF points, and
//! rasterizes every page to a 300-dpi PNG for downstream visual inspection.
//!
//! Offsets are recorded while the canonical text grows; the final
//! document-level normalization pass must leave every recorded offset intact
//! or the whole document is rejected as non-deterministic.

use std::io::Cursor;
use std::path::PathBuf;

use pdfium_render::prelude::*;

use crate::canonical;
use crate::extract::model::{BlockRecord, ExtractionResult, PageRecord};
use crate::extract::{ExtractError, ExtractResult, ExtractionMode, TextExtractor};

/// Render resolution for page inspection images.
const RENDER_DPI: f32 = 300.0;

/// Environment variable naming the Pdfium dynamic library file.
const PDFIUM_PATH_ENV: &str = "LEXCANON_PDFIUM_PATH";

/// Pdfium-backed extractor implementing [`TextExtractor`].
pub struct NativeExtractor {
    /// Explicit path to the Pdfium dynamic library. Falls back to
    /// `LEXCANON_PDFIUM_PATH`, then the system library.
    pdfium_library_path: Option<PathBuf>,
    /// Skip page rasterization (faster; inspection images stay empty).
    render_pages: bool,
}

impl Default for NativeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeExtractor {
    pub fn new() -> Self {
        Self {
            pdfium_library_path: None,
            render_pages: true,
        }
    }

    /// Use an explicit Pdfium dynamic library file.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pdfium_library_path = Some(path.into());
        self
    }

    /// Disable page rasterization.
    pub fn without_rendering(mut self) -> Self {
        self.render_pages = false;
        self
    }

    fn bind_pdfium(&self) -> ExtractResult<Pdfium> {
        let explicit = self
            .pdfium_library_path
            .clone()
            .or_else(|| std::env::var_os(PDFIUM_PATH_ENV).map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| ExtractError::PdfiumLoad {
            message: e.to_string(),
        })?;
        Ok(Pdfium::new(bindings))
    }
}

impl TextExtractor for NativeExtractor {
    fn extract(&self, data: &[u8]) -> ExtractResult<ExtractionResult> {
        preflight(data)?;

        let pdfium = self.bind_pdfium()?;
        let doc = pdfium
            .load_pdf_from_byte_vec(data.to_vec(), None)
            .map_err(|e| ExtractError::Pdf {
                message: e.to_string(),
            })?;

        let doc_pages = doc.pages();
        let page_count = doc_pages.len();
        if page_count == 0 {
            return Err(ExtractError::Empty);
        }

        let mut canonical_text = String::new();
        let mut pages = Vec::with_capacity(page_count as usize);

        for (page_idx, page) in doc_pages.iter().enumerate() {
            let page_number = page_idx as u32 + 1;
            let width_pt = page.width().value;
            let height_pt = page.height().value;

            let (png, image_width_px, image_height_px) = if self.render_pages {
                render_page(&page, page_number, width_pt)?
            } else {
                (Vec::new(), 0, 0)
            };

            let text = page.text().map_err(|e| ExtractError::Pdf {
                message: format!("page {page_number} text: {e}"),
            })?;

            let mut blocks = Vec::new();
            for segment in text.segments().iter() {
                let block_text = canonical::normalize_block(&segment.text());
                if block_text.is_empty() {
                    continue;
                }
                let bounds = segment.bounds();
                let char_start = canonical_text.len();
                canonical_text.push_str(&block_text);
                let char_end = canonical_text.len();
                canonical_text.push('\n');

                blocks.push(BlockRecord {
                    block_index: blocks.len(),
                    text: block_text,
                    bbox: [
                        bounds.left.value,
                        bounds.bottom.value,
                        bounds.right.value,
                        bounds.top.value,
                    ],
                    char_start,
                    char_end,
                });
            }

            // One additional LF where the next block starts a new page.
            if page_number < page_count as u32 {
                canonical_text.push('\n');
            }

            pages.push(PageRecord {
                page_number,
                width_pt,
                height_pt,
                png,
                image_width_px,
                image_height_px,
                blocks,
            });
        }

        let canonical_text = canonical::normalize(&canonical_text);

        // Idempotency invariant: offsets recorded before the final
        // normalization must still slice exactly.
        for page in &pages {
            for block in &page.blocks {
                let slice = canonical_text
                    .get(block.char_start..block.char_end)
                    .unwrap_or("");
                if slice != block.text {
                    return Err(ExtractError::NonDeterministic {
                        page: page.page_number,
                        reason: format!(
                            "block {} offsets [{}, {}) no longer match its text",
                            block.block_index, block.char_start, block.char_end
                        ),
                    });
                }
            }
        }

        let canonical_hash = canonical::hash(&canonical_text);
        tracing::debug!(
            pages = pages.len(),
            chars = canonical_text.len(),
            hash = %canonical_hash,
            "native extraction complete"
        );

        Ok(ExtractionResult {
            canonical_text,
            canonical_hash,
            pages,
        })
    }

    fn mode(&self) -> ExtractionMode {
        ExtractionMode::NativeRegex
    }
}

/// Cheap structural checks with lopdf before the Pdfium pass.
fn preflight(data: &[u8]) -> ExtractResult<()> {
    let doc = lopdf::Document::load_mem(data).map_err(|e| ExtractError::Pdf {
        message: e.to_string(),
    })?;
    if doc.is_encrypted() {
        return Err(ExtractError::Encrypted);
    }
    if doc.get_pages().is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(())
}

/// Rasterize one page to a 300-dpi PNG.
fn render_page(
    page: &PdfPage<'_>,
    page_number: u32,
    width_pt: f32,
) -> ExtractResult<(Vec<u8>, u32, u32)> {
    let target_width = ((width_pt / 72.0) * RENDER_DPI).round().max(1.0) as i32;
    let config = PdfRenderConfig::new().set_target_width(target_width);

    let rendered = page
        .render_with_config(&config)
        .map_err(|e| ExtractError::Render {
            page: page_number,
            message: e.to_string(),
        })?
        .as_image();

    let (w, h) = (rendered.width(), rendered.height());
    let mut png = Vec::new();
    rendered
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| ExtractError::Render {
            page: page_number,
            message: format!("png encode: {e}"),
        })?;

    Ok((png, w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preflight_rejects_non_pdf() {
        let result = preflight(b"this is not a PDF");
        assert!(matches!(result, Err(ExtractError::Pdf { .. })));
    }
}
