//! Overlap chunker for ruling sections.
//!
//! Sections are split so no part exceeds `max_chunk_chars`. Cuts respect
//! paragraph boundaries where possible; consecutive parts share an overlap
//! of 20% of the previous part, clamped to `[min_overlap_chars,
//! max_overlap_chars]`. A single paragraph longer than the limit is
//! hard-split at the nearest whitespace at or before the limit.

use crate::ruling::sections::RulingSection;

/// Chunking knobs. Defaults match the sink's per-chunk size limit.
#[derive(Debug, Clone)]
pub struct RulingChunkConfig {
    pub max_chunk_chars: usize,
    /// Fraction of the previous part carried into the next one.
    pub overlap_fraction: f32,
    pub min_overlap_chars: usize,
    pub max_overlap_chars: usize,
}

impl Default for RulingChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 4_000,
            overlap_fraction: 0.20,
            min_overlap_chars: 200,
            max_overlap_chars: 1_200,
        }
    }
}

/// One part of a section after splitting. Offsets are relative to the
/// canonical text (not the section).
#[derive(Debug, Clone)]
pub struct SectionPart {
    /// `SEC-VOTE` for single parts, `SEC-VOTE-P01` … for splits.
    pub span_id: String,
    pub part_index: u32,
    pub part_total: u32,
    pub char_start: usize,
    pub char_end: usize,
    pub text: String,
}

/// Split one section into overlap parts.
pub fn chunk_section(section: &RulingSection, config: &RulingChunkConfig) -> Vec<SectionPart> {
    let text = section.text.as_str();
    let positions: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total_chars = positions.len();

    if total_chars <= config.max_chunk_chars {
        return vec![SectionPart {
            span_id: section.section_type.span_id().to_string(),
            part_index: 1,
            part_total: 1,
            char_start: section.char_start,
            char_end: section.char_end,
            text: text.to_string(),
        }];
    }

    // Paragraph and decision-item start offsets relative to the section,
    // used as preferred cut points.
    let base = section.char_start;
    let mut paragraph_starts: Vec<usize> = section
        .paragraphs
        .iter()
        .map(|p| p.char_start.saturating_sub(base))
        .chain(section.items.iter().map(|i| i.char_start.saturating_sub(base)))
        .filter(|&p| p > 0 && p < text.len())
        .collect();
    paragraph_starts.sort_unstable();

    let mut raw_parts: Vec<(usize, usize)> = Vec::new();
    let mut start_byte = 0usize;
    let mut start_char = 0usize;

    loop {
        if total_chars - start_char <= config.max_chunk_chars {
            raw_parts.push((start_byte, text.len()));
            break;
        }
        let limit_char = start_char + config.max_chunk_chars;
        let limit_byte = positions[limit_char];
        let floor_byte = positions[start_char + config.max_chunk_chars / 2];

        // Prefer the last paragraph boundary inside the window, then any
        // whitespace, then a hard cut at the limit.
        let cut = paragraph_starts
            .iter()
            .copied()
            .filter(|&p| p > floor_byte && p <= limit_byte)
            .max()
            .or_else(|| {
                text[floor_byte..limit_byte]
                    .char_indices()
                    .rev()
                    .find(|(_, c)| c.is_whitespace())
                    .map(|(off, c)| floor_byte + off + c.len_utf8())
            })
            .unwrap_or(limit_byte);

        raw_parts.push((start_byte, cut));

        // Overlap into the next part, clamped and snapped to a char
        // boundary.
        let part_chars = text[start_byte..cut].chars().count();
        let overlap = ((part_chars as f32 * config.overlap_fraction) as usize)
            .clamp(config.min_overlap_chars, config.max_overlap_chars);
        let cut_char = byte_to_char(&positions, cut);
        let next_char = cut_char.saturating_sub(overlap).max(start_char + 1);
        start_char = next_char;
        start_byte = positions[start_char];
    }

    let part_total = raw_parts.len() as u32;
    raw_parts
        .into_iter()
        .enumerate()
        .map(|(i, (s, e))| {
            let part_index = i as u32 + 1;
            SectionPart {
                span_id: format!(
                    "{}-P{part_index:02}",
                    section.section_type.span_id()
                ),
                part_index,
                part_total,
                char_start: section.char_start + s,
                char_end: section.char_start + e,
                text: text[s..e].to_string(),
            }
        })
        .collect()
}

fn byte_to_char(positions: &[usize], byte: usize) -> usize {
    match positions.binary_search(&byte) {
        Ok(i) => i,
        Err(i) => i,
    }
}
