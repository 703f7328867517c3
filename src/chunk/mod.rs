//! Chunk builder: converts classified devices into [`ProcessedChunk`]s with
//! stable identity, canonical document ids, large-device splitting, and a
//! deterministic baseline retrieval text. No model is ever invoked here; an
//! enrichment stage outside the core may later replace `retrieval_text`.

pub mod docid;
pub mod model;

use std::collections::{HashMap, HashSet};

use miette::Diagnostic;
use thiserror::Error;

pub use docid::normalize_document_id;
pub use model::{
    AuthorityLevel, Citation, DocumentType, OriginConfidence, OriginType, ProcessedChunk, RelType,
    SectionType, EVIDENCE_SENTINEL,
};

use crate::classify::ClassifiedDevice;

/// Default split threshold for oversized devices, in characters.
pub const SPLIT_THRESHOLD_CHARS: usize = 8_000;

/// Errors while resolving chunk offsets and identity. `EmptyText` and
/// `Ambiguous` are fatal; split-point resolution retries once internally
/// before surfacing `NotFound`.
#[derive(Debug, Error, Diagnostic)]
pub enum OffsetResolutionError {
    #[error("no valid split point found inside device {span_id}")]
    #[diagnostic(
        code(lexcanon::chunk::split_not_found),
        help("The device text could not be divided at any boundary. File a bug with the document.")
    )]
    NotFound { span_id: String },

    #[error("ambiguous span id {span_id}: more than one device resolves to it")]
    #[diagnostic(
        code(lexcanon::chunk::ambiguous_span),
        help(
            "Two devices produced the same span id, so their node ids would \
             collide in the sinks. This usually means transcribed external \
             material re-uses a host article number."
        )
    )]
    Ambiguous { span_id: String },

    #[error("device {span_id} has empty text")]
    #[diagnostic(
        code(lexcanon::chunk::empty_text),
        help("An empty device cannot carry an evidence triple.")
    )]
    EmptyText { span_id: String },
}

/// Convenience alias for chunk-building results.
pub type ChunkResult<T> = std::result::Result<T, OffsetResolutionError>;

/// Normalized identity of the document being ingested.
#[derive(Debug, Clone)]
pub struct DocumentIdentity {
    /// Canonical document id, e.g. `LEI-14.133-2021`.
    pub document_id: String,
    pub document_type: DocumentType,
    pub number: String,
    pub year: i32,
}

impl DocumentIdentity {
    pub fn new(raw_id: &str, document_type: DocumentType, number: &str, year: i32) -> Self {
        Self {
            document_id: normalize_document_id(raw_id),
            document_type,
            number: number.to_string(),
            year,
        }
    }

    /// Human-readable context header stem, e.g. `LEI 14.133/2021`.
    pub fn context_header(&self) -> String {
        format!(
            "{} {}/{}",
            self.document_type.as_str(),
            normalize_document_id(&self.number),
            self.year
        )
    }
}

/// Builds [`ProcessedChunk`]s from classified devices.
pub struct ChunkBuilder {
    split_threshold: usize,
}

impl Default for ChunkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkBuilder {
    pub fn new() -> Self {
        Self {
            split_threshold: SPLIT_THRESHOLD_CHARS,
        }
    }

    pub fn with_split_threshold(mut self, chars: usize) -> Self {
        self.split_threshold = chars.max(1);
        self
    }

    /// Build chunks for every device, in document order. Oversized devices
    /// emit their parts right after the (non-indexable) parent chunk.
    pub fn build(
        &self,
        identity: &DocumentIdentity,
        devices: &[ClassifiedDevice],
        canonical_hash: &str,
    ) -> ChunkResult<Vec<ProcessedChunk>> {
        let by_span: HashMap<&str, &ClassifiedDevice> =
            devices.iter().map(|d| (d.span_id.as_str(), d)).collect();

        let mut seen_spans: HashSet<&str> = HashSet::new();
        let mut chunks = Vec::with_capacity(devices.len());

        for device in devices {
            if device.text.trim().is_empty() {
                return Err(OffsetResolutionError::EmptyText {
                    span_id: device.span_id.clone(),
                });
            }
            if !seen_spans.insert(device.span_id.as_str()) {
                return Err(OffsetResolutionError::Ambiguous {
                    span_id: device.span_id.clone(),
                });
            }

            let char_count = device.text.chars().count();
            if char_count <= self.split_threshold {
                chunks.push(self.device_chunk(identity, device, canonical_hash, &by_span, true));
            } else {
                // Parent stays in the stream for hierarchy validation but is
                // flagged out of the sinks; the parts carry the content.
                chunks.push(self.device_chunk(identity, device, canonical_hash, &by_span, false));
                self.push_parts(identity, device, canonical_hash, &mut chunks)?;
            }
        }

        tracing::debug!(chunks = chunks.len(), "chunk building complete");
        Ok(chunks)
    }

    fn device_chunk(
        &self,
        identity: &DocumentIdentity,
        device: &ClassifiedDevice,
        canonical_hash: &str,
        by_span: &HashMap<&str, &ClassifiedDevice>,
        indexable: bool,
    ) -> ProcessedChunk {
        let prefix = identity.document_type.node_prefix();
        let chunk_id = format!("{}#{}", identity.document_id, device.span_id);
        let node_id = format!("{prefix}:{chunk_id}");
        let parent_node_id = if device.parent_span_id.is_empty() {
            String::new()
        } else {
            format!(
                "{prefix}:{}#{}",
                identity.document_id, device.parent_span_id
            )
        };

        let retrieval_text = self.retrieval_text(identity, device, by_span);

        ProcessedChunk {
            node_id: node_id.clone(),
            logical_node_id: node_id,
            chunk_id,
            span_id: device.span_id.clone(),
            parent_node_id,
            device_type: device.device_type,
            chunk_level: device.hierarchy_depth,
            part_index: 1,
            part_total: 1,
            text: device.text.clone(),
            retrieval_text,
            document_id: identity.document_id.clone(),
            document_type: identity.document_type,
            number: identity.number.clone(),
            year: identity.year,
            article_number: device.article_number,
            canonical_start: device.char_start as i64,
            canonical_end: device.char_end as i64,
            canonical_hash: canonical_hash.to_string(),
            page_number: device.page_number,
            bbox: device.bbox.to_vec(),
            origin_type: OriginType::Own,
            origin_reference: String::new(),
            origin_reference_name: String::new(),
            is_external_material: false,
            origin_reason: String::new(),
            origin_confidence: OriginConfidence::High,
            citations: Vec::new(),
            has_citations: false,
            citations_count: 0,
            indexable,
            section_type: None,
            authority_level: None,
            section_path: None,
        }
    }

    fn push_parts(
        &self,
        identity: &DocumentIdentity,
        device: &ClassifiedDevice,
        canonical_hash: &str,
        chunks: &mut Vec<ProcessedChunk>,
    ) -> ChunkResult<()> {
        let ranges = split_ranges(&device.text, self.split_threshold).ok_or_else(|| {
            OffsetResolutionError::NotFound {
                span_id: device.span_id.clone(),
            }
        })?;
        let part_total = ranges.len() as u32;
        let prefix = identity.document_type.node_prefix();
        let logical_node_id = format!(
            "{prefix}:{}#{}",
            identity.document_id, device.span_id
        );

        for (i, (start, end)) in ranges.iter().enumerate() {
            let part_index = i as u32 + 1;
            let part_span = format!("{}-P{part_index:02}", device.span_id);
            let chunk_id = format!("{}#{part_span}", identity.document_id);
            let node_id = format!("{prefix}:{chunk_id}");
            let part_text = device.text[*start..*end].to_string();
            let header = format!(
                "{}, {} (parte {part_index}/{part_total})",
                identity.context_header(),
                device.identifier
            );

            chunks.push(ProcessedChunk {
                node_id,
                logical_node_id: logical_node_id.clone(),
                chunk_id,
                span_id: part_span,
                parent_node_id: logical_node_id.clone(),
                device_type: device.device_type,
                chunk_level: device.hierarchy_depth,
                part_index,
                part_total,
                retrieval_text: format!("{header}\n{part_text}"),
                text: part_text,
                document_id: identity.document_id.clone(),
                document_type: identity.document_type,
                number: identity.number.clone(),
                year: identity.year,
                article_number: device.article_number,
                canonical_start: (device.char_start + start) as i64,
                canonical_end: (device.char_start + end) as i64,
                canonical_hash: canonical_hash.to_string(),
                page_number: device.page_number,
                bbox: device.bbox.to_vec(),
                origin_type: OriginType::Own,
                origin_reference: String::new(),
                origin_reference_name: String::new(),
                is_external_material: false,
                origin_reason: String::new(),
                origin_confidence: OriginConfidence::High,
                citations: Vec::new(),
                has_citations: false,
                citations_count: 0,
                indexable: true,
                section_type: None,
                authority_level: None,
                section_path: None,
            });
        }
        Ok(())
    }

    /// Deterministic baseline retrieval text: context header, caput, then
    /// the immediate children's texts.
    fn retrieval_text(
        &self,
        identity: &DocumentIdentity,
        device: &ClassifiedDevice,
        by_span: &HashMap<&str, &ClassifiedDevice>,
    ) -> String {
        let header = format!("{}, {}", identity.context_header(), device.identifier);
        let caput = device.text.lines().next().unwrap_or("");

        let mut out = format!("{header}\n{caput}");
        if device.children_span_ids.is_empty() {
            if device.text.len() > caput.len() {
                out.push('\n');
                out.push_str(device.text[caput.len()..].trim_start_matches('\n'));
            }
        } else {
            for child_span in &device.children_span_ids {
                if let Some(child) = by_span.get(child_span.as_str()) {
                    out.push('\n');
                    out.push_str(&child.text);
                }
            }
        }
        out
    }
}

/// Split `text` into contiguous byte ranges of at most `max_chars` characters
/// each, preferring paragraph (LF) boundaries, then whitespace, then a hard
/// cut. The union of the ranges is exactly `[0, text.len())`.
fn split_ranges(text: &str, max_chars: usize) -> Option<Vec<(usize, usize)>> {
    if text.is_empty() || max_chars == 0 {
        return None;
    }
    let positions: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total_chars = positions.len();

    let mut ranges = Vec::new();
    let mut start_char = 0usize;
    while start_char < total_chars {
        let start_byte = positions[start_char];
        if total_chars - start_char <= max_chars {
            ranges.push((start_byte, text.len()));
            break;
        }
        let window_end_char = start_char + max_chars;
        let window_end_byte = positions[window_end_char];
        let floor_char = start_char + max_chars / 2;
        let floor_byte = positions[floor_char];
        let window = &text[start_byte..window_end_byte];

        // Paragraph boundary first, then any whitespace, then a hard cut at
        // the window edge (the retry ladder; each rung is deterministic).
        let tail = &window[floor_byte - start_byte..];
        let cut_byte = tail
            .rfind('\n')
            .map(|off| floor_byte + off + 1)
            .or_else(|| {
                tail.char_indices()
                    .rev()
                    .find(|(_, c)| c.is_whitespace())
                    .map(|(off, c)| floor_byte + off + c.len_utf8())
            })
            .unwrap_or(window_end_byte);

        ranges.push((start_byte, cut_byte));
        // Resume at the cut; ranges stay contiguous and non-overlapping.
        while start_char < total_chars && positions[start_char] < cut_byte {
            start_char += 1;
        }
    }
    Some(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{ClassifiedDevice, DeviceType};

    fn device(span: &str, parent: &str, text: &str, start: usize) -> ClassifiedDevice {
        ClassifiedDevice {
            device_type: match &span[..3] {
                "ART" => DeviceType::Article,
                "PAR" => DeviceType::Paragraph,
                "INC" => DeviceType::Item,
                _ => DeviceType::Subitem,
            },
            span_id: span.into(),
            parent_span_id: parent.into(),
            children_span_ids: Vec::new(),
            identifier: span.into(),
            article_number: Some(1),
            hierarchy_depth: if parent.is_empty() { 0 } else { 1 },
            text: text.into(),
            char_start: start,
            char_end: start + text.len(),
            page_number: 1,
            bbox: [0.0, 0.0, 100.0, 10.0],
        }
    }

    fn identity() -> DocumentIdentity {
        DocumentIdentity::new("LEI 14133/2021", DocumentType::Law, "14133", 2021)
    }

    #[test]
    fn identity_normalizes_document_id() {
        let id = identity();
        assert_eq!(id.document_id, "LEI-14.133-2021");
        assert_eq!(id.context_header(), "LEI 14.133/2021");
    }

    #[test]
    fn builds_node_ids_and_parent_links() {
        let devices = vec![
            device("ART-001", "", "Art. 1º Caput.", 0),
            device("PAR-001-1", "ART-001", "§ 1º Texto.", 15),
        ];
        let chunks = ChunkBuilder::new()
            .build(&identity(), &devices, "hash")
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].node_id, "laws:LEI-14.133-2021#ART-001");
        assert_eq!(chunks[0].parent_node_id, "");
        assert_eq!(chunks[1].node_id, "laws:LEI-14.133-2021#PAR-001-1");
        assert_eq!(chunks[1].parent_node_id, "laws:LEI-14.133-2021#ART-001");
        assert!(chunks.iter().all(|c| c.indexable));
    }

    #[test]
    fn oversized_device_splits_into_parts() {
        let long_text = {
            let mut s = String::from("Art. 2º Caput longo.");
            for i in 0..400 {
                s.push('\n');
                s.push_str(&format!("Linha de conteúdo número {i} com texto repetido."));
            }
            s
        };
        let devices = vec![device("ART-002", "", &long_text, 100)];
        let builder = ChunkBuilder::new().with_split_threshold(2_000);
        let chunks = builder.build(&identity(), &devices, "hash").unwrap();

        let parent = &chunks[0];
        assert!(!parent.indexable);
        assert_eq!(parent.span_id, "ART-002");

        let parts: Vec<&ProcessedChunk> = chunks[1..].iter().collect();
        assert!(parts.len() >= 2);
        for (i, part) in parts.iter().enumerate() {
            assert_eq!(part.part_index as usize, i + 1);
            assert_eq!(part.part_total as usize, parts.len());
            assert_eq!(part.span_id, format!("ART-002-P{:02}", i + 1));
            assert_eq!(part.logical_node_id, "laws:LEI-14.133-2021#ART-002");
            assert_eq!(part.parent_node_id, "laws:LEI-14.133-2021#ART-002");
            assert!(part.text.chars().count() <= 2_000);
        }

        // Part coverage: contiguous, non-overlapping, equal to the parent range.
        assert_eq!(parts[0].canonical_start, parent.canonical_start);
        assert_eq!(parts.last().unwrap().canonical_end, parent.canonical_end);
        for pair in parts.windows(2) {
            assert_eq!(pair[0].canonical_end, pair[1].canonical_start);
        }
        // Slicing each part out of the device text reproduces it.
        for part in &parts {
            let s = (part.canonical_start - parent.canonical_start) as usize;
            let e = (part.canonical_end - parent.canonical_start) as usize;
            assert_eq!(&long_text[s..e], part.text);
        }
    }

    #[test]
    fn duplicate_span_is_ambiguous() {
        let devices = vec![
            device("ART-001", "", "Art. 1º A.", 0),
            device("ART-001", "", "Art. 1º B.", 50),
        ];
        let err = ChunkBuilder::new()
            .build(&identity(), &devices, "hash")
            .unwrap_err();
        assert!(matches!(err, OffsetResolutionError::Ambiguous { .. }));
    }

    #[test]
    fn empty_device_text_rejected() {
        let devices = vec![device("ART-001", "", "   ", 0)];
        let err = ChunkBuilder::new()
            .build(&identity(), &devices, "hash")
            .unwrap_err();
        assert!(matches!(err, OffsetResolutionError::EmptyText { .. }));
    }

    #[test]
    fn retrieval_text_has_header_and_caput() {
        let devices = vec![device("ART-001", "", "Art. 1º Caput da norma.\nSegunda linha.", 0)];
        let chunks = ChunkBuilder::new()
            .build(&identity(), &devices, "hash")
            .unwrap();
        assert!(chunks[0]
            .retrieval_text
            .starts_with("LEI 14.133/2021, ART-001\nArt. 1º Caput da norma."));
        assert!(chunks[0].retrieval_text.contains("Segunda linha."));
    }

    #[test]
    fn split_ranges_cover_text_exactly() {
        let text = "um dois tres quatro cinco seis sete oito nove dez";
        let ranges = split_ranges(text, 12).unwrap();
        assert_eq!(ranges[0].0, 0);
        assert_eq!(ranges.last().unwrap().1, text.len());
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        for (s, e) in &ranges {
            assert!(text[*s..*e].chars().count() <= 12);
        }
    }

    #[test]
    fn split_ranges_hard_cuts_without_whitespace() {
        let text = "a".repeat(25);
        let ranges = split_ranges(&text, 10).unwrap();
        assert_eq!(ranges, vec![(0, 10), (10, 20), (20, 25)]);
    }
}
