//! Structural parser for court rulings.
//!
//! Rulings are organized by primary sections — report (RELATÓRIO), vote
//! (VOTO), decision (ACÓRDÃO) — each a single device at depth 0, with
//! numbered paragraphs inside report/vote and dotted-numeric items inside
//! the decision. `build_sections` consolidates the parse into the four
//! canonical sections (summary comes from the header region).

use regex::Regex;

use crate::chunk::SectionType;
use crate::classify::{ClassifyError, ClassifyResult};
use crate::extract::ExtractionResult;
use crate::ruling::header::{HeaderPatterns, RulingHeader};

/// A numbered paragraph inside a report or vote section.
#[derive(Debug, Clone)]
pub struct RulingParagraph {
    pub number: u32,
    /// `PAR-REPORT-<n>` / `PAR-VOTE-<n>`.
    pub span_id: String,
    pub char_start: usize,
    pub char_end: usize,
}

/// A dotted-numeric item inside the decision section (`9.1`, `9.4.1`).
#[derive(Debug, Clone)]
pub struct DecisionItem {
    pub dotted: String,
    /// `ITEM-<dotted>`.
    pub span_id: String,
    pub char_start: usize,
    pub char_end: usize,
}

/// One canonical section with its physical anchor and inner structure.
#[derive(Debug, Clone)]
pub struct RulingSection {
    pub section_type: SectionType,
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
    pub page_number: u32,
    pub bbox: [f32; 4],
    pub paragraphs: Vec<RulingParagraph>,
    pub items: Vec<DecisionItem>,
}

/// Parsed ruling: header metadata plus canonical sections in document order.
#[derive(Debug, Clone)]
pub struct RulingDocument {
    pub header: RulingHeader,
    pub sections: Vec<RulingSection>,
}

/// Ruling structural parser. Holds compiled patterns; build once.
pub struct RulingParser {
    header: HeaderPatterns,
    section_report: Regex,
    section_vote: Regex,
    section_decision: Regex,
    numbered_paragraph: Regex,
    dotted_item: Regex,
}

impl Default for RulingParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RulingParser {
    pub fn new() -> Self {
        Self {
            header: HeaderPatterns::new(),
            section_report: Regex::new(r"(?i)^\s*RELAT[ÓO]RIO\s*$").unwrap(),
            section_vote: Regex::new(r"(?i)^\s*VOTO\s*$").unwrap(),
            // The bare word only; the title line carries a number and does
            // not match.
            section_decision: Regex::new(r"(?i)^\s*AC[ÓO]RD[ÃA]O\s*$").unwrap(),
            numbered_paragraph: Regex::new(r"^(\d{1,3})\.\s+").unwrap(),
            dotted_item: Regex::new(r"^(\d+(?:\.\d+)+)\.?\s+").unwrap(),
        }
    }

    /// Parse the ruling's structure out of an extraction.
    pub fn parse(&self, extraction: &ExtractionResult) -> ClassifyResult<RulingDocument> {
        let canonical = extraction.canonical_text.as_str();

        // Locate section header blocks.
        let mut markers: Vec<(SectionType, usize, usize, u32, [f32; 4])> = Vec::new();
        for (page, block) in extraction.flat_blocks() {
            let first_line = block.text.lines().next().unwrap_or("");
            let section_type = if self.section_report.is_match(first_line) {
                Some(SectionType::Report)
            } else if self.section_vote.is_match(first_line) {
                Some(SectionType::Vote)
            } else if self.section_decision.is_match(first_line) {
                Some(SectionType::Decision)
            } else {
                None
            };
            if let Some(kind) = section_type {
                // Keep the first occurrence of each section kind.
                if !markers.iter().any(|(k, ..)| *k == kind) {
                    markers.push((kind, block.char_start, block.char_end, page, block.bbox));
                }
            }
        }

        if markers.is_empty() {
            return Err(ClassifyError::EmptyDocument);
        }

        let first_section_start = markers[0].1;
        let header_region = &canonical[..first_section_start];
        let header = self.header.parse(header_region);

        let mut sections = Vec::new();

        // Summary section from the header region, when it has substance.
        if !header_region.trim().is_empty() {
            let (start, end) = trim_range(canonical, 0, first_section_start);
            if end > start {
                sections.push(RulingSection {
                    section_type: SectionType::Summary,
                    text: canonical[start..end].to_string(),
                    char_start: start,
                    char_end: end,
                    page_number: 1,
                    bbox: extraction
                        .flat_blocks()
                        .next()
                        .map(|(_, b)| b.bbox)
                        .unwrap_or([0.0; 4]),
                    paragraphs: Vec::new(),
                    items: Vec::new(),
                });
            }
        }

        for (i, (kind, marker_start, _marker_end, page, bbox)) in markers.iter().enumerate() {
            let region_end = markers
                .get(i + 1)
                .map(|(_, next_start, ..)| *next_start)
                .unwrap_or(canonical.len());
            let (start, end) = trim_range(canonical, *marker_start, region_end);
            if end <= start {
                continue;
            }

            let mut section = RulingSection {
                section_type: *kind,
                text: canonical[start..end].to_string(),
                char_start: start,
                char_end: end,
                page_number: *page,
                bbox: *bbox,
                paragraphs: Vec::new(),
                items: Vec::new(),
            };
            self.index_inner_structure(extraction, &mut section);
            sections.push(section);
        }

        Ok(RulingDocument { header, sections })
    }

    /// Record numbered paragraphs / dotted items whose blocks fall inside
    /// the section range.
    fn index_inner_structure(&self, extraction: &ExtractionResult, section: &mut RulingSection) {
        let section_token = match section.section_type {
            SectionType::Report => "REPORT",
            SectionType::Vote => "VOTE",
            SectionType::Decision => "DECISION",
            SectionType::Summary => return,
        };

        let in_range: Vec<&crate::extract::BlockRecord> = extraction
            .flat_blocks()
            .filter(|(_, b)| b.char_start >= section.char_start && b.char_end <= section.char_end)
            .map(|(_, b)| b)
            .collect();

        for (i, block) in in_range.iter().enumerate() {
            let first_line = block.text.lines().next().unwrap_or("");
            // A paragraph or item runs until the next structured block.
            let span_end = in_range
                .iter()
                .skip(i + 1)
                .find(|b| {
                    self.numbered_paragraph.is_match(b.text.lines().next().unwrap_or(""))
                        || self.dotted_item.is_match(b.text.lines().next().unwrap_or(""))
                })
                .map(|b| b.char_start.saturating_sub(1))
                .unwrap_or(section.char_end);

            if section.section_type == SectionType::Decision {
                if let Some(caps) = self.dotted_item.captures(first_line) {
                    let dotted = caps[1].to_string();
                    section.items.push(DecisionItem {
                        span_id: format!("ITEM-{dotted}"),
                        dotted,
                        char_start: block.char_start,
                        char_end: span_end,
                    });
                    continue;
                }
            }
            if let Some(caps) = self.numbered_paragraph.captures(first_line) {
                if let Ok(number) = caps[1].parse::<u32>() {
                    section.paragraphs.push(RulingParagraph {
                        span_id: format!("PAR-{section_token}-{number}"),
                        number,
                        char_start: block.char_start,
                        char_end: span_end,
                    });
                }
            }
        }
    }
}

/// Shrink `[start, end)` past leading/trailing ASCII whitespace.
fn trim_range(canonical: &str, mut start: usize, mut end: usize) -> (usize, usize) {
    let bytes = canonical.as_bytes();
    while start < end && (bytes[start] == b'\n' || bytes[start] == b' ' || bytes[start] == b'\t') {
        start += 1;
    }
    while end > start
        && (bytes[end - 1] == b'\n' || bytes[end - 1] == b' ' || bytes[end - 1] == b'\t')
    {
        end -= 1;
    }
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::model::{BlockRecord, PageRecord};

    fn ruling_extraction(texts: &[&str]) -> ExtractionResult {
        let mut canonical = String::new();
        let mut blocks = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let normalized = crate::canonical::normalize_block(text);
            let char_start = canonical.len();
            canonical.push_str(&normalized);
            let char_end = canonical.len();
            canonical.push('\n');
            blocks.push(BlockRecord {
                block_index: i,
                text: normalized,
                bbox: [50.0, 700.0, 545.0, 712.0],
                char_start,
                char_end,
            });
        }
        let canonical = crate::canonical::normalize(&canonical);
        let canonical_hash = crate::canonical::hash(&canonical);
        ExtractionResult {
            canonical_text: canonical,
            canonical_hash,
            pages: vec![PageRecord {
                page_number: 1,
                width_pt: 595.0,
                height_pt: 842.0,
                png: Vec::new(),
                image_width_px: 0,
                image_height_px: 0,
                blocks,
            }],
        }
    }

    fn sample() -> ExtractionResult {
        ruling_extraction(&[
            "ACÓRDÃO Nº 2622/2013 – TCU – Plenário",
            "Relator: Ministro Benjamin Zymler",
            "SUMÁRIO: REPRESENTAÇÃO. LICITAÇÃO. Procedente em parte.",
            "RELATÓRIO",
            "1. Trata-se de representação formulada por licitante.",
            "2. A unidade técnica instruiu o feito.",
            "VOTO",
            "1. Assiste razão à representante.",
            "2. O sobrepreço ficou demonstrado nos autos.",
            "ACÓRDÃO",
            "9.1. conhecer da representação;",
            "9.2. julgar procedente a representação;",
            "9.4.1. dar ciência à unidade jurisdicionada.",
        ])
    }

    #[test]
    fn parses_sections_in_order() {
        let doc = RulingParser::new().parse(&sample()).unwrap();
        let kinds: Vec<SectionType> = doc.sections.iter().map(|s| s.section_type).collect();
        assert_eq!(
            kinds,
            vec![
                SectionType::Summary,
                SectionType::Report,
                SectionType::Vote,
                SectionType::Decision
            ]
        );
        assert_eq!(doc.header.ruling_number, Some(2622));
        assert_eq!(doc.header.panel.as_deref(), Some("Plenário"));
    }

    #[test]
    fn sections_slice_canonical_text() {
        let extraction = sample();
        let doc = RulingParser::new().parse(&extraction).unwrap();
        for section in &doc.sections {
            assert_eq!(
                &extraction.canonical_text[section.char_start..section.char_end],
                section.text
            );
        }
    }

    #[test]
    fn numbered_paragraphs_and_items_indexed() {
        let doc = RulingParser::new().parse(&sample()).unwrap();
        let report = doc
            .sections
            .iter()
            .find(|s| s.section_type == SectionType::Report)
            .unwrap();
        let spans: Vec<&str> = report.paragraphs.iter().map(|p| p.span_id.as_str()).collect();
        assert_eq!(spans, vec!["PAR-REPORT-1", "PAR-REPORT-2"]);

        let vote = doc
            .sections
            .iter()
            .find(|s| s.section_type == SectionType::Vote)
            .unwrap();
        assert_eq!(vote.paragraphs.len(), 2);
        assert_eq!(vote.paragraphs[0].span_id, "PAR-VOTE-1");

        let decision = doc
            .sections
            .iter()
            .find(|s| s.section_type == SectionType::Decision)
            .unwrap();
        let items: Vec<&str> = decision.items.iter().map(|i| i.span_id.as_str()).collect();
        assert_eq!(items, vec!["ITEM-9.1", "ITEM-9.2", "ITEM-9.4.1"]);
    }

    #[test]
    fn ruling_without_sections_is_empty() {
        let extraction = ruling_extraction(&["Documento sem estrutura de acórdão."]);
        let err = RulingParser::new().parse(&extraction).unwrap_err();
        assert!(matches!(err, ClassifyError::EmptyDocument));
    }

    #[test]
    fn empty_report_section_is_skipped() {
        let extraction = ruling_extraction(&[
            "ACÓRDÃO Nº 100/2020 – TCU – Plenário",
            "RELATÓRIO",
            "VOTO",
            "1. Voto com conteúdo.",
        ]);
        let doc = RulingParser::new().parse(&extraction).unwrap();
        // The report section only contains its own header word; it survives
        // as a minimal section, while the vote carries the content.
        let vote = doc
            .sections
            .iter()
            .find(|s| s.section_type == SectionType::Vote)
            .unwrap();
        assert!(vote.text.contains("conteúdo"));
    }
}
