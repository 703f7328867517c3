//! Court-ruling pipeline: header parsing, section structure, overlap
//! chunking.
//!
//! Rulings do not use the article hierarchy. They are organized by sections
//! (summary, report, vote, decision) with numbered paragraphs inside them,
//! and the emitted chunks form a flat list: `parent_node_id` is always
//! empty, and consecutive parts of a split section overlap on purpose so no
//! reasoning step is ever cut in half at retrieval time.

pub mod chunker;
pub mod header;
pub mod sections;

pub use chunker::{chunk_section, RulingChunkConfig, SectionPart};
pub use header::{Outcome, RulingHeader};
pub use sections::{DecisionItem, RulingDocument, RulingParagraph, RulingParser, RulingSection};

use crate::chunk::{
    DocumentIdentity, OriginConfidence, OriginType, ProcessedChunk, SectionType,
};
use crate::classify::DeviceType;

/// Builds the flat chunk list for a parsed ruling.
pub struct RulingChunker {
    config: RulingChunkConfig,
}

impl Default for RulingChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl RulingChunker {
    pub fn new() -> Self {
        Self {
            config: RulingChunkConfig::default(),
        }
    }

    pub fn with_config(config: RulingChunkConfig) -> Self {
        Self { config }
    }

    /// Emit chunks for every section, in document order.
    pub fn build(
        &self,
        identity: &DocumentIdentity,
        document: &RulingDocument,
        canonical_hash: &str,
    ) -> Vec<ProcessedChunk> {
        let prefix = identity.document_type.node_prefix();
        let mut chunks = Vec::new();

        for section in &document.sections {
            let parts = chunk_section(section, &self.config);
            for part in &parts {
                let chunk_id = format!("{}#{}", identity.document_id, part.span_id);
                let node_id = format!("{prefix}:{chunk_id}");
                let logical_node_id = format!(
                    "{prefix}:{}#{}",
                    identity.document_id,
                    section.section_type.span_id()
                );
                let retrieval_text = format!(
                    "{}\n{}",
                    context_line(identity, &document.header, section.section_type, part),
                    part.text
                );

                chunks.push(ProcessedChunk {
                    node_id,
                    logical_node_id,
                    chunk_id,
                    span_id: part.span_id.clone(),
                    parent_node_id: String::new(),
                    device_type: DeviceType::Section,
                    chunk_level: 0,
                    part_index: part.part_index,
                    part_total: part.part_total,
                    text: part.text.clone(),
                    retrieval_text,
                    document_id: identity.document_id.clone(),
                    document_type: identity.document_type,
                    number: identity.number.clone(),
                    year: identity.year,
                    article_number: None,
                    canonical_start: part.char_start as i64,
                    canonical_end: part.char_end as i64,
                    canonical_hash: canonical_hash.to_string(),
                    page_number: section.page_number,
                    bbox: section.bbox.to_vec(),
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
                    section_type: Some(section.section_type),
                    authority_level: Some(section.section_type.authority_level()),
                    section_path: Some(format!(
                        "{}/{}",
                        section.section_type.as_str(),
                        part.part_index
                    )),
                });
            }
        }

        tracing::debug!(chunks = chunks.len(), "ruling chunking complete");
        chunks
    }
}

/// Contextual retrieval header: ruling number, panel, rapporteur, section
/// label, part X/Y.
fn context_line(
    identity: &DocumentIdentity,
    header: &RulingHeader,
    section: SectionType,
    part: &SectionPart,
) -> String {
    let mut line = match (header.ruling_number, header.ruling_year) {
        (Some(n), Some(y)) => format!("Acórdão {n}/{y}"),
        _ => identity.context_header(),
    };
    if let Some(panel) = &header.panel {
        line.push_str(&format!(" - {panel}"));
    }
    if let Some(rapporteur) = &header.rapporteur {
        line.push_str(&format!(" - Rel. {rapporteur}"));
    }
    line.push_str(&format!(" - {}", section_label(section)));
    if part.part_total > 1 {
        line.push_str(&format!(" (parte {}/{})", part.part_index, part.part_total));
    }
    line
}

fn section_label(section: SectionType) -> &'static str {
    match section {
        SectionType::Summary => "Sumário",
        SectionType::Report => "Relatório",
        SectionType::Vote => "Voto",
        SectionType::Decision => "Acórdão",
    }
}
