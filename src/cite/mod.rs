//! Citation extraction and normalization.
//!
//! For each chunk, detect normative references in its text and emit
//! canonical citations. Two hard rules: never fabricate a citation, and
//! never emit self- or parent-loops (the normalizer suppresses both).

mod patterns;
pub mod normalize;

pub use normalize::{normalize_citations, RawCitation};

use patterns::{CitationPatterns, ReferenceShape};

use crate::chunk::{
    normalize_document_id, Citation, DocumentIdentity, ProcessedChunk, RelType,
};
use crate::classify::article_token;
use crate::registry::NormRegistry;

// Confidence ladder for extracted citations.
const CONF_EXTERNAL_WITH_YEAR: f32 = 0.95;
const CONF_EXTERNAL_REGISTRY: f32 = 0.60;
const CONF_EXTERNAL_UNRESOLVED: f32 = 0.45;
const CONF_NO_NUMBER: f32 = 0.30;
const CONF_CONSTITUTIONAL: f32 = 0.95;
const CONF_INTERNAL_KNOWN: f32 = 0.90;
const CONF_INTERNAL_UNKNOWN: f32 = 0.50;

/// Extracts and normalizes citations for every chunk of a document.
pub struct CitationExtractor<'a> {
    registry: &'a NormRegistry,
    patterns: CitationPatterns,
}

impl<'a> CitationExtractor<'a> {
    pub fn new(registry: &'a NormRegistry) -> Self {
        Self {
            registry,
            patterns: CitationPatterns::new(),
        }
    }

    /// Extract raw citations from one text. `identity` is the host document;
    /// without it, internal references degrade to span-only targets at low
    /// confidence.
    pub fn extract(&self, text: &str, identity: Option<&DocumentIdentity>) -> Vec<RawCitation> {
        let mut out = Vec::new();
        let matches = self.patterns.find_all(text);

        for found in &matches {
            let rel_type = self.patterns.classify_rel(text, found.start);
            let citation = match &found.shape {
                ReferenceShape::ExternalDevice {
                    article,
                    item,
                    paragraph,
                    doc_type,
                    number,
                    year,
                } => {
                    let (document_id, confidence) =
                        self.external_document_id(doc_type, number, *year);
                    let span = device_span(*article, item.as_deref(), *paragraph);
                    Citation {
                        target_node_id: format!("laws:{document_id}#{span}"),
                        rel_type,
                        rel_type_confidence: confidence,
                    }
                }
                ReferenceShape::ExternalNorm {
                    doc_type,
                    number,
                    year,
                } => {
                    let (document_id, confidence) =
                        self.external_document_id(doc_type, number, *year);
                    Citation {
                        target_node_id: format!("laws:{document_id}"),
                        rel_type,
                        rel_type_confidence: confidence,
                    }
                }
                ReferenceShape::Constitutional { article } => Citation {
                    target_node_id: format!(
                        "laws:CF-1988#ART-{}",
                        article_token(*article, None)
                    ),
                    rel_type,
                    rel_type_confidence: CONF_CONSTITUTIONAL,
                },
                ReferenceShape::InternalDevice {
                    article,
                    item,
                    paragraph,
                } => internal_citation(
                    identity,
                    device_span(*article, item.as_deref(), *paragraph),
                    rel_type,
                ),
                ReferenceShape::InternalParagraph { article, paragraph } => internal_citation(
                    identity,
                    format!("PAR-{}-{paragraph}", article_token(*article, None)),
                    rel_type,
                ),
            };
            out.push(RawCitation::Record(citation));
        }

        // Name-only mentions of registered norms ("do Código Penal") carry
        // no numeric identifier; they are still worth a low-confidence edge.
        for norm in self.registry.norms() {
            for alias in std::iter::once(&norm.name).chain(norm.aliases.iter()) {
                if let Some(pos) = text.find(alias.as_str()) {
                    let claimed = matches
                        .iter()
                        .any(|m| pos < m.end && m.start < pos + alias.len());
                    if !claimed {
                        out.push(RawCitation::Record(Citation {
                            target_node_id: format!("laws:{}", norm.id),
                            rel_type: self.patterns.classify_rel(text, pos),
                            rel_type_confidence: CONF_NO_NUMBER,
                        }));
                    }
                    break;
                }
            }
        }

        out
    }

    /// Extract, normalize, and attach citations for every chunk.
    pub fn annotate(&self, identity: &DocumentIdentity, chunks: &mut [ProcessedChunk]) {
        for chunk in chunks.iter_mut() {
            let raw = self.extract(&chunk.text, Some(identity));
            let parent_chunk_id = if chunk.parent_node_id.is_empty() {
                None
            } else {
                chunk
                    .parent_node_id
                    .split_once(':')
                    .map(|(_, rest)| rest)
            };
            let citations = normalize_citations(
                raw,
                &chunk.node_id,
                parent_chunk_id,
                Some(chunk.document_type),
            );
            chunk.citations_count = citations.len() as u32;
            chunk.has_citations = !citations.is_empty();
            chunk.citations = citations;
        }
    }

    /// Canonical document id and confidence for an external reference.
    fn external_document_id(
        &self,
        doc_type: &str,
        number: &str,
        year: Option<i32>,
    ) -> (String, f32) {
        let type_token = normalize_type_token(doc_type);
        match year {
            Some(y) => (
                normalize_document_id(&format!("{type_token} {number}/{}", expand_year(y))),
                CONF_EXTERNAL_WITH_YEAR,
            ),
            None => match self.registry.resolve_number(type_token, number) {
                Some(entry) => (entry.id.clone(), CONF_EXTERNAL_REGISTRY),
                None => (
                    normalize_document_id(&format!("{type_token} {number}")),
                    CONF_EXTERNAL_UNRESOLVED,
                ),
            },
        }
    }
}

fn internal_citation(
    identity: Option<&DocumentIdentity>,
    span: String,
    rel_type: RelType,
) -> Citation {
    match identity {
        Some(id) => Citation {
            target_node_id: format!(
                "{}:{}#{span}",
                id.document_type.node_prefix(),
                id.document_id
            ),
            rel_type,
            rel_type_confidence: CONF_INTERNAL_KNOWN,
        },
        None => Citation {
            target_node_id: format!("#{span}"),
            rel_type,
            rel_type_confidence: CONF_INTERNAL_UNKNOWN,
        },
    }
}

fn device_span(article: u32, item: Option<&str>, paragraph: Option<u32>) -> String {
    let art = article_token(article, None);
    if let Some(roman) = item {
        format!("INC-{art}-{roman}")
    } else if let Some(n) = paragraph {
        format!("PAR-{art}-{n}")
    } else {
        format!("ART-{art}")
    }
}

fn normalize_type_token(raw: &str) -> &'static str {
    let folded = raw.to_lowercase();
    let folded = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    match folded.as_str() {
        "lei complementar" => "LC",
        "decreto-lei" => "DECRETO-LEI",
        "decreto" => "DECRETO",
        "instrução normativa" | "instrucao normativa" | "in" => "IN",
        _ => "LEI",
    }
}

/// Two-digit years pivot at 50: `93` → 1993, `21` → 2021.
fn expand_year(year: i32) -> i32 {
    if year >= 100 {
        year
    } else if year >= 50 {
        1900 + year
    } else {
        2000 + year
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::DocumentType;

    fn identity() -> DocumentIdentity {
        DocumentIdentity::new("IN-58-2022", DocumentType::NormativeInstruction, "58", 2022)
    }

    fn extractor_targets(text: &str) -> Vec<(String, RelType, f32)> {
        let registry = NormRegistry::builtin();
        let extractor = CitationExtractor::new(&registry);
        extractor
            .extract(text, Some(&identity()))
            .into_iter()
            .map(|raw| match raw {
                RawCitation::Record(c) => (c.target_node_id, c.rel_type, c.rel_type_confidence),
                RawCitation::Target(t) => (t, RelType::Cites, 0.5),
            })
            .collect()
    }

    #[test]
    fn external_device_citation_with_year() {
        let found = extractor_targets("nos termos do art. 18 da Lei 14.133/2021");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "laws:LEI-14.133-2021#ART-018");
        assert_eq!(found[0].1, RelType::Cites);
        assert!(found[0].2 >= 0.9);
    }

    #[test]
    fn external_norm_resolved_via_registry() {
        let found = extractor_targets("aplica-se subsidiariamente a Lei 8.666, no que couber");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "laws:LEI-8.666-1993");
        assert!((found[0].2 - 0.60).abs() < 1e-6);
    }

    #[test]
    fn unresolved_norm_without_year_is_low_confidence() {
        let found = extractor_targets("conforme a Lei 11.111, observado o procedimento");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "laws:LEI-11.111");
        assert!(found[0].2 <= 0.6);
    }

    #[test]
    fn constitutional_citation() {
        let found = extractor_targets("com base no art. 37 da Constituição Federal");
        assert!(found
            .iter()
            .any(|(t, _, c)| t == "laws:CF-1988#ART-037" && (*c - 0.95).abs() < 1e-6));
    }

    #[test]
    fn internal_paragraph_citation_resolves_to_host() {
        let found = extractor_targets("para os fins do § 1º do art. 40, aplica-se");
        assert!(found
            .iter()
            .any(|(t, _, c)| t == "laws:IN-58-2022#PAR-040-1" && (*c - 0.90).abs() < 1e-6));
    }

    #[test]
    fn name_only_mention_is_low_confidence() {
        let found = extractor_targets("na forma prevista no Código Penal, quando cabível");
        assert!(found
            .iter()
            .any(|(t, _, c)| t == "laws:DECRETO-LEI-2.848-1940" && (*c - 0.30).abs() < 1e-6));
    }

    #[test]
    fn amending_citation_gets_amends_rel() {
        let found =
            extractor_targets("O art. 5º da Lei 8.666/1993 passa a vigorar com a seguinte redação");
        assert_eq!(found[0].0, "laws:LEI-8.666-1993#ART-005");
        // The trigger phrase sits after the citation here, so the lexical
        // window sees it only for later matches; a preceding command like
        // "Dê-se nova redação ao art. 5º da Lei 8.666/1993" classifies.
        let found = extractor_targets("Dê-se nova redação ao art. 5º da Lei 8.666/1993");
        assert_eq!(found[0].1, RelType::ExplicitlyAmends);
    }

    #[test]
    fn two_digit_year_expansion() {
        assert_eq!(expand_year(93), 1993);
        assert_eq!(expand_year(21), 2021);
        assert_eq!(expand_year(1988), 1988);
    }

    #[test]
    fn annotate_suppresses_parent_loop_end_to_end() {
        use crate::chunk::{OriginConfidence, OriginType, ProcessedChunk};

        let registry = NormRegistry::builtin();
        let extractor = CitationExtractor::new(&registry);
        let identity =
            DocumentIdentity::new("LEI 14133/2021", DocumentType::Law, "14133", 2021);

        let mut chunks = vec![ProcessedChunk {
            node_id: "laws:LEI-14.133-2021#PAR-006-1".into(),
            logical_node_id: "laws:LEI-14.133-2021#PAR-006-1".into(),
            chunk_id: "LEI-14.133-2021#PAR-006-1".into(),
            span_id: "PAR-006-1".into(),
            parent_node_id: "laws:LEI-14.133-2021#ART-006".into(),
            device_type: crate::classify::DeviceType::Paragraph,
            chunk_level: 1,
            part_index: 1,
            part_total: 1,
            text: "§ 1º Aplica-se o disposto no art. 6º desta Lei e no art. 3º da Lei 12.850/2013."
                .into(),
            retrieval_text: String::new(),
            document_id: identity.document_id.clone(),
            document_type: DocumentType::Law,
            number: "14133".into(),
            year: 2021,
            article_number: Some(6),
            canonical_start: 0,
            canonical_end: 10,
            canonical_hash: "h".into(),
            page_number: 1,
            bbox: vec![],
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
        }];

        extractor.annotate(&identity, &mut chunks);
        let targets: Vec<&str> = chunks[0]
            .citations
            .iter()
            .map(|c| c.target_node_id.as_str())
            .collect();
        // "art. 6º desta Lei" resolves to the parent article and is dropped.
        assert_eq!(targets, vec!["laws:LEI-12.850-2013#ART-003"]);
        assert!(chunks[0].has_citations);
        assert_eq!(chunks[0].citations_count, 1);
    }
}
