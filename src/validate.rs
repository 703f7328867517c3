//! The pre-sink invariant gate and the non-fatal article-coverage
//! validator.
//!
//! The gate is the sole checkpoint between the pipeline and any external
//! persistence: either every chunk of a document passes all eight rules or
//! the whole document is aborted. Rules are numbered; the first violation
//! reports its rule number and the offending chunk so an operator can find
//! the defect without replaying the pipeline.

use std::collections::{BTreeMap, HashMap};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canonical;
use crate::chunk::ProcessedChunk;
use crate::classify::DeviceType;

const VALID_PREFIXES: [&str; 3] = ["laws:", "rulings:", "summaries:"];

/// Fatal contract violation: aborts the document, nothing is persisted.
#[derive(Debug, Error, Diagnostic)]
#[error("contract violation (rule {rule}) on chunk \"{node_id}\" of {document_id}: {reason}")]
#[diagnostic(
    code(lexcanon::validate::contract_violation),
    help(
        "A chunk reached the gate in a state that would corrupt the sinks. \
         The document was aborted with no partial persistence; fix the \
         pipeline defect and re-ingest."
    )
)]
pub struct ContractViolationError {
    pub document_id: String,
    pub node_id: String,
    pub rule: u8,
    pub reason: String,
}

/// Convenience alias for gate results.
pub type ValidateResult<T> = std::result::Result<T, ContractViolationError>;

/// Run the gate over every chunk of a document.
pub fn validate_chunks(
    document_id: &str,
    canonical_text: &str,
    chunks: &[ProcessedChunk],
) -> ValidateResult<()> {
    let document_hash = canonical::hash(canonical_text);

    for chunk in chunks {
        check_chunk(document_id, canonical_text, &document_hash, chunk)?;
    }
    check_structure(document_id, chunks)?;

    tracing::debug!(chunks = chunks.len(), document_id, "invariant gate passed");
    Ok(())
}

fn violation(
    document_id: &str,
    chunk: &ProcessedChunk,
    rule: u8,
    reason: impl Into<String>,
) -> ContractViolationError {
    ContractViolationError {
        document_id: document_id.to_string(),
        node_id: chunk.node_id.clone(),
        rule,
        reason: reason.into(),
    }
}

fn check_chunk(
    document_id: &str,
    canonical_text: &str,
    document_hash: &str,
    chunk: &ProcessedChunk,
) -> ValidateResult<()> {
    // Rule 1: prefixed node id, no "@P" part suffix.
    if !VALID_PREFIXES.iter().any(|p| chunk.node_id.starts_with(p)) {
        return Err(violation(document_id, chunk, 1, "node_id lacks a valid prefix"));
    }
    if chunk.node_id.contains("@P") {
        return Err(violation(document_id, chunk, 1, "node_id carries a part suffix"));
    }

    // Rule 2: parent empty or prefixed.
    if !chunk.parent_node_id.is_empty()
        && !VALID_PREFIXES
            .iter()
            .any(|p| chunk.parent_node_id.starts_with(p))
    {
        return Err(violation(
            document_id,
            chunk,
            2,
            "parent_node_id lacks a valid prefix",
        ));
    }

    // Rule 3: nested law devices must have a parent.
    if matches!(
        chunk.device_type,
        DeviceType::Paragraph | DeviceType::Item | DeviceType::Subitem
    ) && chunk.parent_node_id.is_empty()
    {
        return Err(violation(
            document_id,
            chunk,
            3,
            "nested device without parent_node_id",
        ));
    }

    // Rule 4: evidence triple is either the sentinel or coherent.
    let sentinel = chunk.has_sentinel_evidence();
    if !sentinel {
        if chunk.canonical_start < 0
            || chunk.canonical_end <= chunk.canonical_start
            || chunk.canonical_hash.is_empty()
        {
            return Err(violation(
                document_id,
                chunk,
                4,
                format!(
                    "incoherent evidence triple ({}, {}, {:?})",
                    chunk.canonical_start, chunk.canonical_end, chunk.canonical_hash
                ),
            ));
        }
    }

    // Rule 5: evidence-bearing device types never carry the sentinel.
    if sentinel && chunk.device_type.is_evidence_bearing() {
        return Err(violation(
            document_id,
            chunk,
            5,
            "evidence-bearing chunk carries the sentinel triple",
        ));
    }
    if sentinel {
        return Ok(());
    }

    // Rule 6: the slice reconstructs the chunk text. Laws require byte
    // equality; ruling sections (overlapping parts) pass on the first whole
    // word.
    let (start, end) = (chunk.canonical_start as usize, chunk.canonical_end as usize);
    let slice = match canonical_text.get(start..end) {
        Some(s) => s,
        None => {
            return Err(violation(
                document_id,
                chunk,
                6,
                "offsets fall outside the canonical text",
            ));
        }
    };
    if chunk.device_type == DeviceType::Section {
        let slice_word = slice.split_whitespace().next().unwrap_or("");
        if slice_word != chunk.first_word() {
            return Err(violation(
                document_id,
                chunk,
                6,
                "slice does not begin with the chunk's first word",
            ));
        }
    } else if slice != chunk.text {
        return Err(violation(
            document_id,
            chunk,
            6,
            "slice does not equal the chunk text",
        ));
    }

    // Rule 7: one canonical hash per document.
    if chunk.canonical_hash != document_hash {
        return Err(violation(
            document_id,
            chunk,
            7,
            "canonical_hash differs from the document hash",
        ));
    }

    Ok(())
}

/// Rule 8: siblings disjoint, children contained in their parents. Ruling
/// sections are exempt from sibling disjointness — their parts overlap by
/// design and carry no parent links.
fn check_structure(document_id: &str, chunks: &[ProcessedChunk]) -> ValidateResult<()> {
    let by_node: HashMap<&str, &ProcessedChunk> =
        chunks.iter().map(|c| (c.node_id.as_str(), c)).collect();

    let mut sibling_groups: HashMap<&str, Vec<&ProcessedChunk>> = HashMap::new();
    for chunk in chunks {
        if chunk.device_type == DeviceType::Section || chunk.has_sentinel_evidence() {
            continue;
        }
        if !chunk.parent_node_id.is_empty() {
            if let Some(parent) = by_node.get(chunk.parent_node_id.as_str()) {
                if chunk.canonical_start < parent.canonical_start
                    || chunk.canonical_end > parent.canonical_end
                {
                    return Err(violation(
                        document_id,
                        chunk,
                        8,
                        format!("range escapes parent {}", parent.node_id),
                    ));
                }
            }
        }
        sibling_groups
            .entry(chunk.parent_node_id.as_str())
            .or_default()
            .push(chunk);
    }

    for siblings in sibling_groups.values_mut() {
        siblings.sort_by_key(|c| c.canonical_start);
        for pair in siblings.windows(2) {
            if pair[0].canonical_end > pair[1].canonical_start {
                return Err(violation(
                    document_id,
                    pair[1],
                    8,
                    format!("range overlaps sibling {}", pair[0].node_id),
                ));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Article coverage (non-fatal)
// ---------------------------------------------------------------------------

/// Outcome of the article-coverage check. Never aborts a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Passed,
    Warning,
    Failed,
}

/// Article-coverage report, attached to the ingest result when the caller
/// asks for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub status: ValidationStatus,
    pub expected_articles: u32,
    pub found_articles: u32,
    pub missing_articles: Vec<u32>,
    pub duplicate_articles: Vec<u32>,
    pub split_articles: Vec<u32>,
    pub coverage_percent: f32,
    /// Chunk counts by device type.
    pub chunks_manifest: BTreeMap<String, usize>,
}

/// Compare the found article set against the expected range.
pub fn validate_article_coverage(
    chunks: &[ProcessedChunk],
    expected_first: Option<u32>,
    expected_last: Option<u32>,
) -> ValidationSummary {
    // Logical article chunks only; split parts share their parent's number.
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    let mut split_articles: Vec<u32> = Vec::new();
    for chunk in chunks {
        if chunk.device_type != DeviceType::Article || chunk.node_id != chunk.logical_node_id {
            continue;
        }
        if let Some(n) = chunk.article_number {
            // Suffix articles (ART-005-A) are their own devices, not
            // duplicates of the base number.
            if chunk.span_id == format!("ART-{n:03}") {
                *counts.entry(n).or_insert(0) += 1;
            }
            if chunk.part_total > 1 || !chunk.indexable {
                split_articles.push(n);
            }
        }
    }
    split_articles.dedup();

    let found: Vec<u32> = counts.keys().copied().collect();
    let first = expected_first.or(found.first().copied()).unwrap_or(0);
    let last = expected_last.or(found.last().copied()).unwrap_or(0);

    let expected: Vec<u32> = if last >= first && first > 0 {
        (first..=last).collect()
    } else {
        Vec::new()
    };
    let missing: Vec<u32> = expected
        .iter()
        .copied()
        .filter(|n| !counts.contains_key(n))
        .collect();
    let duplicates: Vec<u32> = counts
        .iter()
        .filter(|&(_, &count)| count > 1)
        .map(|(&n, _)| n)
        .collect();

    let coverage_percent = if expected.is_empty() {
        100.0
    } else {
        ((expected.len() - missing.len()) as f32 / expected.len() as f32) * 100.0
    };
    let status = if missing.is_empty() && duplicates.is_empty() {
        ValidationStatus::Passed
    } else if coverage_percent >= 80.0 {
        ValidationStatus::Warning
    } else {
        ValidationStatus::Failed
    };

    let mut chunks_manifest: BTreeMap<String, usize> = BTreeMap::new();
    for chunk in chunks {
        *chunks_manifest
            .entry(chunk.device_type.as_str().to_string())
            .or_insert(0) += 1;
    }

    ValidationSummary {
        status,
        expected_articles: expected.len() as u32,
        found_articles: found.len() as u32,
        missing_articles: missing,
        duplicate_articles: duplicates,
        split_articles,
        coverage_percent,
        chunks_manifest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{DocumentType, OriginConfidence, OriginType};

    fn chunk(
        node_id: &str,
        parent: &str,
        device_type: DeviceType,
        text: &str,
        start: i64,
        end: i64,
        hash: &str,
    ) -> ProcessedChunk {
        ProcessedChunk {
            node_id: node_id.into(),
            logical_node_id: node_id.into(),
            chunk_id: node_id.split_once(':').map(|(_, r)| r).unwrap_or(node_id).into(),
            span_id: node_id.split('#').next_back().unwrap_or("").into(),
            parent_node_id: parent.into(),
            device_type,
            chunk_level: device_type.hierarchy_depth(),
            part_index: 1,
            part_total: 1,
            text: text.into(),
            retrieval_text: text.into(),
            document_id: "LEI-1-2020".into(),
            document_type: DocumentType::Law,
            number: "1".into(),
            year: 2020,
            article_number: Some(1),
            canonical_start: start,
            canonical_end: end,
            canonical_hash: hash.into(),
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
        }
    }

    #[test]
    fn valid_document_passes() {
        let text = "Art. 1º Caput.\n§ 1º Filho.\n";
        let hash = canonical::hash(text);
        let chunks = vec![
            chunk(
                "laws:LEI-1-2020#ART-001",
                "",
                DeviceType::Article,
                "Art. 1º Caput.\n§ 1º Filho.",
                0,
                29,
                &hash,
            ),
            chunk(
                "laws:LEI-1-2020#PAR-001-1",
                "laws:LEI-1-2020#ART-001",
                DeviceType::Paragraph,
                "§ 1º Filho.",
                16,
                29,
                &hash,
            ),
        ];
        validate_chunks("LEI-1-2020", text, &chunks).unwrap();
    }

    #[test]
    fn bad_prefix_fails_rule_1() {
        let text = "Art. 1º X.\n";
        let hash = canonical::hash(text);
        let chunks = vec![chunk("bogus:LEI#ART-001", "", DeviceType::Article, "Art. 1º X.", 0, 12, &hash)];
        let err = validate_chunks("LEI-1-2020", text, &chunks).unwrap_err();
        assert_eq!(err.rule, 1);
    }

    #[test]
    fn part_suffix_in_node_id_fails_rule_1() {
        let text = "Art. 1º X.\n";
        let hash = canonical::hash(text);
        let chunks = vec![chunk(
            "laws:LEI-1-2020#ART-001@P01",
            "",
            DeviceType::Article,
            "Art. 1º X.",
            0,
            12,
            &hash,
        )];
        let err = validate_chunks("LEI-1-2020", text, &chunks).unwrap_err();
        assert_eq!(err.rule, 1);
    }

    #[test]
    fn orphan_paragraph_fails_rule_3() {
        let text = "§ 1º Órfão.\n";
        let hash = canonical::hash(text);
        let chunks = vec![chunk(
            "laws:LEI-1-2020#PAR-001-1",
            "",
            DeviceType::Paragraph,
            "§ 1º Órfão.",
            0,
            13,
            &hash,
        )];
        let err = validate_chunks("LEI-1-2020", text, &chunks).unwrap_err();
        assert_eq!(err.rule, 3);
    }

    #[test]
    fn sentinel_on_article_fails_rule_5() {
        let text = "Art. 1º X.\n";
        let mut c = chunk("laws:LEI-1-2020#ART-001", "", DeviceType::Article, "Art. 1º X.", -1, -1, "");
        c.canonical_hash = String::new();
        let err = validate_chunks("LEI-1-2020", text, &[c]).unwrap_err();
        assert_eq!(err.rule, 5);
    }

    #[test]
    fn wrong_slice_fails_rule_6() {
        let text = "Art. 1º Certo.\n";
        let hash = canonical::hash(text);
        let chunks = vec![chunk(
            "laws:LEI-1-2020#ART-001",
            "",
            DeviceType::Article,
            "Art. 1º Errado.",
            0,
            14,
            &hash,
        )];
        let err = validate_chunks("LEI-1-2020", text, &chunks).unwrap_err();
        assert_eq!(err.rule, 6);
    }

    #[test]
    fn wrong_hash_fails_rule_7() {
        let text = "Art. 1º X.\n";
        let chunks = vec![chunk(
            "laws:LEI-1-2020#ART-001",
            "",
            DeviceType::Article,
            "Art. 1º X.",
            0,
            11,
            "0000",
        )];
        let err = validate_chunks("LEI-1-2020", text, &chunks).unwrap_err();
        assert_eq!(err.rule, 7);
    }

    #[test]
    fn child_escaping_parent_fails_rule_8() {
        let text = "Art. 1º Caput.\n§ 1º Filho longo.\n";
        let hash = canonical::hash(text);
        let chunks = vec![
            chunk(
                "laws:LEI-1-2020#ART-001",
                "",
                DeviceType::Article,
                "Art. 1º Caput.",
                0,
                15,
                &hash,
            ),
            chunk(
                "laws:LEI-1-2020#PAR-001-1",
                "laws:LEI-1-2020#ART-001",
                DeviceType::Paragraph,
                "§ 1º Filho longo.",
                16,
                35,
                &hash,
            ),
        ];
        let err = validate_chunks("LEI-1-2020", text, &chunks).unwrap_err();
        assert_eq!(err.rule, 8);
    }

    #[test]
    fn ruling_overlap_is_allowed() {
        let text = "VOTO\nParte um compartilha texto com parte dois.\n";
        let hash = canonical::hash(text);
        let mut a = chunk(
            "rulings:ACORDAO-1-2020#SEC-VOTE-P01",
            "",
            DeviceType::Section,
            "VOTO\nParte um compartilha",
            0,
            26,
            &hash,
        );
        a.part_total = 2;
        let mut b = chunk(
            "rulings:ACORDAO-1-2020#SEC-VOTE-P02",
            "",
            DeviceType::Section,
            "compartilha texto com parte dois.",
            14,
            47,
            &hash,
        );
        b.part_index = 2;
        b.part_total = 2;
        validate_chunks("ACORDAO-1-2020", text, &[a, b]).unwrap();
    }

    #[test]
    fn coverage_reports_missing_and_duplicates() {
        let text_hash = "h";
        let mut chunks: Vec<ProcessedChunk> = (1..=5)
            .filter(|n| *n != 3)
            .map(|n| {
                let mut c = chunk(
                    &format!("laws:LEI-1-2020#ART-{n:03}"),
                    "",
                    DeviceType::Article,
                    "Art.",
                    (n as i64) * 10,
                    (n as i64) * 10 + 4,
                    text_hash,
                );
                c.article_number = Some(n);
                c
            })
            .collect();
        // A duplicate of article 2.
        let mut dup = chunks[1].clone();
        dup.canonical_start += 1000;
        dup.canonical_end += 1000;
        chunks.push(dup);

        let summary = validate_article_coverage(&chunks, Some(1), Some(5));
        assert_eq!(summary.expected_articles, 5);
        assert_eq!(summary.missing_articles, vec![3]);
        assert_eq!(summary.duplicate_articles, vec![2]);
        assert_eq!(summary.status, ValidationStatus::Warning);
        assert!((summary.coverage_percent - 80.0).abs() < 0.01);
    }

    #[test]
    fn full_coverage_passes() {
        let chunks: Vec<ProcessedChunk> = (1..=3)
            .map(|n| {
                let mut c = chunk(
                    &format!("laws:LEI-1-2020#ART-{n:03}"),
                    "",
                    DeviceType::Article,
                    "Art.",
                    (n as i64) * 10,
                    (n as i64) * 10 + 4,
                    "h",
                );
                c.article_number = Some(n);
                c
            })
            .collect();
        let summary = validate_article_coverage(&chunks, None, None);
        assert_eq!(summary.status, ValidationStatus::Passed);
        assert_eq!(summary.found_articles, 3);
        assert!((summary.coverage_percent - 100.0).abs() < 0.01);
    }
}
