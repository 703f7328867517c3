//! Post-extraction citation normalization.
//!
//! The origin system accepted citations as either bare strings or dicts;
//! here the boundary adapter folds both into the single [`Citation`] record
//! before the suppression rules run. Order matters and is pinned by the
//! pipeline contract: blanks out, self-loops out, parent-loops out, then an
//! order-preserving dedup.

use std::collections::HashSet;

use crate::chunk::{Citation, DocumentType, RelType};

/// A citation as it may arrive from outside the core: a bare target string
/// or a full record.
#[derive(Debug, Clone)]
pub enum RawCitation {
    Target(String),
    Record(Citation),
}

impl RawCitation {
    /// Adapt a JSON value (string or object) at the boundary. Anything else
    /// is dropped by normalization.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self::Target(s.clone())),
            serde_json::Value::Object(map) => {
                let target = map.get("target_node_id")?.as_str()?.to_string();
                let rel_type = map
                    .get("rel_type")
                    .and_then(|v| serde_json::from_value::<RelType>(v.clone()).ok())
                    .unwrap_or(RelType::Cites);
                let rel_type_confidence = map
                    .get("rel_type_confidence")
                    .and_then(|v| v.as_f64())
                    .map(|f| f as f32)
                    .unwrap_or(0.5);
                Some(Self::Record(Citation {
                    target_node_id: target,
                    rel_type,
                    rel_type_confidence,
                }))
            }
            _ => None,
        }
    }

    fn into_citation(self) -> Citation {
        match self {
            Self::Target(target_node_id) => Citation {
                target_node_id,
                rel_type: RelType::Cites,
                rel_type_confidence: 0.5,
            },
            Self::Record(citation) => citation,
        }
    }
}

/// Normalize a chunk's citation list.
///
/// In order: drop empty targets, fold raw inputs into [`Citation`] records,
/// suppress self-loops, suppress parent-loops (the parent node id is
/// `"<prefix>:<parent_chunk_id>"`, prefix from the document type or, absent
/// that, inferred from the chunk's own node id), then dedup preserving
/// first-seen order.
pub fn normalize_citations(
    raw: impl IntoIterator<Item = RawCitation>,
    chunk_node_id: &str,
    parent_chunk_id: Option<&str>,
    document_type: Option<DocumentType>,
) -> Vec<Citation> {
    let parent_node_id = parent_chunk_id.filter(|p| !p.trim().is_empty()).map(|p| {
        let prefix = document_type
            .map(|t| t.node_prefix())
            .or_else(|| chunk_node_id.split(':').next())
            .unwrap_or("laws");
        format!("{prefix}:{p}")
    });

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for item in raw {
        let citation = item.into_citation();
        let target = citation.target_node_id.trim().to_string();
        if target.is_empty() {
            continue;
        }
        if target == chunk_node_id {
            continue;
        }
        if parent_node_id.as_deref() == Some(target.as_str()) {
            continue;
        }
        if seen.insert(target.clone()) {
            out.push(Citation {
                target_node_id: target,
                ..citation
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(citations: &[Citation]) -> Vec<&str> {
        citations.iter().map(|c| c.target_node_id.as_str()).collect()
    }

    #[test]
    fn drops_blank_and_self_and_parent() {
        let raw = vec![
            RawCitation::Target("".into()),
            RawCitation::Target("   ".into()),
            RawCitation::Target("laws:LEI-12.850-2013#ART-003".into()),
            RawCitation::Target("laws:LEI-14.133-2021#ART-006-P01".into()), // self
            RawCitation::Target("laws:LEI-14.133-2021#ART-006".into()),     // parent
        ];
        let out = normalize_citations(
            raw,
            "laws:LEI-14.133-2021#ART-006-P01",
            Some("LEI-14.133-2021#ART-006"),
            Some(DocumentType::Law),
        );
        assert_eq!(targets(&out), vec!["laws:LEI-12.850-2013#ART-003"]);
    }

    #[test]
    fn dedups_preserving_first_seen_order() {
        let raw = vec![
            RawCitation::Target("laws:A#X".into()),
            RawCitation::Target("laws:B#Y".into()),
            RawCitation::Target("laws:A#X".into()),
        ];
        let out = normalize_citations(raw, "laws:C#Z", None, Some(DocumentType::Law));
        assert_eq!(targets(&out), vec!["laws:A#X", "laws:B#Y"]);
    }

    #[test]
    fn parent_prefix_inferred_from_chunk_node_id() {
        let raw = vec![RawCitation::Target("rulings:ACORDAO-100-2020#SEC-VOTE".into())];
        let out = normalize_citations(
            raw,
            "rulings:ACORDAO-100-2020#SEC-REPORT",
            Some("ACORDAO-100-2020#SEC-VOTE"),
            None,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn json_adapter_accepts_string_and_object() {
        let s = serde_json::json!("laws:LEI-8.666-1993#ART-001");
        let raw = RawCitation::from_json(&s).unwrap();
        assert!(matches!(raw, RawCitation::Target(_)));

        let obj = serde_json::json!({
            "target_node_id": "laws:LEI-8.666-1993#ART-002",
            "rel_type": "REVOKES",
            "rel_type_confidence": 0.9
        });
        let raw = RawCitation::from_json(&obj).unwrap();
        match raw {
            RawCitation::Record(c) => {
                assert_eq!(c.rel_type, RelType::Revokes);
                assert!((c.rel_type_confidence - 0.9).abs() < 1e-6);
            }
            other => panic!("wrong variant: {other:?}"),
        }

        assert!(RawCitation::from_json(&serde_json::json!(42)).is_none());
    }
}
