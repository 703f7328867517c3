//! The unit handed to sinks: [`ProcessedChunk`], plus the document typing
//! and citation records it carries.

use serde::{Deserialize, Serialize};

use crate::classify::DeviceType;

/// The document families the pipeline ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "LEI")]
    Law,
    #[serde(rename = "DECRETO")]
    Decree,
    #[serde(rename = "IN")]
    NormativeInstruction,
    #[serde(rename = "LC")]
    ComplementaryLaw,
    #[serde(rename = "ACORDAO")]
    Ruling,
    #[serde(rename = "SUMULA")]
    Summary,
}

impl DocumentType {
    /// Canonical upper-case type token used inside document ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Law => "LEI",
            Self::Decree => "DECRETO",
            Self::NormativeInstruction => "IN",
            Self::ComplementaryLaw => "LC",
            Self::Ruling => "ACORDAO",
            Self::Summary => "SUMULA",
        }
    }

    /// Node-id prefix for this family: `laws`, `rulings`, or `summaries`.
    pub fn node_prefix(&self) -> &'static str {
        match self {
            Self::Law | Self::Decree | Self::NormativeInstruction | Self::ComplementaryLaw => {
                "laws"
            }
            Self::Ruling => "rulings",
            Self::Summary => "summaries",
        }
    }

    /// Whether this family uses the article hierarchy (vs. ruling sections).
    pub fn is_law_family(&self) -> bool {
        !matches!(self, Self::Ruling)
    }

    /// Parse the common spellings: `LEI`, `LAW`, `DECRETO`, `DECREE`, `IN`,
    /// `LC`, `ACORDAO`, `RULING`, `SUMULA`, `SUMMARY`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LEI" | "LAW" => Some(Self::Law),
            "DECRETO" | "DECREE" => Some(Self::Decree),
            "IN" | "INSTRUCAO-NORMATIVA" | "INSTRUÇÃO-NORMATIVA" => {
                Some(Self::NormativeInstruction)
            }
            "LC" | "LEI-COMPLEMENTAR" => Some(Self::ComplementaryLaw),
            "ACORDAO" | "ACÓRDÃO" | "RULING" => Some(Self::Ruling),
            "SUMULA" | "SÚMULA" | "SUMMARY" => Some(Self::Summary),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a chunk's text belongs to the host document or was transcribed
/// from another norm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OriginType {
    #[serde(rename = "self")]
    Own,
    #[serde(rename = "external")]
    External,
}

impl OriginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Own => "self",
            Self::External => "external",
        }
    }
}

/// Categorical confidence for origin classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginConfidence {
    High,
    Medium,
    Low,
}

/// Relationship type of a citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelType {
    Cites,
    ExplicitlyAmends,
    Regulates,
    Revokes,
}

/// A normalized citation carried by a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// `"<prefix>:<document_id>[#<span_id>]"`.
    pub target_node_id: String,
    pub rel_type: RelType,
    /// In `[0, 1]`.
    pub rel_type_confidence: f32,
}

/// Ruling section kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Summary,
    Report,
    Vote,
    Decision,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Report => "report",
            Self::Vote => "vote",
            Self::Decision => "decision",
        }
    }

    /// Fixed authority level per section.
    pub fn authority_level(&self) -> AuthorityLevel {
        match self {
            Self::Summary => AuthorityLevel::Metadata,
            Self::Report => AuthorityLevel::Informative,
            Self::Vote => AuthorityLevel::Reasoning,
            Self::Decision => AuthorityLevel::Binding,
        }
    }

    /// Bare section span id: `SEC-SUMMARY`, `SEC-REPORT`, …
    pub fn span_id(&self) -> &'static str {
        match self {
            Self::Summary => "SEC-SUMMARY",
            Self::Report => "SEC-REPORT",
            Self::Vote => "SEC-VOTE",
            Self::Decision => "SEC-DECISION",
        }
    }
}

/// How strongly a ruling section binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityLevel {
    Metadata,
    Informative,
    Reasoning,
    Binding,
}

/// Evidence sentinel for non-evidence chunks. This core never produces it,
/// but the invariant gate accepts it on chunk kinds that are allowed to.
pub const EVIDENCE_SENTINEL: (i64, i64) = (-1, -1);

/// The unit handed to sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedChunk {
    // Identity
    pub node_id: String,
    /// `node_id` without any part suffix.
    pub logical_node_id: String,
    /// `"<document_id>#<span_id>"`.
    pub chunk_id: String,
    pub span_id: String,
    /// Empty for top-level devices and all ruling chunks.
    pub parent_node_id: String,

    // Typing
    pub device_type: DeviceType,
    /// Hierarchy depth of the device (0–3).
    pub chunk_level: u8,
    /// 1-based part index; 1/1 for unsplit devices.
    pub part_index: u32,
    pub part_total: u32,

    // Text
    /// Authoritative device text.
    pub text: String,
    /// Deterministic baseline text for embedding.
    pub retrieval_text: String,

    // Document metadata
    pub document_id: String,
    pub document_type: DocumentType,
    pub number: String,
    pub year: i32,
    pub article_number: Option<u32>,

    // Evidence triple
    pub canonical_start: i64,
    pub canonical_end: i64,
    pub canonical_hash: String,

    // Physical location
    pub page_number: u32,
    /// Length 0 or length 4 (`[x0, y0, x1, y1]` in PDF points).
    pub bbox: Vec<f32>,

    // Provenance
    pub origin_type: OriginType,
    pub origin_reference: String,
    pub origin_reference_name: String,
    pub is_external_material: bool,
    pub origin_reason: String,
    pub origin_confidence: OriginConfidence,

    // Citations
    pub citations: Vec<Citation>,
    pub has_citations: bool,
    pub citations_count: u32,

    /// Split parents are flagged out of the sink stream.
    pub indexable: bool,

    // Rulings only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_type: Option<SectionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority_level: Option<AuthorityLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_path: Option<String>,
}

impl ProcessedChunk {
    /// Whether this chunk carries the non-evidence sentinel triple.
    pub fn has_sentinel_evidence(&self) -> bool {
        self.canonical_start == EVIDENCE_SENTINEL.0
            && self.canonical_end == EVIDENCE_SENTINEL.1
            && self.canonical_hash.is_empty()
    }

    /// First whole word of the chunk's text, whitespace-normalized.
    pub fn first_word(&self) -> &str {
        self.text.split_whitespace().next().unwrap_or("")
    }
}
