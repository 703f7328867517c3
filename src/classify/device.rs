//! Typed legal devices: the classifier's output model.

use serde::{Deserialize, Serialize};

/// The kind of legal device a chunk or classified node represents.
///
/// Laws, decrees and normative instructions use the article hierarchy;
/// court rulings use sections with numbered paragraphs and decision items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Article,
    Paragraph,
    Item,
    Subitem,
    Section,
    ItemRuling,
}

impl DeviceType {
    /// Wire name for manifests and `offsets.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Paragraph => "paragraph",
            Self::Item => "item",
            Self::Subitem => "subitem",
            Self::Section => "section",
            Self::ItemRuling => "item_ruling",
        }
    }

    /// Depth in the law hierarchy: article 0, paragraph 1, item 2, sub-item 3.
    /// Ruling sections sit at 0.
    pub fn hierarchy_depth(&self) -> u8 {
        match self {
            Self::Article | Self::Section => 0,
            Self::Paragraph => 1,
            Self::Item | Self::ItemRuling => 2,
            Self::Subitem => 3,
        }
    }

    /// Whether this device type must carry a real evidence triple (never the
    /// sentinel) when it reaches the invariant gate.
    pub fn is_evidence_bearing(&self) -> bool {
        matches!(
            self,
            Self::Article | Self::Paragraph | Self::Item | Self::Subitem | Self::Section
        )
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, hierarchical node produced by the classifier.
///
/// Invariants (verified by the classifier's linking pass and again by the
/// invariant gate):
/// - `canonical_text[char_start..char_end] == text`;
/// - for non-roots, the parent's range contains this range;
/// - siblings are non-overlapping and increase monotonically in `char_start`;
/// - `children_span_ids` lists exactly the devices whose `parent_span_id`
///   equals this node's `span_id`, in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedDevice {
    pub device_type: DeviceType,
    /// Deterministic local identifier, e.g. `ART-005`, `PAR-005-2`,
    /// `INC-005-III`, `ALI-005-III-a`.
    pub span_id: String,
    /// Empty for articles and ruling sections.
    pub parent_span_id: String,
    /// Immediate children in document order.
    pub children_span_ids: Vec<String>,
    /// Human-readable marker: `Art. 5º`, `§ 1º`, `III`, `a`.
    pub identifier: String,
    /// Article number where applicable (propagated to descendants).
    pub article_number: Option<u32>,
    /// 0 (article/section) … 3 (sub-item).
    pub hierarchy_depth: u8,
    /// Complete device text including all descendants.
    pub text: String,
    /// Offsets into the canonical text.
    pub char_start: usize,
    pub char_end: usize,
    /// Physical location of the device's first line.
    pub page_number: u32,
    pub bbox: [f32; 4],
}

/// Zero-padded article token used inside span ids: `5` → `005`,
/// `(5, Some('A'))` → `005-A`.
pub fn article_token(number: u32, suffix: Option<char>) -> String {
    match suffix {
        Some(s) => format!("{number:03}-{s}"),
        None => format!("{number:03}"),
    }
}
