//! Origin classification: self vs. transcribed external material.
//!
//! Amending laws quote whole articles of other norms ("O art. 337 do Código
//! Penal passa a vigorar com a seguinte redação: …"). Indexing that quoted
//! text as if the host document said it would poison retrieval, so every
//! chunk is annotated with its provenance: `self` for the host's own
//! material, `external` for transcribed regions, with the canonical id of
//! the referenced norm attached.
//!
//! The classifier is a small state machine over chunks in document order.
//! Entry: a trigger rule from the registry fires (high confidence), or an
//! opening quote starts an article whose number breaks the host sequence
//! (medium). Exit: "(NR)" alone on its line, a closing quote ending the
//! chunk, resumption of the host article sequence, or a fresh trigger.

use regex::Regex;

use crate::chunk::{OriginConfidence, OriginType, ProcessedChunk};
use crate::classify::DeviceType;
use crate::registry::NormRegistry;

/// How far ahead of the host sequence a quoted article may sit before we
/// call it a break. Amended codes jump far (Art. 337-A of the Criminal Code
/// inside a law whose own articles stop at ~190); small gaps are just
/// vetoed articles.
const SEQUENCE_GAP_TOLERANCE: u32 = 20;

struct ExternalRegion {
    reference: String,
    reference_name: String,
    reason: String,
    confidence: OriginConfidence,
}

/// Annotates chunks with self/external provenance.
pub struct OriginClassifier<'a> {
    registry: &'a NormRegistry,
    opening_quote: Regex,
    closing_marker: Regex,
}

impl<'a> OriginClassifier<'a> {
    pub fn new(registry: &'a NormRegistry) -> Self {
        Self {
            registry,
            opening_quote: Regex::new(r#"^\s*["“'‘]"#).unwrap(),
            closing_marker: Regex::new(r#"(?m)^\s*["”']?\s*\(NR\)\s*["”']?\s*$|\(NR\)["”]?\s*$|["”]\s*$"#)
                .unwrap(),
        }
    }

    /// Walk chunks in document order and set the origin fields.
    pub fn annotate(&self, chunks: &mut [ProcessedChunk]) {
        let mut region: Option<ExternalRegion> = None;
        // Last article number attributed to the host document itself.
        let mut last_host_article: u32 = 0;

        for chunk in chunks.iter_mut() {
            let is_article = chunk.device_type == DeviceType::Article && chunk.part_index == 1;

            if let Some(active) = &region {
                // Resumption of the host sequence closes the region before
                // this chunk.
                if is_article && chunk.article_number == Some(last_host_article + 1) {
                    region = None;
                } else {
                    mark_external(chunk, active);
                    // A fresh trigger re-targets the region (implicit exit of
                    // the previous one); a closing marker ends it after this
                    // chunk.
                    if let Some(next) = self.entry_region(chunk) {
                        region = Some(next);
                    } else if self.closing_marker.is_match(&chunk.text) {
                        region = None;
                    }
                    continue;
                }
            }

            if is_article && self.breaks_sequence(chunk, last_host_article) {
                // Quote-led sequence break: this chunk is already external,
                // and the host counter must not advance past it.
                let norm = self.registry.find_alias(&chunk.text);
                let active = ExternalRegion {
                    reference: norm.map(|n| n.id.clone()).unwrap_or_default(),
                    reference_name: norm.map(|n| n.name.clone()).unwrap_or_default(),
                    reason: "rule:sequence_break".into(),
                    confidence: OriginConfidence::Medium,
                };
                mark_external(chunk, &active);
                if !self.closing_marker.is_match(&chunk.text) {
                    region = Some(active);
                }
                continue;
            }

            // Self material.
            chunk.origin_type = OriginType::Own;
            chunk.is_external_material = false;
            if is_article {
                if let Some(n) = chunk.article_number {
                    last_host_article = n;
                }
            }

            // The trigger sentence itself is host material; the region
            // applies from the next chunk on.
            if let Some(next) = self.entry_region(chunk) {
                region = Some(next);
            }
        }
    }

    /// Test the chunk against the registry's entry rules.
    fn entry_region(&self, chunk: &ProcessedChunk) -> Option<ExternalRegion> {
        for (rule, regex) in self.registry.rules() {
            if let Some(m) = regex.find(&chunk.text) {
                let norm = rule
                    .norm
                    .as_deref()
                    .and_then(|id| self.registry.by_id(id))
                    .or_else(|| {
                        // Look for a named norm near the trigger.
                        let window_start = m.start().saturating_sub(160);
                        let start = floor_char_boundary(&chunk.text, window_start);
                        self.registry.find_alias(&chunk.text[start..])
                    });
                return Some(ExternalRegion {
                    reference: norm.map(|n| n.id.clone()).unwrap_or_default(),
                    reference_name: norm.map(|n| n.name.clone()).unwrap_or_default(),
                    reason: rule.id.clone(),
                    confidence: if norm.is_some() {
                        OriginConfidence::High
                    } else {
                        OriginConfidence::Low
                    },
                });
            }
        }
        None
    }

    /// An opening-quote article whose number breaks the host sequence.
    fn breaks_sequence(&self, chunk: &ProcessedChunk, last_host: u32) -> bool {
        if !self.opening_quote.is_match(&chunk.text) {
            return false;
        }
        match chunk.article_number {
            Some(n) => n <= last_host || n > last_host + SEQUENCE_GAP_TOLERANCE,
            None => false,
        }
    }
}

fn mark_external(chunk: &mut ProcessedChunk, region: &ExternalRegion) {
    chunk.origin_type = OriginType::External;
    chunk.is_external_material = true;
    chunk.origin_reference = region.reference.clone();
    chunk.origin_reference_name = region.reference_name.clone();
    chunk.origin_reason = region.reason.clone();
    chunk.origin_confidence = region.confidence;
    if !region.reference_name.is_empty()
        && !chunk.retrieval_text.starts_with(&format!("[{}]", region.reference_name))
    {
        chunk.retrieval_text = format!("[{}] {}", region.reference_name, chunk.retrieval_text);
    }
}

/// Largest byte index `<= idx` that lies on a char boundary.
fn floor_char_boundary(s: &str, idx: usize) -> usize {
    let mut i = idx.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
