//! Three-pass device construction.
//!
//! Pass 1 labels each block by first-line marker matching. Pass 2 walks the
//! blocks with an open-device stack, closing devices of equal or lower rank
//! and attaching new ones to the nearest open ancestor of higher rank.
//! Pass 3 links children, then verifies sibling monotonicity, containment,
//! and the exact-slicing invariant.
//!
//! A block contributes its text to every open ancestor, so a device's text
//! always spans all of its descendants. List-number prefixes are discarded
//! only from the opening device's own text; ancestors keep the exact
//! canonical bytes, which is what makes `text == canonical[start..end)` hold
//! at every level.

use crate::classify::device::{article_token, ClassifiedDevice, DeviceType};
use crate::classify::markers::{BlockLabel, MarkerSet};
use crate::classify::{ClassifyError, ClassifyResult};
use crate::extract::ExtractionResult;

struct DeviceBuilder {
    device_type: DeviceType,
    span_id: String,
    parent_idx: Option<usize>,
    parent_span_id: String,
    identifier: String,
    article_number: Option<u32>,
    /// Distinguishing token inside the span id: `2`, `UNICO`, `III`, `a`.
    marker_token: String,
    char_start: usize,
    char_end: usize,
    page_number: u32,
    bbox: [f32; 4],
    text: String,
    last_end: usize,
}

impl DeviceBuilder {
    fn append_piece(&mut self, canonical: &str, piece: &str, end: usize, gap_from: usize) {
        if !self.text.is_empty() {
            self.text.push_str(&canonical[self.last_end..gap_from]);
        }
        self.text.push_str(piece);
        self.char_end = end;
        self.last_end = end;
    }
}

pub(crate) fn build_devices(
    markers: &MarkerSet,
    extraction: &ExtractionResult,
) -> ClassifyResult<Vec<ClassifiedDevice>> {
    let canonical = extraction.canonical_text.as_str();
    let mut devices: Vec<DeviceBuilder> = Vec::new();
    // Stack of indices into `devices`: article → paragraph → item → sub-item.
    let mut open: Vec<usize> = Vec::new();

    for (page_number, block) in extraction.flat_blocks() {
        let before = &canonical[..block.char_start];
        let label = markers.label_block(&block.text, before, !open.is_empty());

        match label {
            BlockLabel::Metadata => {
                // Preamble and header material belongs to no device.
                continue;
            }
            BlockLabel::Unclassified => {
                // Body continuation: contributes to every open device.
                for &idx in &open {
                    devices[idx].append_piece(
                        canonical,
                        &block.text,
                        block.char_end,
                        block.char_start,
                    );
                }
                continue;
            }
            _ => {}
        }

        let depth = match &label {
            BlockLabel::Article { .. } => 0u8,
            BlockLabel::Paragraph { .. } => 1,
            BlockLabel::Item { .. } => 2,
            BlockLabel::Subitem { .. } => 3,
            BlockLabel::Metadata | BlockLabel::Unclassified => unreachable!(),
        };

        // Close every open device of equal or lower rank.
        while let Some(&top) = open.last() {
            if devices[top].device_type.hierarchy_depth() >= depth {
                open.pop();
            } else {
                break;
            }
        }

        let parent_idx = open.last().copied();
        if depth > 0 && parent_idx.is_none() {
            return Err(ClassifyError::Inconsistent {
                span_id: format!("block@{}", block.char_start),
                reason: format!(
                    "{} marker before any article",
                    match label {
                        BlockLabel::Paragraph { .. } => "paragraph",
                        BlockLabel::Item { .. } => "item",
                        _ => "sub-item",
                    }
                ),
            });
        }

        let art_token = parent_idx
            .map(|idx| host_article_token(&devices, idx))
            .unwrap_or_default();
        let article_number = parent_idx.and_then(|idx| devices[idx].article_number);

        let (device_type, span_id, identifier, marker_token, article_number, strip) = match label {
            BlockLabel::Article {
                number,
                suffix,
                strip,
            } => {
                let token = article_token(number, suffix);
                (
                    DeviceType::Article,
                    format!("ART-{token}"),
                    article_identifier(number, suffix),
                    token,
                    Some(number),
                    strip,
                )
            }
            BlockLabel::Paragraph { number, strip } => {
                let token = match number {
                    Some(n) => n.to_string(),
                    None => "UNICO".to_string(),
                };
                let identifier = match number {
                    Some(n) if n < 10 => format!("§ {n}º"),
                    Some(n) => format!("§ {n}"),
                    None => "Parágrafo único".to_string(),
                };
                (
                    DeviceType::Paragraph,
                    format!("PAR-{art_token}-{token}"),
                    identifier,
                    token,
                    article_number,
                    strip,
                )
            }
            BlockLabel::Item { roman, strip } => (
                DeviceType::Item,
                format!("INC-{art_token}-{roman}"),
                roman.clone(),
                roman,
                article_number,
                strip,
            ),
            BlockLabel::Subitem { letter, strip } => {
                // Nearest open ancestor of higher rank names the middle
                // segment: item roman, paragraph number, or CAPUT when the
                // sub-item hangs directly off the article.
                let parent = &devices[parent_idx.unwrap()];
                let middle = match parent.device_type {
                    DeviceType::Item => parent.marker_token.clone(),
                    DeviceType::Paragraph => parent.marker_token.clone(),
                    _ => "CAPUT".to_string(),
                };
                (
                    DeviceType::Subitem,
                    format!("ALI-{art_token}-{middle}-{letter}"),
                    letter.to_string(),
                    letter.to_string(),
                    article_number,
                    strip,
                )
            }
            BlockLabel::Metadata | BlockLabel::Unclassified => unreachable!(),
        };

        let parent_span_id = parent_idx
            .map(|idx| devices[idx].span_id.clone())
            .unwrap_or_default();

        let char_start = block.char_start + strip;
        let mut builder = DeviceBuilder {
            device_type,
            span_id,
            parent_idx,
            parent_span_id,
            identifier,
            article_number,
            marker_token,
            char_start,
            char_end: block.char_end,
            page_number,
            bbox: block.bbox,
            text: String::new(),
            last_end: char_start,
        };
        builder.append_piece(canonical, &block.text[strip..], block.char_end, char_start);

        // The opening block also contributes (unstripped) to the ancestors.
        for &idx in &open {
            devices[idx].append_piece(canonical, &block.text, block.char_end, block.char_start);
        }

        let idx = devices.len();
        devices.push(builder);
        open.push(idx);
    }

    if devices.is_empty() {
        return Err(ClassifyError::EmptyDocument);
    }

    // Exact-slicing verification with a single local repair.
    for device in &mut devices {
        let expected = &canonical[device.char_start..device.char_end];
        if device.text != expected {
            let repaired = crate::canonical::normalize_block(&device.text);
            if repaired == expected {
                device.text = repaired;
            } else {
                return Err(ClassifyError::Inconsistent {
                    span_id: device.span_id.clone(),
                    reason: format!(
                        "device text does not equal canonical slice [{}, {})",
                        device.char_start, device.char_end
                    ),
                });
            }
        }
    }

    link_and_verify(devices)
}

/// Article token of the article at the root of `idx`'s ancestor chain.
fn host_article_token(devices: &[DeviceBuilder], idx: usize) -> String {
    let mut current = idx;
    loop {
        if devices[current].device_type == DeviceType::Article {
            return devices[current].marker_token.clone();
        }
        match devices[current].parent_idx {
            Some(parent) => current = parent,
            None => return devices[current].marker_token.clone(),
        }
    }
}

fn article_identifier(number: u32, suffix: Option<char>) -> String {
    let base = if number < 10 {
        format!("Art. {number}º")
    } else {
        format!("Art. {number}")
    };
    match suffix {
        Some(s) => format!("{base}-{s}"),
        None => base,
    }
}

/// Pass 3: populate children lists and verify structural invariants.
fn link_and_verify(builders: Vec<DeviceBuilder>) -> ClassifyResult<Vec<ClassifiedDevice>> {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); builders.len()];
    let mut roots: Vec<usize> = Vec::new();

    for (idx, builder) in builders.iter().enumerate() {
        match builder.parent_idx {
            Some(parent) => children[parent].push(idx),
            None => roots.push(idx),
        }
    }

    verify_siblings(&builders, &roots, None)?;
    for (parent_idx, child_list) in children.iter().enumerate() {
        if !child_list.is_empty() {
            verify_siblings(&builders, child_list, Some(parent_idx))?;
        }
    }

    let devices = builders
        .iter()
        .enumerate()
        .map(|(idx, b)| ClassifiedDevice {
            device_type: b.device_type,
            span_id: b.span_id.clone(),
            parent_span_id: b.parent_span_id.clone(),
            children_span_ids: children[idx]
                .iter()
                .map(|&c| builders[c].span_id.clone())
                .collect(),
            identifier: b.identifier.clone(),
            article_number: b.article_number,
            hierarchy_depth: b.device_type.hierarchy_depth(),
            text: b.text.clone(),
            char_start: b.char_start,
            char_end: b.char_end,
            page_number: b.page_number,
            bbox: b.bbox,
        })
        .collect();

    Ok(devices)
}

fn verify_siblings(
    builders: &[DeviceBuilder],
    siblings: &[usize],
    parent_idx: Option<usize>,
) -> ClassifyResult<()> {
    for window in siblings.windows(2) {
        let (a, b) = (&builders[window[0]], &builders[window[1]]);
        if a.char_start >= b.char_start {
            return Err(ClassifyError::Inconsistent {
                span_id: b.span_id.clone(),
                reason: format!("sibling order not monotonic after {}", a.span_id),
            });
        }
        if a.char_end > b.char_start {
            return Err(ClassifyError::Inconsistent {
                span_id: b.span_id.clone(),
                reason: format!("sibling ranges overlap with {}", a.span_id),
            });
        }
    }

    if let Some(p) = parent_idx {
        let parent = &builders[p];
        for &c in siblings {
            let child = &builders[c];
            if child.char_start < parent.char_start || child.char_end > parent.char_end {
                return Err(ClassifyError::Inconsistent {
                    span_id: child.span_id.clone(),
                    reason: format!("child range escapes parent {}", parent.span_id),
                });
            }
            if child.char_start >= child.char_end {
                return Err(ClassifyError::Inconsistent {
                    span_id: child.span_id.clone(),
                    reason: "empty device range".into(),
                });
            }
        }
    }
    Ok(())
}
