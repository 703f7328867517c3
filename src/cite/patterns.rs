//! Citation reference shapes and relationship-type classification.
//!
//! Three shapes are recognized: an external norm with a device qualifier
//! ("art. 18 da Lei 14.133/2021"), a bare external norm ("Decreto nº
//! 10.947/2022"), and an internal reference into the host document ("§ 2º
//! do art. 40", "o art. 5º desta Lei"). The regex crate has no lookaround,
//! so the shapes are matched in precedence order and later shapes skip any
//! span already claimed by an earlier one.

use regex::Regex;

use crate::chunk::RelType;

/// A raw reference found in chunk text, before target construction.
#[derive(Debug, Clone)]
pub(crate) enum ReferenceShape {
    /// `art. N [, inciso R | § P] da <TIPO> <num>[/<year>]`
    ExternalDevice {
        article: u32,
        item: Option<String>,
        paragraph: Option<u32>,
        doc_type: String,
        number: String,
        year: Option<i32>,
    },
    /// `<TIPO> nº <num>[/<year>]`
    ExternalNorm {
        doc_type: String,
        number: String,
        year: Option<i32>,
    },
    /// `art. N [...] da Constituição [Federal]`
    Constitutional { article: u32 },
    /// `o art. N [, inciso R | § P] [desta Lei]`
    InternalDevice {
        article: u32,
        item: Option<String>,
        paragraph: Option<u32>,
    },
    /// `§ P do art. N`
    InternalParagraph { article: u32, paragraph: u32 },
}

/// A shape plus where it matched, for overlap suppression and windowing.
pub(crate) struct ShapeMatch {
    pub shape: ReferenceShape,
    pub start: usize,
    pub end: usize,
}

const TYPE_ALT: &str =
    r"Lei\s+Complementar|Decreto-Lei|Instru[cç][aã]o\s+Normativa|Lei|Decreto|IN";

pub(crate) struct CitationPatterns {
    external_device: Regex,
    external_norm: Regex,
    constitutional: Regex,
    internal_device: Regex,
    internal_paragraph: Regex,
    rel_revokes: Regex,
    rel_amends: Regex,
    rel_regulates: Regex,
}

impl CitationPatterns {
    pub fn new() -> Self {
        let number = r"(?:n[ºo°]?\.?\s*)?([\d.]+)(?:\s*/\s*(\d{2,4}))?";
        Self {
            external_device: Regex::new(&format!(
                r"(?i)\bart\.?\s*(\d+)[ºo°]?(?:\s*,\s*(?:inciso\s+([ivxlcdm]+)|§\s*(\d+)[ºo°]?))?\s*,?\s+d[ao]\s+({TYPE_ALT})\s+{number}"
            ))
            .unwrap(),
            external_norm: Regex::new(&format!(r"(?i)\b({TYPE_ALT})\s+{number}")).unwrap(),
            constitutional: Regex::new(
                r"(?i)\bart\.?\s*(\d+)[ºo°]?(?:\s*,\s*(?:inciso\s+[ivxlcdm]+|§\s*\d+[ºo°]?))?\s*,?\s+da\s+Constitui[cç][aã]o(?:\s+Federal)?",
            )
            .unwrap(),
            internal_device: Regex::new(
                r"(?i)\b(?:[nd]?o|ao)\s+art\.?\s*(\d+)[ºo°]?(?:\s*,\s*(?:inciso\s+([ivxlcdm]+)|§\s*(\d+)[ºo°]?))?(?:\s+dest[ae]\s+(?:Lei|Decreto|Instru[cç][aã]o))?",
            )
            .unwrap(),
            internal_paragraph: Regex::new(
                r"(?i)\b§\s*(\d+)[ºo°]?\s+do\s+art\.?\s*(\d+)[ºo°]?",
            )
            .unwrap(),
            rel_revokes: Regex::new(r"(?i)(ficam?\s+revogad|revoga[mr]?-?s?e?\b)").unwrap(),
            rel_amends: Regex::new(
                r"(?i)(passa(?:m)?\s+a\s+vigorar|nova\s+redaç|nova\s+redac|fica(?:m)?\s+acrescid|d[êe]-se\s+nova)",
            )
            .unwrap(),
            rel_regulates: Regex::new(r"(?i)\bregulament").unwrap(),
        }
    }

    /// Find all reference shapes in `text`, earlier (more specific) shapes
    /// claiming their spans first.
    pub fn find_all(&self, text: &str) -> Vec<ShapeMatch> {
        let mut matches: Vec<ShapeMatch> = Vec::new();

        for caps in self.external_device.captures_iter(text) {
            let m = caps.get(0).unwrap();
            let (Some(article), Some(doc_type), Some(number)) = (
                caps.get(1).and_then(|c| c.as_str().parse().ok()),
                caps.get(4).map(|c| c.as_str().to_string()),
                caps.get(5).map(|c| c.as_str().to_string()),
            ) else {
                continue;
            };
            matches.push(ShapeMatch {
                shape: ReferenceShape::ExternalDevice {
                    article,
                    item: caps.get(2).map(|c| c.as_str().to_uppercase()),
                    paragraph: caps.get(3).and_then(|c| c.as_str().parse().ok()),
                    doc_type,
                    number,
                    year: caps.get(6).and_then(|c| c.as_str().parse().ok()),
                },
                start: m.start(),
                end: m.end(),
            });
        }

        for caps in self.constitutional.captures_iter(text) {
            let m = caps.get(0).unwrap();
            if overlaps(&matches, m.start(), m.end()) {
                continue;
            }
            if let Some(article) = caps.get(1).and_then(|c| c.as_str().parse().ok()) {
                matches.push(ShapeMatch {
                    shape: ReferenceShape::Constitutional { article },
                    start: m.start(),
                    end: m.end(),
                });
            }
        }

        for caps in self.external_norm.captures_iter(text) {
            let m = caps.get(0).unwrap();
            if overlaps(&matches, m.start(), m.end()) {
                continue;
            }
            let (Some(doc_type), Some(number)) = (
                caps.get(1).map(|c| c.as_str().to_string()),
                caps.get(2).map(|c| c.as_str().to_string()),
            ) else {
                continue;
            };
            // A bare number with no dots and no year is far more often a
            // quantity than a norm; require either.
            let year: Option<i32> = caps.get(3).and_then(|c| c.as_str().parse().ok());
            if year.is_none() && !number.contains('.') {
                continue;
            }
            matches.push(ShapeMatch {
                shape: ReferenceShape::ExternalNorm {
                    doc_type,
                    number,
                    year,
                },
                start: m.start(),
                end: m.end(),
            });
        }

        for caps in self.internal_paragraph.captures_iter(text) {
            let m = caps.get(0).unwrap();
            if overlaps(&matches, m.start(), m.end()) {
                continue;
            }
            let (Some(paragraph), Some(article)) = (
                caps.get(1).and_then(|c| c.as_str().parse().ok()),
                caps.get(2).and_then(|c| c.as_str().parse().ok()),
            ) else {
                continue;
            };
            matches.push(ShapeMatch {
                shape: ReferenceShape::InternalParagraph { article, paragraph },
                start: m.start(),
                end: m.end(),
            });
        }

        for caps in self.internal_device.captures_iter(text) {
            let m = caps.get(0).unwrap();
            if overlaps(&matches, m.start(), m.end()) {
                continue;
            }
            if let Some(article) = caps.get(1).and_then(|c| c.as_str().parse().ok()) {
                matches.push(ShapeMatch {
                    shape: ReferenceShape::InternalDevice {
                        article,
                        item: caps.get(2).map(|c| c.as_str().to_uppercase()),
                        paragraph: caps.get(3).and_then(|c| c.as_str().parse().ok()),
                    },
                    start: m.start(),
                    end: m.end(),
                });
            }
        }

        matches.sort_by_key(|m| m.start);
        matches
    }

    /// Classify the relationship type from the lexical window before the
    /// citation match.
    pub fn classify_rel(&self, text: &str, match_start: usize) -> RelType {
        let window_start = floor_boundary(text, match_start.saturating_sub(120));
        let window = &text[window_start..floor_boundary(text, match_start + 1).max(window_start)];
        if self.rel_revokes.is_match(window) {
            RelType::Revokes
        } else if self.rel_amends.is_match(window) {
            RelType::ExplicitlyAmends
        } else if self.rel_regulates.is_match(window) {
            RelType::Regulates
        } else {
            RelType::Cites
        }
    }
}

fn overlaps(matches: &[ShapeMatch], start: usize, end: usize) -> bool {
    matches.iter().any(|m| start < m.end && m.start < end)
}

fn floor_boundary(s: &str, idx: usize) -> usize {
    let mut i = idx.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_device_with_year() {
        let patterns = CitationPatterns::new();
        let found = patterns.find_all("nos termos do art. 18 da Lei 14.133/2021");
        assert_eq!(found.len(), 1);
        match &found[0].shape {
            ReferenceShape::ExternalDevice {
                article,
                doc_type,
                number,
                year,
                ..
            } => {
                assert_eq!(*article, 18);
                assert_eq!(doc_type.to_lowercase(), "lei");
                assert_eq!(number, "14.133");
                assert_eq!(*year, Some(2021));
            }
            other => panic!("wrong shape: {other:?}"),
        }
    }

    #[test]
    fn external_norm_without_device() {
        let patterns = CitationPatterns::new();
        let found = patterns.find_all("aplicando-se o Decreto nº 10.947/2022 no que couber");
        assert_eq!(found.len(), 1);
        assert!(matches!(
            found[0].shape,
            ReferenceShape::ExternalNorm { year: Some(2022), .. }
        ));
    }

    #[test]
    fn external_norm_without_year_needs_dots() {
        let patterns = CitationPatterns::new();
        let found = patterns.find_all("conforme a Lei 8.666, aplica-se");
        assert_eq!(found.len(), 1);
        assert!(matches!(
            found[0].shape,
            ReferenceShape::ExternalNorm { year: None, .. }
        ));
        // "há 30" style numbers never become citations.
        assert!(patterns.find_all("no prazo de Lei 30 dias").is_empty());
    }

    #[test]
    fn constitutional_reference() {
        let patterns = CitationPatterns::new();
        let found = patterns.find_all("com fundamento no art. 37 da Constituição Federal");
        assert!(found
            .iter()
            .any(|m| matches!(m.shape, ReferenceShape::Constitutional { article: 37 })));
    }

    #[test]
    fn internal_paragraph_of_article() {
        let patterns = CitationPatterns::new();
        let found = patterns.find_all("para os fins do § 1º do art. 40, considera-se");
        assert!(found.iter().any(|m| matches!(
            m.shape,
            ReferenceShape::InternalParagraph {
                article: 40,
                paragraph: 1
            }
        )));
    }

    #[test]
    fn internal_device_reference() {
        let patterns = CitationPatterns::new();
        let found = patterns.find_all("observado o art. 25, inciso III desta Lei");
        assert_eq!(found.len(), 1);
        match &found[0].shape {
            ReferenceShape::InternalDevice { article, item, .. } => {
                assert_eq!(*article, 25);
                assert_eq!(item.as_deref(), Some("III"));
            }
            other => panic!("wrong shape: {other:?}"),
        }
    }

    #[test]
    fn external_wins_over_internal_on_same_span() {
        let patterns = CitationPatterns::new();
        let found = patterns.find_all("observado o art. 3º da Lei 12.850/2013");
        assert_eq!(found.len(), 1);
        assert!(matches!(
            found[0].shape,
            ReferenceShape::ExternalDevice { article: 3, .. }
        ));
    }

    #[test]
    fn rel_type_classification() {
        let patterns = CitationPatterns::new();
        let amend = "O art. 5º da Lei 8.666/1993 passa a vigorar com nova redação: art. 9º da Lei 8.666/1993";
        let pos = amend.rfind("art. 9º").unwrap();
        assert_eq!(patterns.classify_rel(amend, pos), RelType::ExplicitlyAmends);

        let revoke = "Ficam revogados o art. 10 da Lei 8.666/1993";
        let pos = revoke.find("art. 10").unwrap();
        assert_eq!(patterns.classify_rel(revoke, pos), RelType::Revokes);

        let plain = "aplica-se o art. 18 da Lei 14.133/2021";
        let pos = plain.find("art. 18").unwrap();
        assert_eq!(patterns.classify_rel(plain, pos), RelType::Cites);
    }
}
