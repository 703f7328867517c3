//! Device marker patterns and citation-context suppression.
//!
//! Markers are anchored to the start of a block's first logical line, after
//! stripping an optional list-number prefix (`"11. Art. 56"` is treated as
//! `"Art. 56"`, and the prefix is discarded from the retained text). The
//! whole set is compiled once and passed by reference; a misfire here
//! produces a chunk whose span id does not match its text, which the
//! invariant gate treats as fatal.

use regex::Regex;

/// How a block's first line was labeled by the marker pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockLabel {
    Article {
        number: u32,
        suffix: Option<char>,
        /// Bytes of a discarded list-number prefix (`"11. "`).
        strip: usize,
    },
    Paragraph {
        /// `None` for "Parágrafo único".
        number: Option<u32>,
        strip: usize,
    },
    Item {
        roman: String,
        strip: usize,
    },
    Subitem {
        letter: char,
        strip: usize,
    },
    /// Preamble or header material before the first device.
    Metadata,
    /// Body continuation of the currently open device.
    Unclassified,
}

/// Compiled marker set. Built once at pipeline startup, immutable.
pub struct MarkerSet {
    list_prefix: Regex,
    article: Regex,
    paragraph: Regex,
    sole_paragraph: Regex,
    item: Regex,
    subitem: Regex,
    citation_before: Vec<Regex>,
    citation_after: Vec<Regex>,
}

impl Default for MarkerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerSet {
    pub fn new() -> Self {
        // The expressions are static and small; compilation cannot fail.
        Self {
            list_prefix: Regex::new(r"^\s*\d{1,3}\.\s+").unwrap(),
            article: Regex::new(r"^Art\.?\s*(\d+)\s*[ºo°]?(?:\s*-\s*([A-Z]))?\.?").unwrap(),
            paragraph: Regex::new(r"^§\s*(\d+)\s*[ºo°]?\.?").unwrap(),
            sole_paragraph: Regex::new(r"^Par[áa]grafo\s+[úu]nico\.?").unwrap(),
            item: Regex::new(r"^([IVXLCDM]+)\s*[-–—]").unwrap(),
            subitem: Regex::new(r"^([a-z])\)\s").unwrap(),
            citation_before: vec![
                Regex::new(r"(?i)(nos\s+termos\s+d[oa]|conforme\s+o?|na\s+forma\s+d[oa]|o\s+disposto\s+n[oa]|de\s+que\s+trata\s+o|a\s+que\s+se\s+refere\s+o|combinado\s+com\s+o|c/c\s+o?|\bd[oa]|\bn[oa]|\ba?o)\s*$").unwrap(),
            ],
            citation_after: vec![
                Regex::new(r"(?i)^\s*dest[ea]\s+(artigo|lei|decreto|instru)").unwrap(),
                Regex::new(r"(?i)^\s*d[oa]\s+art").unwrap(),
                Regex::new(r"(?i)^\s*d[ao]\s+(lei|decreto|constitui)").unwrap(),
            ],
        }
    }

    /// Label a block by its first logical line.
    ///
    /// `before` is the window of canonical text immediately preceding the
    /// block, used to suppress paragraph markers that are really the tail of
    /// a citation wrapped onto a new line.
    pub fn label_block(&self, block_text: &str, before: &str, any_device_open: bool) -> BlockLabel {
        let first_line = block_text.lines().next().unwrap_or("");

        // Leading indentation and an optional list-number prefix are both
        // discarded from the retained text when a real marker follows them.
        let trimmed = first_line.trim_start();
        let ws = first_line.len() - trimmed.len();
        let (stripped, strip) = match self.list_prefix.find(trimmed) {
            Some(m) => (&trimmed[m.end()..], ws + m.end()),
            None => (trimmed, ws),
        };

        if let Some(caps) = self.article.captures(stripped) {
            if let Ok(number) = caps[1].parse::<u32>() {
                let suffix = caps.get(2).and_then(|m| m.as_str().chars().next());
                return BlockLabel::Article {
                    number,
                    suffix,
                    strip,
                };
            }
        }

        if self.sole_paragraph.is_match(stripped) {
            return BlockLabel::Paragraph {
                number: None,
                strip,
            };
        }

        if let Some(caps) = self.paragraph.captures(stripped) {
            let after = &stripped[caps.get(0).map(|m| m.end()).unwrap_or(0)..];
            if self.is_citation_context(before, after) {
                // An apparent `§ N` in citation context is absorbed into the
                // current device's text.
                return if any_device_open {
                    BlockLabel::Unclassified
                } else {
                    BlockLabel::Metadata
                };
            }
            if let Ok(number) = caps[1].parse::<u32>() {
                return BlockLabel::Paragraph {
                    number: Some(number),
                    strip,
                };
            }
        }

        if let Some(caps) = self.item.captures(stripped) {
            return BlockLabel::Item {
                roman: caps[1].to_string(),
                strip,
            };
        }

        if let Some(caps) = self.subitem.captures(stripped) {
            let letter = caps[1].chars().next().unwrap_or('a');
            return BlockLabel::Subitem { letter, strip };
        }

        if any_device_open {
            BlockLabel::Unclassified
        } else {
            BlockLabel::Metadata
        }
    }

    /// Lexical test for citation surroundings of an apparent `§ N` marker.
    fn is_citation_context(&self, before: &str, after: &str) -> bool {
        let before_window = tail_chars(before, 48);
        if self
            .citation_before
            .iter()
            .any(|re| re.is_match(before_window))
        {
            return true;
        }
        let after_window = head_chars(after, 48);
        self.citation_after
            .iter()
            .any(|re| re.is_match(after_window))
    }
}

/// Last `n` chars of `s`, on a char boundary.
fn tail_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    let skip = count - n;
    let (idx, _) = s.char_indices().nth(skip).unwrap_or((0, ' '));
    &s[idx..]
}

/// First `n` chars of `s`, on a char boundary.
fn head_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> MarkerSet {
        MarkerSet::new()
    }

    #[test]
    fn labels_plain_article() {
        let label = markers().label_block("Art. 5º Todos são iguais.", "", false);
        assert_eq!(
            label,
            BlockLabel::Article {
                number: 5,
                suffix: None,
                strip: 0
            }
        );
    }

    #[test]
    fn labels_article_with_suffix() {
        let label = markers().label_block("Art. 337-A. Texto.", "", true);
        assert_eq!(
            label,
            BlockLabel::Article {
                number: 337,
                suffix: Some('A'),
                strip: 0
            }
        );
    }

    #[test]
    fn strips_list_number_prefix() {
        let label = markers().label_block("11. Art. 56. O modo de disputa.", "", true);
        assert_eq!(
            label,
            BlockLabel::Article {
                number: 56,
                suffix: None,
                strip: 4
            }
        );
    }

    #[test]
    fn labels_paragraph_and_sole_paragraph() {
        let m = markers();
        assert_eq!(
            m.label_block("§ 1º Texto do parágrafo.", "", true),
            BlockLabel::Paragraph {
                number: Some(1),
                strip: 0
            }
        );
        assert_eq!(
            m.label_block("Parágrafo único. Texto.", "", true),
            BlockLabel::Paragraph {
                number: None,
                strip: 0
            }
        );
    }

    #[test]
    fn labels_item_and_subitem() {
        let m = markers();
        assert_eq!(
            m.label_block("III - licitação deserta;", "", true),
            BlockLabel::Item {
                roman: "III".into(),
                strip: 0
            }
        );
        assert_eq!(
            m.label_block("a) pela União;", "", true),
            BlockLabel::Subitem {
                letter: 'a',
                strip: 0
            }
        );
    }

    #[test]
    fn suppresses_paragraph_in_citation_context_before() {
        // Line-wrapped citation: "...nos termos do\n§ 2º do art. 40..."
        let label = markers().label_block("§ 2º do art. 40.", "aplica-se o disposto nos termos do", true);
        assert_eq!(label, BlockLabel::Unclassified);
    }

    #[test]
    fn suppresses_paragraph_in_citation_context_after() {
        let label = markers().label_block("§ 1º deste artigo, considera-se...", "", true);
        assert_eq!(label, BlockLabel::Unclassified);
    }

    #[test]
    fn real_paragraph_not_suppressed() {
        let label = markers().label_block(
            "§ 2º Para os fins do § 1º deste artigo, considera-se agente público.",
            "Art. 40. Texto do caput.",
            true,
        );
        assert_eq!(
            label,
            BlockLabel::Paragraph {
                number: Some(2),
                strip: 0
            }
        );
    }

    #[test]
    fn lowercase_art_citation_is_not_a_marker() {
        let label = markers().label_block("art. 18 da Lei 14.133/2021 aplica-se.", "", true);
        assert_eq!(label, BlockLabel::Unclassified);
    }

    #[test]
    fn preamble_is_metadata_until_first_device() {
        let m = markers();
        assert_eq!(
            m.label_block("LEI Nº 14.133, DE 1º DE ABRIL DE 2021", "", false),
            BlockLabel::Metadata
        );
        assert_eq!(
            m.label_block("O PRESIDENTE DA REPÚBLICA", "", false),
            BlockLabel::Metadata
        );
    }
}
