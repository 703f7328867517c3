//! Ruling header parser.
//!
//! Court rulings open with a metadata region: ruling number, panel, case
//! number, rapporteur, session date, technical unit, an abstract (SUMÁRIO /
//! EMENTA), and the outcome. Everything here is best-effort — absent fields
//! stay `None` and never fail the document.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Outcome of the examined claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Founded,
    Unfounded,
    PartiallyFounded,
}

/// Metadata extracted from the ruling's first region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulingHeader {
    pub ruling_number: Option<u32>,
    pub ruling_year: Option<i32>,
    /// Normalized: `Plenário`, `Primeira Câmara`, `Segunda Câmara`.
    pub panel: Option<String>,
    pub case_number: Option<String>,
    pub rapporteur: Option<String>,
    pub session_date: Option<String>,
    pub technical_unit: Option<String>,
    /// The SUMÁRIO / EMENTA abstract.
    pub summary: Option<String>,
    pub outcome: Option<Outcome>,
}

pub(crate) struct HeaderPatterns {
    number: Regex,
    panel: Regex,
    case_number: Regex,
    rapporteur: Regex,
    session_date: Regex,
    technical_unit: Regex,
    summary: Regex,
}

impl HeaderPatterns {
    pub fn new() -> Self {
        Self {
            number: Regex::new(r"(?i)AC[ÓO]RD[ÃA]O\s+N?[ºo°]?\.?\s*(\d+)\s*/\s*(\d{4})").unwrap(),
            panel: Regex::new(
                r"(?i)\b(Plen[áa]rio|(?:Primeira|1ª)\s+C[âa]mara|(?:Segunda|2ª)\s+C[âa]mara)\b",
            )
            .unwrap(),
            case_number: Regex::new(r"(?i)\b(?:Processo|TC)[:\s]+n?[ºo°]?\.?\s*([\d][\d./-]+)")
                .unwrap(),
            rapporteur: Regex::new(
                r"(?i)Relator(?:a)?[:\s]+(?:Ministr[oa](?:-Substitut[oa])?\s+)?([^\n]+)",
            )
            .unwrap(),
            session_date: Regex::new(r"(?i)Sess[ãa]o[:\s]+(?:de\s+)?([^\n]+)").unwrap(),
            technical_unit: Regex::new(r"(?i)Unidade\s+T[ée]cnica[:\s]+([^\n]+)").unwrap(),
            summary: Regex::new(r"(?i)(?:SUM[ÁA]RIO|EMENTA)[:.\s]+((?s).+?)(?:\n\n|\n[A-ZÀ-Ü ]{6,}\n|$)")
                .unwrap(),
        }
    }

    /// Parse the header region (everything before the first section).
    pub fn parse(&self, region: &str) -> RulingHeader {
        let mut header = RulingHeader::default();

        if let Some(caps) = self.number.captures(region) {
            header.ruling_number = caps[1].parse().ok();
            header.ruling_year = caps[2].parse().ok();
        }
        if let Some(caps) = self.panel.captures(region) {
            header.panel = Some(normalize_panel(&caps[1]));
        }
        if let Some(caps) = self.case_number.captures(region) {
            header.case_number = Some(caps[1].trim_end_matches('.').to_string());
        }
        if let Some(caps) = self.rapporteur.captures(region) {
            header.rapporteur = Some(caps[1].trim().trim_end_matches('.').to_string());
        }
        if let Some(caps) = self.session_date.captures(region) {
            header.session_date = Some(caps[1].trim().to_string());
        }
        if let Some(caps) = self.technical_unit.captures(region) {
            header.technical_unit = Some(caps[1].trim().to_string());
        }
        if let Some(caps) = self.summary.captures(region) {
            let text = caps[1].trim();
            if !text.is_empty() {
                header.summary = Some(text.to_string());
            }
        }
        header.outcome = detect_outcome(region);
        header
    }
}

fn normalize_panel(raw: &str) -> String {
    let folded = raw.to_lowercase();
    if folded.contains("plen") {
        "Plenário".to_string()
    } else if folded.contains("primeira") || folded.contains("1ª") {
        "Primeira Câmara".to_string()
    } else {
        "Segunda Câmara".to_string()
    }
}

/// "improcedente" contains "procedente", so the longer forms are tested
/// first.
fn detect_outcome(region: &str) -> Option<Outcome> {
    let folded = region.to_lowercase();
    if folded.contains("parcialmente procedente") {
        Some(Outcome::PartiallyFounded)
    } else if folded.contains("improcedente") {
        Some(Outcome::Unfounded)
    } else if folded.contains("procedente") {
        Some(Outcome::Founded)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "\
ACÓRDÃO Nº 2622/2013 – TCU – Plenário
Processo: TC 012.345/2020-1
Relator: Ministro Benjamin Zymler
Sessão: 25/9/2013
Unidade Técnica: SecexAdmin

SUMÁRIO: REPRESENTAÇÃO. LICITAÇÃO. PREGÃO ELETRÔNICO. Julga-se parcialmente procedente a representação.
";

    #[test]
    fn parses_all_fields() {
        let header = HeaderPatterns::new().parse(HEADER);
        assert_eq!(header.ruling_number, Some(2622));
        assert_eq!(header.ruling_year, Some(2013));
        assert_eq!(header.panel.as_deref(), Some("Plenário"));
        assert_eq!(header.case_number.as_deref(), Some("012.345/2020-1"));
        assert_eq!(header.rapporteur.as_deref(), Some("Benjamin Zymler"));
        assert_eq!(header.session_date.as_deref(), Some("25/9/2013"));
        assert_eq!(header.technical_unit.as_deref(), Some("SecexAdmin"));
        assert!(header.summary.as_deref().unwrap().starts_with("REPRESENTAÇÃO."));
        assert_eq!(header.outcome, Some(Outcome::PartiallyFounded));
    }

    #[test]
    fn panel_normalization() {
        assert_eq!(normalize_panel("plenário"), "Plenário");
        assert_eq!(normalize_panel("1ª Câmara"), "Primeira Câmara");
        assert_eq!(normalize_panel("Segunda Câmara"), "Segunda Câmara");
    }

    #[test]
    fn outcome_precedence() {
        assert_eq!(
            detect_outcome("julgar parcialmente procedente"),
            Some(Outcome::PartiallyFounded)
        );
        assert_eq!(detect_outcome("julgar improcedente"), Some(Outcome::Unfounded));
        assert_eq!(detect_outcome("julgar procedente"), Some(Outcome::Founded));
        assert_eq!(detect_outcome("sem juízo de mérito"), None);
    }

    #[test]
    fn missing_fields_stay_none() {
        let header = HeaderPatterns::new().parse("texto sem metadados reconhecíveis");
        assert!(header.ruling_number.is_none());
        assert!(header.panel.is_none());
        assert!(header.summary.is_none());
    }
}
