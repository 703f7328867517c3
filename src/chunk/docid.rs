//! Canonical document-id normalization.
//!
//! `"LEI 14133/2021"` → `"LEI-14.133-2021"`; `"IN-58-2022"` → `"IN-58-2022"`.
//! Idempotent under repeated application, which matters because document ids
//! arrive both raw (from callers) and already-normalized (from citation
//! targets and re-ingestions).

/// Normalize a document id into canonical form.
///
/// Rules: uppercase; separators become hyphens; ordinal markers ("nº") are
/// dropped; numeric components ≥ 1000 get Brazilian-style thousands dots,
/// except a trailing 4-digit year which stays plain.
pub fn normalize_document_id(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let hyphened: String = upper
        .chars()
        .map(|c| if matches!(c, ' ' | '/' | '_' | ',') { '-' } else { c })
        .collect();

    let components: Vec<String> = hyphened
        .split('-')
        .filter_map(clean_component)
        .collect();

    let last = components.len().saturating_sub(1);
    components
        .iter()
        .enumerate()
        .map(|(i, comp)| format_component(comp, i == last))
        .collect::<Vec<_>>()
        .join("-")
}

/// Strip stray punctuation and drop ordinal-marker tokens.
fn clean_component(component: &str) -> Option<String> {
    let cleaned: String = component
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == 'º' || *c == '°')
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        return None;
    }
    // Ordinal markers: "Nº", "N°", "N.º", bare "N" followed by the number in
    // the next component.
    let without_ordinal: String = cleaned.chars().filter(|c| *c != 'º' && *c != '°').collect();
    if without_ordinal.is_empty() || without_ordinal == "N" || without_ordinal == "NO" {
        return None;
    }
    Some(without_ordinal)
}

fn format_component(component: &str, is_last: bool) -> String {
    let digits: String = component.chars().filter(|c| *c != '.').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) || digits.is_empty() {
        return component.to_string();
    }

    // A trailing 4-digit component in the plausible year range stays plain.
    if is_last && digits.len() == 4 {
        if let Ok(year) = digits.parse::<u32>() {
            if (1500..=2100).contains(&year) {
                return digits;
            }
        }
    }

    match digits.parse::<u64>() {
        Ok(value) if value >= 1000 => thousands_dots(&digits),
        Ok(_) => digits,
        Err(_) => component.to_string(),
    }
}

/// Insert dots every three digits from the right: `14133` → `14.133`.
fn thousands_dots(digits: &str) -> String {
    let chars: Vec<char> = digits.chars().collect();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(*c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_spec_examples() {
        assert_eq!(normalize_document_id("LEI 14133/2021"), "LEI-14.133-2021");
        assert_eq!(normalize_document_id("IN-58-2022"), "IN-58-2022");
        assert_eq!(
            normalize_document_id("DECRETO-10947-2022"),
            "DECRETO-10.947-2022"
        );
    }

    #[test]
    fn strips_ordinal_markers() {
        assert_eq!(
            normalize_document_id("LEI Nº 14.133/2021"),
            "LEI-14.133-2021"
        );
        assert_eq!(normalize_document_id("lei nº 8666/1993"), "LEI-8.666-1993");
    }

    #[test]
    fn numbers_below_one_thousand_stay_plain() {
        assert_eq!(normalize_document_id("IN 58/2022"), "IN-58-2022");
        assert_eq!(normalize_document_id("LC 123/2006"), "LC-123-2006");
    }

    #[test]
    fn year_is_not_dotted() {
        assert_eq!(normalize_document_id("LEI 9784/1999"), "LEI-9.784-1999");
    }

    #[test]
    fn idempotent() {
        for raw in [
            "LEI 14133/2021",
            "LEI-14.133-2021",
            "DECRETO-LEI 2848/1940",
            "IN 58/2022",
            "ACORDAO 2622/2013",
        ] {
            let once = normalize_document_id(raw);
            assert_eq!(once, normalize_document_id(&once), "not idempotent: {raw}");
        }
    }

    #[test]
    fn large_numbers_group_correctly() {
        assert_eq!(normalize_document_id("LEI 1234567/2021"), "LEI-1.234.567-2021");
    }

    #[test]
    fn two_digit_year_kept_as_is() {
        assert_eq!(normalize_document_id("LEI 8666/93"), "LEI-8.666-93");
    }
}
