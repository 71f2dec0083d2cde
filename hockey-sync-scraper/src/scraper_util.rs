//! Small text/number helpers shared by every extractor.
//!
//! Ported from the original Python implementation's
//! `backend/utils/parsing_utils.py`, which centralizes exactly this kind of
//! whitespace and number normalization so each scraping script doesn't
//! reinvent it.

use scraper::ElementRef;

/// Collapse runs of whitespace (including non-breaking spaces) into single
/// ASCII spaces and trim the ends.
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The normalized text content of an element.
pub fn elem_text(e: ElementRef) -> String {
    clean_text(&e.text().collect::<String>())
}

/// Extract the first signed integer found in `text`, accepting both the
/// ASCII hyphen-minus and the Unicode minus sign `−` that Hockey Victoria's
/// ladder pages sometimes use for negative goal differences.
pub fn extract_int(text: &str) -> Option<i64> {
    let normalized = text.replace('\u{2212}', "-");
    let mut digits = String::new();
    let mut chars = normalized.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '-' && chars.peek().is_some_and(|n| n.is_ascii_digit()) {
            digits.push(c);
            continue;
        }
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if !digits.is_empty() {
            break;
        }
    }

    if digits.is_empty() || digits == "-" {
        None
    } else {
        digits.parse().ok()
    }
}

/// The integer path segments of a URL, in order. Used by every
/// extractor that needs to recover an external id embedded in an `href`.
pub fn path_digit_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

/// Slugify a name into uppercase alphanumerics, matching the venue slug
/// algorithm used by the venue extractor.
pub fn slugify_alphanumeric(parts: &[&str], max_len: usize) -> String {
    let joined = parts
        .iter()
        .filter(|p| !p.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("_");

    let slug: String = joined
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();

    slug.chars().take(max_len).collect()
}

/// The first 4-digit year token found in `text` (e.g. a competition or grade
/// name), or `None` if none is present. Used to derive the `season` field
/// when it is not carried separately by the source page.
pub fn extract_year(text: &str) -> Option<String> {
    let bytes: Vec<char> = text.chars().collect();
    for i in 0..bytes.len() {
        if i + 4 <= bytes.len() && bytes[i..i + 4].iter().all(|c| c.is_ascii_digit()) {
            let before_ok = i == 0 || !bytes[i - 1].is_ascii_digit();
            let after_ok = i + 4 == bytes.len() || !bytes[i + 4].is_ascii_digit();
            if before_ok && after_ok {
                let candidate: String = bytes[i..i + 4].iter().collect();
                if candidate.starts_with("20") {
                    return Some(candidate);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text(" A B\tC\n"), "A B C");
        assert_eq!(clean_text("A\u{00A0}B"), "A B");
    }

    #[test]
    fn extract_int_handles_minus_variants() {
        assert_eq!(extract_int("21"), Some(21));
        assert_eq!(extract_int("-21"), Some(-21));
        assert_eq!(extract_int("\u{2212}21"), Some(-21));
        assert_eq!(extract_int("no digits here"), None);
        assert_eq!(extract_int("1. Mentone"), Some(1));
    }

    #[test]
    fn path_digit_segments_extracts_ids() {
        assert_eq!(
            path_digit_segments("/games/22076/37393/round/4"),
            vec!["22076", "37393", "4"]
        );
        assert_eq!(path_digit_segments("/game/2048530"), vec!["2048530"]);
    }

    #[test]
    fn slugify_trims_to_max_len() {
        let slug = slugify_alphanumeric(&["Mentone Hockey Centre", "1 Main St"], 50);
        assert!(slug.len() <= 50);
        assert!(slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn extract_year_finds_four_digit_season() {
        assert_eq!(extract_year("Senior Competition 2025"), Some("2025".to_string()));
        assert_eq!(extract_year("Men's Pennant B - 2025"), Some("2025".to_string()));
        assert_eq!(extract_year("U16 Boys State League"), None);
        assert_eq!(extract_year("fixture id 20250401"), None);
    }
}
