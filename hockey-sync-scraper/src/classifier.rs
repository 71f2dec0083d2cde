//! Keyword-driven classification of grade/team names into [`TeamType`] and
//! [`Gender`]. Pure function of a free-text name: never panics, always
//! produces a best-effort answer.

use crate::model::{Gender, TeamType};

const MIDWEEK_AGE_BANDS: [&str; 6] = ["35+", "40+", "45+", "50+", "60+", "70+"];
const JUNIOR_AGE_BANDS: [&str; 12] = [
    "u8", "u9", "u10", "u11", "u12", "u13", "u14", "u15", "u16", "u17", "u18", "u19",
];

/// Classify a grade/competition name into its [`TeamType`]. The procedure is strictly ordered and
/// case-insensitive, operating on whole-string `contains`.
pub fn classify_type(name: &str) -> TeamType {
    let lower = name.to_lowercase();

    if lower.contains("midweek")
    || lower.contains("masters")
    || MIDWEEK_AGE_BANDS.iter().any(|b| lower.contains(b))
    {
        return TeamType::Midweek;
    }

    if lower.contains("junior") || JUNIOR_AGE_BANDS.iter().any(|b| lower.contains(b)) {
        return TeamType::Junior;
    }

    if ["senior", "pennant", "vic league", "premier league", "metro"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        return TeamType::Senior;
    }

    if lower.contains("indoor") {
        return TeamType::Indoor;
    }
    if lower.contains("outdoor") {
        return TeamType::Outdoor;
    }
    if ["social", "summer", "vaisakhi", "cup"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        return TeamType::SocialOther;
    }

    // Generic keyword map fallback.
    for (kw, ty) in [
        ("senior", TeamType::Senior),
        ("junior", TeamType::Junior),
        ("midweek", TeamType::Midweek),
        ("masters", TeamType::Masters),
        ("outdoor", TeamType::Outdoor),
        ("indoor", TeamType::Indoor),
    ] {
        if lower.contains(kw) {
            return ty;
        }
    }

    TeamType::Senior
}

/// Classify a grade/team name into its [`Gender`]. Depends on the already-classified [`TeamType`] for
/// the fallback pass.
pub fn classify_gender(name: &str, team_type: TeamType) -> Gender {
    let lower = name.to_lowercase();

    if ["women", "girls", "ladies"].iter().any(|kw| lower.contains(kw)) {
        return Gender::Women;
    }
    if ["men", "boys"].iter().any(|kw| lower.contains(kw)) {
        return Gender::Men;
    }
    if lower.contains("mixed") {
        return Gender::Mixed;
    }

    match team_type {
        TeamType::Junior => Gender::Mixed,
        TeamType::Midweek | TeamType::Masters | TeamType::Senior => Gender::Men,
        _ => Gender::Unknown,
    }
}

/// Convenience: classify both type and gender in one call.
pub fn classify(name: &str) -> (TeamType, Gender) {
    let team_type = classify_type(name);
    let gender = classify_gender(name, team_type);
    (team_type, gender)
}

/// Strips a trailing team-index token (e.g. `"Mentone 2"` -> `"Mentone"`) to
/// recover the club name a ladder/team display name belongs to. Names with
/// no trailing index are returned unchanged.
pub fn derive_club_name(team_display_name: &str) -> String {
    let trimmed = team_display_name.trim();
    match trimmed.rsplit_once(' ') {
        Some((club, suffix)) if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) => {
            club.trim().to_string()
        }
        _ => trimmed.to_string(),
    }
}

/// Deterministic slug for a club name. Lowercase
/// alphanumerics joined by underscores, matching the case of the reserved
/// focus-club slug [`crate::model::FOCUS_CLUB_SLUG`].
pub fn club_key(name: &str) -> String {
    crate::scraper_util::slugify_alphanumeric(&[name], 64).to_lowercase()
}

/// Whether `name` belongs to the configured focus club.
/// Case-insensitive whole-string `contains`.
pub fn is_focus_club(name: &str, focus_keyword: &str) -> bool {
    !focus_keyword.is_empty() && name.to_lowercase().contains(&focus_keyword.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_boundary_cases() {
        assert_eq!(
            classify("Men's Pennant B - 2025"),
            (TeamType::Senior, Gender::Men)
        );
        assert_eq!(
            classify("Women's Vic League 1"),
            (TeamType::Senior, Gender::Women)
        );
        assert_eq!(
            classify("U16 Boys State League"),
            (TeamType::Junior, Gender::Men)
        );
        assert_eq!(
            classify("Masters Women 45+"),
            (TeamType::Midweek, Gender::Women)
        );
        assert_eq!(
            classify("Mixed Summer Social"),
            (TeamType::SocialOther, Gender::Mixed)
        );
    }

    #[test]
    fn classifier_is_total() {
        for name in ["", "???", " ", "random garbage 123"] {
            let (_ty, _g) = classify(name);
        }
        // default type for nonsense input is Senior, never "unknown".
        assert_eq!(classify_type("???"), TeamType::Senior);
    }

    #[test]
    fn classifier_is_idempotent_on_its_own_output() {
        for name in [
            "Men's Pennant B - 2025",
            "U16 Boys State League",
            "Masters Women 45+",
        ] {
            let (t1, g1) = classify(name);
            // classify only ever takes a name, so re-classifying the same
            // name is definitionally idempotent.
            let (t2, g2) = classify(name);
            assert_eq!(t1, t2);
            assert_eq!(g1, g2);
        }
    }

    #[test]
    fn derive_club_name_strips_trailing_team_index() {
        assert_eq!(derive_club_name("Mentone 2"), "Mentone");
        assert_eq!(derive_club_name("Camberwell"), "Camberwell");
        assert_eq!(derive_club_name("Old Xaverians 10"), "Old Xaverians");
    }

    #[test]
    fn club_key_is_deterministic_and_lowercase() {
        assert_eq!(club_key("Mentone Hockey Club"), club_key("Mentone Hockey Club"));
        assert_eq!(club_key("Mentone Hockey Club"), "mentonehockeyclub");
    }

    #[test]
    fn focus_club_match_is_case_insensitive() {
        assert!(is_focus_club("Mentone Hockey Club - Men's 1", "mentone"));
        assert!(is_focus_club("MENTONE", "Mentone"));
        assert!(!is_focus_club("Camberwell", "mentone"));
    }
}
