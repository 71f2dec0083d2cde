//! Venue extractor.

use scraper::{Html, Selector};
use tracing::instrument;

use super::{ExtractContext, Warnings};
use crate::scraper_util::{elem_text, slugify_alphanumeric};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VenueInfo {
    pub name: String,
    pub address: Option<String>,
    pub field_code: Option<String>,
    pub map_url: Option<String>,
}

impl VenueInfo {
    /// Derives the venue slug from uppercased alphanumerics of
    /// `name + "_" + first address segment`, trimmed to at most 50
    /// characters.
    pub fn slug(&self) -> String {
        let first_address_segment = self
            .address
            .as_deref()
            .and_then(|a| a.split(',').next())
            .unwrap_or("");
        slugify_alphanumeric(&[&self.name, first_address_segment], 50)
    }
}

/// Parses a game detail page for its venue information.
#[instrument(skip(html))]
pub fn extract_venue(html: &str, _ctx: &ExtractContext) -> (Option<VenueInfo>, Warnings) {
    let doc = Html::parse_document(html);
    let venue_selector = Selector::parse(".game-venue,.fixture-venue").unwrap();
    let address_selector = Selector::parse(".venue-address").unwrap();
    let field_code_selector = Selector::parse(".field-code").unwrap();
    let map_selector = Selector::parse(r#"a[href*="maps"]"#).unwrap();
    let warnings = Warnings::default();

    let Some(venue_el) = doc.select(&venue_selector).next() else {
        return (None, warnings);
    };

    let name = venue_el
        .children()
        .find_map(|n| n.value().as_text())
        .map(|t| t.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| elem_text(venue_el));

    let address = venue_el.select(&address_selector).next().map(elem_text).filter(|s| !s.is_empty());
    let field_code = venue_el.select(&field_code_selector).next().map(elem_text).filter(|s| !s.is_empty());
    let map_url = venue_el
        .select(&map_selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|s| s.to_string());

    (
        Some(VenueInfo {
            name,
            address,
            field_code,
            map_url,
        }),
        warnings,
    )
}
