//! Competitions-index extractor.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::instrument;

use super::{ExtractContext, Warnings};
use crate::scraper_util::elem_text;

static ACTION_LINK_RE: LazyLock<Regex> =
LazyLock::new(|| Regex::new(r"/(?:reports/games|team-stats)/(\d+)").unwrap());
static GRADE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/games/(\d+)/(\d+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeLink {
    pub grade_name: String,
    pub comp_id: String,
    pub fixture_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetitionBlock {
    pub name: String,
    pub parent_comp_id: String,
    pub grades: Vec<GradeLink>,
}

/// Parses the top-level games index page into an ordered list of
/// competition blocks, each carrying the grade links that belong to it.
/// The page is walked as a
/// flat, document-order sequence of heading and anchor elements: a heading
/// opens a new competition block, and every anchor seen before the next
/// heading either supplies the block's `parent_comp_id` (an action link) or
/// is recorded as one of its grade links.
#[instrument(skip(html))]
pub fn extract_competitions_index(html: &str, _ctx: &ExtractContext) -> (Vec<CompetitionBlock>, Warnings) {
    let doc = Html::parse_document(html);
    let selector = Selector::parse("h1, h2, h3, h4, a").unwrap();

    let mut blocks = vec![];
    let mut warnings = Warnings::default();

    struct InProgress {
        name: String,
        parent_comp_id: Option<String>,
        grades: Vec<GradeLink>,
    }

    let mut current: Option<InProgress> = None;

    let finalize = |current: Option<InProgress>, warnings: &mut Warnings| -> Option<CompetitionBlock> {
        let block = current?;
        let parent_comp_id = block.parent_comp_id.or_else(|| {
            block.grades.first().map(|g| g.comp_id.clone())
        });
        match parent_comp_id {
            Some(parent_comp_id) => Some(CompetitionBlock {
                name: block.name,
                parent_comp_id,
                grades: block.grades,
            }),
            None => {
                warnings.push(
                    "competitions_index",
                    block.name.clone(),
                    "no parent_comp_id could be determined (no action link and no grade links)",
                );
                None
            }
        }
    };

    for el in doc.select(&selector) {
        let tag = el.value().name();

        if tag.starts_with('h') {
            if let Some(finished) = finalize(current.take(), &mut warnings) {
                blocks.push(finished);
            }
            current = Some(InProgress {
                name: elem_text(el),
                parent_comp_id: None,
                grades: vec![],
            });
            continue;
        }

        // anchor
        let Some(href) = el.value().attr("href") else {
            continue;
        };

        let Some(block) = current.as_mut() else {
            // an anchor before any heading: not part of any competition block.
            continue;
        };

        if block.parent_comp_id.is_none() {
            if let Some(caps) = ACTION_LINK_RE.captures(href) {
                block.parent_comp_id = Some(caps[1].to_string());
                continue;
            }
        }

        if let Some(caps) = GRADE_LINK_RE.captures(href) {
            block.grades.push(GradeLink {
                grade_name: elem_text(el),
                comp_id: caps[1].to_string(),
                fixture_id: caps[2].to_string(),
                url: href.to_string(),
            });
        }
    }

    if let Some(finished) = finalize(current, &mut warnings) {
        blocks.push(finished);
    }

    (blocks, warnings)
}
