//! Keyword chapter router.
//!
//! Decides which chapter, if any, should scope a similarity search. The
//! query is lower-cased and each keyword group is scanned in table
//! declaration order; the first group with any keyword occurring as a
//! substring wins. There is no scoring: a query that mentions both a race
//! and a class routes to whichever chapter is declared first.

use serde::Serialize;

use crate::chapters::{Chapter, ChapterTable};

/// Which chapter a query was routed to and the keyword that matched.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDecision<'a> {
    pub chapter: &'a Chapter,
    pub keyword: &'a str,
}

/// Route `query` to a chapter, returning the matched keyword as well.
pub fn route_with_keyword<'a>(table: &'a ChapterTable, query: &str) -> Option<RouteDecision<'a>> {
    let query_lower = query.to_lowercase();
    for group in table.keyword_groups() {
        if let Some(keyword) = group
            .keywords
            .iter()
            .find(|k| query_lower.contains(k.as_str()))
        {
            // Groups are validated against the chapter list on construction.
            let chapter = table.get(&group.chapter_id)?;
            return Some(RouteDecision {
                chapter,
                keyword: keyword.as_str(),
            });
        }
    }
    None
}

/// Route `query` to a chapter. `None` means "search every chapter".
pub fn route<'a>(table: &'a ChapterTable, query: &str) -> Option<&'a Chapter> {
    route_with_keyword(table, query).map(|d| d.chapter)
}
