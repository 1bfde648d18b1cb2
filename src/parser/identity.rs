use serde::Serialize;

use crate::model::{field_text, first_text, RawRecord};

/// Internal id fields, first present wins.
pub const ID_FIELDS: &[&str] = &["hero_id", "id"];
pub const SLUG_FIELD: &str = "slug";
pub const NAME_FIELDS: &[&str] = &["hero_name", "name"];

/// Matching strategies in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchStrategy {
    Identifier,
    DisplayName,
}

const STRATEGIES: &[MatchStrategy] = &[MatchStrategy::Identifier, MatchStrategy::DisplayName];

#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub record: &'a RawRecord,
    pub strategy: MatchStrategy,
}

/// Lower-case and drop dashes: `Tide-Caller` → `tidecaller`.
pub fn simplify(s: &str) -> String {
    s.to_lowercase().replace('-', "")
}

/// Match a URL slug to one record. Ties go to collection order.
pub fn resolve<'a>(
    slug: &str,
    link_text: &str,
    records: &[&'a RawRecord],
) -> Option<Resolved<'a>> {
    STRATEGIES.iter().find_map(|&strategy| {
        let record = match strategy {
            MatchStrategy::Identifier => by_identifier(slug, records),
            MatchStrategy::DisplayName => by_display_name(link_text, records),
        }?;
        Some(Resolved { record, strategy })
    })
}

fn by_identifier<'a>(slug: &str, records: &[&'a RawRecord]) -> Option<&'a RawRecord> {
    let target = simplify(slug);
    if target.is_empty() {
        return None;
    }
    records.iter().copied().find(|record| {
        let id = first_text(record, ID_FIELDS).map(|s| simplify(&s));
        let slug = field_text(record, SLUG_FIELD).map(|s| simplify(&s));
        id.as_deref() == Some(target.as_str()) || slug.as_deref() == Some(target.as_str())
    })
}

fn by_display_name<'a>(link_text: &str, records: &[&'a RawRecord]) -> Option<&'a RawRecord> {
    let haystack = link_text.to_lowercase();
    if haystack.trim().is_empty() {
        return None;
    }
    records.iter().copied().find(|record| {
        first_text(record, NAME_FIELDS)
            .map(|name| name.trim().to_lowercase())
            .is_some_and(|name| !name.is_empty() && haystack.contains(&name))
    })
}
