pub mod embedded;
pub mod guides;
pub mod identity;
pub mod normalize;
pub mod skills;
pub mod wiki;

use serde::Serialize;
use tracing::debug;

use crate::model::{HeroEntity, ListingEntry};
use identity::MatchStrategy;
use normalize::NormalizeContext;

/// Degradations recorded on an entity that still produced output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Fallback {
    /// No blob on the page; entity built from markup and defaults.
    NoEmbeddedData,
    /// Blob found but no record matched the slug.
    IdentityUnresolved,
    /// No usable portrait; placeholder referenced.
    AssetUnavailable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailOutcome {
    pub hero: HeroEntity,
    pub matched_by: Option<MatchStrategy>,
    pub fallbacks: Vec<Fallback>,
}

/// Extraction → identity → normalization over one detail page.
/// `image_path` is provisional; the asset stage replaces it.
pub fn process_detail_page(html: &str, entry: &ListingEntry, image_path: &str) -> DetailOutcome {
    let html_skills = skills::extract_skills(html);
    let blob = embedded::extract(html);
    let mut fallbacks = Vec::new();

    let resolved = match &blob {
        None => {
            fallbacks.push(Fallback::NoEmbeddedData);
            None
        }
        Some(blob) => {
            debug!(slug = %entry.slug, pattern = blob.pattern, "embedded data found");
            let records = blob.records();
            let resolved = identity::resolve(&entry.slug, &entry.link_text, &records);
            if resolved.is_none() {
                fallbacks.push(Fallback::IdentityUnresolved);
            }
            resolved
        }
    };

    let ctx = NormalizeContext {
        slug: &entry.slug,
        detected_faction: entry.faction,
        html_skills,
        image_path,
    };
    let hero = normalize::normalize(resolved.map(|r| r.record), &ctx);

    DetailOutcome {
        hero,
        matched_by: resolved.map(|r| r.strategy),
        fallbacks,
    }
}
