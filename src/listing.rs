use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::info;

use crate::error::PipelineError;
use crate::fetch::Fetcher;
use crate::model::{Faction, ListingEntry};
use crate::parser::skills::element_text;
use crate::settings::{join_url, Settings};

/// Fetch the hero listing and return one entry per distinct slug, in page order.
pub async fn fetch_entries<F: Fetcher>(
    fetcher: &F,
    settings: &Settings,
) -> Result<Vec<ListingEntry>, PipelineError> {
    let url = settings.listing_url();
    info!("Fetching hero listing: {}", url);
    let html = fetcher
        .fetch_text(&url)
        .await
        .map_err(PipelineError::ListingFetch)?;
    let entries = parse_listing(&html, &settings.base_url, &settings.entity_segment);
    info!("Hero links on listing: {}", entries.len());
    Ok(entries)
}

pub fn parse_listing(html: &str, base_url: &str, segment: &str) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").expect("anchor selector");
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for link in document.select(&anchors) {
        let Some(href) = link.value().attr("href") else { continue };
        let Some(slug) = slug_from_href(href, segment) else { continue };
        if !seen.insert(slug.clone()) {
            continue;
        }

        let link_text = link_text(&link);
        let context = match enclosing_div(&link) {
            Some(div) => format!("{} {}", link_text, element_text(&div)),
            None => link_text.clone(),
        };

        entries.push(ListingEntry {
            url: join_url(base_url, href),
            faction: Faction::detect(&context),
            slug,
            link_text,
        });
    }

    entries
}

/// Last path segment of an href whose path contains `/{segment}/{slug}`.
pub fn slug_from_href(href: &str, segment: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let at = parts.iter().position(|p| *p == segment)?;
    if at + 1 >= parts.len() {
        return None;
    }
    parts.last().map(|s| s.to_string())
}

/// Visible anchor text, one line per text node, empty lines dropped.
fn link_text(link: &ElementRef) -> String {
    link.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn enclosing_div<'a>(link: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div")
}
