use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::normalize::clean_text;
use super::skills::element_text;

static H2_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").unwrap());
static H3_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").unwrap());
static SUBHEAD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3, h4").unwrap());
static P_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th, td").unwrap());
static TD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

const PASSIVES_MARKER: &str = "Epic Hero Passive Traits";
const PASSIVES_INTRO: &str = "Once Epic Heroes reach 2-Star Platinum, they unlock a global passive \
                              trait (Skill 3). Prioritize maxing these out!";

/// Pages rendered from the site's hero guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guide {
    CoreStrategy,
    FactionMeta,
    EpicPassives,
}

impl Guide {
    pub const ALL: [Guide; 3] = [Guide::CoreStrategy, Guide::FactionMeta, Guide::EpicPassives];

    /// Output path under the guides directory.
    pub fn relative_path(self) -> &'static str {
        match self {
            Guide::CoreStrategy => "mechanics/core-strategy.md",
            Guide::FactionMeta => "meta/faction-meta.md",
            Guide::EpicPassives => "mechanics/epic-passives.md",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Guide::CoreStrategy => "Core Hero Strategy",
            Guide::FactionMeta => "Faction Meta Guides",
            Guide::EpicPassives => PASSIVES_MARKER,
        }
    }
}

/// Every guide page in `Guide::ALL` order; `None` where the page's header
/// is missing from the guide.
pub fn extract_guides(html: &str) -> Vec<(Guide, Option<String>)> {
    let document = Html::parse_document(html);
    Guide::ALL
        .into_iter()
        .map(|guide| {
            let page = match guide {
                Guide::CoreStrategy => core_strategy(&document),
                Guide::FactionMeta => faction_meta(&document),
                Guide::EpicPassives => epic_passives(&document),
            };
            (guide, page)
        })
        .collect()
}

fn clean(el: &ElementRef) -> String {
    clean_text(&element_text(el))
}

fn h2_containing<'a>(document: &'a Html, needle: &str) -> Option<ElementRef<'a>> {
    document.select(&H2_SEL).find(|h| element_text(h).contains(needle))
}

fn next_elements<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.next_siblings().filter_map(ElementRef::wrap)
}

/// Paragraph describing a card title: a later sibling `p`, else the first
/// `p` in the title's parent.
fn card_text(title: ElementRef) -> Option<String> {
    next_elements(title)
        .find(|el| el.value().name() == "p")
        .or_else(|| {
            title
                .parent()
                .and_then(ElementRef::wrap)
                .and_then(|parent| parent.select(&P_SEL).next())
        })
        .map(|p| clean(&p))
}

fn core_strategy(document: &Html) -> Option<String> {
    let header = h2_containing(document, Guide::CoreStrategy.title())?;
    let mut out = format!("# {}\n\n", Guide::CoreStrategy.title());
    if let Some(grid) = next_elements(header).find(|el| el.value().name() == "div") {
        for title in grid.select(&H3_SEL) {
            out.push_str(&format!("## {}\n", clean(&title)));
            if let Some(text) = card_text(title) {
                out.push_str(&format!("{}\n\n", text));
            }
        }
    }
    Some(out)
}

fn faction_meta(document: &Html) -> Option<String> {
    let header = h2_containing(document, Guide::FactionMeta.title())?;
    let mut out = format!("# {}\n\n", Guide::FactionMeta.title());
    for el in next_elements(header).take_while(|el| el.value().name() != "h2") {
        match el.value().name() {
            "p" => {
                let text = clean(&el);
                if !text.is_empty() {
                    out.push_str(&format!("{}\n\n", text));
                }
            }
            "h3" => out.push_str(&format!("## {}\n\n", clean(&el))),
            "h4" => out.push_str(&format!("### {}\n\n", clean(&el))),
            "div" => {
                let mut subheads = el.select(&SUBHEAD_SEL).peekable();
                if subheads.peek().is_none() {
                    let text = clean(&el);
                    if text.chars().count() > 20 {
                        out.push_str(&format!("{}\n\n", text));
                    }
                }
                for sub in subheads {
                    out.push_str(&format!("## {}\n", clean(&sub)));
                    if let Some(p) = next_elements(sub).find(|s| s.value().name() == "p") {
                        out.push_str(&format!("{}\n\n", clean(&p)));
                    }
                }
            }
            _ => {}
        }
    }
    Some(out)
}

/// Element directly holding a text node that mentions the passives title.
fn passives_header(document: &Html) -> Option<ElementRef<'_>> {
    document
        .root_element()
        .descendants()
        .find(|node| node.value().as_text().is_some_and(|t| t.contains(PASSIVES_MARKER)))
        .and_then(|node| node.parent())
        .and_then(ElementRef::wrap)
}

fn epic_passives(document: &Html) -> Option<String> {
    let header = passives_header(document)?;
    let table = next_elements(header)
        .take(10)
        .find_map(|el| match el.value().name() {
            "table" => Some(el),
            "div" => el.select(&TABLE_SEL).next(),
            _ => None,
        })
        .or_else(|| {
            document.select(&TABLE_SEL).find(|t| {
                let text = element_text(t);
                text.contains("Hero") && text.contains("Trait")
            })
        });

    let mut out = format!("# {}\n\n{}\n\n", PASSIVES_MARKER, PASSIVES_INTRO);
    if let Some(table) = table {
        out.push_str(&markdown_table(table));
    }
    Some(out)
}

/// First row as the header; later rows keep only their `td` cells.
fn markdown_table(table: ElementRef) -> String {
    let mut rows = table.select(&TR_SEL);
    let Some(first) = rows.next() else {
        return String::new();
    };
    let headers: Vec<String> = first.select(&CELL_SEL).map(|c| clean(&c)).collect();
    let mut out = format!("| {} |\n", headers.join(" | "));
    out.push_str(&format!("| {} |\n", vec!["---"; headers.len()].join(" | ")));
    for row in rows {
        let cells: Vec<String> = row.select(&TD_SEL).map(|c| clean(&c)).collect();
        if !cells.is_empty() {
            out.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
    }
    out
}
