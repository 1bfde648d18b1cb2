use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::skills::element_text;

static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.").unwrap());
static HEADER_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2, h3").unwrap());

/// Prose sections lifted from a wiki page, already rendered as markdown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WikiSections {
    pub lore: Option<String>,
    pub skills: Option<String>,
    pub strategy: Option<String>,
}

impl WikiSections {
    pub fn is_empty(&self) -> bool {
        self.lore.is_none() && self.skills.is_none() && self.strategy.is_none()
    }
}

/// Wiki page URL for a display name (`Desert Prince` → `.../Desert_Prince`).
pub fn page_url(wiki_base: &str, name: &str) -> String {
    format!("{}{}", wiki_base, name.trim().replace(' ', "_"))
}

pub fn extract_sections(html: &str) -> WikiSections {
    let document = Html::parse_document(html);
    let first_heading = Selector::parse("#firstHeading").expect("first heading selector");
    if document.select(&first_heading).next().is_none() {
        return WikiSections::default();
    }
    WikiSections {
        lore: find_header(&document, &["Lore"]).and_then(lore_body),
        skills: find_header(&document, &["Skills"]).and_then(skills_body),
        strategy: find_header(&document, &["Strategy", "Formation"]).and_then(strategy_body),
    }
}

/// First h2/h3 whose text mentions any of `needles`.
fn find_header<'a>(document: &'a Html, needles: &[&str]) -> Option<ElementRef<'a>> {
    document.select(&HEADER_SEL).find(|h| {
        let text = element_text(h);
        needles.iter().any(|n| text.contains(n))
    })
}

fn heading_text(el: &ElementRef) -> String {
    element_text(el).replace("[edit]", "").trim().to_string()
}

/// Element siblings after `header` until one named in `stop`.
fn following<'a>(header: ElementRef<'a>, stop: &'a [&'a str]) -> impl Iterator<Item = ElementRef<'a>> {
    header
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .take_while(move |el| !stop.contains(&el.value().name()))
}

fn stop_tags(header: &ElementRef) -> &'static [&'static str] {
    if header.value().name() == "h2" {
        &["h2"]
    } else {
        &["h2", "h3"]
    }
}

fn list_items(list: &ElementRef, out: &mut String) {
    let li = Selector::parse("li").expect("list item selector");
    for item in list.select(&li) {
        out.push_str(&format!("- {}\n", element_text(&item)));
    }
    out.push('\n');
}

fn finish(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn lore_body(header: ElementRef) -> Option<String> {
    let mut text = String::new();
    for el in following(header, &["h2", "h3"]) {
        if el.value().name() == "p" {
            text.push_str(&element_text(&el));
            text.push_str("\n\n");
        }
    }
    finish(text)
}

fn skills_body(header: ElementRef) -> Option<String> {
    let mut text = String::new();
    for el in following(header, stop_tags(&header)) {
        match el.value().name() {
            "h3" => text.push_str(&format!("### {}\n", heading_text(&el))),
            "p" => {
                let p = element_text(&el);
                if p.is_empty() {
                    continue;
                }
                if NUMBERED_RE.is_match(&p) {
                    text.push_str(&format!("### {}\n", p));
                } else if p.starts_with('→') {
                    text.push_str(&format!("> {}\n\n", p));
                } else {
                    text.push_str(&format!("{}\n\n", p));
                }
            }
            "ul" => list_items(&el, &mut text),
            _ => {}
        }
    }
    finish(text)
}

fn strategy_body(header: ElementRef) -> Option<String> {
    let mut text = String::new();
    for el in following(header, stop_tags(&header)) {
        match el.value().name() {
            "p" => {
                text.push_str(&element_text(&el));
                text.push_str("\n\n");
            }
            "ul" => list_items(&el, &mut text),
            _ => {}
        }
    }
    finish(text)
}
