use scraper::{ElementRef, Html, Selector};

use crate::model::{Skill, SkillType};

const TITLE_SELECTOR: &str = ".text-sm.font-bold.text-slate-900";
const DESCRIPTION_SELECTOR: &str = r"p.text-\[13px\].text-slate-800";
const TAG_SELECTOR: &str = "span.rounded-full";
const CARD_CLASS: &str = "rounded-xl";

/// Read skill cards from a detail page's markup.
pub fn extract_skills(html: &str) -> Vec<Skill> {
    let document = Html::parse_document(html);
    let title_sel = Selector::parse(TITLE_SELECTOR).expect("skill title selector");
    let desc_sel = Selector::parse(DESCRIPTION_SELECTOR).expect("skill description selector");
    let tag_sel = Selector::parse(TAG_SELECTOR).expect("skill tag selector");

    document
        .select(&title_sel)
        .filter_map(|title| {
            let card = title
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "div" && el.value().classes().any(|c| c == CARD_CLASS))?;

            let name = element_text(&title);
            if name.is_empty() {
                return None;
            }
            let description = card
                .select(&desc_sel)
                .next()
                .map(|el| element_text(&el))
                .unwrap_or_default();
            let kind = card
                .select(&tag_sel)
                .find_map(|tag| SkillType::parse(&element_text(&tag)))
                .unwrap_or(SkillType::Unknown);

            Some(Skill {
                name,
                kind,
                description,
                tips: String::new(),
            })
        })
        .collect()
}

/// Text content with whitespace runs collapsed.
pub fn element_text(el: &ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
