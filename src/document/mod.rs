pub mod sections;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::EntityError;
use crate::model::HeroEntity;
use crate::parser::wiki::WikiSections;
use crate::store::write_atomic;
use sections::{merge_section, SectionUpdate};

pub const OVERVIEW: &str = "Overview";
pub const SKILLS: &str = "Skills";
pub const LORE: &str = "Lore";
pub const STRATEGY: &str = "Strategy";

const NO_SKILLS: &str = "*Skill data not available.*";
const NO_DESCRIPTION: &str = "Description not available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocStatus {
    Written,
    Unchanged,
}

pub fn document_path(docs_dir: &Path, id: &str) -> PathBuf {
    docs_dir.join(format!("{}.md", id))
}

pub fn overview_body(hero: &HeroEntity) -> String {
    let positions = if hero.positions.is_empty() {
        "None".to_string()
    } else {
        hero.positions.join(", ")
    };
    format!(
        "- **Faction:** {}\n- **Rarity:** {}\n- **Role:** {}\n- **Gear Set:** {}\n\
         - **Unique Weapon:** {}\n- **Positions:** {}\n\n![{}]({})",
        hero.faction,
        hero.rarity,
        hero.role,
        hero.gear_set,
        hero.unique_weapon,
        positions,
        hero.name,
        hero.image_path,
    )
}

pub fn skills_body(hero: &HeroEntity) -> String {
    if hero.skills.is_empty() {
        return NO_SKILLS.to_string();
    }
    hero.skills
        .iter()
        .map(|skill| {
            let description = if skill.description.is_empty() {
                NO_DESCRIPTION
            } else {
                &skill.description
            };
            let mut entry = format!(
                "### {}\n**Type:** `{}`\n\n{}",
                skill.name, skill.kind, description
            );
            if !skill.tips.is_empty() {
                entry.push_str(&format!("\n\n> Tip: {}", skill.tips));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Apply `updates` in order to `doc`.
pub fn apply(doc: &str, updates: &[SectionUpdate]) -> String {
    updates
        .iter()
        .fold(doc.to_string(), |text, update| merge_section(&text, update))
}

fn hero_updates(hero: &HeroEntity) -> [SectionUpdate; 2] {
    [
        SectionUpdate::new(OVERVIEW, overview_body(hero)),
        SectionUpdate::new(SKILLS, skills_body(hero)).after(OVERVIEW),
    ]
}

fn wiki_updates(sections: &WikiSections) -> Vec<SectionUpdate> {
    [
        (LORE, &sections.lore, OVERVIEW),
        (SKILLS, &sections.skills, LORE),
        (STRATEGY, &sections.strategy, SKILLS),
    ]
    .into_iter()
    .filter_map(|(heading, body, after)| {
        body.as_ref()
            .map(|b| SectionUpdate::new(heading, b.clone()).after(after))
    })
    .collect()
}

fn read_or_skeleton(path: &Path, name: &str) -> io::Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(format!("# {}\n", name)),
        Err(e) => Err(e),
    }
}

fn save_if_changed(path: &Path, before: &str, after: &str) -> io::Result<DocStatus> {
    if before == after && path.exists() {
        return Ok(DocStatus::Unchanged);
    }
    write_atomic(path, after.as_bytes())?;
    Ok(DocStatus::Written)
}

/// Upsert the Overview and Skills sections of the hero's document, creating it
/// if needed. Other content in the file is left alone.
/// Write a whole generated page, leaving it untouched when the content is
/// already current.
pub fn write_page(path: &Path, content: &str) -> io::Result<DocStatus> {
    let before = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };
    save_if_changed(path, &before, content)
}

pub fn write_hero_document(docs_dir: &Path, hero: &HeroEntity) -> Result<DocStatus, EntityError> {
    let path = document_path(docs_dir, &hero.id);
    let io_err = |source| EntityError::DocumentWrite {
        path: path.clone(),
        source,
    };
    let before = read_or_skeleton(&path, &hero.name).map_err(io_err)?;
    let after = apply(&before, &hero_updates(hero));
    save_if_changed(&path, &before, &after).map_err(io_err)
}

/// Merge wiki prose into an existing document. `Ok(None)` when the document
/// does not exist yet.
pub fn enrich_document(
    docs_dir: &Path,
    id: &str,
    sections: &WikiSections,
) -> Result<Option<DocStatus>, EntityError> {
    let path = document_path(docs_dir, id);
    let io_err = |source| EntityError::DocumentWrite {
        path: path.clone(),
        source,
    };
    let before = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(e)),
    };
    let after = apply(&before, &wiki_updates(sections));
    save_if_changed(&path, &before, &after).map(Some).map_err(io_err)
}
