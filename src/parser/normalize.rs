use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::identity::{simplify, ID_FIELDS, NAME_FIELDS};
use crate::model::{
    first_text, Faction, HeroEntity, RawRecord, Rarity, Skill, SkillType,
};

static LINE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*[\r\n]+\s*").unwrap());

/// Names that default to Mythic when the source omits rarity.
const MYTHIC_NAMES: &[&str] = &[
    "Paragon", "Tidecaller", "Storm", "Pixie", "Sage", "Monkey", "Panda", "Rose",
    "Aahura", "Soulmancer", "Wanderer", "Desert Prince", "Astrologer",
];

pub const DEFAULT_ROLE: &str = "DPS";
pub const NONE_TEXT: &str = "None";
pub const UNKNOWN_SKILL: &str = "Unknown";

/// Listing- and page-derived context for one entity.
#[derive(Debug, Clone)]
pub struct NormalizeContext<'a> {
    pub slug: &'a str,
    pub detected_faction: Faction,
    /// Skills read from page markup; preferred over blob skills when non-empty.
    pub html_skills: Vec<Skill>,
    pub image_path: &'a str,
}

/// Trim, swap `"` for `'`, and fold line breaks into single spaces.
pub fn clean_text(s: &str) -> String {
    LINE_BREAK_RE
        .replace_all(s.trim(), " ")
        .replace('"', "'")
}

fn clean_or(value: Option<String>, default: impl FnOnce() -> String) -> String {
    value
        .map(|v| clean_text(&v))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(default)
}

/// `tide-caller` → `Tide Caller`
pub fn title_from_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_mythic_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    MYTHIC_NAMES.iter().any(|m| lower.contains(&m.to_lowercase()))
}

/// Build a fully populated entity; every field gets a defined default.
pub fn normalize(record: Option<&RawRecord>, ctx: &NormalizeContext) -> HeroEntity {
    let empty = RawRecord::new();
    let rec = record.unwrap_or(&empty);

    let id = clean_or(Some(ctx.slug.to_string()), || "unknown".into());
    let game_id = first_text(rec, ID_FIELDS)
        .map(|s| simplify(&clean_text(&s)))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| simplify(&id));
    let name = clean_or(first_text(rec, NAME_FIELDS), || title_from_slug(&id));
    let name = if name.is_empty() { id.clone() } else { name };

    let faction = first_text(rec, &["faction"])
        .and_then(|f| Faction::parse(&f))
        .unwrap_or(ctx.detected_faction);
    let rarity = first_text(rec, &["rarity"])
        .and_then(|r| Rarity::parse(&r))
        .unwrap_or(if is_mythic_name(&name) {
            Rarity::Mythic
        } else {
            Rarity::Legendary
        });
    let role = clean_or(first_text(rec, &["role", "class"]), || DEFAULT_ROLE.into());

    let gear_set = clean_or(
        rec.get("gear")
            .and_then(Value::as_object)
            .and_then(|g| first_text(g, &["default_set_name"]))
            .or_else(|| first_text(rec, &["gear_set"])),
        || NONE_TEXT.into(),
    );
    let unique_weapon = clean_or(first_text(rec, &["unique_weapon", "weapon"]), || {
        NONE_TEXT.into()
    });

    let positions = rec
        .get("positions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(clean_text(s)),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let skills = if ctx.html_skills.is_empty() {
        record_skills(rec)
    } else {
        ctx.html_skills.iter().map(clean_skill).collect()
    };

    HeroEntity {
        id,
        game_id,
        name,
        faction,
        rarity,
        role,
        image_path: ctx.image_path.to_string(),
        gear_set,
        unique_weapon,
        positions,
        skills,
    }
}

fn record_skills(rec: &RawRecord) -> Vec<Skill> {
    rec.get("skills")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|s| Skill {
                    name: clean_or(first_text(s, &["name", "skill_name"]), || {
                        UNKNOWN_SKILL.into()
                    }),
                    kind: first_text(s, &["type", "skill_type"])
                        .and_then(|t| SkillType::parse(&t))
                        .unwrap_or(SkillType::Unknown),
                    description: clean_or(
                        first_text(s, &["base_description", "description"]),
                        String::new,
                    ),
                    tips: clean_or(first_text(s, &["tips"]), String::new),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn clean_skill(skill: &Skill) -> Skill {
    Skill {
        name: clean_or(Some(skill.name.clone()), || UNKNOWN_SKILL.into()),
        kind: skill.kind,
        description: clean_text(&skill.description),
        tips: clean_text(&skill.tips),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(slug: &str) -> NormalizeContext<'_> {
        NormalizeContext {
            slug,
            detected_faction: Faction::Unknown,
            html_skills: vec![],
            image_path: "/img/heroes/placeholder.png",
        }
    }

    #[test]
    fn full_default_path() {
        let hero = normalize(None, &ctx("iron-golem"));
        assert_eq!(hero.id, "iron-golem");
        assert_eq!(hero.game_id, "irongolem");
        assert_eq!(hero.name, "Iron Golem");
        assert_eq!(hero.faction, Faction::Unknown);
        assert_eq!(hero.rarity, Rarity::Legendary);
        assert_eq!(hero.role, "DPS");
        assert_eq!(hero.gear_set, "None");
        assert_eq!(hero.unique_weapon, "None");
        assert!(hero.positions.is_empty());
        assert!(hero.skills.is_empty());
    }

    #[test]
    fn no_required_field_is_empty() {
        let data = json!({"hero_id": "  ", "hero_name": "\n", "role": "", "gear": {"default_set_name": ""}});
        let hero = normalize(data.as_object(), &ctx("x"));
        for field in [
            &hero.id, &hero.game_id, &hero.name, &hero.role,
            &hero.image_path, &hero.gear_set, &hero.unique_weapon,
        ] {
            assert!(!field.is_empty());
        }
    }

    #[test]
    fn alternative_field_names() {
        let data = json!({
            "id": "Tide-Caller",
            "name": "Tidecaller",
            "faction": "nature",
            "class": "Healer",
            "gear_set": "Ocean Set",
            "weapon": "Trident",
            "positions": ["Back", 2],
            "skills": [
                {"skill_name": "Wave", "skill_type": "ULTIMATE", "description": "Big \"splash\"\nhits all", "tips": "Save it"}
            ]
        });
        let hero = normalize(data.as_object(), &ctx("tide-caller"));
        assert_eq!(hero.game_id, "tidecaller");
        assert_eq!(hero.faction, Faction::Nature);
        assert_eq!(hero.rarity, Rarity::Mythic);
        assert_eq!(hero.role, "Healer");
        assert_eq!(hero.gear_set, "Ocean Set");
        assert_eq!(hero.unique_weapon, "Trident");
        assert_eq!(hero.positions, vec!["Back", "2"]);
        assert_eq!(hero.skills[0].kind, SkillType::Ultimate);
        assert_eq!(hero.skills[0].description, "Big 'splash' hits all");
        assert_eq!(hero.skills[0].tips, "Save it");
    }

    #[test]
    fn nested_gear_preferred_over_flat() {
        let data = json!({"gear": {"default_set_name": "Warlord"}, "gear_set": "Other"});
        let hero = normalize(data.as_object(), &ctx("a"));
        assert_eq!(hero.gear_set, "Warlord");
    }

    #[test]
    fn faction_falls_back_to_context_then_unknown() {
        let data = json!({"faction": "Pirates"});
        let mut c = ctx("a");
        c.detected_faction = Faction::Horde;
        assert_eq!(normalize(data.as_object(), &c).faction, Faction::Horde);
        assert_eq!(normalize(data.as_object(), &ctx("a")).faction, Faction::Unknown);
    }

    #[test]
    fn explicit_rarity_wins_over_mythic_names() {
        let data = json!({"name": "Rose", "rarity": "Epic"});
        assert_eq!(normalize(data.as_object(), &ctx("rose")).rarity, Rarity::Epic);
        assert_eq!(normalize(None, &ctx("rose")).rarity, Rarity::Mythic);
    }

    #[test]
    fn html_skills_preferred() {
        let data = json!({"skills": [{"name": "Old"}]});
        let mut c = ctx("w");
        c.html_skills = vec![Skill {
            name: " Curse ".into(),
            kind: SkillType::Active,
            description: "Reduces\nenemy defense".into(),
            tips: String::new(),
        }];
        let hero = normalize(data.as_object(), &c);
        assert_eq!(hero.skills.len(), 1);
        assert_eq!(hero.skills[0].name, "Curse");
        assert_eq!(hero.skills[0].description, "Reduces enemy defense");
    }

    #[test]
    fn clean_text_rules() {
        assert_eq!(clean_text("  say \"hi\"\r\n\n  there "), "say 'hi' there");
        assert_eq!(clean_text("a  b"), "a  b");
    }
}
