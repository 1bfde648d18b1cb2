use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Untyped record as found in an embedded blob.
pub type RawRecord = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Faction {
    League,
    Horde,
    Nature,
    Unknown,
}

impl Faction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "league" => Some(Self::League),
            "horde" => Some(Self::Horde),
            "nature" => Some(Self::Nature),
            _ => None,
        }
    }

    /// Detect a faction mentioned in visible listing text.
    pub fn detect(text: &str) -> Self {
        if text.contains("Nature") {
            Self::Nature
        } else if text.contains("Horde") {
            Self::Horde
        } else if text.contains("League") {
            Self::League
        } else {
            Self::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rarity {
    Mythic,
    Legendary,
    Epic,
    Rare,
    Unknown,
}

impl Rarity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mythic" => Some(Self::Mythic),
            "legendary" => Some(Self::Legendary),
            "epic" => Some(Self::Epic),
            "rare" => Some(Self::Rare),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillType {
    Active,
    Passive,
    Ultimate,
    Unknown,
}

impl SkillType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "passive" => Some(Self::Passive),
            "ultimate" => Some(Self::Ultimate),
            _ => None,
        }
    }
}

macro_rules! display_as_debug {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        })*
    };
}

display_as_debug!(Faction, Rarity, SkillType);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SkillType,
    pub description: String,
    pub tips: String,
}

/// Canonical hero record, keyed by `id` (the URL slug).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroEntity {
    pub id: String,
    pub game_id: String,
    pub name: String,
    pub faction: Faction,
    pub rarity: Rarity,
    pub role: String,
    pub image_path: String,
    pub gear_set: String,
    pub unique_weapon: String,
    pub positions: Vec<String>,
    pub skills: Vec<Skill>,
}

/// One hero link found on the listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub slug: String,
    pub url: String,
    pub link_text: String,
    pub faction: Faction,
}

/// Read a field as text; numbers are stringified, empty strings count as absent.
pub fn field_text(record: &RawRecord, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First present alternative among `keys`.
pub fn first_text(record: &RawRecord, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| field_text(record, k))
}
