//! Character sheet schema.
//!
//! Races and classes serialize to their Portuguese display names
//! (`"Anão"`, `"Clérigo"`) and parse from either the display name or an
//! unaccented spelling (`"anao"`, `"meio_elfo"`), case-insensitively.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Fold a name for lenient matching: lowercase, strip Portuguese accents,
/// treat `_` and spaces as `-`.
fn fold(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' => 'a',
            'é' | 'ê' => 'e',
            'í' => 'i',
            'ó' | 'ô' | 'õ' => 'o',
            'ú' | 'ü' => 'u',
            'ç' => 'c',
            '_' | ' ' => '-',
            other => other,
        })
        .collect()
}

macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident, $what:literal { $($variant:ident => $display:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $display)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $display),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = fold(s);
                for candidate in Self::ALL {
                    if fold(candidate.as_str()) == wanted {
                        return Ok(*candidate);
                    }
                }
                let known: Vec<&str> = Self::ALL.iter().map(|c| c.as_str()).collect();
                bail!("unknown {} '{}'; expected one of: {}", $what, s, known.join(", "))
            }
        }
    };
}

named_enum!(
    /// Playable races.
    Race, "race" {
        Human => "Humano",
        Elf => "Elfo",
        Dwarf => "Anão",
        Orc => "Orc",
        Tiefling => "Tiefling",
        Halfling => "Halfling",
        Gnome => "Gnomo",
        Dragonborn => "Draconato",
        HalfElf => "Meio-Elfo",
        HalfOrc => "Meio-Orc",
    }
);

named_enum!(
    /// Character classes.
    Class, "class" {
        Barbarian => "Bárbaro",
        Bard => "Bardo",
        Warlock => "Bruxo",
        Cleric => "Clérigo",
        Druid => "Druida",
        Sorcerer => "Feiticeiro",
        Fighter => "Guerreiro",
        Rogue => "Ladino",
        Wizard => "Mago",
        Monk => "Monge",
        Paladin => "Paladino",
        Ranger => "Patrulheiro",
    }
);

/// Display names of the six abilities, in sheet order.
pub const ABILITY_NAMES: [&str; 6] = [
    "Força",
    "Destreza",
    "Constituição",
    "Inteligência",
    "Sabedoria",
    "Carisma",
];

/// The six base ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abilities {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl Abilities {
    pub fn new(
        strength: u8,
        dexterity: u8,
        constitution: u8,
        intelligence: u8,
        wisdom: u8,
        charisma: u8,
    ) -> Self {
        Self {
            strength,
            dexterity,
            constitution,
            intelligence,
            wisdom,
            charisma,
        }
    }

    /// Build from exactly six scores in sheet order.
    pub fn from_slice(scores: &[u8]) -> Result<Self> {
        match scores {
            [s, d, c, i, w, ch] => Ok(Self::new(*s, *d, *c, *i, *w, *ch)),
            _ => bail!("expected 6 ability scores, got {}", scores.len()),
        }
    }

    pub fn to_array(&self) -> [u8; 6] {
        [
            self.strength,
            self.dexterity,
            self.constitution,
            self.intelligence,
            self.wisdom,
            self.charisma,
        ]
    }

    /// Scores paired with their display names.
    pub fn named(&self) -> [(&'static str, u8); 6] {
        let scores = self.to_array();
        std::array::from_fn(|i| (ABILITY_NAMES[i], scores[i]))
    }
}

/// Parses `"8,8,8,8,8,15"`.
impl FromStr for Abilities {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut scores = Vec::with_capacity(6);
        for part in s.split(',') {
            let part = part.trim();
            match part.parse::<u8>() {
                Ok(v) => scores.push(v),
                Err(_) => bail!("invalid ability score '{}'", part),
            }
        }
        Self::from_slice(&scores)
    }
}

/// Player's Handbook backgrounds offered by the workshop. Free text is
/// also accepted; these are suggestions.
pub const BACKGROUNDS: [&str; 13] = [
    "Acólito",
    "Artesão",
    "Artista",
    "Charlatão",
    "Criminoso",
    "Eremita",
    "Forasteiro",
    "Herói do Povo",
    "Nobre",
    "Marinheiro",
    "Órfão",
    "Sábio",
    "Soldado",
];

/// The nine alignments.
pub const ALIGNMENTS: [&str; 9] = [
    "Leal e Bom",
    "Neutro e Bom",
    "Caótico e Bom",
    "Leal e Neutro",
    "Neutro",
    "Caótico e Neutro",
    "Leal e Mau",
    "Neutro e Mau",
    "Caótico e Mau",
];

pub const DEFAULT_SEX: &str = "Masculino";
pub const MAX_LEVEL: u8 = 20;

fn default_sex() -> String {
    DEFAULT_SEX.to_string()
}

fn default_level() -> u8 {
    1
}

/// A character sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(default = "default_sex")]
    pub sex: String,
    pub race: Race,
    pub class: Class,
    #[serde(default = "default_level")]
    pub level: u8,
    pub background: String,
    pub alignment: String,
    pub abilities: Abilities,
    #[serde(default)]
    pub story: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
    /// Free-form features keyed by source (class, race, background).
    #[serde(default)]
    pub features: BTreeMap<String, String>,
}

impl Character {
    pub fn new(
        name: &str,
        race: Race,
        class: Class,
        background: &str,
        alignment: &str,
        abilities: Abilities,
    ) -> Self {
        Self {
            name: name.to_string(),
            sex: default_sex(),
            race,
            class,
            level: default_level(),
            background: background.to_string(),
            alignment: alignment.to_string(),
            abilities,
            story: String::new(),
            skills: Vec::new(),
            equipment: Vec::new(),
            features: BTreeMap::new(),
        }
    }

    pub fn with_sex(mut self, sex: &str) -> Self {
        self.sex = sex.to_string();
        self
    }

    pub fn with_level(mut self, level: u8) -> Result<Self> {
        if !(1..=MAX_LEVEL).contains(&level) {
            bail!("level must be between 1 and {}, got {}", MAX_LEVEL, level);
        }
        self.level = level;
        Ok(self)
    }
}
