//! The chapter map: which pages belong to which chapter, and which
//! keywords point a query at a chapter.
//!
//! A [`ChapterTable`] is built once at startup (either the built-in
//! Player's Handbook table or an override from the config file) and is
//! shared read-only afterwards. Declaration order matters in two places:
//! ingestion emits chunks chapter by chapter in table order, and the
//! router scans keyword groups in table order.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// A named chapter covering an inclusive, 1-based page range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub name: String,
    pub start: u32,
    pub end: u32,
}

impl Chapter {
    pub fn new(id: &str, name: &str, start: u32, end: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            start,
            end,
        }
    }

    /// Whether `page` falls inside `[start, end]`.
    pub fn contains_page(&self, page: u32) -> bool {
        self.start <= page && page <= self.end
    }
}

/// Lowercase keywords that route a query to one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub chapter_id: String,
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    pub fn new(chapter_id: &str, keywords: &[&str]) -> Self {
        Self {
            chapter_id: chapter_id.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Frozen chapter configuration: page ranges plus keyword routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterTable {
    chapters: Vec<Chapter>,
    keywords: Vec<KeywordGroup>,
}

impl ChapterTable {
    /// Build and validate a table.
    ///
    /// Keywords are lower-cased and trimmed. Rejects duplicate chapter
    /// ids or names, page 0, inverted ranges, and keyword groups naming an
    /// unknown chapter. Names must be unique because search filters on
    /// them.
    pub fn new(chapters: Vec<Chapter>, keywords: Vec<KeywordGroup>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut names = HashSet::new();
        for chapter in &chapters {
            if chapter.id.trim().is_empty() {
                bail!("chapter id must not be empty");
            }
            if !seen.insert(chapter.id.as_str()) {
                bail!("duplicate chapter id: '{}'", chapter.id);
            }
            if !names.insert(chapter.name.as_str()) {
                bail!("duplicate chapter name: '{}'", chapter.name);
            }
            if chapter.start == 0 {
                bail!("chapter '{}': pages are 1-based, start must be >= 1", chapter.id);
            }
            if chapter.start > chapter.end {
                bail!(
                    "chapter '{}': start page {} is after end page {}",
                    chapter.id,
                    chapter.start,
                    chapter.end
                );
            }
        }

        let mut normalized = Vec::with_capacity(keywords.len());
        for group in keywords {
            if !seen.contains(group.chapter_id.as_str()) {
                bail!(
                    "keyword group references unknown chapter: '{}'",
                    group.chapter_id
                );
            }
            let words: Vec<String> = group
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            normalized.push(KeywordGroup {
                chapter_id: group.chapter_id,
                keywords: words,
            });
        }

        Ok(Self {
            chapters,
            keywords: normalized,
        })
    }

    /// The Portuguese Player's Handbook (D&D 5e) chapter map.
    pub fn players_handbook() -> Self {
        let chapters = vec![
            Chapter::new("character_creation", "Criação de Personagens", 11, 16),
            Chapter::new("races", "Raças", 17, 43),
            Chapter::new("classes", "Classes", 45, 121),
            Chapter::new("personality", "Personalidades e Antecedentes", 123, 143),
            Chapter::new("equipment", "Equipamento", 145, 163),
            Chapter::new("customization", "Opções de Personalização", 165, 171),
            Chapter::new("abilities", "Utilizando Habilidades", 175, 181),
            Chapter::new("adventuring", "Aventurando-se", 183, 189),
            Chapter::new("combat", "Combate", 191, 200),
            Chapter::new("spellcasting", "Conjuração", 203, 207),
            Chapter::new("spells", "Magias", 209, 289),
        ];
        let keywords = vec![
            KeywordGroup::new(
                "races",
                &["raça", "elfo", "anão", "humano", "halfling", "draconato", "gnomo", "tiefling"],
            ),
            KeywordGroup::new(
                "classes",
                &[
                    "classe",
                    "bárbaro",
                    "bardo",
                    "bruxo",
                    "clérigo",
                    "druida",
                    "feiticeiro",
                    "guerreiro",
                    "ladino",
                    "mago",
                    "monge",
                    "paladino",
                    "patrulheiro",
                ],
            ),
            KeywordGroup::new(
                "personality",
                &["antecedente", "personalidade", "inspiração", "alinhamento"],
            ),
            KeywordGroup::new(
                "equipment",
                &["equipamento", "arma", "armadura", "item", "ferramenta"],
            ),
            KeywordGroup::new("spells", &["magia", "feitiço", "conjuração", "spell"]),
            KeywordGroup::new("abilities", &["habilidade", "perícia", "atributo"]),
            KeywordGroup::new("combat", &["combate", "luta", "ataque", "dano"]),
        ];
        // The built-in table is static and known to be valid.
        Self { chapters, keywords }
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn keyword_groups(&self) -> &[KeywordGroup] {
        &self.keywords
    }

    /// Look up a chapter by its identifier (e.g. `"races"`).
    pub fn get(&self, id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == id)
    }

    /// Look up a chapter by its display name (e.g. `"Raças"`).
    pub fn by_name(&self, name: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.name == name)
    }

    /// Resolve either an id or a display name, case-insensitively.
    pub fn resolve(&self, id_or_name: &str) -> Option<&Chapter> {
        let needle = id_or_name.trim().to_lowercase();
        self.chapters
            .iter()
            .find(|c| c.id.to_lowercase() == needle || c.name.to_lowercase() == needle)
    }

    /// Keywords declared for a chapter, empty if it has none.
    pub fn keywords_for(&self, chapter_id: &str) -> &[String] {
        self.keywords
            .iter()
            .find(|g| g.chapter_id == chapter_id)
            .map(|g| g.keywords.as_slice())
            .unwrap_or(&[])
    }

    /// SHA-256 over the canonical JSON form of the table.
    ///
    /// Stored alongside the persisted index so that a changed chapter map
    /// forces a full re-ingest instead of serving stale chapter tags.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        format!("{:x}", hasher.finalize())
    }
}

impl Default for ChapterTable {
    fn default() -> Self {
        Self::players_handbook()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn players_handbook_is_valid() {
        let phb = ChapterTable::players_handbook();
        let rebuilt = ChapterTable::new(
            phb.chapters().to_vec(),
            phb.keyword_groups().to_vec(),
        )
        .unwrap();
        assert_eq!(rebuilt, phb);
        assert_eq!(phb.chapters().len(), 11);
        assert_eq!(phb.keyword_groups().len(), 7);
    }

    #[test]
    fn contains_page_is_inclusive() {
        let races = Chapter::new("races", "Raças", 17, 43);
        assert!(races.contains_page(17));
        assert!(races.contains_page(43));
        assert!(!races.contains_page(16));
        assert!(!races.contains_page(44));
    }

    #[test]
    fn lookups_by_id_and_name() {
        let phb = ChapterTable::players_handbook();
        assert_eq!(phb.get("races").unwrap().name, "Raças");
        assert_eq!(phb.by_name("Magias").unwrap().id, "spells");
        assert_eq!(phb.resolve("COMBATE").unwrap().id, "combat");
        assert_eq!(phb.resolve("classes").unwrap().start, 45);
        assert!(phb.resolve("nope").is_none());
        assert!(phb.keywords_for("adventuring").is_empty());
        assert!(phb.keywords_for("races").contains(&"elfo".to_string()));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = ChapterTable::new(
            vec![Chapter::new("a", "A", 1, 2), Chapter::new("a", "B", 3, 4)],
            vec![],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = ChapterTable::new(
            vec![Chapter::new("a", "Magias", 1, 2), Chapter::new("b", "Magias", 3, 4)],
            vec![],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate chapter name"));
    }

    #[test]
    fn rejects_inverted_range_and_page_zero() {
        assert!(ChapterTable::new(vec![Chapter::new("a", "A", 5, 2)], vec![]).is_err());
        assert!(ChapterTable::new(vec![Chapter::new("a", "A", 0, 2)], vec![]).is_err());
    }

    #[test]
    fn rejects_keywords_for_unknown_chapter() {
        let err = ChapterTable::new(
            vec![Chapter::new("a", "A", 1, 2)],
            vec![KeywordGroup::new("b", &["x"])],
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown chapter"));
    }

    #[test]
    fn keywords_are_normalized() {
        let table = ChapterTable::new(
            vec![Chapter::new("a", "A", 1, 2)],
            vec![KeywordGroup::new("a", &["  Élfico ", "", "DANO"])],
        )
        .unwrap();
        assert_eq!(table.keywords_for("a"), &["élfico".to_string(), "dano".to_string()]);
    }

    #[test]
    fn fingerprint_tracks_changes() {
        let phb = ChapterTable::players_handbook();
        assert_eq!(phb.fingerprint(), ChapterTable::players_handbook().fingerprint());

        let mut chapters = phb.chapters().to_vec();
        chapters[0].end = 17;
        let changed = ChapterTable::new(chapters, phb.keyword_groups().to_vec()).unwrap();
        assert_ne!(phb.fingerprint(), changed.fingerprint());
    }
}
