//! Character workshop agents.
//!
//! Three single-purpose agents sit on top of the [`KnowledgeBase`]:
//!
//! | Agent | Does |
//! |-------|------|
//! | [`CharacterCreationAgent`] | Rule lookups and character assembly via knowledge queries |
//! | [`StorytellingAgent`] | Origin story from the character sheet |
//! | [`IllustrationAgent`] | Prompt for an external image generator |
//!
//! [`CharacterWorkshop`] chains them. Point-buy is validated before any
//! of them runs, so an invalid sheet never costs a model call.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use lorekeeper_core::character::{Abilities, Character, Class, Race, DEFAULT_SEX};
use lorekeeper_core::error::KnowledgeError;
use lorekeeper_core::generation::TextGenerator;
use lorekeeper_core::pointbuy;
use lorekeeper_core::query::KnowledgeBase;

/// Keys of [`Character::features`] filled by [`CharacterCreationAgent::create_character`].
pub const FEATURE_CLASS: &str = "Classe";
pub const FEATURE_RACE: &str = "Raça";
pub const FEATURE_BACKGROUND: &str = "Antecedente";

/// Shown when a lookup is requested without choosing anything.
pub const SELECT_FIRST: &str = "Por favor, selecione uma opção primeiro.";

// ═══════════════════════════════════════════════════════════════════════
// Character creation
// ═══════════════════════════════════════════════════════════════════════

/// Input for building a character.
#[derive(Debug, Clone, Deserialize)]
pub struct CharacterRequest {
    pub name: String,
    #[serde(default = "default_sex")]
    pub sex: String,
    pub race: Race,
    pub class: Class,
    pub background: String,
    pub alignment: String,
    pub abilities: Abilities,
}

fn default_sex() -> String {
    DEFAULT_SEX.to_string()
}

/// Rule lookups against the handbook, plus character assembly.
#[derive(Clone)]
pub struct CharacterCreationAgent {
    kb: KnowledgeBase,
}

impl CharacterCreationAgent {
    pub fn new(kb: KnowledgeBase) -> Self {
        Self { kb }
    }

    async fn answer(&self, query: String) -> Result<String, KnowledgeError> {
        tracing::debug!(%query, "knowledge lookup");
        Ok(self.kb.query(&query).await?.answer)
    }

    pub async fn race_info(&self, race: &str) -> Result<String, KnowledgeError> {
        self.answer(format!("Descreva detalhadamente a raça {} em D&D 5e", race))
            .await
    }

    pub async fn class_info(&self, class: &str) -> Result<String, KnowledgeError> {
        self.answer(format!("Descreva detalhadamente a classe {} em D&D 5e", class))
            .await
    }

    pub async fn background_info(&self, background: &str) -> Result<String, KnowledgeError> {
        self.answer(format!(
            "Descreva detalhadamente o antecedente {} em D&D 5e",
            background
        ))
        .await
    }

    pub async fn alignment_info(&self, alignment: &str) -> Result<String, KnowledgeError> {
        self.answer(format!(
            "Descreva detalhadamente o alinhamento {} em D&D 5e",
            alignment
        ))
        .await
    }

    /// Free-form lookup. A blank concept returns [`SELECT_FIRST`] without
    /// querying.
    pub async fn concept_info(&self, concept: &str) -> Result<String, KnowledgeError> {
        let concept = concept.trim();
        if concept.is_empty() {
            return Ok(SELECT_FIRST.to_string());
        }
        self.answer(format!("Descreva detalhadamente {} em D&D 5e", concept))
            .await
    }

    /// Build the sheet and enrich its features with class, race and
    /// background lookups. Story, skills and equipment are left empty.
    pub async fn create_character(
        &self,
        req: &CharacterRequest,
    ) -> Result<Character, KnowledgeError> {
        let mut character = Character::new(
            &req.name,
            req.race,
            req.class,
            &req.background,
            &req.alignment,
            req.abilities,
        )
        .with_sex(&req.sex);

        let class_features = self
            .answer(format!(
                "Liste as características principais e equipamento inicial da classe {}",
                character.class
            ))
            .await?;
        character
            .features
            .insert(FEATURE_CLASS.to_string(), class_features);

        let race_features = self
            .answer(format!(
                "Liste os traços raciais e características da raça {}",
                character.race
            ))
            .await?;
        character
            .features
            .insert(FEATURE_RACE.to_string(), race_features);

        let background_features = self
            .answer(format!(
                "Liste as características e proficiências do antecedente {}",
                character.background
            ))
            .await?;
        character
            .features
            .insert(FEATURE_BACKGROUND.to_string(), background_features);

        Ok(character)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Story and illustration
// ═══════════════════════════════════════════════════════════════════════

pub struct StorytellingAgent {
    generator: Arc<dyn TextGenerator>,
}

impl StorytellingAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn prompt(character: &Character) -> String {
        format!(
            "Crie uma história de origem envolvente para este personagem de D&D:\n\n\
             Nome: {}\n\
             Raça: {}\n\
             Classe: {}\n\
             Antecedente: {}\n\n\
             A história deve:\n\
             1. Explicar como o personagem escolheu sua classe\n\
             2. Incorporar elementos do seu antecedente\n\
             3. Refletir seu alinhamento ({})\n\
             4. Mencionar eventos formativos\n",
            character.name,
            character.race,
            character.class,
            character.background,
            character.alignment
        )
    }

    pub async fn generate_story(&self, character: &Character) -> Result<String, KnowledgeError> {
        self.generator
            .generate(&Self::prompt(character))
            .await
            .map_err(KnowledgeError::Generation)
    }
}

pub struct IllustrationAgent {
    generator: Arc<dyn TextGenerator>,
}

impl IllustrationAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn prompt(character: &Character) -> String {
        format!(
            "Crie um prompt detalhado para gerar uma ilustração deste personagem:\n\n\
             Nome: {}\n\
             Raça: {}\n\
             Classe: {}\n\n\
             O prompt deve:\n\
             1. Descrever aparência física\n\
             2. Incluir vestimentas e equipamentos típicos da classe\n\
             3. Sugerir pose e expressão que reflitam personalidade\n\
             4. Especificar estilo artístico apropriado\n",
            character.name, character.race, character.class
        )
    }

    pub async fn generate_illustration_prompt(
        &self,
        character: &Character,
    ) -> Result<String, KnowledgeError> {
        self.generator
            .generate(&Self::prompt(character))
            .await
            .map_err(KnowledgeError::Generation)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Workshop
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct WorkshopResult {
    pub character: Character,
    pub story: String,
    pub illustration_prompt: String,
    pub points_spent: u32,
}

/// Validate → create → story → illustration prompt.
pub struct CharacterWorkshop {
    creator: CharacterCreationAgent,
    storyteller: StorytellingAgent,
    illustrator: IllustrationAgent,
}

impl CharacterWorkshop {
    pub fn new(kb: KnowledgeBase) -> Self {
        let generator = kb.generator().clone();
        Self {
            creator: CharacterCreationAgent::new(kb),
            storyteller: StorytellingAgent::new(generator.clone()),
            illustrator: IllustrationAgent::new(generator),
        }
    }

    pub fn creator(&self) -> &CharacterCreationAgent {
        &self.creator
    }

    pub async fn create(&self, req: &CharacterRequest) -> Result<WorkshopResult, KnowledgeError> {
        let points_spent = pointbuy::validate(&req.abilities)?;

        let mut character = self.creator.create_character(req).await?;
        let story = self.storyteller.generate_story(&character).await?;
        character.story = story.clone();
        let illustration_prompt = self
            .illustrator
            .generate_illustration_prompt(&character)
            .await?;

        tracing::info!(name = %character.name, points_spent, "character created");
        Ok(WorkshopResult {
            character,
            story,
            illustration_prompt,
            points_spent,
        })
    }
}

/// Markdown character sheet for terminal output.
pub fn render_sheet(character: &Character) -> String {
    let mut out = String::new();
    out.push_str(&format!("## 🎭 Personagem Criado: {}\n\n", character.name));

    out.push_str("### 📝 Detalhes Básicos\n");
    out.push_str(&format!("- **Raça:** {}\n", character.race));
    out.push_str(&format!("- **Classe:** {}\n", character.class));
    out.push_str(&format!("- **Antecedente:** {}\n", character.background));
    out.push_str(&format!("- **Alinhamento:** {}\n\n", character.alignment));

    out.push_str("### 💪 Atributos\n");
    for (name, score) in character.abilities.named() {
        out.push_str(&format!("- {}: {}\n", name, score));
    }

    out.push_str("\n### ⚔️ Características\n");
    for (key, value) in &character.features {
        out.push_str(&format!("- {}: {}\n", key, value));
    }

    out.push_str("\n### 🎒 Equipamento\n");
    for item in &character.equipment {
        out.push_str(&format!("- {}\n", item));
    }

    out.push_str("\n### 🎯 Perícias\n");
    for skill in &character.skills {
        out.push_str(&format!("- {}\n", skill));
    }

    out.push_str("\n### 📖 História\n");
    out.push_str(&character.story);
    out.push('\n');
    out
}
