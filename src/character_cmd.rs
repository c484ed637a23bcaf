//! CLI commands for the character workshop: `lore point-buy` and
//! `lore character`.

use anyhow::{anyhow, Result};

use lorekeeper_core::character::{Abilities, Class, Race, DEFAULT_SEX};
use lorekeeper_core::pointbuy::{self, POINT_BUY_BUDGET};

use crate::agents::{render_sheet, CharacterRequest, CharacterWorkshop};
use crate::config::Config;
use crate::knowledge;
use crate::progress::ProgressMode;

/// Summary line printed for a valid point-buy allocation.
pub fn format_spent(spent: u32) -> String {
    format!(
        "Pontos Gastos: {} | Pontos Restantes: {}",
        spent,
        POINT_BUY_BUDGET - spent
    )
}

pub fn run_point_buy(scores: &[u8]) -> Result<()> {
    let abilities = Abilities::from_slice(scores)?;
    let spent = pointbuy::validate(&abilities).map_err(|e| anyhow!(e.user_message()))?;

    for (name, score) in abilities.named() {
        println!("  {:<14} {:>2}", name, score);
    }
    println!();
    println!("{}", format_spent(spent));
    Ok(())
}

/// Arguments of `lore character`, already parsed by clap.
pub struct CharacterArgs {
    pub name: String,
    pub sex: Option<String>,
    pub race: Race,
    pub class: Class,
    pub background: String,
    pub alignment: String,
    pub scores: Abilities,
    pub json: bool,
}

impl CharacterArgs {
    fn to_request(&self) -> CharacterRequest {
        CharacterRequest {
            name: self.name.clone(),
            sex: self.sex.clone().unwrap_or_else(|| DEFAULT_SEX.to_string()),
            race: self.race,
            class: self.class,
            background: self.background.clone(),
            alignment: self.alignment.clone(),
            abilities: self.scores,
        }
    }
}

pub async fn run_character(config: &Config, args: CharacterArgs) -> Result<()> {
    let req = args.to_request();

    // Reject bad scores before touching the index or any provider.
    pointbuy::validate(&req.abilities).map_err(|e| anyhow!(e.user_message()))?;

    let kb = knowledge::open(config, ProgressMode::default_for_tty().reporter().as_ref()).await?;
    let workshop = CharacterWorkshop::new(kb);
    let result = workshop
        .create(&req)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print!("{}", render_sheet(&result.character));
    println!();
    println!("### 🎨 Prompt de Ilustração");
    println!("{}", result.illustration_prompt.trim());
    println!();
    println!("{}", format_spent(result.points_spent));
    Ok(())
}
