//! # Lorekeeper CLI (`lore`)
//!
//! The `lore` binary answers rules questions from a Portuguese D&D 5e
//! Player's Handbook and runs the character workshop.
//!
//! ## Usage
//!
//! ```bash
//! lore --config ./config/lore.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lore chapters` | Print the chapter map and routing keywords |
//! | `lore route "<query>"` | Show which chapter a query is routed to |
//! | `lore index build` | Rebuild the persisted vector index |
//! | `lore index status` | Show index metadata and per-chapter chunk counts |
//! | `lore search "<query>"` | Similarity search without generation |
//! | `lore ask "<query>"` | Answer a question from the handbook |
//! | `lore info <concept>` | Describe a rules concept |
//! | `lore point-buy 8 8 8 8 8 15` | Check an ability score allocation |
//! | `lore character ...` | Create a character with story and illustration prompt |
//! | `lore serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! lore route "Quais são as magias de nível 1?"
//! lore index build --json-progress
//! lore ask "Como funciona a visão no escuro dos elfos?"
//! lore character --name Arwen --race Elfo --class Mago \
//!     --background Sábio --alignment "Neutro e Bom" --scores 8,14,13,15,12,10
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use lorekeeper::character_cmd::{self, CharacterArgs};
use lorekeeper::config::{self, Config};
use lorekeeper::index;
use lorekeeper::progress::ProgressMode;
use lorekeeper::{search, server, stats};
use lorekeeper_core::character::{Abilities, Class, Race};

/// Lorekeeper CLI: a chapter-aware rules assistant and character
/// workshop for the D&D 5e Player's Handbook.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lore.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lore",
    about = "Lorekeeper — a chapter-aware rules assistant and character workshop",
    version,
    long_about = "Lorekeeper splits the Player's Handbook into chapter-tagged chunks, \
    embeds them into a local SQLite index, routes each question to the chapter it is about, \
    and answers from that chapter's passages. It also validates point-buy scores and \
    generates characters with an origin story and an illustration prompt."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/lore.toml`. `chapters`, `route` and
    /// `point-buy` fall back to built-in defaults when it is missing.
    #[arg(long, global = true, default_value = "./config/lore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Print the chapter map and routing keywords.
    Chapters,

    /// Show which chapter a query would be scoped to.
    ///
    /// Prints the chapter name and the matched keyword, or
    /// "(sem filtro)" when the query searches every chapter.
    Route {
        /// The query text.
        query: String,
    },

    /// Manage the persisted vector index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Similarity search over the handbook, without generation.
    ///
    /// The query is routed to a chapter unless `--chapter` or
    /// `--no-route` is given.
    Search {
        /// The search query string.
        query: String,

        /// Restrict results to a chapter (id or name).
        #[arg(long)]
        chapter: Option<String>,

        /// Number of passages to return.
        #[arg(long)]
        k: Option<usize>,

        /// Search every chapter regardless of keywords.
        #[arg(long)]
        no_route: bool,
    },

    /// Answer a question from the handbook.
    ///
    /// Builds the index on first use. Prints the answer, the routed
    /// chapter, token usage and the passages used.
    Ask {
        /// The question.
        query: String,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Describe a rules concept in detail.
    Info {
        /// Concept to look up (e.g. "Ação Bônus").
        concept: String,
    },

    /// Check six ability scores against the 27-point budget.
    ///
    /// Scores are given in sheet order: Força, Destreza, Constituição,
    /// Inteligência, Sabedoria, Carisma. Exits non-zero when the
    /// allocation is invalid.
    PointBuy {
        #[arg(num_args = 6, required = true)]
        scores: Vec<u8>,
    },

    /// Create a character: rules lookups, origin story and
    /// illustration prompt.
    Character {
        #[arg(long)]
        name: String,

        #[arg(long)]
        sex: Option<String>,

        /// Race, e.g. `Elfo`, `Anão`, `meio-orc`.
        #[arg(long)]
        race: Race,

        /// Class, e.g. `Mago`, `Clérigo`, `guerreiro`.
        #[arg(long)]
        class: Class,

        #[arg(long)]
        background: String,

        #[arg(long)]
        alignment: String,

        /// Six comma-separated scores, e.g. `8,14,13,15,12,10`.
        #[arg(long)]
        scores: Abilities,

        /// Print the workshop result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the JSON HTTP server.
    Serve,
}

#[derive(Subcommand)]
enum IndexAction {
    /// Rebuild the index from the source document.
    Build {
        /// Emit progress as JSON lines on stderr.
        #[arg(long)]
        json_progress: bool,
    },

    /// Show index metadata and per-chapter chunk counts.
    Status,
}

/// Built-in defaults when no config file exists. A file that exists but
/// fails to load is still an error.
fn load_config_or_minimal(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Chapters => {
            let cfg = load_config_or_minimal(&cli.config)?;
            search::run_chapters(&cfg)?;
            return Ok(());
        }
        Commands::Route { query } => {
            let cfg = load_config_or_minimal(&cli.config)?;
            search::run_route(&cfg, query)?;
            return Ok(());
        }
        Commands::PointBuy { scores } => {
            character_cmd::run_point_buy(scores)?;
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index { action } => match action {
            IndexAction::Build { json_progress } => {
                let mode = if json_progress {
                    ProgressMode::Json
                } else {
                    ProgressMode::Human
                };
                index::run_build(&cfg, mode.reporter().as_ref()).await?;
            }
            IndexAction::Status => {
                stats::run_status(&cfg).await?;
            }
        },
        Commands::Search {
            query,
            chapter,
            k,
            no_route,
        } => {
            search::run_search(&cfg, &query, chapter, k, no_route).await?;
        }
        Commands::Ask { query, json } => {
            search::run_ask(&cfg, &query, json).await?;
        }
        Commands::Info { concept } => {
            search::run_info(&cfg, &concept).await?;
        }
        Commands::Character {
            name,
            sex,
            race,
            class,
            background,
            alignment,
            scores,
            json,
        } => {
            let args = CharacterArgs {
                name,
                sex,
                race,
                class,
                background,
                alignment,
                scores,
                json,
            };
            character_cmd::run_character(&cfg, args).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Chapters | Commands::Route { .. } | Commands::PointBuy { .. } => {
            // Handled above (before config loading)
        }
    }

    Ok(())
}
