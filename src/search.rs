//! CLI commands for routing, retrieval, and question answering:
//! `lore chapters`, `lore route`, `lore search`, `lore ask`, `lore info`.

use anyhow::{bail, Result};

use lorekeeper_core::chapters::ChapterTable;
use lorekeeper_core::error::KnowledgeError;
use lorekeeper_core::models::ScoredChunk;
use lorekeeper_core::router;
use lorekeeper_core::search::SearchRequest;

use crate::agents::CharacterCreationAgent;
use crate::config::Config;
use crate::knowledge;
use crate::progress::ProgressMode;

/// Printed by `lore route` when no keyword matches.
pub const NO_FILTER: &str = "(sem filtro)";

const EXCERPT_CHARS: usize = 240;

pub fn run_chapters(config: &Config) -> Result<()> {
    let table = config.chapter_table();
    print!("{}", format_chapters(&table));
    Ok(())
}

fn format_chapters(table: &ChapterTable) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "  {:<20} {:<28} {:>5} {:>5}\n",
        "ID", "CHAPTER", "START", "END"
    ));
    out.push_str(&format!("  {}\n", "-".repeat(61)));
    for chapter in table.chapters() {
        out.push_str(&format!(
            "  {:<20} {:<28} {:>5} {:>5}\n",
            chapter.id, chapter.name, chapter.start, chapter.end
        ));
    }

    if !table.keyword_groups().is_empty() {
        out.push_str("\n  Routing keywords (first match wins):\n");
        for (i, group) in table.keyword_groups().iter().enumerate() {
            out.push_str(&format!(
                "  {}. {:<20} {}\n",
                i + 1,
                group.chapter_id,
                group.keywords.join(", ")
            ));
        }
    }
    out
}

pub fn run_route(config: &Config, query: &str) -> Result<()> {
    let table = config.chapter_table();
    match router::route_with_keyword(&table, query) {
        Some(decision) => println!(
            "{} (keyword: \"{}\")",
            decision.chapter.name, decision.keyword
        ),
        None => println!("{}", NO_FILTER),
    }
    Ok(())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    chapter: Option<String>,
    k: Option<usize>,
    no_route: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    if !config.embedding.is_enabled() {
        bail!("Search requires embeddings. Set [embedding] provider in config.");
    }

    let table = config.chapter_table();
    let filter = match chapter {
        Some(wanted) => match table.resolve(&wanted) {
            Some(c) => Some(c.name.clone()),
            None => bail!("Unknown chapter: '{}'. See `lore chapters`.", wanted),
        },
        None if no_route => None,
        None => router::route(&table, query).map(|c| c.name.clone()),
    };

    let kb = knowledge::open_existing(config).await?;
    let req = SearchRequest::new(query, k.unwrap_or(config.retrieval.k)).in_chapter(filter.as_deref());
    let results = kb.search(&req).await?;

    println!("chapter: {}", filter.as_deref().unwrap_or(NO_FILTER));
    println!();
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    print_sources(&results);
    Ok(())
}

fn print_sources(results: &[ScoredChunk]) {
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} / p. {}",
            i + 1,
            result.score,
            result.chunk.chapter,
            result.chunk.page
        );
        println!("    excerpt: \"{}\"", excerpt(&result.chunk.text));
        println!("    id: {}", result.chunk.id);
        println!();
    }
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    out.push_str("...");
    out
}

/// Present a knowledge failure the way interactive surfaces do.
fn localized(err: KnowledgeError) -> anyhow::Error {
    anyhow::anyhow!(err.user_message())
}

pub async fn run_ask(config: &Config, query: &str, json: bool) -> Result<()> {
    let kb = knowledge::open(config, ProgressMode::default_for_tty().reporter().as_ref()).await?;
    let result = kb.query(query).await.map_err(localized)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", result.answer.trim());
    println!();
    println!("chapter: {}", result.chapter.as_deref().unwrap_or(NO_FILTER));
    println!(
        "tokens: input {} · context {} · output {} · total {}",
        result.tokens.input, result.tokens.context, result.tokens.output, result.tokens.total
    );
    println!();
    print_sources(&result.sources);
    Ok(())
}

pub async fn run_info(config: &Config, concept: &str) -> Result<()> {
    let kb = knowledge::open(config, ProgressMode::default_for_tty().reporter().as_ref()).await?;
    let agent = CharacterCreationAgent::new(kb);
    let answer = agent.concept_info(concept).await.map_err(localized)?;
    println!("{}", answer.trim());
    Ok(())
}
