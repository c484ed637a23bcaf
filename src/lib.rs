//! # Lorekeeper
//!
//! A chapter-aware rules assistant and character workshop for the
//! Portuguese D&D 5e Player's Handbook.
//!
//! The handbook PDF is split into chapter-tagged chunks, embedded, and
//! persisted in a single SQLite file. Each question is routed to the
//! chapter it is about by keyword, the nearest passages of that chapter
//! are retrieved, and a language model answers from them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Handbook │──▶│ Chunk + tag  │──▶│ SQLite index │
//! │   PDF    │   │   + embed    │   │ chunks + vec │
//! └──────────┘   └──────────────┘   └──────┬───────┘
//!                                          │
//!                   route → search → generate
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │  (lore)  │       │  (JSON)  │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! Pure logic (chapter map, router, splitter, search, point-buy) lives in
//! `lorekeeper-core`; this crate adds configuration, providers, the
//! persisted index, and the outer surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF / text page extraction |
//! | [`ingest`] | Document → chapter-tagged chunks |
//! | [`index`] | Build, load, and rebuild the persisted index |
//! | [`sqlite_store`] | SQLite implementation of the store trait |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Text-generation providers |
//! | [`agents`] | Character creation, story, illustration prompt |
//! | [`server`] | JSON HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema |

pub mod agents;
pub mod character_cmd;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod http;
pub mod index;
pub mod ingest;
pub mod knowledge;
pub mod migrate;
pub mod progress;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod tokens;
