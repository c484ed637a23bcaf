//! # Lorekeeper Core
//!
//! Shared, I/O-free logic for Lorekeeper: the chapter map, the keyword
//! chapter router, the layered text splitter, the store abstraction, the
//! similarity search, the knowledge query service, and the character
//! rules (schema and point-buy).
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem code. Concrete
//! embedding/generation providers and the persisted SQLite index live in
//! the `lorekeeper` app crate and plug in through the traits defined here.

pub mod chapters;
pub mod character;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod models;
pub mod pointbuy;
pub mod query;
pub mod router;
pub mod search;
pub mod store;
