//! Error taxonomy for the knowledge pipeline.
//!
//! Plumbing code uses `anyhow` throughout; at the boundaries where a
//! caller needs to decide what to do (fall back to a rebuild, show a
//! localized message, return a 422) failures are classified into a
//! [`KnowledgeError`].

use thiserror::Error;

use crate::pointbuy::PointBuyError;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// Source document missing or unreadable, or chunk embedding failed.
    /// Fatal to index construction; no partial index is left behind.
    #[error("ingestion failed: {0:#}")]
    Ingestion(anyhow::Error),

    /// Persisted index absent, corrupt, or built with a different
    /// configuration. Recoverable by rebuilding.
    #[error("cannot load index at {path}: {reason}")]
    Load { path: String, reason: String },

    /// Query embedding or similarity search failed.
    #[error("retrieval failed: {0:#}")]
    Retrieval(anyhow::Error),

    /// The text-generation call failed.
    #[error("generation failed: {0:#}")]
    Generation(anyhow::Error),

    /// Character input rejected before any knowledge-base work.
    #[error(transparent)]
    Validation(#[from] PointBuyError),
}

impl KnowledgeError {
    pub fn load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        KnowledgeError::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            KnowledgeError::Ingestion(_) => "ingestion_error",
            KnowledgeError::Load { .. } => "load_error",
            KnowledgeError::Retrieval(_) => "retrieval_error",
            KnowledgeError::Generation(_) => "generation_error",
            KnowledgeError::Validation(_) => "validation_error",
        }
    }

    /// Localized message for interactive surfaces.
    pub fn user_message(&self) -> String {
        match self {
            KnowledgeError::Ingestion(e) => {
                format!("Erro ao criar a base de conhecimento: {:#}", e)
            }
            KnowledgeError::Load { reason, .. } => {
                format!("Erro ao carregar a base de conhecimento: {}", reason)
            }
            KnowledgeError::Retrieval(e) | KnowledgeError::Generation(e) => {
                format!("Erro ao buscar informações: {:#}", e)
            }
            KnowledgeError::Validation(e) => e.user_message(),
        }
    }
}
