//! Token counting with the generation model's BPE.

use std::sync::Arc;
use tiktoken_rs::CoreBPE;

use lorekeeper_core::generation::{TokenCounter, WordCounter};

/// Counts tokens with the tiktoken encoding of a model.
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    /// Pick the encoding for `model`, falling back to `o200k_base` for
    /// models tiktoken does not know (Ollama models, new releases).
    pub fn for_model(model: &str) -> anyhow::Result<Self> {
        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(_) => {
                tracing::debug!(model, "no tokenizer for model, using o200k_base");
                tiktoken_rs::o200k_base()?
            }
        };
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Tokenizer for `model`, or a word counter if no BPE can be loaded.
pub fn counter_for(model: &str) -> Arc<dyn TokenCounter> {
    match TiktokenCounter::for_model(model) {
        Ok(counter) => Arc::new(counter),
        Err(e) => {
            tracing::warn!(model, error = %e, "tokenizer unavailable, counting words");
            Arc::new(WordCounter)
        }
    }
}
