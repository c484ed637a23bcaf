//! Text generation and token counting seams.
//!
//! The knowledge query service and the character agents only need two
//! things from a language model: turn a prompt into text, and count the
//! tokens of a string with the model's tokenizer. Concrete backends live
//! in the app crate.

use anyhow::Result;
use async_trait::async_trait;

/// A text-generation model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;
    /// Generate a completion for a single user prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Counts tokens the way the generation model would.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Whitespace word count. Used when no model tokenizer is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_counter_counts_words() {
        assert_eq!(WordCounter.count("  Elfos   vivem\nmuito "), 3);
        assert_eq!(WordCounter.count(""), 0);
    }
}
