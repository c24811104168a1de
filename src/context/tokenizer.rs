use tiktoken_rs::{cl100k_base, CoreBPE};

use crate::error::{MemvraError, Result};

/// Token counting and truncation over a fixed BPE encoding.
///
/// Uses cl100k_base (GPT-4 era) for every provider so budget math is stable
/// across runs and platforms, even when the answering model tokenizes
/// slightly differently.
pub struct Tokenizer {
    bpe: CoreBPE,
}

impl Tokenizer {
    pub fn new() -> Result<Self> {
        let bpe = cl100k_base()
            .map_err(|e| MemvraError::Internal(format!("tokenizer: {e}")))?;
        Ok(Self { bpe })
    }

    /// Number of tokens in `text`. Empty input is 0 tokens.
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }

    /// Truncate `text` to at most `max_tokens` tokens.
    ///
    /// Text already within budget is returned byte-identical. Otherwise the
    /// decoded prefix of the token sequence is returned; if the cut lands
    /// mid-codepoint the boundary backs off until it decodes cleanly.
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }
        let mut end = max_tokens;
        while end > 0 {
            if let Ok(s) = self.bpe.decode(tokens[..end].to_vec()) {
                return s;
            }
            end -= 1;
        }
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero_tokens() {
        let t = Tokenizer::new().unwrap();
        assert_eq!(t.count(""), 0);
    }

    #[test]
    fn count_is_stable() {
        let t = Tokenizer::new().unwrap();
        let a = t.count("fn main() { println!(\"hello\"); }");
        let b = t.count("fn main() { println!(\"hello\"); }");
        assert_eq!(a, b);
        assert!(a > 0);
    }

    #[test]
    fn truncate_within_budget_is_identity() {
        let t = Tokenizer::new().unwrap();
        let s = "short string";
        let n = t.count(s);
        assert_eq!(t.truncate(s, n), s);
        assert_eq!(t.truncate(s, n + 100), s);
    }

    #[test]
    fn truncate_respects_budget_and_prefix() {
        let t = Tokenizer::new().unwrap();
        let s = "one two three four five six seven eight nine ten";
        let cut = t.truncate(s, 4);
        assert!(t.count(&cut) <= 4);
        assert!(s.starts_with(&cut));
    }
}
