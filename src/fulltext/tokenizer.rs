//! Tokenization for full-text indexing.
//!
//! The default tokenizer lowercases, splits on non-alphanumeric boundaries,
//! and drops empty tokens. No stemming, no stop-word removal. The
//! [`Tokenizer`] trait is the replacement seam for callers that want
//! different behavior; the index and the query path always share one
//! tokenizer instance.

/// Tokenized text: owns the lowercased buffer, provides `&str` slices via
/// byte spans. One heap allocation (the lowercased String) instead of N
/// per-token Strings.
pub struct Tokens {
    buffer: String,
    spans: Vec<(u32, u32)>, // (start, end) byte offsets into buffer
}

impl Tokens {
    /// Returns an iterator over the token `&str` slices.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.spans
            .iter()
            .map(|&(s, e)| &self.buffer[s as usize..e as usize])
    }

    /// Returns the number of tokens.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Returns `true` if there are no tokens.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// Text-to-tokens capability. Object-safe so the index can hold
/// `Arc<dyn Tokenizer>`.
pub trait Tokenizer: Send + Sync {
    /// Tokenize a text.
    fn tokenize(&self, text: &str) -> Tokens;
}

/// Default tokenizer: lowercase, split on Unicode non-alphanumeric
/// boundaries, drop empty tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTokenizer;

impl Tokenizer for DefaultTokenizer {
    fn tokenize(&self, text: &str) -> Tokens {
        tokenize(text)
    }
}

/// Tokenize with the default rules.
pub fn tokenize(text: &str) -> Tokens {
    let buffer = text.to_lowercase();
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in buffer.char_indices() {
        if c.is_alphanumeric() {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start {
            spans.push((s as u32, i as u32));
            start = None;
        }
    }
    // Handle last token (no trailing separator)
    if let Some(s) = start {
        spans.push((s as u32, buffer.len() as u32));
    }

    Tokens { buffer, spans }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_and_split() {
        let tokens = tokenize("The Quick-Brown_Fox!");
        let words: Vec<&str> = tokens.iter().collect();
        assert_eq!(words, vec!["the", "quick", "brown", "fox"]);
    }

    #[test]
    fn test_no_stop_word_removal() {
        let tokens = tokenize("the cat and the hat");
        let words: Vec<&str> = tokens.iter().collect();
        assert_eq!(words, vec!["the", "cat", "and", "the", "hat"]);
    }

    #[test]
    fn test_digits_kept() {
        let tokens = tokenize("error 404 page");
        let words: Vec<&str> = tokens.iter().collect();
        assert_eq!(words, vec!["error", "404", "page"]);
    }

    #[test]
    fn test_single_char_tokens_kept() {
        let tokens = tokenize("a b c");
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_empty_and_punctuation_only() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("... !!! ---").is_empty());
    }

    #[test]
    fn test_unicode_boundaries() {
        let tokens = tokenize("café–crème");
        let words: Vec<&str> = tokens.iter().collect();
        assert_eq!(words, vec!["café", "crème"]);
    }
}
