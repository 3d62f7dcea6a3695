//! Full-text search: tokenizer, inverted index, and BM25 ranking.
//!
//! A table carries at most one [`FullTextIndex`], auto-created when text
//! fields are configured. The indexed text of a record is the concatenation
//! of its configured text fields' string values, in field-list order.

/// Postings lists and document-length table.
pub mod inverted_index;
/// BM25 Okapi scoring.
pub mod scorer;
/// Pluggable tokenization; default lowercase/alphanumeric splitter.
pub mod tokenizer;

pub use inverted_index::InvertedIndex;
pub use scorer::bm25_search;
pub use tokenizer::{tokenize, DefaultTokenizer, Tokenizer, Tokens};

use std::sync::Arc;

use crate::record::{Payload, PayloadValue, RecordId};

/// Full-text index over a table's configured text fields.
///
/// Owns the inverted index and the tokenizer shared between indexing and
/// query paths.
pub struct FullTextIndex {
    fields: Vec<String>,
    tokenizer: Arc<dyn Tokenizer>,
    inverted: InvertedIndex,
}

impl std::fmt::Debug for FullTextIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FullTextIndex")
            .field("fields", &self.fields)
            .field("doc_count", &self.inverted.doc_count())
            .finish()
    }
}

impl FullTextIndex {
    /// Creates an index over `fields` with the default tokenizer.
    pub fn new(fields: Vec<String>) -> Self {
        Self::with_tokenizer(fields, Arc::new(DefaultTokenizer))
    }

    /// Creates an index over `fields` with a caller-supplied tokenizer.
    pub fn with_tokenizer(fields: Vec<String>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            fields,
            tokenizer,
            inverted: InvertedIndex::new(),
        }
    }

    /// The configured text field names.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Concatenated text of the configured fields, in field-list order.
    /// Non-string and missing fields contribute nothing.
    pub fn extract_text(&self, payload: &Payload) -> String {
        let mut text = String::new();
        for field in &self.fields {
            if let Some(PayloadValue::String(s)) = payload.get(field) {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(s);
            }
        }
        text
    }

    /// Indexes (or re-indexes) a record's payload.
    pub fn add(&mut self, id: RecordId, payload: &Payload) {
        let text = self.extract_text(payload);
        let tokens = self.tokenizer.tokenize(&text);
        self.inverted.add_document(id, &tokens);
    }

    /// Removes a record. No-op if absent.
    pub fn remove(&mut self, id: RecordId) {
        self.inverted.remove_document(id);
    }

    /// BM25 search over the index. Descending score, ties by ascending id.
    pub fn search(&self, query: &str, k: usize) -> Vec<(RecordId, f32)> {
        let tokens = self.tokenizer.tokenize(query);
        bm25_search(&self.inverted, &tokens, k)
    }

    /// Number of indexed documents.
    pub fn doc_count(&self) -> usize {
        self.inverted.doc_count()
    }
}
