//! Inverted index for BM25 full-text search.
//!
//! Maps terms to postings lists (record id + term frequency) with a
//! per-document length table. After any successful mutation the postings
//! contain only live record ids; removal strips the record from every list.

use std::collections::HashMap;

use crate::fulltext::tokenizer::Tokens;
use crate::record::RecordId;

/// A single entry in a term's postings list.
#[derive(Debug, Clone)]
pub struct Posting {
    /// Record id of the document.
    pub record_id: RecordId,
    /// Number of times the term appears in the document.
    pub term_frequency: u32,
}

/// Inverted index mapping terms to postings lists.
///
/// Supports incremental addition and removal. Document lengths are tracked
/// for BM25 length normalization.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    /// term → list of postings
    pub(crate) postings: HashMap<String, Vec<Posting>>,
    /// record id → document length (token count)
    pub(crate) doc_lengths: HashMap<RecordId, u32>,
    /// Sum of all document lengths
    total_doc_length: u64,
}

impl InvertedIndex {
    /// Creates a new empty inverted index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a tokenized document. Re-adding an id replaces its previous
    /// entry.
    pub fn add_document(&mut self, id: RecordId, tokens: &Tokens) {
        if self.doc_lengths.contains_key(&id) {
            self.remove_document(id);
        }
        let doc_len = tokens.len() as u32;
        self.doc_lengths.insert(id, doc_len);
        self.total_doc_length += doc_len as u64;

        let mut tf_map: HashMap<&str, u32> = HashMap::new();
        for token in tokens.iter() {
            *tf_map.entry(token).or_insert(0) += 1;
        }

        for (term, tf) in tf_map {
            self.postings.entry(term.to_string()).or_default().push(Posting {
                record_id: id,
                term_frequency: tf,
            });
        }
    }

    /// Removes a document from the index. No-op if absent.
    pub fn remove_document(&mut self, id: RecordId) {
        if let Some(doc_len) = self.doc_lengths.remove(&id) {
            self.total_doc_length -= doc_len as u64;
            self.postings.retain(|_, postings| {
                postings.retain(|p| p.record_id != id);
                !postings.is_empty()
            });
        }
    }

    /// Number of indexed documents.
    pub fn doc_count(&self) -> usize {
        self.doc_lengths.len()
    }

    /// Average document length across indexed documents.
    pub fn average_doc_length(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            return 0.0;
        }
        self.total_doc_length as f32 / self.doc_lengths.len() as f32
    }

    /// True if no documents are indexed.
    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulltext::tokenizer::tokenize;

    #[test]
    fn test_add_document_updates_postings() {
        let mut idx = InvertedIndex::new();
        idx.add_document(1, &tokenize("the quick brown fox"));
        assert_eq!(idx.doc_count(), 1);
        assert!(idx.postings.contains_key("the"));
        assert!(idx.postings.contains_key("quick"));
        assert!(idx.postings.contains_key("fox"));
    }

    #[test]
    fn test_term_frequency() {
        let mut idx = InvertedIndex::new();
        idx.add_document(1, &tokenize("hello hello hello world"));
        let postings = idx.postings.get("hello").unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].term_frequency, 3);
    }

    #[test]
    fn test_readd_replaces_previous_entry() {
        let mut idx = InvertedIndex::new();
        idx.add_document(1, &tokenize("old text here"));
        idx.add_document(1, &tokenize("new words"));
        assert_eq!(idx.doc_count(), 1);
        assert!(!idx.postings.contains_key("old"));
        assert!(idx.postings.contains_key("new"));
        assert_eq!(idx.doc_lengths[&1], 2);
    }

    #[test]
    fn test_remove_strips_postings() {
        let mut idx = InvertedIndex::new();
        idx.add_document(1, &tokenize("hello world"));
        idx.add_document(2, &tokenize("hello rust"));
        idx.remove_document(1);
        assert_eq!(idx.doc_count(), 1);
        assert!(!idx.postings.contains_key("world"));
        let postings = idx.postings.get("hello").unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].record_id, 2);
    }

    #[test]
    fn test_remove_nonexistent_is_noop() {
        let mut idx = InvertedIndex::new();
        idx.add_document(1, &tokenize("hello world"));
        idx.remove_document(99);
        assert_eq!(idx.doc_count(), 1);
    }

    #[test]
    fn test_average_doc_length() {
        let mut idx = InvertedIndex::new();
        assert_eq!(idx.average_doc_length(), 0.0);
        idx.add_document(1, &tokenize("one two three"));
        idx.add_document(2, &tokenize("four five six seven eight"));
        assert!((idx.average_doc_length() - 4.0).abs() < 1e-6);
    }
}
