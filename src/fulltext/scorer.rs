//! BM25 Okapi scoring.
//!
//! Scores documents against a query with `k1`/`b` from [`crate::config`]
//! and the Lucene IDF variant, which never goes negative. Documents with no
//! matching term are excluded.

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::config;
use crate::fulltext::inverted_index::InvertedIndex;
use crate::fulltext::tokenizer::Tokens;
use crate::record::RecordId;

/// BM25 scoring of a tokenized query against the inverted index.
///
/// Returns up to `k` (record id, score) pairs in descending score, ties
/// broken by ascending id.
pub fn bm25_search(index: &InvertedIndex, query_tokens: &Tokens, k: usize) -> Vec<(RecordId, f32)> {
    if query_tokens.is_empty() || index.is_empty() || k == 0 {
        return Vec::new();
    }

    let avgdl = index.average_doc_length();
    let n = index.doc_count() as f32;
    let k1 = config::BM25_K1;
    let b = config::BM25_B;

    let mut scores: HashMap<RecordId, f32> = HashMap::new();

    for token in query_tokens.iter() {
        if let Some(postings) = index.postings.get(token) {
            let df = postings.len() as f32;
            // IDF: log((N - df + 0.5) / (df + 0.5) + 1)
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for posting in postings {
                let dl = index
                    .doc_lengths
                    .get(&posting.record_id)
                    .copied()
                    .unwrap_or(0) as f32;
                let tf = posting.term_frequency as f32;

                let tf_norm = (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / avgdl));
                *scores.entry(posting.record_id).or_insert(0.0) += idf * tf_norm;
            }
        }
    }

    top_k_desc(scores, k)
}

/// Partial top-k by descending score, ascending id on ties, via a bounded
/// min-heap keyed on (score, reversed id).
pub(crate) fn top_k_desc(scores: HashMap<RecordId, f32>, k: usize) -> Vec<(RecordId, f32)> {
    let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, Reverse<RecordId>)>> =
        BinaryHeap::with_capacity(k + 1);
    for (id, score) in scores {
        heap.push(Reverse((OrderedFloat(score), Reverse(id))));
        if heap.len() > k {
            heap.pop();
        }
    }
    let mut results: Vec<(RecordId, f32)> = heap
        .into_iter()
        .map(|Reverse((s, Reverse(id)))| (id, s.0))
        .collect();
    results.sort_unstable_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    results
}
