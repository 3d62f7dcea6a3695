//! Query builder.
//!
//! A [`Query`] is an immutable description accumulated by chainable builder
//! calls; nothing executes until the value is handed to
//! [`Table::execute`](crate::storage::Table::execute). The execution order
//! is fixed regardless of the order the builder methods were called in:
//! candidate generation (index-backed when a ranking mode is set), residual
//! filtering, ranking/fusion, pagination, projection.

use std::sync::Arc;

use crate::record::{Payload, PayloadValue, Record, RecordId};

/// Opaque record predicate usable in [`Query::where_fn`].
pub type RecordPredicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Ranking mode of a query.
#[derive(Clone)]
pub(crate) enum RankingMode {
    Vector {
        query: Vec<f32>,
        k: usize,
    },
    Text {
        query: String,
        k: usize,
    },
    Hybrid {
        vector: Vec<f32>,
        text: String,
        weight: f32,
        k: usize,
    },
}

impl RankingMode {
    pub(crate) fn k(&self) -> usize {
        match self {
            RankingMode::Vector { k, .. }
            | RankingMode::Text { k, .. }
            | RankingMode::Hybrid { k, .. } => *k,
        }
    }
}

/// Immutable query description. Build with the chainable methods, execute
/// with [`Table::execute`](crate::storage::Table::execute).
#[derive(Clone, Default)]
pub struct Query {
    pub(crate) equality_filters: Vec<(String, PayloadValue)>,
    pub(crate) predicates: Vec<RecordPredicate>,
    pub(crate) mode: Option<RankingMode>,
    pub(crate) index_name: Option<String>,
    pub(crate) projection: Option<Vec<String>>,
    pub(crate) limit: Option<usize>,
    pub(crate) offset: usize,
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("equality_filters", &self.equality_filters)
            .field("predicates", &self.predicates.len())
            .field("index_name", &self.index_name)
            .field("projection", &self.projection)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

impl Query {
    /// Creates an empty query (no filters, no ranking: rows come back in
    /// ascending id order).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a conjunctive equality predicate on a payload field.
    pub fn filter(mut self, field: &str, value: impl Into<PayloadValue>) -> Self {
        self.equality_filters.push((field.to_string(), value.into()));
        self
    }

    /// Adds an opaque boolean predicate over the record.
    pub fn where_fn(mut self, pred: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Self {
        self.predicates.push(Arc::new(pred));
        self
    }

    /// Ranks by vector distance to `query` with candidate cap `k`.
    pub fn vector_search(mut self, query: Vec<f32>, k: usize) -> Self {
        self.mode = Some(RankingMode::Vector { query, k });
        self
    }

    /// Ranks by BM25 relevance to `query` with candidate cap `k`.
    pub fn text_search(mut self, query: &str, k: usize) -> Self {
        self.mode = Some(RankingMode::Text {
            query: query.to_string(),
            k,
        });
        self
    }

    /// Ranks by weighted fusion of vector and text relevance.
    pub fn hybrid(mut self, vector: Vec<f32>, text: &str, weight: f32, k: usize) -> Self {
        self.mode = Some(RankingMode::Hybrid {
            vector,
            text: text.to_string(),
            weight,
            k,
        });
        self
    }

    /// Selects the named vector index instead of `default`.
    pub fn use_index(mut self, name: &str) -> Self {
        self.index_name = Some(name.to_string());
        self
    }

    /// Restricts returned payload fields. The record id is always present.
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.projection = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Caps the number of returned rows (applied after ranking).
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Skips the first `m` rows (applied after ranking, before limit).
    pub fn offset(mut self, m: usize) -> Self {
        self.offset = m;
        self
    }
}

/// One result row: id, optional ranking score, projected payload.
///
/// Score semantics depend on the ranking mode: metric distance for vector
/// queries (lower is better), BM25 for text queries (higher is better),
/// fused similarity for hybrid queries (higher is better). Mode-less
/// queries carry no score.
#[derive(Debug, Clone)]
pub struct QueryRow {
    /// Record id; always present regardless of projection.
    pub id: RecordId,
    /// Ranking score, `None` for mode-less queries.
    pub score: Option<f32>,
    /// Projected payload (full payload when no projection is set).
    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates() {
        let q = Query::new()
            .filter("category", "a")
            .vector_search(vec![1.0, 0.0], 5)
            .select(&["category"])
            .offset(2)
            .limit(3);
        assert_eq!(q.equality_filters.len(), 1);
        assert!(q.mode.is_some());
        assert_eq!(q.offset, 2);
        assert_eq!(q.limit, Some(3));
        assert_eq!(q.projection.as_deref(), Some(&["category".to_string()][..]));
    }

    #[test]
    fn test_builder_is_plain_value() {
        let base = Query::new().filter("x", 1i64);
        let a = base.clone().limit(1);
        let b = base.limit(2);
        assert_eq!(a.limit, Some(1));
        assert_eq!(b.limit, Some(2));
    }
}
