//! Embedding capability.
//!
//! The core never computes embeddings itself. Callers supply an [`Embedder`]
//! when creating a table; mutations that omit a vector use it to embed the
//! record's `text` payload field.

use crate::error::Result;

/// Text-to-vector capability supplied by the caller.
///
/// Object-safe so a table can hold `Arc<dyn Embedder>`. Implementations must
/// produce vectors of the table's dimension; the store validates the result
/// like any explicit vector.
pub trait Embedder: Send + Sync {
    /// Embed a text into a dense vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
