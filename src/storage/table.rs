//! Record store and table.
//!
//! [`Table`] is the public handle: a `parking_lot::RwLock` around
//! [`TableState`] gives single-writer/many-reader semantics at table
//! granularity. A read that begins after a write returned sees all of that
//! write's index effects; a query holds one read guard for its whole
//! execution and therefore one consistent snapshot.
//!
//! Every mutation runs as validate → stage → propagate to all indexes →
//! roll back on any index failure, so index membership always mirrors the
//! record store.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::config;
use crate::distance::DistanceMetric;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::fulltext::FullTextIndex;
use crate::index::{ScalarIndex, VectorIndex, VectorIndexSpec, VectorSource};
use crate::query::{Query, QueryRow, RankingMode};
use crate::record::{Payload, PayloadValue, Record, RecordId, Schema};
use crate::search::filter::matches_equality;
use crate::search::hybrid::fuse;

/// Construction parameters for a table.
pub struct TableConfig {
    /// Embedding dimension D; every vector must have exactly this length.
    pub dimension: usize,
    /// Default distance metric, used by the `default` brute-force index.
    pub metric: DistanceMetric,
    /// Payload fields indexed for full text. Non-empty auto-creates the
    /// full-text index.
    pub text_fields: Vec<String>,
    /// Optional strict payload schema.
    pub schema: Option<Schema>,
    /// Optional embedding capability for mutations that omit a vector.
    pub embedder: Option<Arc<dyn Embedder>>,
}

impl std::fmt::Debug for TableConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableConfig")
            .field("dimension", &self.dimension)
            .field("metric", &self.metric)
            .field("text_fields", &self.text_fields)
            .field("schema", &self.schema)
            .field("embedder", &self.embedder.is_some())
            .finish()
    }
}

impl TableConfig {
    /// Minimal config: dimension and metric, no text fields, no schema.
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            text_fields: Vec::new(),
            schema: None,
            embedder: None,
        }
    }

    /// Configures full-text fields.
    pub fn text_fields(mut self, fields: &[&str]) -> Self {
        self.text_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Attaches a strict payload schema.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Attaches an embedding capability.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }
}

/// Ground-truth record storage with monotonic id allocation.
///
/// Ids are never reused: deletes leave gaps and `next_id` only grows.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: BTreeMap<RecordId, Record>,
    next_id: RecordId,
}

impl RecordStore {
    fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    fn insert(&mut self, record: Record) {
        let id = record.id;
        self.records.insert(id, record);
        if id >= self.next_id {
            self.next_id = id + 1;
        }
    }

    fn remove(&mut self, id: RecordId) -> Option<Record> {
        self.records.remove(&id)
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn iter(&self) -> impl Iterator<Item = (&RecordId, &Record)> {
        self.records.iter()
    }
}

impl VectorSource for RecordStore {
    fn vector(&self, id: RecordId) -> Option<&[f32]> {
        self.records.get(&id).map(|r| r.vector.as_slice())
    }

    fn live_vectors(&self) -> Box<dyn Iterator<Item = (RecordId, &[f32])> + '_> {
        Box::new(self.records.iter().map(|(id, r)| (*id, r.vector.as_slice())))
    }

    fn live_len(&self) -> usize {
        self.records.len()
    }
}

/// All table-internal state, guarded by the table lock.
pub(crate) struct TableState {
    dimension: usize,
    metric: DistanceMetric,
    schema: Option<Schema>,
    embedder: Option<Arc<dyn Embedder>>,
    store: RecordStore,
    vector_indexes: BTreeMap<String, VectorIndex>,
    scalar_indexes: BTreeMap<String, ScalarIndex>,
    fulltext: Option<FullTextIndex>,
}

impl TableState {
    fn new(config: TableConfig) -> Result<Self> {
        if config.dimension == 0 || config.dimension > config::MAX_DIMENSION {
            return Err(Error::InvalidParameter(format!(
                "dimension must be in 1..={}, got {}",
                config::MAX_DIMENSION,
                config.dimension
            )));
        }
        let mut vector_indexes = BTreeMap::new();
        let default = VectorIndex::new(
            VectorIndexSpec::BruteForce,
            config.metric,
            config.dimension,
        )?;
        vector_indexes.insert(config::DEFAULT_INDEX_NAME.to_string(), default);
        let fulltext = if config.text_fields.is_empty() {
            None
        } else {
            Some(FullTextIndex::new(config.text_fields))
        };
        Ok(Self {
            dimension: config.dimension,
            metric: config.metric,
            schema: config.schema,
            embedder: config.embedder,
            store: RecordStore::default(),
            vector_indexes,
            scalar_indexes: BTreeMap::new(),
            fulltext,
        })
    }

    // ── validation ───────────────────────────────────────────────────

    fn validate_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::NumericDomain);
        }
        Ok(())
    }

    fn normalize_payload(&self, payload: Payload) -> Result<Payload> {
        match &self.schema {
            Some(schema) => schema.normalize(payload),
            None => Ok(payload),
        }
    }

    /// Explicit vector, or auto-embedding from the `text` payload field.
    fn resolve_vector(&self, payload: &Payload, explicit: Option<Vec<f32>>) -> Result<Vec<f32>> {
        if let Some(vector) = explicit {
            return Ok(vector);
        }
        let Some(PayloadValue::String(text)) = payload.get(config::AUTO_EMBED_FIELD) else {
            return Err(Error::EmbeddingMissing);
        };
        if text.is_empty() {
            return Err(Error::EmbeddingMissing);
        }
        let embedder = self.embedder.as_ref().ok_or(Error::EmbeddingMissing)?;
        embedder.embed(text)
    }

    // ── index propagation ────────────────────────────────────────────

    /// Enters a record into every index. On any failure the already-applied
    /// entries are removed before the error returns, leaving all indexes as
    /// they were.
    fn index_record(&mut self, record: &Record) -> Result<()> {
        for index in self.vector_indexes.values_mut() {
            index.insert(record.id, &record.vector);
        }
        let fields: Vec<String> = self.scalar_indexes.keys().cloned().collect();
        let mut applied: Vec<String> = Vec::new();
        for field in fields {
            let Some(value) = record.payload.get(&field).cloned() else {
                continue;
            };
            let outcome = match self.scalar_indexes.get_mut(&field) {
                Some(index) => index.insert(record.id, &value),
                None => Ok(()),
            };
            if let Err(e) = outcome {
                for done in &applied {
                    if let (Some(index), Some(v)) =
                        (self.scalar_indexes.get_mut(done), record.payload.get(done))
                    {
                        index.remove(record.id, v);
                    }
                }
                for index in self.vector_indexes.values_mut() {
                    index.remove(record.id);
                }
                return Err(e);
            }
            applied.push(field);
        }
        if let Some(fulltext) = &mut self.fulltext {
            fulltext.add(record.id, &record.payload);
        }
        Ok(())
    }

    /// Removes a record from every index. Infallible.
    fn deindex_record(&mut self, record: &Record) {
        for index in self.vector_indexes.values_mut() {
            index.remove(record.id);
        }
        for (field, index) in self.scalar_indexes.iter_mut() {
            if let Some(value) = record.payload.get(field) {
                index.remove(record.id, value);
            }
        }
        if let Some(fulltext) = &mut self.fulltext {
            fulltext.remove(record.id);
        }
    }

    /// Rebuilds any index whose tombstone or growth threshold tripped.
    fn maybe_rebuild(&mut self) {
        let store = &self.store;
        for (name, index) in self.vector_indexes.iter_mut() {
            if index.needs_rebuild() {
                debug!(index = %name, live = store.live_len(), "threshold rebuild");
                index.rebuild(store);
            }
        }
    }

    // ── mutations ────────────────────────────────────────────────────

    fn add(&mut self, payload: Payload, vector: Option<Vec<f32>>) -> Result<RecordId> {
        let payload = self.normalize_payload(payload)?;
        let vector = self.resolve_vector(&payload, vector)?;
        self.validate_vector(&vector)?;
        let id = self.store.next_id;
        let record = Record { id, vector, payload };
        self.index_record(&record)?;
        self.store.insert(record);
        self.maybe_rebuild();
        Ok(id)
    }

    fn delete(&mut self, id: RecordId) -> Result<()> {
        let record = self.store.remove(id).ok_or(Error::UnknownId(id))?;
        self.deindex_record(&record);
        self.maybe_rebuild();
        Ok(())
    }

    fn update(&mut self, id: RecordId, payload: Payload, vector: Option<Vec<f32>>) -> Result<()> {
        let old = self.store.get(id).cloned().ok_or(Error::UnknownId(id))?;
        let payload = self.normalize_payload(payload)?;
        let vector = match vector {
            Some(v) => v,
            // re-embed when the text changed under auto-embedding,
            // otherwise keep the stored vector
            None => match (&self.embedder, payload.get(config::AUTO_EMBED_FIELD)) {
                (Some(_), Some(PayloadValue::String(text)))
                    if !text.is_empty()
                        && old.payload.get(config::AUTO_EMBED_FIELD).map_or(
                            true,
                            |o| !o.loose_eq(&PayloadValue::String(text.clone())),
                        ) =>
                {
                    self.resolve_vector(&payload, None)?
                }
                _ => old.vector.clone(),
            },
        };
        self.validate_vector(&vector)?;
        let new = Record { id, vector, payload };
        self.replace_record(old, new)
    }

    fn merge(&mut self, id: RecordId, partial: Payload) -> Result<()> {
        let old = self.store.get(id).cloned().ok_or(Error::UnknownId(id))?;
        let mut payload = old.payload.clone();
        for (field, value) in partial {
            payload.insert(field, value);
        }
        let payload = self.normalize_payload(payload)?;
        // merge never touches the vector
        let new = Record {
            id,
            vector: old.vector.clone(),
            payload,
        };
        self.replace_record(old, new)
    }

    fn upsert(&mut self, id: RecordId, payload: Payload, vector: Option<Vec<f32>>) -> Result<()> {
        if self.store.get(id).is_some() {
            return self.update(id, payload, vector);
        }
        let payload = self.normalize_payload(payload)?;
        let vector = self.resolve_vector(&payload, vector)?;
        self.validate_vector(&vector)?;
        let record = Record { id, vector, payload };
        self.index_record(&record)?;
        self.store.insert(record);
        self.maybe_rebuild();
        Ok(())
    }

    /// Delete+insert across all indexes, restoring the old record if the
    /// new one cannot be indexed.
    fn replace_record(&mut self, old: Record, new: Record) -> Result<()> {
        self.deindex_record(&old);
        if let Err(e) = self.index_record(&new) {
            // the old entries were indexed moments ago, so restoring them
            // cannot hit a class conflict
            self.index_record(&old)?;
            return Err(e);
        }
        self.store.insert(new);
        self.maybe_rebuild();
        Ok(())
    }

    // ── index management ─────────────────────────────────────────────

    fn create_vector_index(
        &mut self,
        name: &str,
        spec: VectorIndexSpec,
        metric: DistanceMetric,
    ) -> Result<()> {
        if self.vector_indexes.contains_key(name) {
            return Err(Error::DuplicateIndex(name.to_string()));
        }
        let mut index = VectorIndex::new(spec, metric, self.dimension)?;
        index.rebuild(&self.store);
        self.vector_indexes.insert(name.to_string(), index);
        Ok(())
    }

    fn drop_vector_index(&mut self, name: &str) -> Result<()> {
        if name == config::DEFAULT_INDEX_NAME {
            return Err(Error::InvalidParameter(
                "the default index cannot be dropped".into(),
            ));
        }
        self.vector_indexes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::UnknownIndex(name.to_string()))
    }

    fn create_btree_index(&mut self, field: &str) -> Result<()> {
        if self.scalar_indexes.contains_key(field) {
            return Err(Error::DuplicateIndex(field.to_string()));
        }
        let mut index = ScalarIndex::new();
        for (id, record) in self.store.iter() {
            if let Some(value) = record.payload.get(field) {
                // a mixed-class payload fails creation; the partial index
                // is simply dropped
                index.insert(*id, value)?;
            }
        }
        self.scalar_indexes.insert(field.to_string(), index);
        Ok(())
    }

    fn create_fulltext_index(&mut self, fields: &[&str]) -> Result<()> {
        if fields.is_empty() {
            return Err(Error::InvalidParameter(
                "fulltext index needs at least one field".into(),
            ));
        }
        let mut index = FullTextIndex::new(fields.iter().map(|f| f.to_string()).collect());
        for (id, record) in self.store.iter() {
            index.add(*id, &record.payload);
        }
        self.fulltext = Some(index);
        Ok(())
    }

    // ── query execution ──────────────────────────────────────────────

    /// Pure function of (query value, table snapshot): candidate
    /// generation, residual filtering, ranking, pagination, projection,
    /// in that order, regardless of builder call order.
    fn execute(&self, query: &Query) -> Result<Vec<QueryRow>> {
        self.validate_query(query)?;

        let has_filters = !query.equality_filters.is_empty() || !query.predicates.is_empty();
        // equality filters on B-tree-indexed fields resolve through the
        // index; everything else falls back to payload checks
        let allowed = self.scalar_prefilter(&query.equality_filters);
        let residual = |record: &Record| -> bool {
            matches_equality(&record.payload, &query.equality_filters)
                && query.predicates.iter().all(|pred| pred(record))
        };
        let id_pred = |id: RecordId| {
            allowed.as_ref().map_or(true, |ids| ids.contains(&id))
                && self.store.get(id).is_some_and(&residual)
        };

        let Some(mode) = &query.mode else {
            // mode-less: full live set in ascending id order, narrowed to
            // the scalar-index intersection when one applies
            let ids: Vec<RecordId> = match &allowed {
                Some(allowed) => allowed
                    .iter()
                    .copied()
                    .filter(|id| self.store.get(*id).is_some_and(&residual))
                    .collect(),
                None => self
                    .store
                    .iter()
                    .filter(|(_, record)| residual(record))
                    .map(|(id, _)| *id)
                    .collect(),
            };
            let page = paginate(ids, query.offset, query.limit);
            return Ok(page
                .into_iter()
                .map(|id| self.project_row(id, None, query))
                .collect());
        };

        let k = mode.k();
        let k_eff = k.max(query.offset.saturating_add(query.limit.unwrap_or(k)));
        let pred: Option<&dyn Fn(RecordId) -> bool> =
            if has_filters { Some(&id_pred) } else { None };

        let hits: Vec<(RecordId, f32)> = match mode {
            RankingMode::Vector { query: q_vec, .. } => {
                let index = self.resolve_vector_index(query)?;
                index.search(&self.store, q_vec, k_eff, pred)
            }
            RankingMode::Text { query: q_text, .. } => {
                self.text_hits(q_text, k_eff, has_filters, &id_pred)?
            }
            RankingMode::Hybrid {
                vector: q_vec,
                text: q_text,
                weight,
                ..
            } => {
                // vector and text passes run independently and fuse;
                // a vector ordering is never reused for the text side
                let index = self.resolve_vector_index(query)?;
                let vector_hits = index.search(&self.store, q_vec, k_eff, pred);
                let text_hits = self.text_hits(q_text, k_eff, has_filters, &id_pred)?;
                fuse(&vector_hits, index.metric(), &text_hits, *weight, k_eff)
            }
        };

        let page = paginate(hits, query.offset, query.limit);
        Ok(page
            .into_iter()
            .map(|(id, score)| self.project_row(id, Some(score), query))
            .collect())
    }

    fn validate_query(&self, query: &Query) -> Result<()> {
        if let Some(mode) = &query.mode {
            if mode.k() == 0 {
                return Err(Error::InvalidParameter("k must be > 0".into()));
            }
            match mode {
                RankingMode::Vector { query: q, .. } => self.validate_vector(q)?,
                RankingMode::Text { query: q, .. } => {
                    if q.trim().is_empty() {
                        return Err(Error::InvalidParameter("empty text query".into()));
                    }
                }
                RankingMode::Hybrid {
                    vector, text, weight, ..
                } => {
                    self.validate_vector(vector)?;
                    if text.trim().is_empty() {
                        return Err(Error::InvalidParameter("empty text query".into()));
                    }
                    if !(0.0..=1.0).contains(weight) {
                        return Err(Error::InvalidParameter(format!(
                            "hybrid weight must be in [0, 1], got {weight}"
                        )));
                    }
                }
            }
        }
        if query.index_name.is_some()
            && !matches!(
                query.mode,
                Some(RankingMode::Vector { .. }) | Some(RankingMode::Hybrid { .. })
            )
        {
            return Err(Error::IncompatibleIndex(
                "use_index requires a vector or hybrid ranking".into(),
            ));
        }
        Ok(())
    }

    /// Intersection of B-tree lookups for the equality filters whose field
    /// has a scalar index. `None` when no filter is index-backed.
    fn scalar_prefilter(
        &self,
        filters: &[(String, PayloadValue)],
    ) -> Option<std::collections::BTreeSet<RecordId>> {
        let mut allowed: Option<std::collections::BTreeSet<RecordId>> = None;
        for (field, value) in filters {
            let Some(index) = self.scalar_indexes.get(field) else {
                continue;
            };
            let ids: std::collections::BTreeSet<RecordId> = index.eq(value).into_iter().collect();
            allowed = Some(match allowed {
                None => ids,
                Some(prev) => prev.intersection(&ids).copied().collect(),
            });
        }
        allowed
    }

    fn resolve_vector_index(&self, query: &Query) -> Result<&VectorIndex> {
        let name = query
            .index_name
            .as_deref()
            .unwrap_or(config::DEFAULT_INDEX_NAME);
        self.vector_indexes
            .get(name)
            .ok_or_else(|| Error::UnknownIndex(name.to_string()))
    }

    /// BM25 pass. With filters present the whole ranking is computed and
    /// post-filtered so the page stays exact.
    fn text_hits(
        &self,
        q_text: &str,
        k_eff: usize,
        has_filters: bool,
        id_pred: &dyn Fn(RecordId) -> bool,
    ) -> Result<Vec<(RecordId, f32)>> {
        let fulltext = self.fulltext.as_ref().ok_or_else(|| {
            Error::InvalidParameter("text search requires configured text fields".into())
        })?;
        if !has_filters {
            return Ok(fulltext.search(q_text, k_eff));
        }
        let mut hits = fulltext.search(q_text, fulltext.doc_count());
        hits.retain(|(id, _)| id_pred(*id));
        hits.truncate(k_eff);
        Ok(hits)
    }

    fn project_row(&self, id: RecordId, score: Option<f32>, query: &Query) -> QueryRow {
        let payload = self
            .store
            .get(id)
            .map(|record| match &query.projection {
                None => record.payload.clone(),
                Some(fields) => fields
                    .iter()
                    .filter_map(|f| record.payload.get(f).map(|v| (f.clone(), v.clone())))
                    .collect(),
            })
            .unwrap_or_default();
        QueryRow { id, score, payload }
    }
}

fn paginate<T>(items: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    items
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// A thread-safe table handle. Cloning produces a new handle to the same
/// shared state.
#[derive(Clone)]
pub struct Table {
    state: Arc<RwLock<TableState>>,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table").finish_non_exhaustive()
    }
}

impl Table {
    /// Creates an empty table. The `default` brute-force index with the
    /// table metric always exists; configuring text fields auto-creates the
    /// full-text index.
    pub fn new(config: TableConfig) -> Result<Self> {
        Ok(Self {
            state: Arc::new(RwLock::new(TableState::new(config)?)),
        })
    }

    /// Inserts a record; omitting the vector auto-embeds the `text` payload
    /// field. Returns the allocated id.
    pub fn add(&self, payload: Payload, vector: Option<Vec<f32>>) -> Result<RecordId> {
        self.state.write().add(payload, vector)
    }

    /// Replaces a record's payload and vector. Omitting the vector
    /// re-embeds when the text changed, otherwise keeps the stored vector.
    pub fn update(&self, id: RecordId, payload: Payload, vector: Option<Vec<f32>>) -> Result<()> {
        self.state.write().update(id, payload, vector)
    }

    /// Updates only the provided payload fields; never touches the vector.
    pub fn merge(&self, id: RecordId, partial: Payload) -> Result<()> {
        self.state.write().merge(id, partial)
    }

    /// Inserts at `id` when absent, otherwise behaves like `update`.
    pub fn upsert(&self, id: RecordId, payload: Payload, vector: Option<Vec<f32>>) -> Result<()> {
        self.state.write().upsert(id, payload, vector)
    }

    /// Deletes a record from the store and every index.
    pub fn delete(&self, id: RecordId) -> Result<()> {
        self.state.write().delete(id)
    }

    /// Fetches a record by id.
    pub fn get(&self, id: RecordId) -> Option<Record> {
        self.state.read().store.get(id).cloned()
    }

    /// The table's embedding dimension D.
    pub fn dimension(&self) -> usize {
        self.state.read().dimension
    }

    /// The table's default distance metric.
    pub fn metric(&self) -> DistanceMetric {
        self.state.read().metric
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.state.read().store.len()
    }

    /// True if the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a named vector index and backfills it from current records.
    pub fn create_vector_index(
        &self,
        name: &str,
        spec: VectorIndexSpec,
        metric: DistanceMetric,
    ) -> Result<()> {
        self.state.write().create_vector_index(name, spec, metric)
    }

    /// Drops a named vector index. The `default` index cannot be dropped.
    pub fn drop_vector_index(&self, name: &str) -> Result<()> {
        self.state.write().drop_vector_index(name)
    }

    /// Creates a scalar B-tree index over a payload field.
    pub fn create_btree_index(&self, field: &str) -> Result<()> {
        self.state.write().create_btree_index(field)
    }

    /// Creates (or replaces) the full-text index over the given fields and
    /// re-indexes every record.
    pub fn create_fulltext_index(&self, fields: &[&str]) -> Result<()> {
        self.state.write().create_fulltext_index(fields)
    }

    /// Starts an empty query builder.
    pub fn query(&self) -> Query {
        Query::new()
    }

    /// Executes a query against a consistent snapshot of the table.
    pub fn execute(&self, query: &Query) -> Result<Vec<QueryRow>> {
        self.state.read().execute(query)
    }

    /// Top-k nearest records to `query`, optionally through a named index.
    pub fn vector_search(
        &self,
        query: Vec<f32>,
        k: usize,
        index_name: Option<&str>,
    ) -> Result<Vec<QueryRow>> {
        let mut q = Query::new().vector_search(query, k);
        if let Some(name) = index_name {
            q = q.use_index(name);
        }
        self.execute(&q)
    }

    /// Top-k records by BM25 relevance to `query`.
    pub fn text_search(&self, query: &str, k: usize) -> Result<Vec<QueryRow>> {
        self.execute(&Query::new().text_search(query, k))
    }

    /// Top-k records by weighted vector/text fusion.
    pub fn hybrid_search(
        &self,
        vector: Vec<f32>,
        text: &str,
        weight: f32,
        k: usize,
    ) -> Result<Vec<QueryRow>> {
        self.execute(&Query::new().hybrid(vector, text, weight, k))
    }
}
