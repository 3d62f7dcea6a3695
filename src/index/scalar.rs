//! Scalar B-tree index over a payload field.
//!
//! Ordered map from field value to the set of record ids carrying it.
//! Supports equality, range, and membership lookups for filter pushdown.
//! Values inside one index must share a key class (numeric, string, or
//! boolean); integers and floats share the numeric class and compare
//! numerically. `Null` values are not indexed.

use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::record::{PayloadValue, RecordId};

/// Totally ordered projection of a payload value.
///
/// Integers are widened to f64 so `Integer(3)` and `Float(3.0)` land on the
/// same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScalarKey {
    Boolean(bool),
    Number(OrderedFloat<f64>),
    String(String),
}

impl ScalarKey {
    /// Projects a payload value onto its key, or `None` for `Null`.
    pub fn from_value(value: &PayloadValue) -> Option<ScalarKey> {
        match value {
            PayloadValue::Integer(i) => Some(ScalarKey::Number(OrderedFloat(*i as f64))),
            PayloadValue::Float(f) => Some(ScalarKey::Number(OrderedFloat(*f))),
            PayloadValue::String(s) => Some(ScalarKey::String(s.clone())),
            PayloadValue::Boolean(b) => Some(ScalarKey::Boolean(*b)),
            PayloadValue::Null => None,
        }
    }

    fn class(&self) -> KeyClass {
        match self {
            ScalarKey::Boolean(_) => KeyClass::Boolean,
            ScalarKey::Number(_) => KeyClass::Number,
            ScalarKey::String(_) => KeyClass::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyClass {
    Boolean,
    Number,
    String,
}

/// Range bound inclusivity for [`ScalarIndex::range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inclusivity {
    pub lo: bool,
    pub hi: bool,
}

impl Inclusivity {
    /// Both bounds inclusive.
    pub const BOTH: Inclusivity = Inclusivity { lo: true, hi: true };
}

/// Ordered index: field value → set of record ids.
///
/// Mutations are O(log n). The key class is fixed by the first insertion;
/// inserting a value of another class fails, which fails the whole record
/// mutation upstream.
#[derive(Debug, Default)]
pub struct ScalarIndex {
    entries: BTreeMap<ScalarKey, BTreeSet<RecordId>>,
    class: Option<KeyClass>,
}

impl ScalarIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes `id` under `value`. `Null` values are skipped.
    pub fn insert(&mut self, id: RecordId, value: &PayloadValue) -> Result<()> {
        let Some(key) = ScalarKey::from_value(value) else {
            return Ok(());
        };
        match self.class {
            None => self.class = Some(key.class()),
            Some(class) if class != key.class() => {
                return Err(Error::SchemaViolation(format!(
                    "scalar index holds {class:?} keys, got {}",
                    value.type_name()
                )));
            }
            Some(_) => {}
        }
        self.entries.entry(key).or_default().insert(id);
        Ok(())
    }

    /// Removes `id` from the entry for `value`. No-op if absent.
    pub fn remove(&mut self, id: RecordId, value: &PayloadValue) {
        if let Some(key) = ScalarKey::from_value(value) {
            if let Some(ids) = self.entries.get_mut(&key) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }

    /// Record ids whose field equals `value`, ascending.
    pub fn eq(&self, value: &PayloadValue) -> Vec<RecordId> {
        ScalarKey::from_value(value)
            .and_then(|key| self.entries.get(&key))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Record ids whose field falls in `[lo, hi]` with the given bound
    /// inclusivity, ascending by id.
    pub fn range(
        &self,
        lo: &PayloadValue,
        hi: &PayloadValue,
        inclusivity: Inclusivity,
    ) -> Vec<RecordId> {
        let (Some(lo_key), Some(hi_key)) =
            (ScalarKey::from_value(lo), ScalarKey::from_value(hi))
        else {
            return Vec::new();
        };
        let mut out = BTreeSet::new();
        for (key, ids) in self.entries.range(lo_key.clone()..=hi_key.clone()) {
            if !inclusivity.lo && *key == lo_key {
                continue;
            }
            if !inclusivity.hi && *key == hi_key {
                continue;
            }
            out.extend(ids.iter().copied());
        }
        out.into_iter().collect()
    }

    /// Record ids whose field equals any of `values`, ascending by id.
    pub fn in_values(&self, values: &[PayloadValue]) -> Vec<RecordId> {
        let mut out = BTreeSet::new();
        for value in values {
            if let Some(ids) = ScalarKey::from_value(value).and_then(|k| self.entries.get(&k)) {
                out.extend(ids.iter().copied());
            }
        }
        out.into_iter().collect()
    }

    /// Number of distinct indexed values.
    pub fn distinct_values(&self) -> usize {
        self.entries.len()
    }
}
