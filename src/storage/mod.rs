//! Storage layer: record store, tables, and the database registry.

/// Record store, table state, and the public table handle.
pub mod table;

pub use table::{RecordStore, Table, TableConfig};

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Named-table registry. Tables carry all behavior; the registry is a thin
/// shell for lookup and lifecycle.
#[derive(Clone, Default)]
pub struct Database {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl Database {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table. Fails if the name is taken.
    pub fn create_table(&self, name: &str, config: TableConfig) -> Result<Table> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(Error::DuplicateTable(name.to_string()));
        }
        let table = Table::new(config)?;
        tables.insert(name.to_string(), table.clone());
        Ok(table)
    }

    /// Returns a handle to the named table.
    pub fn table(&self, name: &str) -> Result<Table> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Drops a table and every index it owns.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.tables
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Names of all tables.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }
}
