//! In-memory record store
//!
//! Tables are loaded by the caller (from CSV, spreadsheets or JSON) and held
//! here keyed by store name.

use dashmap::DashMap;
use mb_core::value_to_text;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::ports::{PortResult, Record, RecordStore, RecordTable};

/// Record store backed by a concurrent map of tables
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: DashMap<String, RecordTable>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from named tables
    pub fn from_tables(tables: HashMap<String, RecordTable>) -> Self {
        let store = Self::new();
        for (name, table) in tables {
            store.insert_table(name, table);
        }
        store
    }

    /// Add or replace a table
    pub fn insert_table(&self, name: impl Into<String>, table: RecordTable) {
        let name = name.into();
        debug!(store = %name, records = table.data.len(), "Registered record table");
        self.tables.insert(name, table);
    }

    pub fn store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

fn cell_matches(record: &Record, column: &str, value: &str) -> bool {
    let cell = record.get(column).map(value_to_text).unwrap_or_default();
    cell.trim() == value.trim()
}

impl RecordStore for InMemoryRecordStore {
    fn search(&self, store: &str, column: &str, value: &str) -> PortResult<Option<Record>> {
        Ok(self.tables.get(store).and_then(|table| {
            table
                .data
                .iter()
                .find(|record| cell_matches(record, column, value))
                .cloned()
        }))
    }

    fn get_columns(&self, store: &str) -> PortResult<Vec<String>> {
        Ok(self
            .tables
            .get(store)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    fn table(&self, store: &str) -> PortResult<Option<RecordTable>> {
        Ok(self.tables.get(store).map(|t| t.clone()))
    }

    fn update_first(
        &self,
        store: &str,
        match_column: &str,
        match_value: &str,
        update_column: &str,
        new_value: Value,
    ) -> PortResult<bool> {
        let Some(mut table) = self.tables.get_mut(store) else {
            return Ok(false);
        };

        match table
            .data
            .iter_mut()
            .find(|record| cell_matches(record, match_column, match_value))
        {
            Some(record) => {
                record.insert(update_column.to_string(), new_value);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> RecordTable {
        serde_json::from_value(json!({
            "columns": ["name", "code"],
            "data": [
                {"name": "alice", "code": " 7 "},
                {"name": "bob", "code": 8}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_search_compares_trimmed_text() {
        let store = InMemoryRecordStore::new();
        store.insert_table("people", people());

        let hit = store.search("people", "code", "7").unwrap().unwrap();
        assert_eq!(hit["name"], json!("alice"));

        let hit = store.search("people", "code", "8").unwrap().unwrap();
        assert_eq!(hit["name"], json!("bob"));

        assert!(store.search("people", "code", "9").unwrap().is_none());
        assert!(store.search("nobody", "code", "7").unwrap().is_none());
    }

    #[test]
    fn test_update_first() {
        let store = InMemoryRecordStore::new();
        store.insert_table("people", people());

        assert!(store
            .update_first("people", "name", "bob", "code", json!("99"))
            .unwrap());
        assert!(!store
            .update_first("people", "name", "carol", "code", json!("1"))
            .unwrap());

        let table = store.table("people").unwrap().unwrap();
        assert_eq!(table.data[1]["code"], json!("99"));
        assert_eq!(store.get_columns("people").unwrap(), vec!["name", "code"]);
    }
}
