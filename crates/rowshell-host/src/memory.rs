//! In-process host document.
//!
//! Used by tests and by the CLI's dry runs. Tables live behind a
//! `parking_lot::RwLock`, so a single document can be shared between the
//! shell and the studio through an `Arc`.

use crate::{HostDocument, HostError};
use async_trait::async_trait;
use parking_lot::RwLock;
use rowshell_model::{Row, RowId};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Shape used when answering `fetch_table`, so callers exercise every
/// normalization path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireShape {
    /// `[{"id": 1, ...}, ...]`
    #[default]
    Rows,
    /// `{"id": [1, 2], "col": [a, b]}`
    Columns,
    /// `{"records": [{"id": 1, "fields": {...}}]}`
    Records,
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Row>,
    next_id: RowId,
}

#[derive(Debug, Default)]
pub struct MemoryDocument {
    tables: RwLock<BTreeMap<String, Table>>,
    shape: WireShape,
    failing: RwLock<BTreeSet<String>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shape(shape: WireShape) -> Self {
        Self {
            shape,
            ..Self::default()
        }
    }

    /// Seed a table. Rows without an `id` get one assigned.
    pub fn with_rows(self, table: &str, rows: Vec<Row>) -> Self {
        {
            let mut tables = self.tables.write();
            let entry = tables.entry(table.to_string()).or_default();
            for row in rows {
                insert_row(entry, row);
            }
        }
        self
    }

    /// Make every operation on `table` fail with [`HostError::Unavailable`].
    pub fn fail_table(&self, table: &str) {
        self.failing.write().insert(table.to_string());
    }

    pub fn heal_table(&self, table: &str) {
        self.failing.write().remove(table);
    }

    /// Snapshot of a table's rows, ids included.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    fn check(&self, table: &str) -> Result<(), HostError> {
        if self.failing.read().contains(table) {
            return Err(HostError::Unavailable(format!("table `{table}` is failing")));
        }
        Ok(())
    }

    fn render(&self, rows: &[Row]) -> Value {
        match self.shape {
            WireShape::Rows => Value::Array(rows.iter().cloned().map(Value::Object).collect()),
            WireShape::Records => {
                let records: Vec<Value> = rows
                    .iter()
                    .map(|row| {
                        let mut fields = row.clone();
                        let id = fields.remove("id").unwrap_or(Value::Null);
                        json!({ "id": id, "fields": fields })
                    })
                    .collect();
                json!({ "records": records })
            }
            WireShape::Columns => {
                let mut columns: Map<String, Value> = Map::new();
                let names: BTreeSet<&String> = rows.iter().flat_map(|r| r.keys()).collect();
                for name in names {
                    let values = rows
                        .iter()
                        .map(|r| r.get(name).cloned().unwrap_or(Value::Null))
                        .collect();
                    columns.insert(name.clone(), Value::Array(values));
                }
                Value::Object(columns)
            }
        }
    }
}

fn insert_row(table: &mut Table, mut row: Row) -> RowId {
    let id = match row.get("id").and_then(Value::as_i64) {
        Some(id) => id,
        None => table.next_id + 1,
    };
    table.next_id = table.next_id.max(id);
    row.insert("id".to_string(), json!(id));
    table.rows.push(row);
    id
}

#[async_trait]
impl HostDocument for MemoryDocument {
    async fn fetch_table(&self, table: &str) -> Result<Value, HostError> {
        self.check(table)?;
        let tables = self.tables.read();
        let rows = tables
            .get(table)
            .ok_or_else(|| HostError::UnknownTable(table.to_string()))?;
        Ok(self.render(&rows.rows))
    }

    async fn add_row(&self, table: &str, mut fields: Row) -> Result<RowId, HostError> {
        self.check(table)?;
        fields.remove("id");
        let mut tables = self.tables.write();
        let entry = tables.entry(table.to_string()).or_default();
        Ok(insert_row(entry, fields))
    }

    async fn update_row(&self, table: &str, row_id: RowId, fields: Row) -> Result<(), HostError> {
        self.check(table)?;
        let mut tables = self.tables.write();
        let entry = tables
            .get_mut(table)
            .ok_or_else(|| HostError::UnknownTable(table.to_string()))?;
        let row = entry
            .rows
            .iter_mut()
            .find(|r| r.get("id").and_then(Value::as_i64) == Some(row_id))
            .ok_or_else(|| HostError::UnknownRow {
                table: table.to_string(),
                row_id,
            })?;
        for (key, value) in fields {
            if key != "id" {
                row.insert(key, value);
            }
        }
        Ok(())
    }

    async fn delete_row(&self, table: &str, row_id: RowId) -> Result<(), HostError> {
        self.check(table)?;
        let mut tables = self.tables.write();
        let entry = tables
            .get_mut(table)
            .ok_or_else(|| HostError::UnknownTable(table.to_string()))?;
        let before = entry.rows.len();
        entry
            .rows
            .retain(|r| r.get("id").and_then(Value::as_i64) != Some(row_id));
        if entry.rows.len() == before {
            return Err(HostError::UnknownRow {
                table: table.to_string(),
                row_id,
            });
        }
        Ok(())
    }
}
