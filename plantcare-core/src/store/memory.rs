// plantcare-core/src/store/memory.rs
use super::EntityStore;
use crate::errors::StoreError;
use crate::models::record::RecordId;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local store for development and tests. Generates a UUID `id`
/// and a `created_at` timestamp when the record lacks them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn list_entities(&self, table: &str) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).cloned().unwrap_or_default())
    }

    async fn find_entities(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables.get(table).map(Vec::as_slice).unwrap_or_default();
        Ok(rows
            .iter()
            .filter(|row| match row.get(column) {
                Some(Value::String(s)) => s == value,
                Some(Value::Number(n)) => n.to_string() == value,
                Some(Value::Bool(b)) => b.to_string() == value,
                _ => false,
            })
            .cloned()
            .collect())
    }

    async fn insert_entity(&self, table: &str, record: Value) -> Result<Value, StoreError> {
        let mut record = match record {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Decode(format!(
                    "expected a JSON object record, got: {}",
                    other
                )))
            }
        };
        if record.get("id").map_or(true, Value::is_null) {
            record.insert("id".to_string(), json!(Uuid::new_v4().to_string()));
        }
        if record.get("created_at").map_or(true, Value::is_null) {
            record.insert("created_at".to_string(), json!(chrono::Utc::now()));
        }
        let record = Value::Object(record);
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn delete_entity(&self, table: &str, id: &RecordId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|row| !id.matches(row));
        Ok(rows.len() < before)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
