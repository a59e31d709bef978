// plantcare-core/src/store/mod.rs

//! Entity store collaborators and the typed crop repository on top of them.
//!
//! Stores deal in raw JSON records keyed by table name; [`CropRepository`]
//! and [`NoteRepository`] are the only places that know the record shapes.

use crate::errors::{StoreError, ValidationError};
use crate::models::crop::{Crop, NewCrop};
use crate::models::note::{NewNote, Note};
use crate::models::record::RecordId;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub mod memory;
pub mod supabase;

/// Trait defining the interface of the backing data store.
///
/// "No rows" is an empty vector, never an error.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn list_entities(&self, table: &str) -> Result<Vec<Value>, StoreError>;
    /// Rows whose `column` equals `value`.
    async fn find_entities(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Vec<Value>, StoreError>;
    /// Inserts `record` and returns it as stored (with generated columns).
    async fn insert_entity(&self, table: &str, record: Value) -> Result<Value, StoreError>;
    /// Deletes the row with the given id. `Ok(false)` when there was none.
    async fn delete_entity(&self, table: &str, id: &RecordId) -> Result<bool, StoreError>;
    fn name(&self) -> &str;
}

/// Errors from the repositories' `create`.
#[derive(thiserror::Error, Debug)]
pub enum CreateRecordError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Typed access to the crops table.
#[derive(Clone)]
pub struct CropRepository {
    store: Arc<dyn EntityStore>,
    table: String,
}

impl CropRepository {
    pub fn new(store: Arc<dyn EntityStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub async fn list(&self) -> Result<Vec<Crop>, StoreError> {
        let rows = self.store.list_entities(&self.table).await?;
        debug!(store = self.store.name(), table = %self.table, count = rows.len(), "Listed crops");
        decode_rows(rows)
    }

    pub async fn create(&self, new_crop: NewCrop) -> Result<Crop, CreateRecordError> {
        let crop = new_crop.into_crop(Utc::now())?;
        let record = serde_json::to_value(&crop).map_err(StoreError::from)?;
        let stored = self.store.insert_entity(&self.table, record).await?;
        let created: Crop = serde_json::from_value(stored).map_err(StoreError::from)?;
        info!(store = self.store.name(), name = %created.name, id = ?created.id, "Created crop");
        Ok(created)
    }
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|row| serde_json::from_value::<T>(row).map_err(StoreError::from))
        .collect()
}

/// Typed access to the notes table.
#[derive(Clone)]
pub struct NoteRepository {
    store: Arc<dyn EntityStore>,
    table: String,
}

impl NoteRepository {
    pub fn new(store: Arc<dyn EntityStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    /// All notes, or only those of one day.
    pub async fn list(&self, date: Option<NaiveDate>) -> Result<Vec<Note>, StoreError> {
        let rows = match date {
            Some(date) => {
                let day = date.format("%Y-%m-%d").to_string();
                self.store.find_entities(&self.table, "date", &day).await?
            }
            None => self.store.list_entities(&self.table).await?,
        };
        debug!(store = self.store.name(), table = %self.table, ?date, count = rows.len(), "Listed notes");
        decode_rows(rows)
    }

    pub async fn create(&self, new_note: NewNote) -> Result<Note, CreateRecordError> {
        let note = new_note.into_note(Utc::now())?;
        let record = serde_json::to_value(&note).map_err(StoreError::from)?;
        let stored = self.store.insert_entity(&self.table, record).await?;
        let created: Note = serde_json::from_value(stored).map_err(StoreError::from)?;
        info!(store = self.store.name(), date = %created.date, id = ?created.id, "Created note");
        Ok(created)
    }

    /// Returns whether a note was removed.
    pub async fn delete(&self, id: &RecordId) -> Result<bool, StoreError> {
        let deleted = self.store.delete_entity(&self.table, id).await?;
        info!(store = self.store.name(), id = %id, deleted, "Deleted note");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;

    fn repo() -> CropRepository {
        CropRepository::new(Arc::new(MemoryStore::new()), "cultivos")
    }

    fn tomates() -> NewCrop {
        NewCrop {
            nombre: "Tomates".into(),
            ubicacion: "Interior".into(),
            plantas: vec!["tomate".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_list_empty_store() {
        assert!(repo().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_then_list_includes_record() {
        let repo = repo();
        let created = repo.create(tomates()).await.unwrap();
        assert!(created.id.is_some());
        assert_eq!(created.status, "Iniciando");

        let crops = repo.list().await.unwrap();
        assert_eq!(crops.len(), 1);
        assert_eq!(crops[0], created);
    }

    #[tokio::test]
    async fn test_list_is_idempotent() {
        let repo = repo();
        repo.create(tomates()).await.unwrap();
        repo.create(NewCrop {
            nombre: "Lechugas".into(),
            ubicacion: "Exterior".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        let first = repo.list().await.unwrap();
        let second = repo.list().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[tokio::test]
    async fn test_create_invalid_does_not_touch_store() {
        let repo = repo();
        let err = repo.create(NewCrop::default()).await.unwrap_err();
        assert!(matches!(err, CreateRecordError::Validation(_)));
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_tolerates_null_columns() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_entity(
                "cultivos",
                serde_json::json!({
                    "name": "Tomates",
                    "location": "Interior",
                    "status": null,
                    "statusColor": null,
                    "plantas": null,
                    "created_at": "2024-05-01T10:00:00.123456"
                }),
            )
            .await
            .unwrap();
        let repo = CropRepository::new(store, "cultivos");
        let crops = repo.list().await.unwrap();
        assert_eq!(crops.len(), 1);
        assert_eq!(crops[0].status, "Iniciando");
        assert!(crops[0].created_at.is_some());
    }

    fn notes() -> NoteRepository {
        NoteRepository::new(Arc::new(MemoryStore::new()), "notes")
    }

    fn note_on(date: &str, title: &str) -> NewNote {
        NewNote {
            title: Some(title.into()),
            date: date.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_notes_filter_by_day() {
        let repo = notes();
        repo.create(note_on("2024-05-01", "Riego")).await.unwrap();
        repo.create(note_on("2024-05-02", "Poda")).await.unwrap();
        repo.create(note_on("2024-05-01", "Abono")).await.unwrap();

        assert_eq!(repo.list(None).await.unwrap().len(), 3);
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let titles: Vec<String> = repo
            .list(Some(day))
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["Riego".to_string(), "Abono".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_note() {
        let repo = notes();
        let created = repo.create(note_on("2024-05-01", "Riego")).await.unwrap();
        let id = created.id.clone().unwrap();

        assert!(repo.delete(&id).await.unwrap());
        assert!(repo.list(None).await.unwrap().is_empty());
        assert!(!repo.delete(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_note_invalid_does_not_touch_store() {
        let repo = notes();
        let err = repo.create(note_on("mañana", "Riego")).await.unwrap_err();
        assert!(matches!(err, CreateRecordError::Validation(_)));
        assert!(repo.list(None).await.unwrap().is_empty());
    }
}
