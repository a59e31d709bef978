// plantcare-core/src/store/supabase.rs
use super::EntityStore;
use crate::errors::StoreError;
use crate::models::record::RecordId;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

/// Supabase (PostgREST) table client.
#[derive(Clone)]
pub struct SupabaseStore {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, StoreError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn read_body(response: reqwest::Response) -> Result<Value, StoreError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(status = %status, body = %body, "Supabase request failed");
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(format!("{}: {}", e, body)))
    }

    async fn read_rows(response: reqwest::Response) -> Result<Vec<Value>, StoreError> {
        match Self::read_body(response).await? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(StoreError::Decode(format!(
                "expected an array of rows, got: {}",
                other
            ))),
        }
    }
}

#[async_trait]
impl EntityStore for SupabaseStore {
    async fn list_entities(&self, table: &str) -> Result<Vec<Value>, StoreError> {
        let url = self.table_url(table);
        debug!(url = %url, "Listing rows from Supabase");
        let response = self
            .authorized(self.http_client.get(&url))
            .query(&[("select", "*"), ("order", "id.asc")])
            .send()
            .await?;
        Self::read_rows(response).await
    }

    async fn find_entities(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let url = self.table_url(table);
        debug!(url = %url, column, value, "Filtering rows from Supabase");
        let filter = format!("eq.{}", value);
        let response = self
            .authorized(self.http_client.get(&url))
            .query(&[("select", "*"), (column, filter.as_str()), ("order", "id.asc")])
            .send()
            .await?;
        Self::read_rows(response).await
    }

    async fn insert_entity(&self, table: &str, record: Value) -> Result<Value, StoreError> {
        let url = self.table_url(table);
        debug!(url = %url, "Inserting row into Supabase");
        let response = self
            .authorized(self.http_client.post(&url))
            .header("Prefer", "return=representation")
            .json(&record)
            .send()
            .await?;
        // PostgREST answers inserts with an array of the inserted rows.
        match Self::read_body(response).await? {
            Value::Array(mut rows) if !rows.is_empty() => Ok(rows.swap_remove(0)),
            Value::Object(row) => Ok(Value::Object(row)),
            other => Err(StoreError::Decode(format!(
                "insert returned no row: {}",
                other
            ))),
        }
    }

    async fn delete_entity(&self, table: &str, id: &RecordId) -> Result<bool, StoreError> {
        let url = self.table_url(table);
        debug!(url = %url, id = %id, "Deleting row from Supabase");
        let filter = format!("eq.{}", id);
        let response = self
            .authorized(self.http_client.delete(&url))
            .header("Prefer", "return=representation")
            .query(&[("id", filter.as_str())])
            .send()
            .await?;
        Ok(!Self::read_rows(response).await?.is_empty())
    }

    fn name(&self) -> &str {
        "supabase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn store(server: &MockServer) -> SupabaseStore {
        SupabaseStore::new(&server.base_url(), "test-key".to_string(), Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_entities_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/cultivos")
                    .query_param("select", "*")
                    .header("apikey", "test-key")
                    .header("Authorization", "Bearer test-key");
                then.status(200)
                    .json_body(json!([{ "id": 1, "name": "Tomates", "location": "Interior" }]));
            })
            .await;

        let rows = store(&server).list_entities("cultivos").await.unwrap();
        mock.assert_async().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Tomates");
    }

    #[tokio::test]
    async fn test_list_entities_empty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/cultivos");
                then.status(200).json_body(json!([]));
            })
            .await;
        let rows = store(&server).list_entities("cultivos").await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_list_entities_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/cultivos");
                then.status(401).body("{\"message\":\"Invalid API key\"}");
            })
            .await;
        let err = store(&server).list_entities("cultivos").await.unwrap_err();
        match err {
            StoreError::Rejected { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("Invalid API key"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_insert_entity_returns_first_row() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/cultivos")
                    .header("Prefer", "return=representation")
                    .json_body(json!({ "name": "Tomates" }));
                then.status(201)
                    .json_body(json!([{ "id": 42, "name": "Tomates" }]));
            })
            .await;
        let row = store(&server)
            .insert_entity("cultivos", json!({ "name": "Tomates" }))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(row["id"], 42);
    }

    #[tokio::test]
    async fn test_insert_entity_empty_response_is_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rest/v1/cultivos");
                then.status(201).json_body(json!([]));
            })
            .await;
        let err = store(&server)
            .insert_entity("cultivos", json!({ "name": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[tokio::test]
    async fn test_find_entities_sends_eq_filter() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/notes")
                    .query_param("date", "eq.2024-05-01");
                then.status(200)
                    .json_body(json!([{ "id": 1, "date": "2024-05-01", "title": "Riego" }]));
            })
            .await;
        let rows = store(&server)
            .find_entities("notes", "date", "2024-05-01")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_entity_reports_whether_a_row_went() {
        let server = MockServer::start_async().await;
        let hit = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/rest/v1/notes")
                    .query_param("id", "eq.5")
                    .header("Prefer", "return=representation");
                then.status(200).json_body(json!([{ "id": 5 }]));
            })
            .await;
        let miss = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/rest/v1/notes")
                    .query_param("id", "eq.6");
                then.status(200).json_body(json!([]));
            })
            .await;

        let store = store(&server);
        assert!(store.delete_entity("notes", &RecordId::Int(5)).await.unwrap());
        assert!(!store.delete_entity("notes", &RecordId::Int(6)).await.unwrap());
        hit.assert_async().await;
        miss.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_store_is_transport_error() {
        let store = SupabaseStore::new(
            "http://127.0.0.1:9",
            "k".to_string(),
            Duration::from_millis(500),
        )
        .unwrap();
        let err = store.list_entities("cultivos").await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
    }
}
