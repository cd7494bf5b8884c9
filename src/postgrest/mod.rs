//! Database operations through the PostgREST API

mod filter;
mod query;
mod types;

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::Result;
use crate::fetch::{Fetch, FetchBuilder};

pub use filter::*;
pub use query::*;
pub use types::*;

/// Executes [`Query`] values against `/rest/v1`
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    /// The base URL for the project
    url: String,

    /// The anonymous API key for the project
    key: String,

    /// Schema sent via `Accept-Profile`/`Content-Profile`
    schema: String,

    /// Request timeout
    timeout: Option<Duration>,

    /// HTTP client
    client: Client,
}

impl PostgrestClient {
    /// Create a new PostgrestClient
    pub(crate) fn new(
        url: &str,
        key: &str,
        schema: &str,
        timeout: Option<Duration>,
        client: Client,
    ) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            schema: schema.to_string(),
            timeout,
            client,
        }
    }

    /// Get the REST URL for a table
    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }

    fn prepare<'a>(&self, fetch: FetchBuilder<'a>, token: &str) -> FetchBuilder<'a> {
        fetch
            .api_auth(&self.key, token)
            .header("Accept-Profile", &self.schema)
            .header("Content-Profile", &self.schema)
            .timeout(self.timeout)
    }

    /// Run a select and return the raw rows
    pub async fn select(&self, query: &Query, token: &str) -> Result<Vec<Value>> {
        let url = self.table_url(query.table_name());
        self.prepare(Fetch::get(&self.client, &url), token)
            .query(query.to_params())
            .execute::<Vec<Value>>()
            .await
    }

    /// Count matching rows without transferring them
    pub async fn count(&self, query: &Query, token: &str) -> Result<u64> {
        let url = self.table_url(query.table_name());
        self.prepare(Fetch::head(&self.client, &url), token)
            .header("Prefer", "count=exact")
            .query(query.to_params())
            .execute_count()
            .await
    }

    /// Insert one row and return it as stored
    pub async fn insert(&self, table: &str, row: &Value, token: &str) -> Result<Value> {
        let url = self.table_url(table);
        let value = self
            .prepare(Fetch::post(&self.client, &url), token)
            .header("Prefer", ReturnOption::Representation.prefer())
            .json(row)?
            .execute_value()
            .await?;
        Ok(first_row(value))
    }

    /// Patch every row the query matches and return the updated rows
    pub async fn update(&self, query: &Query, patch: &Value, token: &str) -> Result<Vec<Value>> {
        let url = self.table_url(query.table_name());
        let value = self
            .prepare(Fetch::patch(&self.client, &url), token)
            .header("Prefer", ReturnOption::Representation.prefer())
            .query(query.filter_params())
            .json(patch)?
            .execute_value()
            .await?;
        Ok(match value {
            Value::Array(rows) => rows,
            Value::Null => Vec::new(),
            other => vec![other],
        })
    }

    /// Delete every row the query matches
    pub async fn delete(&self, query: &Query, token: &str) -> Result<()> {
        let url = self.table_url(query.table_name());
        self.prepare(Fetch::delete(&self.client, &url), token)
            .header("Prefer", ReturnOption::Minimal.prefer())
            .query(query.filter_params())
            .execute_empty()
            .await
    }
}

/// PostgREST answers inserts with an array of the written rows
fn first_row(value: Value) -> Value {
    match value {
        Value::Array(mut rows) if !rows.is_empty() => rows.swap_remove(0),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> PostgrestClient {
        PostgrestClient::new(&server.uri(), "anon", "public", None, Client::new())
    }

    #[tokio::test]
    async fn test_select() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/pets"))
            .and(query_param("select", "*"))
            .and(query_param("status", "eq.available"))
            .and(header("apikey", "anon"))
            .and(header("Authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "1", "name": "Momo" },
                { "id": "2", "name": "Lucky" }
            ])))
            .mount(&mock_server)
            .await;

        let query = Query::table("pets").eq("status", "available");
        let rows = client(&mock_server).select(&query, "token").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Momo");
    }

    #[tokio::test]
    async fn test_count_reads_content_range() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/rest/v1/favorites"))
            .and(header("Prefer", "count=exact"))
            .and(query_param("user_id", "eq.u1"))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Range", "0-2/3"))
            .mount(&mock_server)
            .await;

        let query = Query::table("favorites").eq("user_id", "u1");
        let count = client(&mock_server).count(&query, "anon").await.unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_insert_returns_first_row() {
        let mock_server = MockServer::start().await;
        let row = json!({ "user_id": "u1", "pet_id": "p1" });
        Mock::given(method("POST"))
            .and(path("/rest/v1/favorites"))
            .and(header("Prefer", "return=representation"))
            .and(body_json(&row))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!([{ "id": "f1", "user_id": "u1", "pet_id": "p1" }])),
            )
            .mount(&mock_server)
            .await;

        let stored = client(&mock_server)
            .insert("favorites", &row, "anon")
            .await
            .unwrap();
        assert_eq!(stored["id"], "f1");
    }

    #[tokio::test]
    async fn test_insert_conflict_is_unique_violation() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/favorites"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint",
                "details": null,
                "hint": null
            })))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .insert("favorites", &json!({}), "anon")
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_delete_sends_filters_only() {
        let mock_server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/pets"))
            .and(query_param("id", "eq.p9"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let query = Query::table("pets").eq("id", "p9");
        client(&mock_server).delete(&query, "anon").await.unwrap();
    }
}
