//! Host document backed by the spreadsheet REST API.
//!
//! Endpoints used, relative to `{base_url}/api/docs/{doc_id}/tables/{table}`:
//!
//! - `GET    /records[?filter=...]`
//! - `POST   /records`       body `{"records": [{"fields": {...}}]}`
//! - `PATCH  /records`       body `{"records": [{"id": n, "fields": {...}}]}`
//! - `POST   /data/delete`   body `[n]`

use crate::{HostDocument, HostError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use rowshell_model::{rows_from_wire, Row, RowId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestConfig {
    pub base_url: String,
    pub doc_id: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl RestConfig {
    pub fn new(base_url: &str, doc_id: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            doc_id: doc_id.to_string(),
            api_key: api_key.to_string(),
            timeout_secs: default_timeout(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/api/docs/{}/tables/{}",
            self.base_url.trim_end_matches('/'),
            self.doc_id,
            table
        )
    }
}

pub struct GristRestDocument {
    client: Client,
    config: RestConfig,
}

impl GristRestDocument {
    pub fn new(config: RestConfig) -> Result<Self, HostError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HostError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Bearer {}", self.config.api_key))
    }

    async fn send(
        &self,
        request: RequestBuilder,
        method: &str,
        url: &str,
    ) -> Result<Response, HostError> {
        tracing::debug!(method, url, "host request");
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| HostError::Network(format!("{method} {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

async fn read_json(response: Response) -> Result<Value, HostError> {
    response
        .json()
        .await
        .map_err(|e| HostError::InvalidResponse(e.to_string()))
}

/// Id of the first record in a `{"records": [{"id": n}]}` answer.
fn first_record_id(data: &Value) -> Option<RowId> {
    data.get("records")?.as_array()?.first()?.get("id")?.as_i64()
}

#[async_trait]
impl HostDocument for GristRestDocument {
    /// Filtered server side.
    async fn find_by_field(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Vec<Row>, HostError> {
        let filter = json!({ column: [value] }).to_string();
        let url = format!("{}/records", self.config.table_url(table));
        let request = self.client.get(&url).query(&[("filter", filter)]);
        let data = read_json(self.send(request, "GET", &url).await?).await?;
        Ok(rows_from_wire(data))
    }

    async fn fetch_table(&self, table: &str) -> Result<Value, HostError> {
        let url = format!("{}/records", self.config.table_url(table));
        let request = self.client.get(&url);
        read_json(self.send(request, "GET", &url).await?).await
    }

    async fn add_row(&self, table: &str, fields: Row) -> Result<RowId, HostError> {
        let url = format!("{}/records", self.config.table_url(table));
        let body = json!({ "records": [{ "fields": fields }] });
        let request = self.client.post(&url).json(&body);
        let data = read_json(self.send(request, "POST", &url).await?).await?;
        first_record_id(&data)
            .ok_or_else(|| HostError::InvalidResponse("missing created record id".to_string()))
    }

    async fn update_row(&self, table: &str, row_id: RowId, fields: Row) -> Result<(), HostError> {
        let url = format!("{}/records", self.config.table_url(table));
        let body = json!({ "records": [{ "id": row_id, "fields": fields }] });
        let request = self.client.patch(&url).json(&body);
        self.send(request, "PATCH", &url).await?;
        Ok(())
    }

    async fn delete_row(&self, table: &str, row_id: RowId) -> Result<(), HostError> {
        let url = format!("{}/data/delete", self.config.table_url(table));
        let request = self.client.post(&url).json(&json!([row_id]));
        self.send(request, "POST", &url).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_url_trims_trailing_slash() {
        let config = RestConfig::new("https://docs.example.com/", "abc", "k");
        assert_eq!(
            config.table_url("Application_Composants"),
            "https://docs.example.com/api/docs/abc/tables/Application_Composants"
        );
    }

    #[test]
    fn created_id_comes_from_first_record() {
        assert_eq!(first_record_id(&json!({"records": [{"id": 12}]})), Some(12));
        assert_eq!(first_record_id(&json!({"records": []})), None);
        assert_eq!(first_record_id(&json!({})), None);
    }

    #[test]
    fn api_key_is_not_serialized() {
        let config = RestConfig::new("https://h", "d", "secret");
        let text = serde_json::to_string(&config).unwrap();
        assert!(!text.contains("secret"));
    }
}
