//! AirtableClient -- concrete [`RecordStoreClient`] for the Airtable REST API.
//!
//! Records are created with `POST {base_url}/{base_id}/{table}` and updated
//! with `PATCH {base_url}/{base_id}/{table}/{record_id}`, both carrying a
//! `{"fields": {...}}` body.
//!
//! Without both an API key and a base ID the client runs in dry-run mode:
//! calls are logged and succeed with a synthetic `dryrun_<uuid>` record ID,
//! so workflows can be exercised before credentials exist.
//!
//! The API key is wrapped in [`SecretString`] and is only exposed when
//! building the `Authorization` header.

use std::time::Duration;

use autoflow_core::integration::record_store::{RecordStoreClient, RecordStoreError};
use autoflow_types::config::RecordStoreConfig;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

struct Credentials {
    api_key: SecretString,
    base_id: String,
}

pub struct AirtableClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    id: String,
}

impl AirtableClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(config: &RecordStoreConfig) -> Result<Self, RecordStoreError> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RecordStoreError::Request(format!("failed to build HTTP client: {e}")))?;

        let credentials = match (&config.api_key, &config.base_id) {
            (Some(key), Some(base)) if !key.is_empty() && !base.is_empty() => Some(Credentials {
                api_key: SecretString::from(key.clone()),
                base_id: base.clone(),
            }),
            _ => None,
        };

        if credentials.is_none() {
            tracing::info!("record store credentials not configured; running in dry-run mode");
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.credentials.is_none()
    }

    /// `{base_url}/{base_id}/{table}[/{record_id}]` with each segment
    /// percent-encoded.
    fn record_url(
        &self,
        base_id: &str,
        table: &str,
        record_id: Option<&str>,
    ) -> Result<Url, RecordStoreError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| RecordStoreError::Request(format!("invalid base URL: {e}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| RecordStoreError::Request("base URL cannot have a path".to_string()))?;
            segments.pop_if_empty().push(base_id).push(table);
            if let Some(id) = record_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        api_key: &SecretString,
        fields: &Map<String, Value>,
    ) -> Result<RecordResponse, RecordStoreError> {
        let response = request
            .bearer_auth(api_key.expose_secret())
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .map_err(|e| RecordStoreError::Request(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RecordStoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| RecordStoreError::Response(format!("failed to parse response: {e}")))
    }
}

fn dry_run_id() -> String {
    format!("dryrun_{}", Uuid::now_v7().simple())
}

impl RecordStoreClient for AirtableClient {
    async fn create_record(
        &self,
        table: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, RecordStoreError> {
        let Some(creds) = &self.credentials else {
            let id = dry_run_id();
            tracing::info!(table, record_id = %id, field_count = fields.len(), "dry-run record create");
            return Ok(id);
        };

        let url = self.record_url(&creds.base_id, table, None)?;
        let record = self
            .send(self.client.post(url), &creds.api_key, fields)
            .await?;
        tracing::debug!(table, record_id = %record.id, "record created");
        Ok(record.id)
    }

    async fn update_record(
        &self,
        table: &str,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), RecordStoreError> {
        let Some(creds) = &self.credentials else {
            tracing::info!(table, record_id, field_count = fields.len(), "dry-run record update");
            return Ok(());
        };

        let url = self.record_url(&creds.base_id, table, Some(record_id))?;
        self.send(self.client.patch(url), &creds.api_key, fields)
            .await?;
        tracing::debug!(table, record_id, "record updated");
        Ok(())
    }
}
