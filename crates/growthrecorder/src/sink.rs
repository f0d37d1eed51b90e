//! Remote mirror of saved measurements.
//!
//! The remote table is append-only from this application's point of view:
//! rows are inserted and never read back, updated or deleted.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SinkConfig;
use crate::error::{Error, Result};
use crate::measurement::MeasurementRecord;
use crate::qr::QrImage;

/// One row of the remote measurements table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRow {
    /// The subject's name.
    pub name: String,
    /// The parent's name.
    pub parent_name: String,
    /// Date of birth, `YYYY-MM-DD`.
    pub dob: String,
    /// Age in whole years.
    pub age: u32,
    /// Height in centimetres.
    pub height: f64,
    /// Weight in kilograms.
    pub weight: f64,
    /// JSON text of the QR payload.
    pub qr_data: String,
    /// Data URL of the rendered QR image, when encoding succeeded.
    pub qr_image_url: Option<String>,
}

impl SinkRow {
    /// Build the row for a record and its optional QR image.
    ///
    /// # Errors
    ///
    /// Returns an error if the QR payload cannot be serialized.
    pub fn from_record(record: &MeasurementRecord, qr: Option<&QrImage>) -> Result<Self> {
        Ok(Self {
            name: record.name.clone(),
            parent_name: record.parent_name.clone(),
            dob: record.dob.format(crate::identity::DOB_FORMAT).to_string(),
            age: record.age,
            height: record.height_cm,
            weight: record.weight_kg,
            qr_data: record.qr_payload().to_json()?,
            qr_image_url: qr.map(QrImage::data_url),
        })
    }
}

/// A best-effort remote destination for saved records.
#[async_trait]
pub trait RemoteSink: Send + Sync {
    /// Name of the destination table, for diagnostics.
    fn table(&self) -> &str;

    /// Insert one row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteSink`] if the row was not accepted.
    async fn append(&self, row: &SinkRow) -> Result<()>;
}

/// Inserts rows through a hosted backend's REST table endpoint
/// (`POST {url}/rest/v1/{table}`).
#[derive(Debug, Clone)]
pub struct RestTableSink {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    table: String,
}

impl RestTableSink {
    /// Create a sink from configuration.
    ///
    /// Returns `Ok(None)` when the sink is disabled or has no URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &SinkConfig) -> Result<Option<Self>> {
        let Some(url) = config.url.as_deref().filter(|_| config.enabled) else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Some(Self {
            client,
            endpoint: format!(
                "{}/rest/v1/{}",
                url.trim_end_matches('/'),
                config.table_name
            ),
            api_key: config.api_key.clone(),
            table: config.table_name.clone(),
        }))
    }

    /// The insert endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteSink for RestTableSink {
    fn table(&self) -> &str {
        &self.table
    }

    async fn append(&self, row: &SinkRow) -> Result<()> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Prefer", "return=minimal")
            .json(&[row]);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::remote_sink(&self.table, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::remote_sink(
                &self.table,
                format!("status {status}: {}", body.trim()),
            ));
        }

        debug!("Inserted row into {}", self.table);
        Ok(())
    }
}
