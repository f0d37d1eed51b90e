//! Reading providers.
//!
//! A [`ReadingProvider`] yields the latest weight and height published by
//! the measuring devices. Providers never fail: any transport or decoding
//! problem is logged and reported as a reading of `0.0`.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::TelemetryConfig;
use crate::error::{Error, Result};
use crate::measurement::ReadingSample;

/// A source of weight and height readings.
#[async_trait]
pub trait ReadingProvider: Send + Sync {
    /// Latest weight in kilograms, or `0.0` if none could be obtained.
    async fn fetch_weight(&self) -> f64;

    /// Latest height in centimetres, or `0.0` if none could be obtained.
    ///
    /// Subjects under one year are measured lying down on a separate device,
    /// so the source differs by age band.
    async fn fetch_height(&self, age_at_least_one_year: bool) -> f64;
}

/// Fetch weight and height concurrently and wait for both.
pub async fn read_sample(provider: &dyn ReadingProvider, age_at_least_one_year: bool) -> ReadingSample {
    let (weight_kg, height_cm) = tokio::join!(
        provider.fetch_weight(),
        provider.fetch_height(age_at_least_one_year)
    );
    ReadingSample::new(weight_kg, height_cm)
}

/// Body of a channel's `fields/<n>/last.json` response.
///
/// Only the requested field is interpreted. Entry metadata such as
/// `entry_id` or `created_at` is kept untyped so an odd value there never
/// discards a good reading.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct LastEntry {
    fields: HashMap<String, Value>,
}

impl LastEntry {
    /// The numeric value of `field<index>`, if present and numeric.
    #[must_use]
    pub fn field(&self, index: u8) -> Option<f64> {
        self.fields
            .get(&format!("field{index}"))
            .and_then(parse_reading)
    }
}

/// Interpret a JSON field value as a reading.
///
/// Strings are trimmed and parsed; numbers are taken as-is. Anything else,
/// including non-finite values, is no reading.
#[must_use]
pub fn parse_reading(value: &Value) -> Option<f64> {
    let reading = match value {
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    reading.is_finite().then_some(reading)
}

/// Reads the latest values from a telemetry channel over HTTP.
#[derive(Debug, Clone)]
pub struct TelemetryReadingProvider {
    client: Client,
    config: TelemetryConfig,
}

impl TelemetryReadingProvider {
    /// Create a provider for the configured channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: TelemetryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// URL of the latest entry for one field.
    #[must_use]
    pub fn field_url(&self, field: u8) -> String {
        format!(
            "{}/channels/{}/fields/{}/last.json",
            self.config.base_url.trim_end_matches('/'),
            self.config.channel_id,
            field
        )
    }

    /// Fetch one field, reporting every failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadingFetch`] on transport errors, non-success
    /// statuses, undecodable bodies and missing or non-numeric fields.
    pub async fn fetch_field(&self, field: u8) -> Result<f64> {
        let url = self.field_url(field);
        debug!("Fetching reading from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::reading_fetch(field, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::reading_fetch(field, format!("status {status}")));
        }

        let entry: LastEntry = response
            .json()
            .await
            .map_err(|e| Error::reading_fetch(field, e.to_string()))?;

        entry
            .field(field)
            .ok_or_else(|| Error::reading_fetch(field, format!("field{field} missing or not numeric")))
    }

    async fn fetch_or_zero(&self, field: u8, what: &str) -> f64 {
        match self.fetch_field(field).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Error fetching {} data: {}", what, e);
                0.0
            }
        }
    }
}

#[async_trait]
impl ReadingProvider for TelemetryReadingProvider {
    async fn fetch_weight(&self) -> f64 {
        self.fetch_or_zero(self.config.fields.weight, "weight").await
    }

    async fn fetch_height(&self, age_at_least_one_year: bool) -> f64 {
        let field = self.config.fields.height_field(age_at_least_one_year);
        self.fetch_or_zero(field, "height").await
    }
}
