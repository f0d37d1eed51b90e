//! QR code rendering for saved measurements.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use qrcode::render::{svg, unicode};
use qrcode::{EcLevel, QrCode};

use crate::config::{ErrorCorrection, QrConfig};
use crate::error::Result;
use crate::measurement::QrPayload;

/// Prefix of the data URLs produced by [`QrEncoder`].
pub const DATA_URL_PREFIX: &str = "data:image/svg+xml;base64,";

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::L => Self::L,
            ErrorCorrection::M => Self::M,
            ErrorCorrection::Q => Self::Q,
            ErrorCorrection::H => Self::H,
        }
    }
}

/// A rendered QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrImage {
    /// The encoded text.
    pub data: String,
    /// SVG document of the code.
    pub svg: String,
    /// Compact rendering for terminals.
    pub text: String,
}

impl QrImage {
    /// The SVG as a `data:` URL suitable for an `<img>` source.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("{DATA_URL_PREFIX}{}", STANDARD.encode(self.svg.as_bytes()))
    }
}

/// Encodes measurement payloads into QR images.
#[derive(Debug, Clone, Default)]
pub struct QrEncoder {
    config: QrConfig,
}

impl QrEncoder {
    /// Create an encoder with the given settings.
    #[must_use]
    pub fn new(config: QrConfig) -> Self {
        Self { config }
    }

    /// Encode arbitrary text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Encoding`] if the text does not fit in a QR code
    /// at the configured error correction level.
    pub fn encode_text(&self, data: &str) -> Result<QrImage> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), self.config.error_correction.into())?;

        let svg = code
            .render::<svg::Color<'_>>()
            .min_dimensions(self.config.size, self.config.size)
            .build();
        let text = code
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build();

        Ok(QrImage {
            data: data.to_string(),
            svg,
            text,
        })
    }

    /// Encode a measurement payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized or encoded.
    pub fn encode(&self, payload: &QrPayload<'_>) -> Result<QrImage> {
        self.encode_text(&payload.to_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::identity::IdentityRecord;
    use crate::measurement::{MeasurementRecord, ReadingSample};
    use chrono::{NaiveDate, Utc};

    fn record(name: &str) -> MeasurementRecord {
        let identity = IdentityRecord {
            name: name.to_string(),
            parent_name: "Bob".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            age: 1,
        };
        MeasurementRecord::new(&identity, ReadingSample::new(9.8, 76.0), Utc::now())
    }

    #[test]
    fn test_encode_payload() {
        let encoder = QrEncoder::default();
        let r = record("Alice");
        let image = encoder.encode(&r.qr_payload()).unwrap();

        assert!(image.data.contains("\"name\":\"Alice\""));
        assert!(!image.data.contains(&r.id));
        assert!(image.svg.contains("<svg"));
        assert!(!image.text.is_empty());
    }

    #[test]
    fn test_data_url() {
        let image = QrEncoder::default().encode_text("hello").unwrap();
        let url = image.data_url();

        assert!(url.starts_with(DATA_URL_PREFIX));
        let decoded = STANDARD.decode(&url[DATA_URL_PREFIX.len()..]).unwrap();
        assert_eq!(decoded, image.svg.as_bytes());
    }

    #[test]
    fn test_svg_respects_minimum_size() {
        let encoder = QrEncoder::new(QrConfig {
            size: 500,
            ..QrConfig::default()
        });
        let image = encoder.encode_text("hello").unwrap();
        let width: u32 = image
            .svg
            .split("width=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .and_then(|w| w.parse().ok())
            .unwrap();
        assert!(width >= 500);
    }

    #[test]
    fn test_oversized_payload_fails() {
        let encoder = QrEncoder::default();
        let r = record(&"x".repeat(4000));

        let err = encoder.encode(&r.qr_payload()).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn test_lower_correction_fits_more() {
        let data = "y".repeat(2000);
        assert!(QrEncoder::default().encode_text(&data).is_err());

        let low = QrEncoder::new(QrConfig {
            error_correction: ErrorCorrection::L,
            ..QrConfig::default()
        });
        assert!(low.encode_text(&data).is_ok());
    }

    #[test]
    fn test_ec_level_mapping() {
        assert_eq!(EcLevel::from(ErrorCorrection::H), EcLevel::H);
        assert_eq!(EcLevel::from(ErrorCorrection::L), EcLevel::L);
    }
}
