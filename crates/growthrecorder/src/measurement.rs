//! Core measurement types for growthrecorder.
//!
//! This module defines the persisted measurement record, the transient
//! reading sample held by the workflow, and the display-only QR payload.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::IdentityRecord;

/// A pair of readings taken from the telemetry source.
///
/// A value of exactly `0.0` means no reading was obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingSample {
    /// Weight in kilograms.
    pub weight_kg: f64,
    /// Height in centimetres.
    pub height_cm: f64,
}

impl ReadingSample {
    /// Create a new sample.
    #[must_use]
    pub fn new(weight_kg: f64, height_cm: f64) -> Self {
        Self {
            weight_kg,
            height_cm,
        }
    }

    /// Whether neither reading was obtained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weight_kg == 0.0 && self.height_cm == 0.0
    }

    /// Whether at least one reading is missing.
    #[must_use]
    pub fn has_missing(&self) -> bool {
        self.weight_kg == 0.0 || self.height_cm == 0.0
    }
}

/// A completed, immutable measurement.
///
/// Serialized field names match the persisted collection format shared with
/// earlier clients: `id`, `name`, `parentName`, `age`, `dob`, `weight`,
/// `height`, `measurementDate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    /// Globally unique identifier.
    pub id: String,
    /// The subject's name.
    pub name: String,
    /// The parent's name.
    pub parent_name: String,
    /// Age in whole years when measured.
    pub age: u32,
    /// Date of birth.
    #[serde(with = "dob_format")]
    pub dob: NaiveDate,
    /// Weight in kilograms.
    #[serde(rename = "weight")]
    pub weight_kg: f64,
    /// Height in centimetres.
    #[serde(rename = "height")]
    pub height_cm: f64,
    /// When the measurement was confirmed.
    pub measurement_date: DateTime<Utc>,
}

impl MeasurementRecord {
    /// Build a record from a validated identity and confirmed readings.
    ///
    /// Assigns a fresh random identifier and stamps the record with `taken_at`.
    #[must_use]
    pub fn new(identity: &IdentityRecord, sample: ReadingSample, taken_at: DateTime<Utc>) -> Self {
        Self {
            id: Self::generate_id(),
            name: identity.name.clone(),
            parent_name: identity.parent_name.clone(),
            age: identity.age,
            dob: identity.date_of_birth,
            weight_kg: sample.weight_kg,
            height_cm: sample.height_cm,
            measurement_date: taken_at,
        }
    }

    /// Generate a random record identifier.
    #[must_use]
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// The readings stored in this record.
    #[must_use]
    pub fn sample(&self) -> ReadingSample {
        ReadingSample::new(self.weight_kg, self.height_cm)
    }

    /// The display payload encoded into the QR image.
    #[must_use]
    pub fn qr_payload(&self) -> QrPayload<'_> {
        QrPayload::from(self)
    }
}

/// The fields of a record shown in its QR code. The identifier is left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload<'a> {
    /// The subject's name.
    pub name: &'a str,
    /// The parent's name.
    pub parent_name: &'a str,
    /// Age in whole years.
    pub age: u32,
    /// Date of birth.
    #[serde(with = "dob_format")]
    pub dob: NaiveDate,
    /// Weight in kilograms.
    pub weight: f64,
    /// Height in centimetres.
    pub height: f64,
    /// When the measurement was confirmed.
    pub measurement_date: DateTime<Utc>,
}

impl<'a> From<&'a MeasurementRecord> for QrPayload<'a> {
    fn from(record: &'a MeasurementRecord) -> Self {
        Self {
            name: &record.name,
            parent_name: &record.parent_name,
            age: record.age,
            dob: record.dob,
            weight: record.weight_kg,
            height: record.height_cm,
            measurement_date: record.measurement_date,
        }
    }
}

impl QrPayload<'_> {
    /// The JSON text carried by the QR code.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Dates of birth are written as `YYYY-MM-DD`; full ISO-8601 timestamps are
/// accepted on read and reduced to their UTC calendar date.
mod dob_format {
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use crate::identity::DOB_FORMAT;

    // serde's `with` hands us a reference.
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(DOB_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let text = String::deserialize(deserializer)?;
        if let Ok(date) = NaiveDate::parse_from_str(&text, DOB_FORMAT) {
            return Ok(date);
        }
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc).date_naive())
            .map_err(|_| D::Error::custom(format!("invalid date of birth: {text}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn alice() -> IdentityRecord {
        IdentityRecord {
            name: "Alice".to_string(),
            parent_name: "Bob".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            age: 1,
        }
    }

    fn taken_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_reading_sample_flags() {
        assert!(ReadingSample::default().is_empty());
        assert!(ReadingSample::default().has_missing());

        let partial = ReadingSample::new(10.5, 0.0);
        assert!(!partial.is_empty());
        assert!(partial.has_missing());

        let full = ReadingSample::new(10.5, 80.2);
        assert!(!full.is_empty());
        assert!(!full.has_missing());
    }

    #[test]
    fn test_record_new_copies_identity() {
        let record = MeasurementRecord::new(&alice(), ReadingSample::new(9.8, 76.0), taken_at());

        assert_eq!(record.name, "Alice");
        assert_eq!(record.parent_name, "Bob");
        assert_eq!(record.age, 1);
        assert_eq!(record.dob, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(record.sample(), ReadingSample::new(9.8, 76.0));
        assert_eq!(record.measurement_date, taken_at());
        assert!(Uuid::parse_str(&record.id).is_ok());
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = MeasurementRecord::new(&alice(), ReadingSample::default(), taken_at());
        let b = MeasurementRecord::new(&alice(), ReadingSample::default(), taken_at());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_record_json_shape() {
        let record = MeasurementRecord::new(&alice(), ReadingSample::new(9.8, 76.0), taken_at());
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["parentName"], "Bob");
        assert_eq!(value["dob"], "2023-01-01");
        assert_eq!(value["weight"], 9.8);
        assert_eq!(value["height"], 76.0);
        assert!(value["measurementDate"]
            .as_str()
            .unwrap()
            .starts_with("2024-06-01T09:30:00"));
        assert!(value.get("weight_kg").is_none());
    }

    #[test]
    fn test_record_reads_legacy_timestamp_dob() {
        let json = r#"{
            "id": "1b9d6bcd-bbfd-4b2d-9b5d-ab8dfbbd4bed",
            "name": "Alice",
            "parentName": "Bob",
            "age": 1,
            "dob": "2023-01-01T00:00:00.000Z",
            "weight": 9.8,
            "height": 76.4,
            "measurementDate": "2024-06-01T09:30:00.000Z"
        }"#;
        let record: MeasurementRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.dob, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(record.measurement_date, taken_at());
    }

    #[test]
    fn test_record_rejects_bad_dob() {
        let json = r#"{"id":"x","name":"A","parentName":"B","age":1,"dob":"yesterday",
            "weight":1.0,"height":1.0,"measurementDate":"2024-06-01T09:30:00Z"}"#;
        let err = serde_json::from_str::<MeasurementRecord>(json).unwrap_err();
        assert!(err.to_string().contains("invalid date of birth"));
    }

    #[test]
    fn test_qr_payload_omits_id() {
        let record = MeasurementRecord::new(&alice(), ReadingSample::new(9.8, 76.0), taken_at());
        let json = record.qr_payload().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(value.get("id").is_none());
        assert_eq!(value["name"], "Alice");
        assert_eq!(value["parentName"], "Bob");
        assert_eq!(value["age"], 1);
        assert_eq!(value["dob"], "2023-01-01");
        assert_eq!(value["weight"], 9.8);
        assert_eq!(value["height"], 76.0);
        assert!(value.get("measurementDate").is_some());
    }
}
