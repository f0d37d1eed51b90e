//! The local measurement store.
//!
//! All records live in one JSON array under a single storage key. Every
//! append reads the array, pushes the new record and writes the whole array
//! back; records are never edited or removed.

use tracing::{debug, error};

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::measurement::MeasurementRecord;
use crate::storage::Storage;

/// Append-only collection of measurement records.
#[derive(Debug)]
pub struct LocalStore {
    storage: Storage,
    key: String,
}

impl LocalStore {
    /// Create a store over `storage`, keeping records under `config.key`.
    #[must_use]
    pub fn new(storage: Storage, config: &StorageConfig) -> Self {
        Self {
            storage,
            key: config.key.clone(),
        }
    }

    /// Open a store backed by an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn in_memory(config: &StorageConfig) -> Result<Self> {
        Ok(Self::new(Storage::open_in_memory()?, config))
    }

    /// The key records are stored under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Append a record to the collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LocalPersist`] if the collection cannot be read or
    /// written. Nothing is written in that case.
    pub fn append(&self, record: &MeasurementRecord) -> Result<()> {
        let result = self.list_all().and_then(|mut records| {
            records.push(record.clone());
            let json = serde_json::to_string(&records)?;
            self.storage.set(&self.key, &json)
        });

        match result {
            Ok(()) => {
                debug!("Appended record {} under {}", record.id, self.key);
                Ok(())
            }
            Err(e) => {
                error!("Error saving measurement {}: {}", record.id, e);
                Err(Error::local_persist(&self.key, e.to_string()))
            }
        }
    }

    /// All records in insertion order.
    ///
    /// An absent key is an empty collection.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the stored document is not a
    /// valid record array.
    pub fn list_all(&self) -> Result<Vec<MeasurementRecord>> {
        match self.storage.get(&self.key)? {
            None => Ok(Vec::new()),
            Some(json) => Ok(serde_json::from_str(&json)?),
        }
    }

    /// Look a record up by its identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn find_by_id(&self, id: &str) -> Result<Option<MeasurementRecord>> {
        Ok(self.list_all()?.into_iter().find(|r| r.id == id))
    }

    /// Whether a record with this identifier exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.list_all()?.iter().any(|r| r.id == id))
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub fn count(&self) -> Result<usize> {
        Ok(self.list_all()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityRecord;
    use crate::measurement::ReadingSample;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn create_test_store() -> LocalStore {
        LocalStore::in_memory(&StorageConfig::default()).expect("failed to create test store")
    }

    fn record(name: &str, weight: f64) -> MeasurementRecord {
        let identity = IdentityRecord {
            name: name.to_string(),
            parent_name: "Parent".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2020, 3, 14).unwrap(),
            age: 4,
        };
        MeasurementRecord::new(
            &identity,
            ReadingSample::new(weight, 101.5),
            Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_empty_store() {
        let store = create_test_store();
        assert!(store.list_all().unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_append_preserves_insertion_order() {
        let store = create_test_store();
        let first = record("Zed", 16.0);
        let second = record("Amy", 15.0);
        store.append(&first).unwrap();
        store.append(&second).unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all, vec![first, second]);
    }

    #[test]
    fn test_find_by_id() {
        let store = create_test_store();
        let r = record("Alice", 12.3);
        store.append(&r).unwrap();
        store.append(&record("Other", 14.0)).unwrap();

        assert_eq!(store.find_by_id(&r.id).unwrap(), Some(r.clone()));
        assert!(store.contains(&r.id).unwrap());
        assert!(store.find_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_collection_stored_under_configured_key() {
        let config = StorageConfig {
            key: "ward_3".to_string(),
            ..StorageConfig::default()
        };
        let store = LocalStore::in_memory(&config).unwrap();
        store.append(&record("Alice", 12.3)).unwrap();

        assert_eq!(store.key(), "ward_3");
        assert_eq!(store.storage().keys().unwrap(), vec!["ward_3"]);
        let raw = store.storage().get("ward_3").unwrap().unwrap();
        assert!(raw.starts_with('['));
        assert!(raw.contains("\"parentName\":\"Parent\""));
    }

    #[test]
    fn test_serialized_collection_round_trips() {
        let store = create_test_store();
        store.append(&record("Alice", 12.3)).unwrap();
        store.append(&record("Bob", 0.0)).unwrap();
        let before = store.list_all().unwrap();

        let raw = store.storage().get(store.key()).unwrap().unwrap();
        let after: Vec<MeasurementRecord> = serde_json::from_str(&raw).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_reads_collection_written_by_web_client() {
        let store = create_test_store();
        store
            .storage()
            .set(
                store.key(),
                r#"[{"id":"a1","name":"Alice","parentName":"Bob","age":1,
                    "dob":"2023-01-01T00:00:00.000Z","weight":9.5,"height":75,
                    "measurementDate":"2024-06-01T09:30:00.000Z"}]"#,
            )
            .unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].height_cm, 75.0);

        store.append(&record("Carol", 20.0)).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_corrupt_collection_is_reported_not_overwritten() {
        let store = create_test_store();
        store.storage().set(store.key(), "{not json").unwrap();

        assert!(matches!(store.list_all(), Err(Error::Json(_))));

        let err = store.append(&record("Alice", 12.3)).unwrap_err();
        assert!(matches!(err, Error::LocalPersist { .. }));
        assert_eq!(
            store.storage().get(store.key()).unwrap().as_deref(),
            Some("{not json")
        );
    }

    #[test]
    fn test_append_fails_when_storage_unavailable() {
        let store = create_test_store();
        store
            .storage()
            .connection()
            .execute("DROP TABLE kv_entries", [])
            .unwrap();

        let err = store.append(&record("Alice", 12.3)).unwrap_err();
        assert!(matches!(err, Error::LocalPersist { ref key, .. } if key == "user_measurements"));
    }

    #[test]
    fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("measurements.db");
        let r = record("Alice", 12.3);

        {
            let store = LocalStore::new(Storage::open(&path).unwrap(), &StorageConfig::default());
            store.append(&r).unwrap();
        }

        let store = LocalStore::new(Storage::open(&path).unwrap(), &StorageConfig::default());
        assert_eq!(store.list_all().unwrap(), vec![r]);
    }
}
