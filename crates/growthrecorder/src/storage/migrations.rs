//! Database migration system for growthrecorder.
//!
//! Migrations are listed in [`MIGRATIONS`] and applied in order, each one
//! inside its own transaction together with the version bump.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{Error, Result};

use super::schema::{CREATE_KV_TABLE, CREATE_METADATA_TABLE, CREATE_UPDATED_INDEX};

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

type Migration = fn(&Connection) -> Result<()>;

/// Ordered list of `(version, migration)` pairs.
const MIGRATIONS: &[(i32, Migration)] = &[(1, create_kv_table), (2, index_updated_at)];

/// The schema version a fully migrated database reports.
pub const CURRENT_VERSION: i32 = 2;

/// Bring the database schema up to [`CURRENT_VERSION`].
///
/// Safe to call on every open.
///
/// # Errors
///
/// Returns an error if a migration fails or the stored version is unreadable.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_METADATA_TABLE, [])?;

    let version = get_schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for &(target, migrate) in MIGRATIONS.iter().filter(|(v, _)| *v > version) {
        let tx = conn.unchecked_transaction()?;
        migrate(&tx)?;
        set_schema_version(&tx, target)?;
        tx.commit()?;
        info!("Migrated local store schema to version {}", target);
    }

    Ok(())
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (fresh database).
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(0),
        Some(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

fn create_kv_table(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_KV_TABLE, [])?;
    Ok(())
}

fn index_updated_at(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_UPDATED_INDEX, [])?;
    Ok(())
}
