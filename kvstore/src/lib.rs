//! SQLite-backed document store.
//!
//! Documents are JSON values addressed by `(collection, key)`. The connector keeps
//! its data product configs in the `configs` collection and its integration
//! templates in the `templates` collection, so operators can add or replace them
//! without touching the config directory.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

const TABLENAME: &str = "documents";
const COLLECTION_FIELD: &str = "collection";
const KEY_FIELD: &str = "key";
const VALUE_FIELD: &str = "value";

#[derive(Debug, thiserror::Error)]
pub enum DocDbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DocDbError>;

pub struct AccessRO;
pub struct AccessRW;

pub struct DocDb<AccessTag>(rusqlite::Connection, AccessTag);

pub type DocDbRW = DocDb<AccessRW>;
pub type DocDbRO = DocDb<AccessRO>;

// Methods common to read-only and read-write connections
impl<AccessTag> DocDb<AccessTag> {
    fn select(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.0
            .query_row(
                &format!(
                    "SELECT {VALUE_FIELD} FROM '{TABLENAME}' \
                     WHERE {COLLECTION_FIELD} = ?1 AND {KEY_FIELD} = ?2"
                ),
                [collection, key],
                |r| r.get::<_, Vec<u8>>(0),
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        collection: impl AsRef<str>,
        key: impl AsRef<str>,
    ) -> Result<Option<T>> {
        self.select(collection.as_ref(), key.as_ref())?
            .map(|v| serde_json::from_slice::<T>(&v))
            .transpose()
            .map_err(Into::into)
    }

    /// Keys of a collection in ascending order.
    pub fn keys(&self, collection: impl AsRef<str>) -> Result<Vec<String>> {
        let mut stmt = self.0.prepare(&format!(
            "SELECT {KEY_FIELD} FROM '{TABLENAME}' WHERE {COLLECTION_FIELD} = ?1 ORDER BY {KEY_FIELD}"
        ))?;
        let rows = stmt.query_map([collection.as_ref()], |r| r.get::<_, String>(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// All documents of a collection as `(key, document)` pairs.
    pub fn entries<T: DeserializeOwned>(
        &self,
        collection: impl AsRef<str>,
    ) -> Result<Vec<(String, T)>> {
        let mut stmt = self.0.prepare(&format!(
            "SELECT {KEY_FIELD}, {VALUE_FIELD} FROM '{TABLENAME}' \
             WHERE {COLLECTION_FIELD} = ?1 ORDER BY {KEY_FIELD}"
        ))?;
        let rows = stmt.query_map([collection.as_ref()], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, Vec<u8>>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (key, raw) = row?;
            out.push((key, serde_json::from_slice::<T>(&raw)?));
        }
        Ok(out)
    }
}

// Methods specific to read-only connection
impl DocDbRO {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        log::debug!("Opening document store {:?} read-only", path.as_ref());
        let connection = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(DocDb(connection, AccessRO))
    }
}

// Methods specific to read-write connection
impl DocDbRW {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        log::debug!("Opening document store {:?} read-write", path.as_ref());
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let connection = Connection::open(path)?;
        connection.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS '{TABLENAME}' (
                {COLLECTION_FIELD} TEXT NOT NULL,
                {KEY_FIELD} TEXT NOT NULL,
                {VALUE_FIELD} BLOB NOT NULL,
                PRIMARY KEY ({COLLECTION_FIELD}, {KEY_FIELD})
                )"
            ),
            [],
        )?;

        Ok(DocDb(connection, AccessRW))
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory()?;
        connection.execute(
            &format!(
                "CREATE TABLE '{TABLENAME}' (
                {COLLECTION_FIELD} TEXT NOT NULL,
                {KEY_FIELD} TEXT NOT NULL,
                {VALUE_FIELD} BLOB NOT NULL,
                PRIMARY KEY ({COLLECTION_FIELD}, {KEY_FIELD})
                )"
            ),
            [],
        )?;
        Ok(DocDb(connection, AccessRW))
    }

    fn upsert(&self, collection: &str, key: &str, value: &[u8]) -> Result<()> {
        let mut stmt = self.0.prepare(&format!(
            "INSERT INTO '{TABLENAME}' ({COLLECTION_FIELD}, {KEY_FIELD}, {VALUE_FIELD}) values (?1, ?2, ?3)
            ON CONFLICT({COLLECTION_FIELD}, {KEY_FIELD}) DO UPDATE SET {VALUE_FIELD}=?3",
        ))?;
        let res = stmt.execute(params![collection, key, value])?;
        log::trace!("Upserted {collection}/{key}: {res} row(s)");
        Ok(())
    }

    pub fn set<V: Serialize>(
        &self,
        collection: impl AsRef<str>,
        key: impl AsRef<str>,
        value: V,
    ) -> Result<()> {
        self.upsert(
            collection.as_ref(),
            key.as_ref(),
            &serde_json::to_vec(&value)?,
        )
    }

    /// Returns whether a document was removed.
    pub fn delete(&self, collection: impl AsRef<str>, key: impl AsRef<str>) -> Result<bool> {
        let n = self.0.execute(
            &format!(
                "DELETE FROM '{TABLENAME}' WHERE {COLLECTION_FIELD} = ?1 AND {KEY_FIELD} = ?2"
            ),
            [collection.as_ref(), key.as_ref()],
        )?;
        Ok(n > 0)
    }
}
