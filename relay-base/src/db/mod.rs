use std::{path::Path, sync::Arc};

use eyre::WrapErr;
use relay_core::StoreError;
use rocksdb::{Options, DB as Rocks};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

pub use memory::*;
pub use rocks_store::*;

mod memory;
mod rocks_store;

#[derive(Debug, Clone)]
/// A KV Store
pub struct DB(Arc<Rocks>);

impl From<Rocks> for DB {
    fn from(rocks: Rocks) -> Self {
        Self(Arc::new(rocks))
    }
}

/// DB Error type
#[derive(thiserror::Error, Debug)]
pub enum DbError {
    /// Rocks DB Error
    #[error("{0}")]
    RockError(#[from] rocksdb::Error),
    /// Value (de)serialization error
    #[error("{0}")]
    EncodingError(#[from] serde_json::Error),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::EncodingError(err) => StoreError::Encoding(err),
            err => StoreError::Backend(Box::new(err)),
        }
    }
}

type Result<T> = std::result::Result<T, DbError>;

impl DB {
    /// Opens db at `db_path` and creates if missing
    #[tracing::instrument(err)]
    pub fn from_path(db_path: &Path) -> eyre::Result<DB> {
        match db_path.is_dir() {
            true => info!(path = ?db_path, "Opening existing db"),
            false => info!(path = ?db_path, "Creating db"),
        }

        let mut opts = Options::default();
        opts.create_if_missing(true);

        Rocks::open(&opts, db_path)
            .wrap_err(format!("Failed to open db path {db_path:?}"))
            .map(Into::into)
    }

    fn prefixed_key(prefix: impl AsRef<[u8]>, key: impl AsRef<[u8]>) -> Vec<u8> {
        let mut buf = vec![];
        buf.extend(prefix.as_ref());
        buf.extend(key.as_ref());
        buf
    }

    /// Prefix a key and store in the DB
    pub fn prefix_store(
        &self,
        prefix: impl AsRef<[u8]>,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<()> {
        Ok(self.0.put(Self::prefixed_key(prefix, key), value)?)
    }

    /// Prefix the key and retrieve
    pub fn prefix_retrieve(
        &self,
        prefix: impl AsRef<[u8]>,
        key: impl AsRef<[u8]>,
    ) -> Result<Option<Vec<u8>>> {
        Ok(self.0.get(Self::prefixed_key(prefix, key))?)
    }

    /// Store a value as JSON
    pub fn store_json<V: Serialize>(
        &self,
        prefix: impl AsRef<[u8]>,
        key: impl AsRef<[u8]>,
        value: &V,
    ) -> Result<()> {
        self.prefix_store(prefix, key, serde_json::to_vec(value)?)
    }

    /// Retrieve and decode a JSON value
    pub fn retrieve_json<V: DeserializeOwned>(
        &self,
        prefix: impl AsRef<[u8]>,
        key: impl AsRef<[u8]>,
    ) -> Result<Option<V>> {
        Ok(self
            .prefix_retrieve(prefix, key)?
            .map(|val| serde_json::from_slice(&val))
            .transpose()?)
    }
}

/// Run `f` against a fresh db in a temporary directory.
#[cfg(test)]
pub(crate) async fn run_test_db<T, Fut>(f: T) -> Fut::Output
where
    T: FnOnce(DB) -> Fut,
    Fut: std::future::Future,
{
    let db_tmp_dir = tempfile::TempDir::new().unwrap();
    let db = DB::from_path(db_tmp_dir.path()).unwrap();
    f(db).await
}
