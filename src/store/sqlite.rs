use async_trait::async_trait;

use crate::{
    db::Database,
    error::StoreError,
    models::BarcodeEntry,
};

use super::{decode_entry, RemoteStore};

/// History mirror backed by the crate's SQLite database, one list per scope.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
    scope: String,
    cap: usize,
}

impl SqliteStore {
    /// A `cap` below 1 is raised to 1, matching the in-memory history.
    pub fn new(db: Database, scope: impl Into<String>, cap: usize) -> Self {
        Self {
            db,
            scope: scope.into(),
            cap: cap.max(1),
        }
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn fetch_all(&self) -> Result<Vec<BarcodeEntry>, StoreError> {
        let rows = self.db.list_history(&self.scope, self.cap).await?;
        rows.into_iter().map(decode_entry).collect()
    }

    async fn append(&self, entry: &BarcodeEntry) -> Result<BarcodeEntry, StoreError> {
        let stored = self
            .db
            .insert_history_entry(&self.scope, entry, self.cap)
            .await?;
        decode_entry(stored)
    }

    async fn replace_all(&self, entries: &[BarcodeEntry]) -> Result<usize, StoreError> {
        Ok(self.db.replace_history(&self.scope, entries, self.cap).await?)
    }
}
