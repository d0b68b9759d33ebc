use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{parse_datetime, to_i64},
    },
    models::{BarcodeEntry, WireEntry},
};

const SELECT_COLUMNS: &str =
    "SELECT id, value, symbology, display_name, label_size, copies, created_at FROM history";

/// Rows are read back loosely; the caller decides whether they are
/// well-formed entries.
fn row_to_wire(row: &Row) -> Result<WireEntry> {
    let created_at: Option<String> = row.get("created_at")?;

    Ok(WireEntry {
        id: row.get("id")?,
        value: row.get("value")?,
        symbology: row.get("symbology")?,
        display_name: row.get("display_name")?,
        label_size: row.get("label_size")?,
        copies: row.get("copies")?,
        created_at: created_at
            .map(|raw| parse_datetime(&raw, "created_at"))
            .transpose()?,
    })
}

fn next_seq(conn: &Connection, scope: &str) -> Result<i64> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(seq) FROM history WHERE scope = ?1",
        params![scope],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0) + 1)
}

fn insert_row(conn: &Connection, scope: &str, seq: i64, entry: &BarcodeEntry) -> Result<usize> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO history
             (scope, id, seq, value, symbology, display_name, label_size, copies, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            scope,
            entry.id(),
            seq,
            entry.value(),
            entry.symbology().as_str(),
            entry.display_name(),
            entry.label_size(),
            i64::from(entry.copies()),
            entry.created_at().to_rfc3339(),
        ],
    )?;
    Ok(inserted)
}

fn trim_scope(conn: &Connection, scope: &str, cap: usize) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM history
         WHERE scope = ?1
           AND id NOT IN (
               SELECT id FROM history WHERE scope = ?1 ORDER BY seq DESC LIMIT ?2
           )",
        params![scope, to_i64(cap)?],
    )?;
    Ok(removed)
}

impl Database {
    /// Insert an entry at the front of `scope`'s list and trim the list to `cap`.
    ///
    /// Idempotent on `id`: re-sending an entry that is already stored leaves
    /// the row (and its position) untouched and returns the stored copy.
    pub async fn insert_history_entry(
        &self,
        scope: &str,
        entry: &BarcodeEntry,
        cap: usize,
    ) -> Result<WireEntry> {
        let scope = scope.to_string();
        let record = entry.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let seq = next_seq(&tx, &scope)?;
            insert_row(&tx, &scope, seq, &record)
                .with_context(|| format!("failed to insert history entry {}", record.id()))?;
            trim_scope(&tx, &scope, cap)?;

            let stored = tx
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE scope = ?1 AND id = ?2"),
                    params![scope, record.id()],
                    |row| Ok(row_to_wire(row)),
                )
                .optional()?
                .transpose()?;

            let stored = stored.ok_or_else(|| {
                anyhow!("history entry {} was trimmed on insert (cap {cap})", record.id())
            })?;
            tx.commit()?;
            Ok(stored)
        })
        .await
    }

    /// Newest-first history for `scope`, at most `limit` rows.
    pub async fn list_history(&self, scope: &str, limit: usize) -> Result<Vec<WireEntry>> {
        let scope = scope.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COLUMNS} WHERE scope = ?1 ORDER BY seq DESC LIMIT ?2"
            ))?;

            let mut rows = stmt.query(params![scope, to_i64(limit)?])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_wire(row)?);
            }

            Ok(entries)
        })
        .await
    }

    /// Replace `scope`'s list wholesale, keeping the given order (first = newest).
    pub async fn replace_history(
        &self,
        scope: &str,
        entries: &[BarcodeEntry],
        cap: usize,
    ) -> Result<usize> {
        let scope = scope.to_string();
        let records: Vec<BarcodeEntry> = entries.iter().take(cap).cloned().collect();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            tx.execute("DELETE FROM history WHERE scope = ?1", params![scope])
                .context("failed to clear history")?;

            let mut written = 0usize;
            // Oldest first so the first record ends up with the highest seq.
            for (seq, record) in records.iter().rev().enumerate() {
                written += insert_row(&tx, &scope, to_i64(seq + 1)?, record)?;
            }

            tx.commit()?;
            Ok(written)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;
    use crate::{encoder::Symbology, models::EntryDraft};

    fn entry(id: i64, value: &str) -> BarcodeEntry {
        let created_at = Utc.timestamp_millis_opt(id).unwrap();
        BarcodeEntry::from_parts(id, EntryDraft::new(value, Symbology::Code128), created_at)
            .unwrap()
    }

    fn open() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("history.sqlite3")).unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn insert_keeps_newest_first_and_trims() {
        let (_dir, db) = open();
        for id in 1..=5 {
            db.insert_history_entry("alice", &entry(id, &format!("CODE{id}")), 3)
                .await
                .unwrap();
        }

        let rows = db.list_history("alice", 10).await.unwrap();
        let ids: Vec<i64> = rows.iter().filter_map(|row| row.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }

    #[tokio::test]
    async fn insert_is_idempotent_on_id() {
        let (_dir, db) = open();
        db.insert_history_entry("alice", &entry(1, "FIRST1"), 10).await.unwrap();
        db.insert_history_entry("alice", &entry(2, "SECOND"), 10).await.unwrap();
        let stored = db
            .insert_history_entry("alice", &entry(1, "FIRST1"), 10)
            .await
            .unwrap();

        assert_eq!(stored.value.as_deref(), Some("FIRST1"));
        let ids: Vec<i64> = db
            .list_history("alice", 10)
            .await
            .unwrap()
            .iter()
            .filter_map(|row| row.id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let (_dir, db) = open();
        db.insert_history_entry("alice", &entry(1, "ALICE1"), 10).await.unwrap();
        db.insert_history_entry("bob", &entry(1, "BOB001"), 10).await.unwrap();

        let alice = db.list_history("alice", 10).await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].value.as_deref(), Some("ALICE1"));
    }

    #[tokio::test]
    async fn replace_preserves_given_order() {
        let (_dir, db) = open();
        db.insert_history_entry("alice", &entry(99, "STALE9"), 10).await.unwrap();

        let replacement = vec![entry(1, "AAAAAA"), entry(3, "CCCCCC"), entry(2, "BBBBBB")];
        let written = db.replace_history("alice", &replacement, 10).await.unwrap();
        assert_eq!(written, 3);

        let values: Vec<String> = db
            .list_history("alice", 10)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|row| row.value)
            .collect();
        assert_eq!(values, vec!["AAAAAA", "CCCCCC", "BBBBBB"]);
    }
}
