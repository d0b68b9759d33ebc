//! Collaborators the history manager talks to: the remote mirror and the
//! local fallback snapshot.

mod snapshot;
mod sqlite;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::StoreError,
    models::{BarcodeEntry, WireEntry},
};

pub use snapshot::{JsonFileSnapshot, SnapshotStore};
pub use sqlite::SqliteStore;

/// Remote persistence for a history list.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Full history, newest first.
    async fn fetch_all(&self) -> Result<Vec<BarcodeEntry>, StoreError>;

    /// Store one entry. Re-sending an already stored `id` is a no-op that
    /// returns the stored copy.
    async fn append(&self, entry: &BarcodeEntry) -> Result<BarcodeEntry, StoreError>;

    /// Overwrite the whole list. Returns how many entries were written.
    async fn replace_all(&self, entries: &[BarcodeEntry]) -> Result<usize, StoreError>;
}

/// Decode one loosely typed record, rejecting it rather than coercing.
pub fn decode_entry(wire: WireEntry) -> Result<BarcodeEntry, StoreError> {
    let id = wire.id;
    BarcodeEntry::try_from(wire).map_err(|err| match id {
        Some(id) => StoreError::malformed(format!("entry {id}: {err}")),
        None => StoreError::malformed(err.to_string()),
    })
}

/// Decode a JSON history payload. Anything but a list of well-formed entries
/// fails as a whole; nothing is partially applied.
pub fn decode_entries(payload: Value) -> Result<Vec<BarcodeEntry>, StoreError> {
    let Value::Array(items) = payload else {
        return Err(StoreError::malformed("expected a list of entries"));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let wire: WireEntry = serde_json::from_value(item)
                .map_err(|err| StoreError::malformed(format!("element {index}: {err}")))?;
            decode_entry(wire)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn non_list_payload_is_malformed() {
        let err = decode_entries(json!({ "ok": true })).unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn one_bad_element_rejects_the_whole_payload() {
        let payload = json!([
            { "id": 1, "value": "123456789012", "symbology": "UPC_A" },
            { "id": 2, "symbology": "UPC_A" },
        ]);
        let err = decode_entries(payload).unwrap_err();
        assert!(err.to_string().contains("value"), "{err}");
    }

    #[test]
    fn well_formed_payload_keeps_order() {
        let payload = json!([
            { "id": 2, "value": "ABCDEF", "symbology": "CODE128" },
            { "id": 1, "value": "4006381333931", "symbology": "EAN_13", "copies": 2 },
        ]);
        let entries = decode_entries(payload).unwrap();
        assert_eq!(entries.iter().map(BarcodeEntry::id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(entries[1].copies(), 2);
    }
}
