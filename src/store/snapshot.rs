use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::models::BarcodeEntry;

use super::decode_entries;

/// Key-value cache of serialized history lists, read only when the remote
/// store cannot be reached.
pub trait SnapshotStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<Vec<BarcodeEntry>>>;
    fn write(&self, key: &str, entries: &[BarcodeEntry]) -> Result<()>;
}

/// One pretty-printed JSON file per key.
pub struct JsonFileSnapshot {
    dir: PathBuf,
}

impl JsonFileSnapshot {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create snapshot directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_key: String = key
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' { ch } else { '_' })
            .collect();
        self.dir.join(format!("history_{file_key}.json"))
    }
}

impl SnapshotStore for JsonFileSnapshot {
    fn read(&self, key: &str) -> Result<Option<Vec<BarcodeEntry>>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let payload: serde_json::Value = serde_json::from_str(&contents)
            .with_context(|| format!("snapshot {} is not valid JSON", path.display()))?;
        let entries = decode_entries(payload)
            .with_context(|| format!("snapshot {} is malformed", path.display()))?;

        Ok(Some(entries))
    }

    fn write(&self, key: &str, entries: &[BarcodeEntry]) -> Result<()> {
        let path = self.path_for(key);
        let serialized = serde_json::to_string_pretty(entries)?;

        // Write-then-rename so a crash never leaves a truncated snapshot behind.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, serialized)
            .with_context(|| format!("failed to write snapshot {}", staging.display()))?;
        fs::rename(&staging, &path)
            .with_context(|| format!("failed to replace snapshot {}", path.display()))
    }
}
