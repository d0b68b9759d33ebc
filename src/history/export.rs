use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::BarcodeEntry;

/// Verbatim copy of a history collection, serialized as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportArchive(Vec<BarcodeEntry>);

impl ExportArchive {
    pub(crate) fn new(entries: Vec<BarcodeEntry>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[BarcodeEntry] {
        &self.0
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize history export")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let serialized = self.to_json_pretty()?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, serialized)
            .with_context(|| format!("failed to write export to {}", path.display()))
    }
}
