//! History entry model and its wire boundary.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    encoder::{self, Symbology},
    error::ValidationError,
};

pub const DEFAULT_COPIES: u32 = 1;

/// One generated barcode. Immutable once built; every constructor runs the
/// symbology's shape check first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireEntry")]
pub struct BarcodeEntry {
    id: i64,
    value: String,
    symbology: Symbology,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label_size: Option<String>,
    copies: u32,
    created_at: DateTime<Utc>,
}

impl BarcodeEntry {
    pub fn from_parts(
        id: i64,
        draft: EntryDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let EntryDraft {
            value,
            symbology,
            display_name,
            label_size,
            copies,
        } = draft;

        encoder::ensure_valid(&value, symbology)?;

        Ok(Self {
            id,
            value,
            symbology,
            display_name: non_blank(display_name),
            label_size: non_blank(label_size),
            copies: normalize_copies(copies),
            created_at,
        })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn symbology(&self) -> Symbology {
        self.symbology
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn label_size(&self) -> Option<&str> {
        self.label_size.as_deref()
    }

    pub fn copies(&self) -> u32 {
        self.copies
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Field copy for pre-filling a new generation flow.
    pub fn to_draft(&self) -> EntryDraft {
        EntryDraft {
            value: self.value.clone(),
            symbology: self.symbology,
            display_name: self.display_name.clone(),
            label_size: self.label_size.clone(),
            copies: Some(i64::from(self.copies)),
        }
    }
}

/// Caller-supplied fields of a not-yet-created entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    pub value: String,
    pub symbology: Symbology,
    pub display_name: Option<String>,
    pub label_size: Option<String>,
    pub copies: Option<i64>,
}

impl EntryDraft {
    pub fn new(value: impl Into<String>, symbology: Symbology) -> Self {
        Self {
            value: value.into(),
            symbology,
            display_name: None,
            label_size: None,
            copies: None,
        }
    }

    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = name;
        self
    }

    pub fn with_label_size(mut self, size: Option<String>) -> Self {
        self.label_size = size;
        self
    }

    pub fn with_copies(mut self, copies: Option<i64>) -> Self {
        self.copies = copies;
        self
    }
}

/// Loosely typed entry as it arrives from a store or an imported file.
///
/// Every field is optional so that a missing `value` or `symbology` surfaces
/// as a [`ValidationError`] instead of a serde message. Accepts the legacy
/// `type`/`name`/`timestamp` keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEntry {
    pub id: Option<i64>,
    pub value: Option<String>,
    #[serde(alias = "type")]
    pub symbology: Option<String>,
    #[serde(alias = "name")]
    pub display_name: Option<String>,
    pub label_size: Option<String>,
    pub copies: Option<i64>,
    #[serde(alias = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TryFrom<WireEntry> for BarcodeEntry {
    type Error = ValidationError;

    fn try_from(wire: WireEntry) -> Result<Self, Self::Error> {
        let value = wire
            .value
            .filter(|value| !value.is_empty())
            .ok_or(ValidationError::MissingField("value"))?;
        let symbology: Symbology = wire
            .symbology
            .filter(|raw| !raw.trim().is_empty())
            .ok_or(ValidationError::MissingField("symbology"))?
            .parse()?;

        let created_at = wire.created_at.unwrap_or_else(Utc::now);
        let id = wire.id.unwrap_or_else(|| created_at.timestamp_millis());

        let draft = EntryDraft {
            value,
            symbology,
            display_name: wire.display_name,
            label_size: wire.label_size,
            copies: wire.copies,
        };

        BarcodeEntry::from_parts(id, draft, created_at)
    }
}

/// Hands out creation ids: the current millisecond timestamp, bumped past the
/// last issued (or observed) id so ids stay strictly increasing.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self, now: DateTime<Utc>) -> i64 {
        let candidate = now.timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        candidate.max(previous.saturating_add(1))
    }

    /// Record an id that came from elsewhere (a store, an import) so it is
    /// never handed out again.
    pub fn observe(&self, id: i64) {
        self.last.fetch_max(id, Ordering::SeqCst);
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn normalize_copies(copies: Option<i64>) -> u32 {
    match copies {
        Some(count) if count > 0 => u32::try_from(count).unwrap_or(u32::MAX),
        _ => DEFAULT_COPIES,
    }
}
