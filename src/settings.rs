use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{encoder::Symbology, history::DEFAULT_HISTORY_CAP, models::DEFAULT_COPIES};

/// Values pre-filled into a new generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintDefaults {
    pub label_size: String,
    pub copies: u32,
    pub symbology: Symbology,
}

impl Default for PrintDefaults {
    fn default() -> Self {
        Self {
            label_size: "30mm".into(),
            copies: DEFAULT_COPIES,
            symbology: Symbology::UpcA,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserSettings {
    /// History key: a user id when configured, otherwise a per-install session id.
    scope: String,
    history_cap: usize,
    defaults: PrintDefaults,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            scope: Uuid::new_v4().to_string(),
            history_cap: DEFAULT_HISTORY_CAP,
            defaults: PrintDefaults::default(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Load settings from `path`, creating the file with defaults when it is
    /// missing so the generated scope id stays stable across runs. A corrupt
    /// file falls back to defaults and is left untouched.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable settings {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            let defaults = UserSettings::default();
            write_settings(&path, &defaults)?;
            defaults
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn scope(&self) -> String {
        self.read().scope.clone()
    }

    /// Maximum history length, never below 1.
    pub fn history_cap(&self) -> usize {
        self.read().history_cap.max(1)
    }

    pub fn defaults(&self) -> PrintDefaults {
        self.read().defaults.clone()
    }

    pub fn update_defaults(&self, defaults: PrintDefaults) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.defaults = defaults;
        write_settings(&self.path, &guard)
    }

    /// Bind history to an explicit user instead of the generated session id.
    pub fn set_scope(&self, scope: impl Into<String>) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.scope = scope.into();
        write_settings(&self.path, &guard)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_settings(path: &Path, data: &UserSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(data)?;
    fs::write(path, serialized)
        .with_context(|| format!("Failed to write settings to {}", path.display()))
}
