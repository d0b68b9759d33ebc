mod commands;
pub mod db;
pub mod encoder;
pub mod error;
pub mod history;
pub mod models;
pub mod render;
pub mod settings;
pub mod store;
mod utils;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use commands::{Cli, NoticeSink};
use db::Database;
use history::{FetchOutcome, HistoryConfig, HistoryManager};
use render::PngRenderer;
use settings::SettingsStore;
use store::{JsonFileSnapshot, SqliteStore};

pub use utils::logging::init_logging;

pub(crate) struct App {
    pub(crate) settings: SettingsStore,
    pub(crate) history: HistoryManager,
    pub(crate) renderer: PngRenderer,
    // Keeps the worker thread alive for the lifetime of the app.
    _db: Database,
}

impl App {
    /// Open the data directory, wire the history manager to its stores and
    /// run the initial bulk load.
    pub(crate) async fn open(data_dir: &Path, user: Option<&str>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        if let Some(user) = user {
            settings.set_scope(user)?;
        }

        let database = Database::new(data_dir.join("barcodegen.sqlite3"))?;
        let scope = settings.scope();
        let cap = settings.history_cap();

        let remote = Arc::new(SqliteStore::new(database.clone(), scope.clone(), cap));
        let snapshot = Arc::new(JsonFileSnapshot::new(data_dir.join("snapshots"))?);
        let mut history = HistoryManager::new(
            HistoryConfig::new(scope).with_cap(cap),
            remote,
            snapshot,
            Arc::new(NoticeSink::default()),
        );

        match history.fetch_history().await {
            FetchOutcome::Remote { count } => info!("Loaded {count} history entries"),
            FetchOutcome::Snapshot { count } => {
                warn!("History store unavailable; showing {count} cached entries")
            }
            FetchOutcome::Unchanged => warn!("History store unavailable; starting empty"),
        }

        Ok(Self {
            settings,
            history,
            renderer: PngRenderer::default(),
            _db: database,
        })
    }
}

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    init_logging();

    let cli = Cli::parse();
    log::debug!("barcodegen starting up...");

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(commands::dispatch(cli))
}
