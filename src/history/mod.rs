//! Bounded, newest-first history with optimistic local commits and a remote
//! mirror.
//!
//! The manager is the only owner of the collection. Every mutation happens
//! synchronously on `&mut self`; remote work runs in tracked background tasks
//! whose results go to the [`ObservabilitySink`] and never back into the
//! collection. A completed `fetch_history` overwrites whatever is local.

mod export;
pub mod search;
mod sink;

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::{
    error::ValidationError,
    models::{BarcodeEntry, EntryDraft, IdGenerator},
    store::{RemoteStore, SnapshotStore},
};

pub use export::ExportArchive;
pub use sink::{LogSink, ObservabilitySink, Operation};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

pub const DEFAULT_HISTORY_CAP: usize = 200;

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Key of the list in the remote store and the snapshot (user or session id).
    pub scope: String,
    /// Maximum retained entries; values below 1 are raised to 1.
    pub cap: usize,
}

impl HistoryConfig {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            cap: DEFAULT_HISTORY_CAP,
        }
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }
}

/// Where the collection came from after [`HistoryManager::fetch_history`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Remote { count: usize },
    Snapshot { count: usize },
    Unchanged,
}

/// Handle on a background persist. Dropping it leaves the task running.
#[must_use = "dropping the handle is fine, but await `confirmed` to wait for the remote"]
pub struct PendingPersist {
    handle: JoinHandle<()>,
}

impl PendingPersist {
    /// Wait until the remote call finished and the sink was told.
    pub async fn confirmed(self) {
        if let Err(err) = self.handle.await {
            log_error!("history persist task ended abnormally: {err}");
        }
    }
}

pub struct HistoryManager {
    scope: String,
    cap: usize,
    entries: Vec<BarcodeEntry>,
    ids: IdGenerator,
    remote: Arc<dyn RemoteStore>,
    snapshot: Arc<dyn SnapshotStore>,
    sink: Arc<dyn ObservabilitySink>,
    tasks: TaskTracker,
}

impl HistoryManager {
    pub fn new(
        config: HistoryConfig,
        remote: Arc<dyn RemoteStore>,
        snapshot: Arc<dyn SnapshotStore>,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Self {
        Self {
            scope: config.scope,
            cap: config.cap.max(1),
            entries: Vec::new(),
            ids: IdGenerator::new(),
            remote,
            snapshot,
            sink,
            tasks: TaskTracker::new(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Current collection, newest first.
    pub fn entries(&self) -> &[BarcodeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&BarcodeEntry> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    /// Build an entry with a fresh id and the current time. Does not append it.
    pub fn new_entry(&self, draft: EntryDraft) -> Result<BarcodeEntry, ValidationError> {
        let now = Utc::now();
        BarcodeEntry::from_parts(self.ids.next_id(now), draft, now)
    }

    /// Commit `entry` at the front, trim to the cap, then persist it in the
    /// background. The local commit is never rolled back.
    ///
    /// Must be called from within a tokio runtime.
    pub fn append(&mut self, entry: BarcodeEntry) -> PendingPersist {
        self.ids.observe(entry.id());
        self.entries.retain(|existing| existing.id() != entry.id());
        self.entries.insert(0, entry.clone());
        self.entries.truncate(self.cap);
        self.write_snapshot();

        let remote = Arc::clone(&self.remote);
        let sink = Arc::clone(&self.sink);
        let handle = self.tasks.spawn(async move {
            match remote.append(&entry).await {
                Ok(stored) => sink.saved(&stored),
                Err(err) => sink.failed(Operation::Append, &err),
            }
        });

        PendingPersist { handle }
    }

    /// Load the full history from the remote store, falling back to the local
    /// snapshot when the remote fails. Never merges the two.
    pub async fn fetch_history(&mut self) -> FetchOutcome {
        match self.remote.fetch_all().await {
            Ok(entries) => {
                self.install(entries);
                self.write_snapshot();
                log_debug!("loaded {} history entries for {}", self.len(), self.scope);
                FetchOutcome::Remote { count: self.len() }
            }
            Err(err) => {
                self.sink.failed(Operation::FetchAll, &err);
                self.load_snapshot()
            }
        }
    }

    /// Read-only filter over the current collection.
    pub fn search(&self, query: &str) -> Vec<&BarcodeEntry> {
        search::filter(&self.entries, query)
    }

    /// Verbatim copy of the collection, or `None` when there is nothing to export.
    pub fn export_snapshot(&self) -> Option<ExportArchive> {
        if self.entries.is_empty() {
            return None;
        }
        Some(ExportArchive::new(self.entries.clone()))
    }

    /// Fields of entry `id` for pre-filling a new generation. The collection
    /// is untouched; a new entry only appears once the caller appends one.
    pub fn reprint(&self, id: i64) -> Option<EntryDraft> {
        self.get(id).map(BarcodeEntry::to_draft)
    }

    /// Replace the collection wholesale (truncated to the cap) and mirror the
    /// replacement to the remote store in the background.
    pub fn replace_all(&mut self, entries: Vec<BarcodeEntry>) -> PendingPersist {
        self.install(entries);
        self.write_snapshot();

        let remote = Arc::clone(&self.remote);
        let sink = Arc::clone(&self.sink);
        let replacement = self.entries.clone();
        let handle = self.tasks.spawn(async move {
            match remote.replace_all(&replacement).await {
                Ok(count) => log_info!("replaced remote history with {count} entries"),
                Err(err) => sink.failed(Operation::ReplaceAll, &err),
            }
        });

        PendingPersist { handle }
    }

    /// Wait for every background persist issued so far.
    pub async fn flush(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    fn install(&mut self, mut entries: Vec<BarcodeEntry>) {
        entries.truncate(self.cap);
        for entry in &entries {
            self.ids.observe(entry.id());
        }
        self.entries = entries;
    }

    fn load_snapshot(&mut self) -> FetchOutcome {
        match self.snapshot.read(&self.scope) {
            Ok(Some(entries)) if !entries.is_empty() => {
                self.install(entries);
                log_info!(
                    "remote history unavailable; using {} cached entries",
                    self.len()
                );
                FetchOutcome::Snapshot { count: self.len() }
            }
            Ok(_) => FetchOutcome::Unchanged,
            Err(err) => {
                self.sink.failed(Operation::SnapshotRead, &format_args!("{err:#}"));
                FetchOutcome::Unchanged
            }
        }
    }

    fn write_snapshot(&self) {
        if let Err(err) = self.snapshot.write(&self.scope, &self.entries) {
            self.sink.failed(Operation::SnapshotWrite, &format_args!("{err:#}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        fmt,
        sync::{
            atomic::{AtomicBool, Ordering},
            Mutex,
        },
    };

    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tokio::sync::Semaphore;

    use super::*;
    use crate::{encoder::Symbology, error::StoreError};

    #[derive(Default)]
    struct FakeRemote {
        stored: Mutex<Vec<BarcodeEntry>>,
        fail_fetch: AtomicBool,
        malformed_fetch: AtomicBool,
        fail_append: AtomicBool,
        gate: Option<Semaphore>,
    }

    impl FakeRemote {
        fn gated() -> Self {
            Self {
                gate: Some(Semaphore::new(0)),
                ..Self::default()
            }
        }

        fn with_entries(entries: Vec<BarcodeEntry>) -> Self {
            Self {
                stored: Mutex::new(entries),
                ..Self::default()
            }
        }

        fn stored_ids(&self) -> Vec<i64> {
            self.stored.lock().unwrap().iter().map(BarcodeEntry::id).collect()
        }
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn fetch_all(&self) -> Result<Vec<BarcodeEntry>, StoreError> {
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(StoreError::Persistence(anyhow!("connection refused")));
            }
            if self.malformed_fetch.load(Ordering::SeqCst) {
                return Err(StoreError::malformed("expected a list of entries"));
            }
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn append(&self, entry: &BarcodeEntry) -> Result<BarcodeEntry, StoreError> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.fail_append.load(Ordering::SeqCst) {
                return Err(StoreError::Persistence(anyhow!("HTTP 503")));
            }
            self.stored.lock().unwrap().insert(0, entry.clone());
            Ok(entry.clone())
        }

        async fn replace_all(&self, entries: &[BarcodeEntry]) -> Result<usize, StoreError> {
            *self.stored.lock().unwrap() = entries.to_vec();
            Ok(entries.len())
        }
    }

    #[derive(Default)]
    struct MemorySnapshot {
        lists: Mutex<HashMap<String, Vec<BarcodeEntry>>>,
    }

    impl MemorySnapshot {
        fn with(key: &str, entries: Vec<BarcodeEntry>) -> Self {
            let snapshot = Self::default();
            snapshot.lists.lock().unwrap().insert(key.to_string(), entries);
            snapshot
        }
    }

    impl SnapshotStore for MemorySnapshot {
        fn read(&self, key: &str) -> anyhow::Result<Option<Vec<BarcodeEntry>>> {
            Ok(self.lists.lock().unwrap().get(key).cloned())
        }

        fn write(&self, key: &str, entries: &[BarcodeEntry]) -> anyhow::Result<()> {
            self.lists
                .lock()
                .unwrap()
                .insert(key.to_string(), entries.to_vec());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        failures: Mutex<Vec<(Operation, String)>>,
        saved: Mutex<Vec<i64>>,
    }

    impl ObservabilitySink for RecordingSink {
        fn failed(&self, operation: Operation, error: &dyn fmt::Display) {
            self.failures
                .lock()
                .unwrap()
                .push((operation, error.to_string()));
        }

        fn saved(&self, entry: &BarcodeEntry) {
            self.saved.lock().unwrap().push(entry.id());
        }
    }

    impl RecordingSink {
        fn failed_operations(&self) -> Vec<Operation> {
            self.failures.lock().unwrap().iter().map(|(op, _)| *op).collect()
        }
    }

    struct Harness {
        manager: HistoryManager,
        remote: Arc<FakeRemote>,
        snapshot: Arc<MemorySnapshot>,
        sink: Arc<RecordingSink>,
    }

    fn harness(remote: FakeRemote, snapshot: MemorySnapshot, cap: usize) -> Harness {
        let remote = Arc::new(remote);
        let snapshot = Arc::new(snapshot);
        let sink = Arc::new(RecordingSink::default());
        let manager = HistoryManager::new(
            HistoryConfig::new("user-1").with_cap(cap),
            remote.clone(),
            snapshot.clone(),
            sink.clone(),
        );
        Harness {
            manager,
            remote,
            snapshot,
            sink,
        }
    }

    fn entry(id: i64, value: &str, symbology: Symbology, name: Option<&str>) -> BarcodeEntry {
        let draft = EntryDraft::new(value, symbology).with_display_name(name.map(String::from));
        BarcodeEntry::from_parts(id, draft, Utc.timestamp_millis_opt(id).unwrap()).unwrap()
    }

    fn code(id: i64) -> BarcodeEntry {
        entry(id, &format!("ITEM{id:04}"), Symbology::Code128, None)
    }

    #[tokio::test]
    async fn append_is_visible_before_the_remote_confirms() {
        let mut h = harness(FakeRemote::gated(), MemorySnapshot::default(), 200);

        let pending = h.manager.append(code(1));
        assert_eq!(h.manager.len(), 1);
        assert_eq!(h.manager.entries()[0].id(), 1);
        assert!(h.remote.stored_ids().is_empty());

        h.remote.gate.as_ref().unwrap().add_permits(1);
        pending.confirmed().await;
        assert_eq!(h.remote.stored_ids(), vec![1]);
        assert_eq!(*h.sink.saved.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn appends_are_capped_to_the_most_recent() {
        let mut h = harness(FakeRemote::default(), MemorySnapshot::default(), 200);

        for id in 1..=250 {
            let _ = h.manager.append(code(id));
            assert!(h.manager.len() <= 200);
            assert_eq!(h.manager.len(), (id as usize).min(200));
        }
        h.manager.flush().await;

        let ids: Vec<i64> = h.manager.entries().iter().map(BarcodeEntry::id).collect();
        let expected: Vec<i64> = (51..=250).rev().collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn failed_append_is_logged_not_rolled_back() {
        let remote = FakeRemote::default();
        remote.fail_append.store(true, Ordering::SeqCst);
        let mut h = harness(remote, MemorySnapshot::default(), 200);

        h.manager.append(code(7)).confirmed().await;

        assert_eq!(h.manager.entries()[0].id(), 7);
        assert_eq!(h.sink.failed_operations(), vec![Operation::Append]);
        assert!(h.sink.saved.lock().unwrap().is_empty());
        assert!(h.sink.failures.lock().unwrap()[0].1.contains("503"));
    }

    #[tokio::test]
    async fn append_with_known_id_moves_it_to_the_front() {
        let mut h = harness(FakeRemote::default(), MemorySnapshot::default(), 200);
        let _ = h.manager.append(code(1));
        let _ = h.manager.append(code(2));
        let _ = h.manager.append(code(1));
        h.manager.flush().await;

        let ids: Vec<i64> = h.manager.entries().iter().map(BarcodeEntry::id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn append_refreshes_the_snapshot() {
        let mut h = harness(FakeRemote::default(), MemorySnapshot::default(), 200);
        h.manager.append(code(3)).confirmed().await;

        let cached = h.snapshot.read("user-1").unwrap().unwrap();
        assert_eq!(cached, vec![code(3)]);
    }

    #[tokio::test]
    async fn fetch_replaces_local_state_with_remote_order() {
        let remote = FakeRemote::with_entries(vec![code(30), code(10), code(20)]);
        let mut h = harness(remote, MemorySnapshot::default(), 200);
        let _ = h.manager.append(code(99));
        h.manager.flush().await;

        // The fake stored 99 at the front during the append.
        let outcome = h.manager.fetch_history().await;
        assert_eq!(outcome, FetchOutcome::Remote { count: 4 });
        let ids: Vec<i64> = h.manager.entries().iter().map(BarcodeEntry::id).collect();
        assert_eq!(ids, vec![99, 30, 10, 20]);
    }

    #[tokio::test]
    async fn fetch_result_is_truncated_to_the_cap() {
        let remote = FakeRemote::with_entries((1..=10).rev().map(code).collect());
        let mut h = harness(remote, MemorySnapshot::default(), 4);

        assert_eq!(
            h.manager.fetch_history().await,
            FetchOutcome::Remote { count: 4 }
        );
        let ids: Vec<i64> = h.manager.entries().iter().map(BarcodeEntry::id).collect();
        assert_eq!(ids, vec![10, 9, 8, 7]);
    }

    #[tokio::test]
    async fn failed_fetch_falls_back_to_exact_snapshot() {
        let remote = FakeRemote::with_entries(vec![code(100)]);
        remote.fail_fetch.store(true, Ordering::SeqCst);
        let cached = vec![code(3), code(2), code(1)];
        let mut h = harness(remote, MemorySnapshot::with("user-1", cached.clone()), 200);

        let outcome = h.manager.fetch_history().await;

        assert_eq!(outcome, FetchOutcome::Snapshot { count: 3 });
        assert_eq!(h.manager.entries(), cached.as_slice());
        assert_eq!(h.sink.failed_operations(), vec![Operation::FetchAll]);
    }

    #[tokio::test]
    async fn malformed_fetch_takes_the_fallback_path() {
        let remote = FakeRemote::default();
        remote.malformed_fetch.store(true, Ordering::SeqCst);
        let mut h = harness(remote, MemorySnapshot::with("user-1", vec![code(5)]), 200);

        assert_eq!(
            h.manager.fetch_history().await,
            FetchOutcome::Snapshot { count: 1 }
        );
        assert!(h.sink.failures.lock().unwrap()[0].1.contains("malformed"));
    }

    #[tokio::test]
    async fn failed_fetch_without_snapshot_keeps_current_state() {
        let remote = FakeRemote::default();
        remote.fail_fetch.store(true, Ordering::SeqCst);
        let mut h = harness(remote, MemorySnapshot::default(), 200);
        h.manager.append(code(1)).confirmed().await;

        // Append wrote a one-entry snapshot; clear it to model "no snapshot".
        h.snapshot.lists.lock().unwrap().clear();
        assert_eq!(h.manager.fetch_history().await, FetchOutcome::Unchanged);
        assert_eq!(h.manager.len(), 1);

        // An empty snapshot is treated the same as none.
        h.snapshot.write("user-1", &[]).unwrap();
        assert_eq!(h.manager.fetch_history().await, FetchOutcome::Unchanged);
        assert_eq!(h.manager.len(), 1);
    }

    #[tokio::test]
    async fn new_entries_never_reuse_loaded_ids() {
        let far_future = Utc::now().timestamp_millis() + 86_400_000;
        let remote = FakeRemote::with_entries(vec![code(far_future)]);
        let mut h = harness(remote, MemorySnapshot::default(), 200);
        h.manager.fetch_history().await;

        let fresh = h
            .manager
            .new_entry(EntryDraft::new("ABCDEF", Symbology::Code128))
            .unwrap();
        assert!(fresh.id() > far_future);
    }

    #[tokio::test]
    async fn search_matches_names_and_keeps_order_for_empty_query() {
        let mut h = harness(FakeRemote::default(), MemorySnapshot::default(), 200);
        let _ = h.manager.append(entry(1, "4006381333931", Symbology::Ean13, Some("Gadget")));
        let _ = h.manager.append(entry(2, "123456789012", Symbology::UpcA, Some("Widget A")));
        let _ = h.manager.append(code(3));
        h.manager.flush().await;

        let hits = h.manager.search("widget");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].display_name(), Some("Widget A"));

        let all: Vec<i64> = h.manager.search("").iter().map(|e| e.id()).collect();
        assert_eq!(all, vec![3, 2, 1]);
        assert_eq!(h.manager.len(), 3);
    }

    #[tokio::test]
    async fn export_is_none_when_empty_and_verbatim_otherwise() {
        let mut h = harness(FakeRemote::default(), MemorySnapshot::default(), 200);
        assert!(h.manager.export_snapshot().is_none());

        let _ = h.manager.append(code(1));
        let _ = h.manager.append(code(2));
        h.manager.flush().await;

        let archive = h.manager.export_snapshot().unwrap();
        assert_eq!(archive.entries(), h.manager.entries());
        let json: serde_json::Value = serde_json::from_str(&archive.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reprint_copies_fields_without_appending() {
        let mut h = harness(FakeRemote::default(), MemorySnapshot::default(), 200);
        let original = entry(8, "123456789012", Symbology::UpcA, Some("Widget A"));
        h.manager.append(original.clone()).confirmed().await;

        assert!(h.manager.reprint(404).is_none());
        let draft = h.manager.reprint(8).unwrap();
        assert_eq!(draft, original.to_draft());
        assert_eq!(h.manager.len(), 1);
    }

    #[tokio::test]
    async fn replace_all_swaps_local_and_remote() {
        let remote = FakeRemote::with_entries(vec![code(1)]);
        let mut h = harness(remote, MemorySnapshot::default(), 2);

        h.manager
            .replace_all(vec![code(9), code(8), code(7)])
            .confirmed()
            .await;

        let ids: Vec<i64> = h.manager.entries().iter().map(BarcodeEntry::id).collect();
        assert_eq!(ids, vec![9, 8]);
        assert_eq!(h.remote.stored_ids(), vec![9, 8]);
    }

    #[tokio::test]
    async fn zero_cap_is_raised_to_one() {
        let mut h = harness(FakeRemote::default(), MemorySnapshot::default(), 0);
        let _ = h.manager.append(code(1));
        let _ = h.manager.append(code(2));
        h.manager.flush().await;
        assert_eq!(h.manager.cap(), 1);
        assert_eq!(h.manager.entries()[0].id(), 2);
    }
}
