//! Threshold stores: where learned multipliers live between documents.
//!
//! [`InMemoryThresholdStore`] is the default; state resets with the process.
//! [`JsonFileThresholdStore`] writes every update through to a small JSON file
//! so learning survives restarts. Losing that file only resets learning to the
//! configured initial multiplier.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use crate::{
    Adjustment, Error, FeedbackSample, MultiplierState, Result, ThresholdConfig, ThresholdKey,
    ThresholdStore,
};

/// Learned multipliers held in process memory.
///
/// Reads share an `RwLock` read guard; updates take the write guard for the
/// whole read-modify-clamp-write, so concurrent updates serialize.
#[derive(Debug, Default)]
pub struct InMemoryThresholdStore {
    states: RwLock<HashMap<ThresholdKey, MultiplierState>>,
}

impl InMemoryThresholdStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with state.
    #[must_use]
    pub fn from_states(states: HashMap<ThresholdKey, MultiplierState>) -> Self {
        Self {
            states: RwLock::new(states),
        }
    }

    /// Snapshot of every learned multiplier.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<ThresholdKey, MultiplierState> {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply an update and run `after` on the post-update state while the
    /// write lock is still held. `after` must not block.
    fn update_with<F, T>(
        &self,
        key: ThresholdKey,
        sample: &FeedbackSample,
        config: &ThresholdConfig,
        after: F,
    ) -> (Adjustment, T)
    where
        F: FnOnce(&HashMap<ThresholdKey, MultiplierState>) -> T,
    {
        // A poisoned lock still holds a valid record: every field is written
        // before the guard can drop.
        let mut states = self
            .states
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let adjustment = states
            .entry(key)
            .or_insert_with(|| MultiplierState::new(config.initial_multiplier))
            .apply(key, sample, config);
        let extra = after(&states);
        (adjustment, extra)
    }
}

impl ThresholdStore for InMemoryThresholdStore {
    fn get(&self, key: ThresholdKey) -> Option<MultiplierState> {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    fn update(
        &self,
        key: ThresholdKey,
        sample: &FeedbackSample,
        config: &ThresholdConfig,
    ) -> Adjustment {
        self.update_with(key, sample, config, |_| ()).0
    }
}

/// Learned multipliers persisted to a JSON file.
///
/// The file maps key labels (`"global"`, `"resume"`, ...) to their state.
/// It is read once on open and rewritten after every update via a temporary
/// file and rename. Write failures are logged; the in-memory state stays
/// authoritative.
///
/// The file is written after the state lock is released, so readers never wait
/// on disk. Each update takes a version under the state lock; a snapshot older
/// than the last one written is skipped, so the file never moves backwards.
#[derive(Debug)]
pub struct JsonFileThresholdStore {
    path: PathBuf,
    inner: InMemoryThresholdStore,
    next_version: AtomicU64,
    /// Version of the last snapshot on disk. Held for the whole write.
    written: Mutex<u64>,
}

impl JsonFileThresholdStore {
    /// Open a store at `path`, loading any existing state.
    ///
    /// A missing file starts empty. A file that cannot be parsed is logged and
    /// replaced on the next update.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let states = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
            match Self::parse(&content) {
                Ok(states) => states,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to parse threshold state, starting fresh"
                    );
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        tracing::debug!(path = %path.display(), keys = states.len(), "threshold store opened");
        Ok(Self {
            path,
            inner: InMemoryThresholdStore::from_states(states),
            next_version: AtomicU64::new(1),
            written: Mutex::new(0),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(content: &str) -> Result<HashMap<ThresholdKey, MultiplierState>> {
        let raw: BTreeMap<String, MultiplierState> = serde_json::from_str(content)?;
        let mut states = HashMap::with_capacity(raw.len());
        for (label, state) in raw {
            match label.parse::<ThresholdKey>() {
                Ok(key) => {
                    states.insert(key, state);
                }
                Err(_) => tracing::warn!(label, "ignoring unknown threshold key"),
            }
        }
        Ok(states)
    }

    /// Write `snapshot` unless a newer version is already on disk.
    fn persist_version(&self, version: u64, snapshot: &BTreeMap<String, MultiplierState>) {
        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        if version <= *written {
            tracing::trace!(version, written = *written, "skipping stale threshold snapshot");
            return;
        }
        match self.persist(snapshot) {
            Ok(()) => *written = version,
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to persist threshold state"
            ),
        }
    }

    fn persist(&self, snapshot: &BTreeMap<String, MultiplierState>) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;

        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source| Error::Io {
            path: tmp.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl ThresholdStore for JsonFileThresholdStore {
    fn get(&self, key: ThresholdKey) -> Option<MultiplierState> {
        self.inner.get(key)
    }

    fn update(
        &self,
        key: ThresholdKey,
        sample: &FeedbackSample,
        config: &ThresholdConfig,
    ) -> Adjustment {
        let (adjustment, (version, snapshot)) =
            self.inner.update_with(key, sample, config, |states| {
                let version = self.next_version.fetch_add(1, Ordering::Relaxed);
                let snapshot: BTreeMap<String, MultiplierState> = states
                    .iter()
                    .map(|(key, state)| (key.to_string(), state.clone()))
                    .collect();
                (version, snapshot)
            });
        self.persist_version(version, &snapshot);
        adjustment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AdaptiveThreshold, DocumentType};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn useful() -> FeedbackSample {
        FeedbackSample::new(0.95, 0.97, 3, 3)
    }

    #[test]
    fn test_empty_store_has_no_state() {
        let store = InMemoryThresholdStore::new();
        assert!(store.get(ThresholdKey::Global).is_none());
    }

    #[test]
    fn test_update_creates_state_from_initial() {
        let store = InMemoryThresholdStore::new();
        let config = ThresholdConfig::default();
        let adjustment = store.update(ThresholdKey::Global, &useful(), &config);

        assert_eq!(adjustment.before, 0.3);
        assert!((adjustment.after - 0.29).abs() < 1e-6);
        assert_eq!(store.get(ThresholdKey::Global).unwrap().value, adjustment.after);
    }

    #[test]
    fn test_concurrent_updates_serialize() {
        let store = Arc::new(InMemoryThresholdStore::new());
        let config = Arc::new(ThresholdConfig::default().with_learning_rate(0.001));
        let key = ThresholdKey::Type(DocumentType::General);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let config = Arc::clone(&config);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        store.update(key, &useful(), &config);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let state = store.get(key).unwrap();
        assert_eq!(state.total_updates, 80);
        assert_eq!(state.useful_count, 80);
        assert!((state.value - 0.22).abs() < 1e-4);
    }

    #[test]
    fn test_snapshot_lists_every_key() {
        let store = InMemoryThresholdStore::new();
        let config = ThresholdConfig::default();
        store.update(ThresholdKey::Global, &useful(), &config);
        store.update(ThresholdKey::Type(DocumentType::Resume), &useful(), &config);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&ThresholdKey::Global].total_updates, 1);
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileThresholdStore::open(dir.path().join("state.json")).unwrap();
        assert!(store.get(ThresholdKey::Global).is_none());
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileThresholdStore::open(&path).unwrap();
        assert!(store.get(ThresholdKey::Global).is_none());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let config = ThresholdConfig::default();
        let key = ThresholdKey::Type(DocumentType::Resume);

        {
            let store = JsonFileThresholdStore::open(&path).unwrap();
            store.update(key, &useful(), &config);
            store.update(key, &useful(), &config);
        }

        let reopened = JsonFileThresholdStore::open(&path).unwrap();
        let state = reopened.get(key).unwrap();
        assert_eq!(state.total_updates, 2);
        assert!((state.value - 0.28).abs() < 1e-6);
        assert!(reopened.get(ThresholdKey::Global).is_none());
    }

    #[test]
    fn test_file_uses_readable_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileThresholdStore::open(&path).unwrap();
        store.update(
            ThresholdKey::Type(DocumentType::AcademicPaper),
            &useful(),
            &ThresholdConfig::default(),
        );

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"academic_paper\""));
    }

    #[test]
    fn test_decide_does_not_wait_on_file_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileThresholdStore::open(dir.path().join("state.json")).unwrap());
        let threshold =
            AdaptiveThreshold::with_store(ThresholdConfig::default(), store.clone()).unwrap();

        // Holding the writer slot stalls the file write of the next update.
        let stalled = store.written.lock().unwrap();
        let writer = {
            let threshold = threshold.clone();
            std::thread::spawn(move || {
                threshold.apply_feedback(DocumentType::General, &useful());
            })
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while threshold.multiplier(DocumentType::General) >= 0.3 {
            assert!(Instant::now() < deadline, "update never became visible");
            std::thread::sleep(Duration::from_millis(1));
        }
        let decision = threshold.decide(&[0.9, 0.8, 0.1], DocumentType::Resume);
        assert_eq!(decision.multiplier, 0.3);
        assert!(!store.path().exists());

        drop(stalled);
        writer.join().unwrap();
        let reopened = JsonFileThresholdStore::open(store.path()).unwrap();
        assert_eq!(
            reopened
                .get(ThresholdKey::Type(DocumentType::General))
                .unwrap()
                .total_updates,
            1
        );
    }

    #[test]
    fn test_stale_snapshot_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileThresholdStore::open(&path).unwrap();
        store.update(ThresholdKey::Global, &useful(), &ThresholdConfig::default());
        let on_disk = std::fs::read_to_string(&path).unwrap();

        store.persist_version(1, &BTreeMap::new());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), on_disk);

        store.persist_version(2, &BTreeMap::new());
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "{}");
    }
}
