//! Persistence adapter over a synchronous string key-value store.
//!
//! The playground persists exactly two records: the source snapshot under
//! [`SOURCES_KEY`] (written through on every rebuild) and the layout
//! snapshot under [`LAYOUT_KEY`] (written at drag release and on console
//! toggle). Missing or corrupt records are treated as absent and the
//! caller falls back to defaults; persistence never fails the host.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::layout::GeometryVars;
use crate::{Error, Result, SourceSnapshot};

/// Store key for the persisted source snapshot
pub const SOURCES_KEY: &str = "codepen-clone";

/// Store key for the persisted layout snapshot
pub const LAYOUT_KEY: &str = "layout";

/// A synchronous string-keyed store of string values, no expiry.
///
/// This is the external collaborator surface: anything that can hold two
/// small strings works. `set` is expected to complete before returning.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// In-memory store used by tests and short-lived embeddings
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

/// File-backed store: a single JSON object, rewritten on every `set`.
///
/// An unreadable or malformed file at open time starts the store empty; a
/// failed write is logged and dropped so a full disk never takes the host
/// down with it.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, String>>(&text) {
                Ok(map) => map,
                Err(e) => {
                    log::warn!("discarding malformed store file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(Error::StoreError(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) {
        let text = match serde_json::to_string_pretty(&self.entries) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("failed to serialize store: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, text) {
            log::warn!("failed to write store file {}: {}", self.path.display(), e);
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush();
    }
}

/// Load the persisted source snapshot, if present and well-formed
pub fn load_sources(store: &dyn KeyValueStore) -> Option<SourceSnapshot> {
    let raw = store.get(SOURCES_KEY)?;
    match serde_json::from_str(&raw) {
        Ok(snap) => Some(snap),
        Err(e) => {
            log::warn!("discarding corrupt source snapshot: {}", e);
            None
        }
    }
}

/// Persist the source snapshot (write-through, called on every rebuild)
pub fn save_sources(store: &mut dyn KeyValueStore, snapshot: &SourceSnapshot) {
    match serde_json::to_string(snapshot) {
        Ok(json) => store.set(SOURCES_KEY, &json),
        Err(e) => log::warn!("failed to serialize source snapshot: {}", e),
    }
}

/// Load the persisted layout snapshot, if present and well-formed
pub fn load_layout(store: &dyn KeyValueStore) -> Option<GeometryVars> {
    let raw = store.get(LAYOUT_KEY)?;
    let map: BTreeMap<String, String> = match serde_json::from_str(&raw) {
        Ok(m) => m,
        Err(e) => {
            log::warn!("discarding corrupt layout snapshot: {}", e);
            return None;
        }
    };
    let vars = GeometryVars::from_map(&map);
    if vars.is_none() {
        log::warn!("discarding layout snapshot with missing or unparsable variables");
    }
    vars
}

/// Persist the layout snapshot (called at drag release and console toggle)
pub fn save_layout(store: &mut dyn KeyValueStore, vars: &GeometryVars) {
    match serde_json::to_string(&vars.to_map()) {
        Ok(json) => store.set(LAYOUT_KEY, &json),
        Err(e) => log::warn!("failed to serialize layout snapshot: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips_sources() {
        let mut store = MemoryStore::new();
        let snap = SourceSnapshot {
            markup: "<h1>Hi</h1>".into(),
            style: "h1 { color: teal }".into(),
            script: "console.log('x')".into(),
        };
        save_sources(&mut store, &snap);
        let back = load_sources(&store).expect("snapshot present");
        assert_eq!(back, snap);
    }

    #[test]
    fn corrupt_sources_treated_as_absent() {
        let mut store = MemoryStore::new();
        store.set(SOURCES_KEY, "{not json");
        assert!(load_sources(&store).is_none());
    }

    #[test]
    fn missing_layout_is_none() {
        let store = MemoryStore::new();
        assert!(load_layout(&store).is_none());
    }

    #[test]
    fn corrupt_layout_treated_as_absent() {
        let mut store = MemoryStore::new();
        store.set(LAYOUT_KEY, "[1,2,3]");
        assert!(load_layout(&store).is_none());
        store.set(LAYOUT_KEY, "{\"--html-w\":\"oops\"}");
        assert!(load_layout(&store).is_none());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store.set("k", "v");
        drop(store);

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn file_store_ignores_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "garbage").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.get("k").is_none());
    }
}
