//! JSON file store.
//!
//! The file holds a single JSON object mapping keys to string values.
//! Writes go to a sibling temp file that is then renamed over the original.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::application::ports::{KeyValueStore, StoreError};

/// Key-value store backed by one JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Store at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut values = match self.read_all() {
            Ok(values) => values,
            Err(StoreError::Corrupt(e)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Overwriting unreadable store file"
                );
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        change(&mut values);
        self.write_all(&values)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|values| {
            values.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));

        assert_eq!(store.get("tsx_watchlist").unwrap(), None);
        store.set("tsx_watchlist", r#"["RY.TO"]"#).unwrap();
        store.set("other", "x").unwrap();

        let reopened = JsonFileStore::new(store.path());
        assert_eq!(
            reopened.get("tsx_watchlist").unwrap().as_deref(),
            Some(r#"["RY.TO"]"#)
        );

        reopened.remove("other").unwrap();
        assert_eq!(store.get("other").unwrap(), None);
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/deeper/state.json"));
        store.set("k", "v").unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.get("k"), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn write_replaces_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{truncated").unwrap();

        let store = JsonFileStore::new(&path);
        store.set("k", "v").unwrap();

        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
