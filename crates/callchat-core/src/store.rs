use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::errors::ClientError;

/// Key under which the credential identifier is persisted.
pub const IDENTIFIER_KEY: &str = "identifier";

/// Application-private key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;
}

/// Volatile store, used by tests and by hosts without a data directory.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.values
            .lock()
            .map_err(|_| ClientError::Storage("memory store poisoned".into()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON-file backed store living in `<data_dir>/store.json`.
///
/// The whole map is rewritten on every `set`. A missing or unreadable file
/// starts out empty.
pub struct FileStore {
    values: Mutex<BTreeMap<String, String>>,
    file_path: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: &str) -> Self {
        let file_path = PathBuf::from(data_dir).join("store.json");
        let values = Self::load(&file_path);
        Self {
            values: Mutex::new(values),
            file_path,
        }
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), ClientError> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::Storage(format!("create {}: {e}", parent.display())))?;
        }
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        std::fs::write(&self.file_path, json)
            .map_err(|e| ClientError::Storage(format!("write {}: {e}", self.file_path.display())))
    }

    fn load(path: &PathBuf) -> BTreeMap<String, String> {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("ignoring corrupt store at {}: {e}", path.display());
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| ClientError::Storage("file store poisoned".into()))?;
        let mut updated = values.clone();
        updated.insert(key.to_string(), value.to_string());
        self.save(&updated)?;
        *values = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get(IDENTIFIER_KEY), None);
        store.set(IDENTIFIER_KEY, "id-1").unwrap();
        assert_eq!(store.get(IDENTIFIER_KEY), Some("id-1".to_string()));
    }

    #[test]
    fn file_store_starts_empty() {
        let dir = temp_dir();
        let store = FileStore::new(dir.path().to_str().unwrap());
        assert_eq!(store.get(IDENTIFIER_KEY), None);
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = temp_dir();
        let path = dir.path().to_str().unwrap();
        {
            let store = FileStore::new(path);
            store.set(IDENTIFIER_KEY, "8:acs:user").unwrap();
        }
        let store = FileStore::new(path);
        assert_eq!(store.get(IDENTIFIER_KEY), Some("8:acs:user".to_string()));
    }

    #[test]
    fn file_store_overwrites_value() {
        let dir = temp_dir();
        let store = FileStore::new(dir.path().to_str().unwrap());
        store.set(IDENTIFIER_KEY, "first").unwrap();
        store.set(IDENTIFIER_KEY, "second").unwrap();
        assert_eq!(store.get(IDENTIFIER_KEY), Some("second".to_string()));
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = temp_dir();
        fs::write(dir.path().join("store.json"), "not json!!!").unwrap();
        let store = FileStore::new(dir.path().to_str().unwrap());
        assert_eq!(store.get(IDENTIFIER_KEY), None);
    }

    #[test]
    fn failed_write_keeps_previous_value() {
        let dir = temp_dir();
        let store = FileStore::new(dir.path().to_str().unwrap());
        store.set(IDENTIFIER_KEY, "kept").unwrap();

        // A directory in place of the file makes every write fail.
        fs::remove_file(dir.path().join("store.json")).unwrap();
        fs::create_dir(dir.path().join("store.json")).unwrap();

        let err = store.set(IDENTIFIER_KEY, "lost").unwrap_err();
        assert!(matches!(err, ClientError::Storage(_)));
        assert_eq!(store.get(IDENTIFIER_KEY), Some("kept".to_string()));
    }

    #[test]
    fn creates_missing_data_dir() {
        let dir = temp_dir();
        let nested = dir.path().join("a").join("b");
        let store = FileStore::new(nested.to_str().unwrap());
        store.set(IDENTIFIER_KEY, "x").unwrap();
        assert!(nested.join("store.json").exists());
    }
}
