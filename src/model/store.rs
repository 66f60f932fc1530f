//! Persistent key/value collaborator and the schema the engine owns in it.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::host::GroupId;
use crate::error::StoreError;

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_value(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_owned(), value);
        self
    }

    pub fn raw(&self, key: &str) -> Option<&Value> { self.values.get(key) }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.values.remove(key);
        Ok(())
    }
}

/// All keys in one JSON document, rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl FileStore {
    /// Opens the document at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(buf) if buf.trim().is_empty() => BTreeMap::new(),
            Ok(buf) => serde_json::from_str(&buf)
                .map_err(|source| StoreError::Decode { path: path.clone(), source })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { op: "read", path, source }),
        };
        debug!(?path, keys = values.len(), "opened store");
        Ok(FileStore { path, values })
    }

    /// An empty store that writes to `path`, whatever the file holds now.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        FileStore { path: path.into(), values: BTreeMap::new() }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn flush(&self) -> Result<(), StoreError> {
        let io = |op, source| StoreError::Io { op, path: self.path.clone(), source };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| io("create directory for", e))?;
        }
        let body = serde_json::to_string_pretty(&self.values).map_err(|source| {
            StoreError::Encode { key: "*".to_owned(), source }
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body.as_bytes()).map_err(|e| io("write", e))?;
        fs::rename(&tmp, &self.path).map_err(|e| io("replace", e))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.insert(key.to_owned(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

const NAMESPACE: &str = "vertical-tabs";
const SCHEMA_VERSION: u32 = 1;

/// A value the engine persists: its current namespaced key and the bare key
/// older releases wrote.
#[derive(Copy, Clone, Debug)]
pub struct PersistedKey {
    pub name: &'static str,
    pub legacy: &'static str,
}

impl PersistedKey {
    pub const GROUP_ORDER: PersistedKey =
        PersistedKey { name: "group-order", legacy: "group-order" };
    pub const SORT_STRATEGY: PersistedKey =
        PersistedKey { name: "sort-strategy", legacy: "sort-strategy" };

    pub fn current(&self) -> String { format!("{NAMESPACE}/v{SCHEMA_VERSION}/{}", self.name) }
}

/// Schema layer over a [`KeyValueStore`].
///
/// Reads fall back to the legacy key and copy it forward; writes go to both
/// keys so a downgrade still finds its data.
#[derive(Debug)]
pub struct PersistedState<S> {
    store: S,
}

impl<S: KeyValueStore> PersistedState<S> {
    pub fn new(store: S) -> Self { PersistedState { store } }

    pub fn store(&self) -> &S { &self.store }

    pub fn into_store(self) -> S { self.store }

    pub fn read<T: DeserializeOwned>(
        &mut self,
        key: PersistedKey,
    ) -> Result<Option<T>, StoreError> {
        let current = key.current();
        let value = match self.store.get(&current)? {
            Some(value) => value,
            None => match self.store.get(key.legacy)? {
                Some(value) => {
                    info!(legacy = key.legacy, %current, "migrating legacy key");
                    if let Err(err) = self.store.set(&current, value.clone()) {
                        warn!(%err, %current, "could not copy legacy key forward");
                    }
                    value
                }
                None => return Ok(None),
            },
        };
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Shape { key: current, source })
    }

    pub fn write<T: Serialize>(&mut self, key: PersistedKey, value: &T) -> Result<(), StoreError> {
        let current = key.current();
        let value = serde_json::to_value(value)
            .map_err(|source| StoreError::Encode { key: current.clone(), source })?;
        self.store.set(&current, value.clone())?;
        self.store.set(key.legacy, value)
    }

    pub fn load_group_order(&mut self) -> Result<Vec<GroupId>, StoreError> {
        Ok(self.read(PersistedKey::GROUP_ORDER)?.unwrap_or_default())
    }

    pub fn save_group_order(&mut self, order: &[GroupId]) -> Result<(), StoreError> {
        self.write(PersistedKey::GROUP_ORDER, &order)
    }

    pub fn load_sort_strategy(&mut self) -> Result<Option<String>, StoreError> {
        self.read(PersistedKey::SORT_STRATEGY)
    }

    pub fn save_sort_strategy(&mut self, name: Option<&str>) -> Result<(), StoreError> {
        self.write(PersistedKey::SORT_STRATEGY, &name)
    }
}
