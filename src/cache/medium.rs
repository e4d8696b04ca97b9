//! Storage Medium Module
//!
//! The persistent key-value backend a `CacheStore` writes its envelopes to,
//! plus an in-memory and a directory-backed implementation.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::MediumError;

// == Medium Trait ==
/// Raw string key-value storage.
///
/// Implementations are shared between stores and binders, so every method
/// takes `&self`. Removing an absent key is not an error.
pub trait KvMedium: Send + Sync {
    fn read_raw(&self, key: &str) -> Result<Option<String>, MediumError>;
    fn write_raw(&self, key: &str, value: &str) -> Result<(), MediumError>;
    fn remove_raw(&self, key: &str) -> Result<(), MediumError>;
    fn list_keys(&self) -> Result<Vec<String>, MediumError>;
}

// == Memory Medium ==
/// In-process medium with an optional byte quota.
///
/// The quota counts key and value bytes across all stored items; a write
/// that would exceed it fails with `MediumError::QuotaExceeded`.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    items: RwLock<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> MediumError {
    MediumError::Unavailable("memory medium lock poisoned".to_string())
}

impl KvMedium for MemoryMedium {
    fn read_raw(&self, key: &str) -> Result<Option<String>, MediumError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.get(key).cloned())
    }

    fn write_raw(&self, key: &str, value: &str) -> Result<(), MediumError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;

        if let Some(quota) = self.quota_bytes {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let bytes = key.len() + value.len();
            if others + bytes > quota {
                return Err(MediumError::QuotaExceeded {
                    key: key.to_string(),
                    bytes,
                });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_raw(&self, key: &str) -> Result<(), MediumError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        items.remove(key);
        Ok(())
    }

    fn list_keys(&self) -> Result<Vec<String>, MediumError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.keys().cloned().collect())
    }
}

// == File Medium ==
/// Directory-backed medium: one `<hex(key)>.json` file per key.
///
/// Hex-encoding the key keeps arbitrary key strings (`news:list`, `a/b`)
/// valid as file names.
#[derive(Debug, Clone)]
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    /// Opens (and creates if needed) the medium directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, MediumError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(key.as_bytes())))
    }
}

impl KvMedium for FileMedium {
    fn read_raw(&self, key: &str) -> Result<Option<String>, MediumError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_raw(&self, key: &str, value: &str) -> Result<(), MediumError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove_raw(&self, key: &str) -> Result<(), MediumError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn list_keys(&self) -> Result<Vec<String>, MediumError> {
        let mut keys = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            // Files not written by this medium are skipped
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Some(key) = hex::decode(stem).ok().and_then(|b| String::from_utf8(b).ok()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
