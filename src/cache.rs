//! Persistent storage of fetched metadata, keyed by remote id.

use crate::error::{Error, Result};
use crate::model::{MetadataRecord, unix_now};
use log::{debug, warn};
use pawtag_ytdlp::utils::file_system;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The default cache file, relative to the working directory.
pub const DEFAULT_CACHE_FILE: &str = ".pawtag_cache.json";

/// A store of metadata records.
pub trait MetadataCache {
    /// The record of `id`, if present and still fresh.
    fn get(&self, id: &str) -> Option<MetadataRecord>;

    /// Inserts or replaces the record of `id`.
    fn put(&mut self, id: &str, record: MetadataRecord);

    /// Saves the records, if the store is persistent.
    fn persist(&self) -> Result<()>;

    /// The number of records held, fresh or not.
    fn len(&self) -> usize;

    /// Whether the store holds no record.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A cache kept in one JSON object mapping ids to records.
#[derive(Debug, Clone)]
pub struct JsonCache {
    path: PathBuf,
    ttl: Option<Duration>,
    records: BTreeMap<String, MetadataRecord>,
}

impl JsonCache {
    /// Loads the cache at `path`.
    ///
    /// Never fails: a missing file gives an empty cache, an unreadable or corrupt one is
    /// logged and also gives an empty cache.
    ///
    /// # Arguments
    ///
    /// * `path` - The JSON document.
    /// * `ttl` - How long records stay fresh, `None` keeps them forever.
    pub fn load(path: impl AsRef<Path>, ttl: Option<Duration>) -> Self {
        let path = path.as_ref().to_path_buf();

        let records = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(records) => records,
                Err(e) => {
                    warn!("Ignoring corrupt cache {:?}: {}", path, e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("Could not read cache {:?}: {}", path, e);
                BTreeMap::new()
            }
        };
        debug!("Loaded {} cached records from {:?}", records.len(), path);

        Self { path, ttl, records }
    }

    /// The file this cache is saved to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_fresh(&self, record: &MetadataRecord) -> bool {
        match (self.ttl, record.fetched_at) {
            (Some(ttl), Some(fetched_at)) => {
                unix_now().saturating_sub(fetched_at) <= ttl.as_secs()
            }
            _ => true,
        }
    }

    fn persist_error(&self, reason: impl ToString) -> Error {
        Error::CachePersist {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl MetadataCache for JsonCache {
    fn get(&self, id: &str) -> Option<MetadataRecord> {
        self.records
            .get(id)
            .filter(|record| self.is_fresh(record))
            .cloned()
    }

    fn put(&mut self, id: &str, record: MetadataRecord) {
        self.records.insert(id.to_string(), record);
    }

    /// Writes the whole document to a sibling temporary file, then renames it over the
    /// cache file, so a crash never leaves a truncated cache.
    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.records).map_err(|e| self.persist_error(e))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.persist_error(e))?;

        let temp = file_system::unique_temp_path(&dir, ".pawtag-cache", "tmp");
        if let Err(e) = std::fs::write(&temp, json) {
            file_system::remove_temp_file(&temp);
            return Err(self.persist_error(e));
        }
        if let Err(e) = std::fs::rename(&temp, &self.path) {
            file_system::remove_temp_file(&temp);
            return Err(self.persist_error(e));
        }

        debug!("Saved {} records to {:?}", self.records.len(), self.path);
        Ok(())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// A cache that lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    records: BTreeMap<String, MetadataRecord>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataCache for MemoryCache {
    fn get(&self, id: &str) -> Option<MetadataRecord> {
        self.records.get(id).cloned()
    }

    fn put(&mut self, id: &str, record: MetadataRecord) {
        self.records.insert(id.to_string(), record);
    }

    fn persist(&self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
