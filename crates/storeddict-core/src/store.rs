//! StoredDict: a dictionary that mirrors itself to a YAML file.
//!
//! **Read path**: cache only (RwLock read, never touches disk)
//! **Write path**: validate, update cache, touch the sync thread
//! **Background**: sync thread writes the whole cache once mutations go quiet

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml::Value;
use tracing::{debug, error, info};

use crate::cache::Cache;
use crate::codec::{self, Mapping};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::scheduler::{start_sync, SyncHandle, SyncStats, SyncTarget};

/// Debounced persistent key/value store.
///
/// All public methods take `&self`; share it between threads with `Arc`.
/// Readers hold the cache read lock briefly. Writers hold the write lock only
/// for the in-memory change, then hand the sync thread a timestamp.
pub struct StoredDict {
    /// Authoritative contents, shared with the sync thread
    cache: Arc<RwLock<Cache>>,
    /// Debounce scheduler; dropping it writes any pending snapshot
    sync: SyncHandle,
    /// Write counters, shared with the sync thread
    stats: Arc<SyncStats>,
    /// Backing file
    path: PathBuf,
    config: StoreConfig,
}

impl StoredDict {
    /// Open the store backed by `path`, loading whatever it holds.
    ///
    /// A missing or empty file yields an empty store. A malformed file is
    /// an error.
    pub fn open<P: AsRef<Path>>(path: P, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let contents = codec::load(&path)?;
        info!(
            path = %path.display(),
            entries = contents.len(),
            delay_s = config.delay.as_secs_f64(),
            dry_run = config.dry_run,
            "opened stored dictionary"
        );

        let cache = Arc::new(RwLock::new(Cache::from_mapping(contents)));
        let stats = Arc::new(SyncStats::new());
        let target = SyncTarget {
            path: path.clone(),
            title: config.header_title().map(str::to_string),
            durable: config.durable,
            dry_run: config.dry_run,
        };
        let sync = start_sync(Arc::clone(&cache), target, config.delay, Arc::clone(&stats))?;

        Ok(Self { cache, sync, stats, path, config })
    }

    /// Open with the default configuration (5 s delay, validation on).
    pub fn with_defaults<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::open(path, StoreConfig::default())
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> StoreResult<Value> {
        self.cache.read().get(key).cloned()
    }

    /// Value stored under `key`, deserialized into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> StoreResult<T> {
        let value = self.get(key)?;
        serde_yaml::from_value(value).map_err(|e| StoreError::Decode {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Insert or overwrite `key`.
    ///
    /// The value is converted (and, when validation is on, checked for plain
    /// data and round-tripped) before the cache is touched; a failure leaves
    /// the store unchanged.
    pub fn set<T: Serialize + ?Sized>(&self, key: impl Into<String>, value: &T) -> StoreResult<()> {
        let key = key.into();
        let value = self.prepare(&key, value)?;
        self.cache.write().insert(key, value);
        self.touch();
        Ok(())
    }

    /// Insert every entry, or none of them if any value is rejected.
    pub fn extend<I, K, V>(&self, entries: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize,
    {
        let prepared = entries
            .into_iter()
            .map(|(key, value)| -> StoreResult<(String, Value)> {
                let key = key.into();
                let value = self.prepare(&key, &value)?;
                Ok((key, value))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        if prepared.is_empty() {
            return Ok(());
        }

        {
            let mut cache = self.cache.write();
            for (key, value) in prepared {
                cache.insert(key, value);
            }
        }
        self.touch();
        Ok(())
    }

    /// Remove `key`, returning its value.
    pub fn delete(&self, key: &str) -> StoreResult<Value> {
        let value = self.cache.write().remove(key)?;
        self.touch();
        Ok(value)
    }

    /// Remove and return the most recently inserted entry.
    pub fn pop_last(&self) -> StoreResult<(String, Value)> {
        let entry = self.cache.write().pop_last()?;
        self.touch();
        Ok(entry)
    }

    /// Remove every entry.
    pub fn clear(&self) -> StoreResult<()> {
        {
            let mut cache = self.cache.write();
            if cache.is_empty() {
                return Ok(());
            }
            cache.clear();
        }
        self.touch();
        Ok(())
    }

    /// Check if key exists in the cache.
    pub fn contains_key(&self, key: &str) -> bool {
        self.cache.read().contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Returns true if the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Keys in insertion order, as of this call. Call again to restart.
    pub fn keys(&self) -> std::vec::IntoIter<String> {
        self.cache.read().keys().cloned().collect::<Vec<_>>().into_iter()
    }

    /// Entries in insertion order, as of this call.
    pub fn iter(&self) -> std::vec::IntoIter<(String, Value)> {
        self.cache
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Plain copy of the contents.
    pub fn to_mapping(&self) -> Mapping {
        self.cache.read().as_mapping().clone()
    }

    /// Write the current contents now, bypassing the debounce window.
    ///
    /// Any armed deadline counts as satisfied, so it will not produce a
    /// second write. Write failures are returned here rather than logged.
    pub fn flush(&self) -> StoreResult<()> {
        debug!(path = %self.path.display(), "flush");
        self.sync.flush()
    }

    /// Replace the in-memory contents with what the backing file holds.
    ///
    /// On error the cache is left as it was.
    pub fn reload(&self) -> StoreResult<()> {
        debug!(path = %self.path.display(), "reload");
        let contents = codec::load(&self.path)?;
        self.cache.write().replace(contents);
        Ok(())
    }

    /// Write the current contents and stop the sync thread.
    pub fn close(self) -> StoreResult<()> {
        self.flush()
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Write counters of the sync thread.
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    fn prepare<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<Value> {
        let value = codec::to_value(key, value)?;
        if self.config.validate_serializable {
            codec::check_plain(key, &value)?;
            codec::check_round_trip(key, &value)?;
        }
        Ok(value)
    }

    /// Tell the sync thread the cache changed. The mutation has already been
    /// applied, so a stopped sync thread is logged rather than returned; the
    /// next `flush()` reports it.
    fn touch(&self) {
        if let Err(e) = self.sync.touch(Instant::now()) {
            error!(path = %self.path.display(), error = %e, "change not scheduled for writing");
        }
    }
}

impl fmt::Debug for StoredDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.cache.read();
        write!(f, "<StoredDict ")?;
        f.debug_map().entries(cache.iter()).finish()?;
        write!(f, ">")
    }
}
