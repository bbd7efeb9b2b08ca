//! StoredDict Core — Debounced Persistent Dictionary
//!
//! An in-memory key/value dictionary that mirrors itself to a single
//! human-readable YAML file, written shortly after the dictionary stops
//! changing rather than on every update.
//!
//! # Architecture
//!
//! - **Read path**: Served from the in-memory cache, never from disk
//! - **Write path**: Validate, update the cache, re-arm the debounce deadline
//! - **Sync thread**: Writes the current cache once no mutation has arrived
//!   for `delay`, or immediately on `flush()`
//!
//! ```no_run
//! use std::time::Duration;
//! use storeddict_core::{StoreConfig, StoredDict};
//!
//! let config = StoreConfig::default().with_delay(Duration::from_millis(100));
//! let md = StoredDict::open("/tmp/re_md_dict.yml", config)?;
//! md.set("beamline_id", "demo")?;
//! md.set("scan_id", &42)?;
//! md.flush()?;
//! # Ok::<(), storeddict_core::StoreError>(())
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod durability;
pub mod error;
pub mod scheduler;
pub mod store;

// Re-export key types for convenience
pub use cache::Cache;
pub use codec::{dump, load, Mapping};
pub use config::{StoreConfig, DEFAULT_DELAY, DEFAULT_TITLE};
pub use error::{StoreError, StoreResult};
pub use scheduler::SyncStats;
pub use serde_yaml::Value;
pub use store::StoredDict;
