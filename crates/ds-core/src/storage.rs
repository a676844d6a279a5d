//! Key-value backend trait and the blacklist store
//!
//! The backend is an opaque external service with a per-item byte quota and a
//! key ceiling; [`MemoryBackend`] is the in-process implementation used by
//! tests and the CLI's fragmentation simulation. [`BlacklistStore`] owns the
//! canonical in-memory cache and serializes all reads and writes through a
//! single-writer lock: a second operation while one is in flight is a caller
//! sequencing bug and is surfaced as an error, never queued.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::blacklist::{Blacklist, EntryKind};
use crate::codec::{self, CodecError, ITEM_QUOTA_BYTES, MAX_FRAGMENTS, MAX_KEYS, UNFRAGMENTED_KEY};

/// Key holding the persisted enabled flag.
pub const ENABLED_KEY: &str = "enabled";

// =============================================================================
// Backend
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The write exceeds the per-item byte quota or the key ceiling.
    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// The external key-value service, reduced to explicit results.
///
/// `get(None)` reads every stored key. Calls complete before returning on the
/// single cooperative execution context; there is no timeout and no retry.
pub trait KeyValueBackend {
    fn get(&self, keys: Option<&[String]>) -> Result<Map<String, Value>, BackendError>;
    fn set(&mut self, items: &Map<String, Value>) -> Result<(), BackendError>;
    fn remove(&mut self, keys: &[String]) -> Result<(), BackendError>;
    fn clear(&mut self) -> Result<(), BackendError>;
}

/// In-memory backend enforcing the same quotas as the real service.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: BTreeMap<String, Value>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the backend with an existing record (e.g. migrated user data).
    pub fn with_items(items: Map<String, Value>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    /// The full stored record, for hosts that mirror writes elsewhere.
    pub fn items(&self) -> &BTreeMap<String, Value> {
        &self.items
    }

    fn item_size(key: &str, value: &Value) -> usize {
        key.len() + value.to_string().len()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, keys: Option<&[String]>) -> Result<Map<String, Value>, BackendError> {
        let mut result = Map::new();
        match keys {
            None => {
                for (key, value) in &self.items {
                    result.insert(key.clone(), value.clone());
                }
            }
            Some(keys) => {
                for key in keys {
                    if let Some(value) = self.items.get(key) {
                        result.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Ok(result)
    }

    fn set(&mut self, items: &Map<String, Value>) -> Result<(), BackendError> {
        for (key, value) in items {
            if Self::item_size(key, value) > ITEM_QUOTA_BYTES {
                return Err(BackendError::QuotaExceeded);
            }
        }
        let new_keys = items
            .keys()
            .filter(|key| !self.items.contains_key(*key))
            .count();
        if self.items.len() + new_keys > MAX_KEYS {
            return Err(BackendError::QuotaExceeded);
        }
        for (key, value) in items {
            self.items.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn remove(&mut self, keys: &[String]) -> Result<(), BackendError> {
        for key in keys {
            self.items.remove(key);
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), BackendError> {
        self.items.clear();
        Ok(())
    }
}

// =============================================================================
// Blacklist Store
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A storage operation was requested while another is in flight. This is
    /// a sequencing bug upstream, not a condition to retry.
    #[error("storage operation requested while another is in flight")]
    Locked,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Owns the canonical in-memory blacklist and mediates all persistence.
pub struct BlacklistStore<B: KeyValueBackend> {
    backend: B,
    cache: Blacklist,
    locked: bool,
}

impl<B: KeyValueBackend> BlacklistStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: Blacklist::new(),
            locked: false,
        }
    }

    /// The cached blacklist. Pure memory read, safe at DOM-scrape frequency.
    pub fn cache(&self) -> &Blacklist {
        &self.cache
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Case-insensitive membership test against the cache only.
    pub fn is_blacklisted(&self, kind: EntryKind, name: &str) -> bool {
        self.cache.contains(kind, name)
    }

    /// Read and decode the stored blacklist, replacing the cache.
    ///
    /// Legacy shapes (the `games` key, sentinel maps vs. arrays) are migrated
    /// during decode; the migrated form reaches storage on the next save.
    pub fn load(&mut self) -> Result<&Blacklist, StoreError> {
        if self.locked {
            return Err(StoreError::Locked);
        }
        self.locked = true;
        let result = self.backend.get(None);
        self.locked = false;

        let record = result?;
        self.cache = codec::decode(&record);
        Ok(&self.cache)
    }

    /// Persist a new blacklist.
    ///
    /// The cache is updated before the write so concurrent readers observe
    /// the pending state; it is deliberately not rolled back on failure (the
    /// cache reflects user intent even when persistence fails). All prior
    /// fragment keys and the unfragmented key are deleted before the new
    /// encoding is written, so no stale fragments can be orphaned.
    pub fn save(&mut self, entries: Blacklist) -> Result<(), StoreError> {
        self.cache = entries;

        if self.locked {
            return Err(StoreError::Locked);
        }
        // Encode before touching the backend: an oversized blacklist refuses
        // the save without clearing the old stored state.
        let encoded = codec::encode(&self.cache)?;

        self.locked = true;
        let result = self.save_record(&encoded.items);
        self.locked = false;
        result
    }

    fn save_record(&mut self, items: &Map<String, Value>) -> Result<(), StoreError> {
        let mut stale: Vec<String> = Vec::with_capacity(MAX_FRAGMENTS + 1);
        stale.push(UNFRAGMENTED_KEY.to_string());
        for index in 0..MAX_FRAGMENTS {
            stale.push(codec::fragment_key(index));
        }
        self.backend.remove(&stale)?;
        self.backend.set(items)?;
        Ok(())
    }

    /// Interactive hide: fold the name to lowercase, add it, persist.
    pub fn hide(&mut self, kind: EntryKind, name: &str) -> Result<(), StoreError> {
        let mut next = self.cache.clone();
        next.kind_mut(kind).insert(&name.to_lowercase());
        self.save(next)
    }

    /// Read the persisted enabled flag; missing means enabled.
    pub fn load_enabled(&mut self) -> Result<bool, StoreError> {
        if self.locked {
            return Err(StoreError::Locked);
        }
        self.locked = true;
        let result = self.backend.get(Some(&[ENABLED_KEY.to_string()]));
        self.locked = false;

        let record = result?;
        Ok(record
            .get(ENABLED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(true))
    }

    /// Persist the enabled flag.
    pub fn save_enabled(&mut self, enabled: bool) -> Result<(), StoreError> {
        if self.locked {
            return Err(StoreError::Locked);
        }
        self.locked = true;
        let mut items = Map::new();
        items.insert(ENABLED_KEY.to_string(), Value::Bool(enabled));
        let result = self.backend.set(&items);
        self.locked = false;
        result?;
        Ok(())
    }
}
