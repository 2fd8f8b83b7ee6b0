// src/storage/memory.rs
use dashmap::{DashMap, DashSet};
use std::time::{Duration, Instant};
use crate::storage::{ResultStore, StoreError};

struct StoredEntry {
    data: String,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| now >= at)
    }
}

/// Process-local store. Expiry is checked on read and by `purge_expired`.
pub struct MemoryStore {
    entries: DashMap<String, StoredEntry>,
    tracked: DashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            tracked: DashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore for MemoryStore {
    fn get(&self, address: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        match self.entries.get(address) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.data.clone())),
            Some(_) => {}
            None => return Ok(None),
        }

        // The read guard must be dropped before removing from the same shard.
        if self.entries.remove_if(address, |_, entry| entry.is_expired(now)).is_some() {
            self.tracked.remove(address);
        }
        Ok(None)
    }

    fn put(&self, address: &str, data: String, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        };

        self.entries.insert(address.to_string(), StoredEntry { data, expires_at });
        Ok(())
    }

    fn delete(&self, address: &str) -> Result<(), StoreError> {
        self.entries.remove(address);
        Ok(())
    }

    fn track(&self, address: &str) -> Result<(), StoreError> {
        self.tracked.insert(address.to_string());
        Ok(())
    }

    fn untrack(&self, address: &str) -> Result<(), StoreError> {
        self.tracked.remove(address);
        Ok(())
    }

    fn tracked(&self) -> Result<Vec<String>, StoreError> {
        let mut servers: Vec<String> = self.tracked.iter().map(|r| r.key().clone()).collect();
        servers.sort();
        Ok(servers)
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|address, entry| {
            if entry.is_expired(now) {
                self.tracked.remove(address);
                return false;
            }
            true
        });
        before.saturating_sub(self.entries.len())
    }
}
