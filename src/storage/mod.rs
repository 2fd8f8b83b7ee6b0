// src/storage/mod.rs
pub mod memory;

use std::fmt;
use std::time::Duration;
use crate::models::status::ServerStatus;

#[derive(Debug)]
pub enum StoreError {
    Serialize(String),
    Deserialize(String),
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize(e) => write!(f, "Failed to serialize server status: {}", e),
            Self::Deserialize(e) => write!(f, "Failed to deserialize server status: {}", e),
            Self::Backend(e) => write!(f, "Store backend failure: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Key-value store for serialized snapshots, keyed by canonical address.
///
/// A zero `ttl` means the entry lives until it is deleted. The store also keeps
/// the index of addresses currently being tracked.
pub trait ResultStore: Send + Sync {
    fn get(&self, address: &str) -> Result<Option<String>, StoreError>;

    fn put(&self, address: &str, data: String, ttl: Duration) -> Result<(), StoreError>;

    fn delete(&self, address: &str) -> Result<(), StoreError>;

    fn track(&self, address: &str) -> Result<(), StoreError>;

    fn untrack(&self, address: &str) -> Result<(), StoreError>;

    fn tracked(&self) -> Result<Vec<String>, StoreError>;

    /// Drops expired entries, returning how many were removed.
    fn purge_expired(&self) -> usize {
        0
    }
}

pub fn encode_status(status: &ServerStatus) -> Result<String, StoreError> {
    serde_json::to_string(status).map_err(|e| StoreError::Serialize(e.to_string()))
}

pub fn load_status(store: &dyn ResultStore, address: &str) -> Result<Option<ServerStatus>, StoreError> {
    match store.get(address)? {
        Some(data) => serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| StoreError::Deserialize(e.to_string())),
        None => Ok(None),
    }
}

/// Removes an address from the store and the tracking index.
pub fn evict(store: &dyn ResultStore, address: &str) -> Result<(), StoreError> {
    store.untrack(address)?;
    store.delete(address)
}
