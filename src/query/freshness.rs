// src/query/freshness.rs
use std::time::Duration;
use crate::models::status::ServerStatus;

/// A stored snapshot may be served without probing while it is younger than `lifetime`.
/// Snapshots carrying an error are never reused.
pub fn is_servable(status: &ServerStatus, now: u64, lifetime: Duration) -> bool {
    if status.has_error() {
        return false;
    }
    now.saturating_sub(status.last_updated) < lifetime.as_secs()
}

/// True once a server has been offline longer than `threshold`.
/// A server never seen online counts as last online `now`.
pub fn is_very_old(last_online: Option<u64>, now: u64, threshold: Duration) -> bool {
    let last_online = last_online.unwrap_or(now);
    now.saturating_sub(last_online) > threshold.as_secs()
}
