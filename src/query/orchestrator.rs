// src/query/orchestrator.rs
use std::sync::Arc;
use std::time::{Duration, Instant};
use log::{debug, error, info, warn};
use tokio::time::timeout;

use crate::config::Config;
use crate::models::status::{LookupStatus, Players, ServerStatus};
use crate::query::freshness;
use crate::query::protocol::{ConnectError, ProtocolClient, QueryError, Stat};
use crate::storage::{encode_status, evict, load_status, ResultStore, StoreError};
use crate::utils::unix_now;

pub const INVALID_ADDRESS: &str = "invalid hostname or port";
pub const UNABLE_TO_ENCODE: &str = "internal server error (unable to jsonify server status)";
pub const UNABLE_TO_SAVE: &str = "internal server error (unable to save server status)";

/// Runs one live lookup for an address and keeps the store consistent with it.
pub struct QueryOrchestrator {
    store: Arc<dyn ResultStore>,
    protocol: Arc<dyn ProtocolClient>,
    fatal_errors: Vec<String>,
    cache_ttl: Duration,
    very_old: Duration,
    probe_timeout: Duration,
}

impl QueryOrchestrator {
    pub fn new(store: Arc<dyn ResultStore>, protocol: Arc<dyn ProtocolClient>, config: &Config) -> Self {
        Self {
            store,
            protocol,
            fatal_errors: config.fatal_errors.clone(),
            cache_ttl: config.cache_ttl(),
            very_old: config.very_old(),
            probe_timeout: config.probe_timeout(),
        }
    }

    pub async fn update(&self, address: &str) -> ServerStatus {
        let mut status = match load_status(self.store.as_ref(), address) {
            Ok(Some(existing)) => existing,
            Ok(None) => ServerStatus::new(address),
            Err(e) => {
                error!("Discarding stored status for {}: {}", address, e);
                ServerStatus::new(address)
            }
        };
        status.address = address.to_string();
        status.error.clear();
        status.duration_nanos = None;

        let started = Instant::now();
        let probe = match timeout(self.probe_timeout, self.probe(address)).await {
            Ok(Err(ProbeError::Fatal(e))) => {
                warn!("Fatal connect error for {}: {}", address, e);
                if let Err(e) = evict(self.store.as_ref(), address) {
                    error!("Failed to evict {}: {}", address, e);
                }
                status.fail(INVALID_ADDRESS);
                status.online = false;
                return status;
            }
            Ok(Err(ProbeError::Transient(e))) => Err(e),
            Ok(Ok(stat)) => Ok(stat),
            Err(_) => {
                self.track(address);
                Err(QueryError::new("i/o timeout"))
            }
        };
        let elapsed = started.elapsed();
        let now = unix_now();

        let mut very_old = false;
        match probe {
            Ok(stat) => apply_stat(&mut status, stat, now),
            Err(e) => {
                debug!("{} is offline: {}", address, e);
                status.status = LookupStatus::Success;
                status.online = false;
                status.last_updated = now;

                if freshness::is_very_old(status.last_online, now, self.very_old) {
                    very_old = true;
                    info!("Very old server {} in store", address);
                }
            }
        }
        status.duration_nanos = Some(elapsed.as_nanos() as u64);
        debug!("Probed {} in {:?} (online: {})", address, elapsed, status.online);

        self.persist(&mut status);

        if very_old || status.last_online.is_none() {
            if let Err(e) = evict(self.store.as_ref(), address) {
                error!("Failed to evict {}: {}", address, e);
            }
        }

        status
    }

    /// Connect and full stat, tracking the address once it is known not to be fatal.
    async fn probe(&self, address: &str) -> Result<Stat, ProbeError> {
        let mut conn = match self.protocol.connect(address).await {
            Ok(conn) => conn,
            Err(e) if e.is_fatal(&self.fatal_errors) => return Err(ProbeError::Fatal(e)),
            Err(e) => {
                self.track(address);
                return Err(ProbeError::Transient(QueryError::new(e.message)));
            }
        };

        self.track(address);
        conn.full_stat().await.map_err(ProbeError::Transient)
    }

    fn track(&self, address: &str) {
        if let Err(e) = self.store.track(address) {
            warn!("Failed to track {}: {}", address, e);
        }
    }

    fn persist(&self, status: &mut ServerStatus) {
        let mut stored = status.clone();
        stored.duration_nanos = None;

        let saved = encode_status(&stored)
            .and_then(|data| self.store.put(&status.address, data, self.cache_ttl));

        match saved {
            Ok(()) => {}
            Err(e @ StoreError::Serialize(_)) => {
                error!("Failed to encode status for {}: {}", status.address, e);
                status.fail(UNABLE_TO_ENCODE);
            }
            Err(e) => {
                warn!("Failed to save status for {}: {}", status.address, e);
                status.fail(UNABLE_TO_SAVE);
            }
        }
    }
}

enum ProbeError {
    Fatal(ConnectError),
    Transient(QueryError),
}

fn apply_stat(status: &mut ServerStatus, stat: Stat, now: u64) {
    status.status = LookupStatus::Success;
    status.online = true;
    status.motd = Some(stat.motd);
    status.version = Some(stat.version);
    status.game_type = Some(stat.game_type);
    status.game_id = Some(stat.game_id);
    status.server_mod = Some(stat.server_mod);
    status.map = Some(stat.map);
    status.plugins = Some(stat.plugins);
    status.players = Some(Players {
        max: stat.max_players,
        now: stat.num_players,
        list: stat.players,
    });
    status.last_updated = now;
    status.last_online = Some(now);
}
