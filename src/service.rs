// src/service.rs
use std::sync::Arc;
use std::time::Duration;
use log::{debug, error, warn};

use crate::config::Config;
use crate::models::status::ServerStatus;
use crate::query::freshness;
use crate::query::orchestrator::QueryOrchestrator;
use crate::query::protocol::ProtocolClient;
use crate::ratelimit::FailureLimiter;
use crate::storage::{evict, load_status, ResultStore, StoreError};
use crate::utils::{normalize_address, unix_now, RequestError};

pub const UNABLE_TO_LOAD: &str = "internal server error (unable to load server status)";

/// Entry point for inbound lookups: cache first, then a throttled live probe.
pub struct QueryService {
    store: Arc<dyn ResultStore>,
    orchestrator: QueryOrchestrator,
    limiter: FailureLimiter,
    default_port: u16,
    cache_ttl: Duration,
}

impl QueryService {
    pub fn new(store: Arc<dyn ResultStore>, protocol: Arc<dyn ProtocolClient>, config: &Config) -> Self {
        Self {
            orchestrator: QueryOrchestrator::new(store.clone(), protocol, config),
            store,
            limiter: FailureLimiter::new(config.throttle_threshold, config.throttle_decay()),
            default_port: config.default_query_port,
            cache_ttl: config.cache_ttl(),
        }
    }

    pub fn limiter(&self) -> &FailureLimiter {
        &self.limiter
    }

    pub async fn resolve(
        &self,
        host: Option<&str>,
        port: Option<&str>,
        client_id: &str,
    ) -> Result<ServerStatus, RequestError> {
        let address = normalize_address(host.unwrap_or(""), port, self.default_port)
            .ok_or(RequestError::MissingData)?;

        match load_status(self.store.as_ref(), &address) {
            Ok(Some(cached)) if freshness::is_servable(&cached, unix_now(), self.cache_ttl) => {
                debug!("Cache hit for {}", address);
                return Ok(cached);
            }
            Ok(_) => debug!("Cache miss for {}", address),
            Err(e) => {
                error!("Unreadable status for {}: {}", address, e);
                if let Err(e) = evict(self.store.as_ref(), &address) {
                    error!("Failed to evict {}: {}", address, e);
                }
                return Ok(ServerStatus::failed(&address, UNABLE_TO_LOAD));
            }
        }

        let decision = self.limiter.should_throttle(client_id);
        if decision.throttle {
            warn!(
                "Throttling client {:?} after {} failed lookups",
                client_id, decision.count
            );
            return Err(RequestError::Throttled { try_after: decision.try_after });
        }

        let status = self.orchestrator.update(&address).await;
        if status.has_error() {
            let count = self.limiter.record_failure(client_id);
            debug!("Client {:?} has {} failed lookups", client_id, count);
        }

        Ok(status)
    }

    pub fn tracked(&self) -> Result<Vec<String>, StoreError> {
        self.store.tracked()
    }

    /// Drops expired snapshots and decayed counters.
    pub fn sweep(&self) -> (usize, usize) {
        (self.store.purge_expired(), self.limiter.cleanup_expired())
    }
}
