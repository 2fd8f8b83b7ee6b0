use std::env;
use std::time::Duration;
use std::num::NonZeroU32;
use governor::Quota;

const DEFAULT_FATAL_ERRORS: &[&str] = &[
    "no such host",
    "invalid port",
    "missing port in address",
    "too many colons in address",
];

#[derive(Clone, Debug)]
pub struct Config {
    // HTTP
    pub bind_address: String,
    pub port: u16,

    // Lookup
    pub default_query_port: u16,
    pub cache_ttl_secs: u64,
    pub very_old_secs: u64,
    pub probe_timeout_secs: u64,
    pub fatal_errors: Vec<String>,

    // Failure throttle
    pub throttle_threshold: u32,
    pub throttle_decay_secs: u64,

    // Client identification
    pub client_ip_header: String,
    pub trusted_proxies: Vec<String>,
    pub fetch_cloudflare_ranges: bool,

    // Request flood quota, a burst of 0 disables it
    pub query_period_secs: u64,
    pub query_burst_limit: u32,

    pub sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            default_query_port: 25565,
            cache_ttl_secs: 6 * 60 * 60,
            very_old_secs: 24 * 60 * 60,
            probe_timeout_secs: 5,
            fatal_errors: DEFAULT_FATAL_ERRORS.iter().map(|s| s.to_string()).collect(),
            throttle_threshold: 10,
            throttle_decay_secs: 600,
            client_ip_header: "CF-Connecting-IP".to_string(),
            trusted_proxies: Vec::new(),
            fetch_cloudflare_ranges: false,
            query_period_secs: 1,
            query_burst_limit: 30,
            sweep_interval_secs: 300,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_list(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|v| split_list(&v))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: parse_var("PORT", defaults.port),

            default_query_port: parse_var("DEFAULT_QUERY_PORT", defaults.default_query_port),
            cache_ttl_secs: parse_var("CACHE_TTL_SECS", defaults.cache_ttl_secs),
            very_old_secs: parse_var("VERY_OLD_SECS", defaults.very_old_secs),
            probe_timeout_secs: parse_var("PROBE_TIMEOUT_SECS", defaults.probe_timeout_secs),
            fatal_errors: parse_list("FATAL_SERVER_ERRORS").unwrap_or(defaults.fatal_errors),

            throttle_threshold: parse_var("THROTTLE_THRESHOLD", defaults.throttle_threshold),
            throttle_decay_secs: parse_var("THROTTLE_DECAY_SECS", defaults.throttle_decay_secs),

            client_ip_header: env::var("CLIENT_IP_HEADER").unwrap_or(defaults.client_ip_header),
            trusted_proxies: parse_list("TRUSTED_PROXIES").unwrap_or(defaults.trusted_proxies),
            fetch_cloudflare_ranges: parse_var(
                "FETCH_CLOUDFLARE_RANGES",
                defaults.fetch_cloudflare_ranges
            ),

            query_period_secs: parse_var("QUERY_PERIOD_SECS", defaults.query_period_secs),
            query_burst_limit: parse_var("QUERY_BURST_LIMIT", defaults.query_burst_limit),

            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs),
        }
    }

    pub fn bind(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn very_old(&self) -> Duration {
        Duration::from_secs(self.very_old_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }

    pub fn throttle_decay(&self) -> Duration {
        Duration::from_secs(self.throttle_decay_secs.max(1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Per-client request quota for `/query`, `None` when disabled.
    pub fn query_quota(&self) -> Option<Quota> {
        let burst = NonZeroU32::new(self.query_burst_limit)?;
        let period = Duration::from_secs(self.query_period_secs.max(1));
        Quota::with_period(period).map(|quota| quota.allow_burst(burst))
    }
}
