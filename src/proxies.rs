// src/proxies.rs
use std::net::IpAddr;
use std::str::FromStr;
use ipnetwork::IpNetwork;
use lazy_static::lazy_static;
use parking_lot::RwLock;
use log::{info, warn, error};

lazy_static! {
    static ref CLOUDFLARE_IPV4_URL: &'static str = "https://www.cloudflare.com/ips-v4/";
    static ref CLOUDFLARE_IPV6_URL: &'static str = "https://www.cloudflare.com/ips-v6/";
}

/// Peers allowed to set the forwarded client IP header.
/// With no ranges loaded, every peer is trusted.
#[derive(Debug, Default)]
pub struct TrustedProxies {
    ranges: RwLock<Vec<IpNetwork>>,
}

impl TrustedProxies {
    pub fn new() -> Self {
        Self {
            ranges: RwLock::new(Vec::new()),
        }
    }

    pub fn from_cidrs(cidrs: &[String]) -> Self {
        let proxies = Self::new();
        proxies.extend(parse_networks(cidrs.iter().map(|s| s.as_str())));
        proxies
    }

    pub fn extend(&self, networks: Vec<IpNetwork>) {
        self.ranges.write().extend(networks);
    }

    pub fn len(&self) -> usize {
        self.ranges.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.read().is_empty()
    }

    pub fn is_trusted(&self, peer: Option<IpAddr>) -> bool {
        let ranges = self.ranges.read();
        if ranges.is_empty() {
            return true;
        }
        match peer {
            Some(ip) => ranges.iter().any(|network| network.contains(ip)),
            None => false,
        }
    }

    pub async fn load_cloudflare_ranges(&self) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let mut loaded = 0;
        for url in [*CLOUDFLARE_IPV4_URL, *CLOUDFLARE_IPV6_URL] {
            info!("Fetching Cloudflare ranges from {}...", url);
            match fetch_ip_ranges(url).await {
                Ok(networks) => {
                    info!("Loaded {} ranges from {}", networks.len(), url);
                    loaded += networks.len();
                    self.extend(networks);
                }
                Err(e) => {
                    error!("Failed to fetch ranges from {}: {}", url, e);
                    return Err(e);
                }
            }
        }
        Ok(loaded)
    }
}

fn parse_networks<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<IpNetwork> {
    let mut networks = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match IpNetwork::from_str(line) {
            Ok(network) => networks.push(network),
            Err(e) => warn!("Ignoring invalid proxy range {}: {}", line, e),
        }
    }
    networks
}

async fn fetch_ip_ranges(url: &str) -> Result<Vec<IpNetwork>, Box<dyn std::error::Error + Send + Sync>> {
    let response = reqwest::get(url).await?.error_for_status()?;
    let text = response.text().await?;
    Ok(parse_networks(text.lines()))
}
