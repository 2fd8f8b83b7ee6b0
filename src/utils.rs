// src/utils.rs
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use actix_web::http::StatusCode;
use std::fmt;
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};
use log::debug;
use crate::models::status::{ServerStatus, ThrottleResponse};
use crate::proxies::TrustedProxies;

pub const MISSING_DATA: &str = "missing data";

#[derive(Debug)]
pub enum RequestError {
    MissingData,
    Throttled { try_after: u32 },
    RateLimitExceeded,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingData => write!(f, "{}", MISSING_DATA),
            Self::Throttled { try_after } => {
                write!(f, "too many invalid requests, try after {}", try_after)
            }
            Self::RateLimitExceeded => write!(f, "Rate limit exceeded"),
        }
    }
}

impl ResponseError for RequestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingData => StatusCode::BAD_REQUEST,
            Self::Throttled { .. } | Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::MissingData => {
                HttpResponse::BadRequest().json(ServerStatus::failed("", MISSING_DATA))
            }
            Self::Throttled { try_after } => {
                HttpResponse::TooManyRequests().json(ThrottleResponse::new(*try_after))
            }
            Self::RateLimitExceeded => {
                HttpResponse::TooManyRequests().body(self.to_string())
            }
        }
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Builds the canonical `host:port` key, or `None` when the host is missing.
pub fn normalize_address(host: &str, port: Option<&str>, default_port: u16) -> Option<String> {
    let host = host.trim();
    if host.is_empty() {
        return None;
    }

    let address = match port.map(str::trim).filter(|p| !p.is_empty()) {
        Some(port) => format!("{}:{}", host, port),
        None => format!("{}:{}", host, default_port),
    };
    Some(address.to_lowercase())
}

/// Client identifier for the failure throttle. Empty when the header is
/// absent, unparseable or set by a peer that is not a trusted proxy.
pub fn extract_client_id(req: &HttpRequest, header: &str, proxies: &TrustedProxies) -> String {
    let peer = req.peer_addr().map(|addr| addr.ip());
    if !proxies.is_trusted(peer) {
        debug!("Ignoring {} from untrusted peer {:?}", header, peer);
        return String::new();
    }

    req.headers()
        .get(header)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .map(|ip| ip.to_string())
        .unwrap_or_default()
}
