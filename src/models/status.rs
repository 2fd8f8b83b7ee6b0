// src/models/status.rs
use serde::{Deserialize, Serialize};

/// Whether the lookup itself completed, independent of the target being online.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupStatus {
    #[default]
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Players {
    pub max: i32,
    pub now: i32,
    pub list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub status: LookupStatus,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub error: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_mod: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<Players>,

    /// Unix seconds of the most recent lookup attempt.
    #[serde(default)]
    pub last_updated: u64,
    /// Unix seconds of the most recent attempt that found the server online.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_online: Option<u64>,
    /// Cost of the live probe, never stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_nanos: Option<u64>,
}

impl ServerStatus {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Default::default()
        }
    }

    /// A structured failure that never reaches the store.
    pub fn failed(address: &str, message: &str) -> Self {
        Self {
            address: address.to_string(),
            status: LookupStatus::Error,
            online: false,
            error: message.to_string(),
            ..Default::default()
        }
    }

    pub fn fail(&mut self, message: &str) {
        self.status = LookupStatus::Error;
        self.error = message.to_string();
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Body returned when a client is throttled for repeated failed lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleResponse {
    pub error: String,
    pub try_after: u32,
}

impl ThrottleResponse {
    pub fn new(try_after: u32) -> Self {
        Self {
            error: "too many invalid requests".to_string(),
            try_after,
        }
    }
}
