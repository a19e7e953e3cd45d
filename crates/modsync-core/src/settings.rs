//! Tunables for a [`crate::SyncNode`].

use crate::timeout::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry and admission settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSettings {
    /// How often a client re-sends `Request/hostconfig` (default: 3s)
    #[serde(default = "default_host_config_poll_interval")]
    pub host_config_poll_interval_ms: u64,

    /// Give up waiting for the host after this many re-sends (default: never)
    #[serde(default)]
    pub host_config_max_attempts: Option<u32>,

    /// How often the host re-sends `Request/clientinfo` (default: 5s)
    #[serde(default = "default_client_info_retry_interval")]
    pub client_info_retry_interval_ms: u64,

    /// Stop asking a silent client after this many re-sends (default: never)
    #[serde(default)]
    pub client_info_max_attempts: Option<u32>,

    /// Kick clients whose `clientinfo` retries run out (default: false)
    #[serde(default)]
    pub kick_unresponsive_peers: bool,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            host_config_poll_interval_ms: default_host_config_poll_interval(),
            host_config_max_attempts: None,
            client_info_retry_interval_ms: default_client_info_retry_interval(),
            client_info_max_attempts: None,
            kick_unresponsive_peers: false,
        }
    }
}

impl NodeSettings {
    pub fn host_config_policy(&self) -> RetryPolicy {
        RetryPolicy::every(Duration::from_millis(self.host_config_poll_interval_ms))
            .with_max_attempts(self.host_config_max_attempts)
    }

    pub fn client_info_policy(&self) -> RetryPolicy {
        RetryPolicy::every(Duration::from_millis(self.client_info_retry_interval_ms))
            .with_max_attempts(self.client_info_max_attempts)
    }
}

fn default_host_config_poll_interval() -> u64 {
    3000
}

fn default_client_info_retry_interval() -> u64 {
    5000
}
