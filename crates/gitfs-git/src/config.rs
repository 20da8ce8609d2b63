//! Client configuration types.

use crate::{GitError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`Client`](crate::Client) and its HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// User-Agent header sent with every request.
    pub user_agent: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// Largest pack a fetch will buffer, if any.
    pub max_pack_bytes: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("gitfs/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 60,
            max_pack_bytes: None,
        }
    }
}

impl ClientConfig {
    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(GitError::InvalidConfig(
                "timeout_secs must be positive".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(GitError::InvalidConfig(
                "user_agent must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
