//! Provider configuration loaded from environment variables.

use std::time::Duration;

use crate::error::{CloudupError, Result};

/// Default timeout while waiting for a GCE operation.
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 300;

/// Default delay between GCE operation polls.
pub const DEFAULT_OPERATION_POLL_INTERVAL_SECS: u64 = 2;

/// Configuration for the GCE compute API.
#[derive(Debug, Clone)]
pub struct GceConfig {
    /// Project that owns the resources.
    pub project: String,
    /// Region the forwarding rules live in.
    pub region: String,
    /// `OAuth2` access token.
    pub access_token: String,
    /// Compute API base URL override.
    pub endpoint: Option<String>,
    /// How long to wait for a long-running operation.
    pub operation_timeout: Duration,
    /// Delay between operation polls.
    pub operation_poll_interval: Duration,
}

impl GceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Required Environment Variables
    /// - `GCE_PROJECT`: project ID
    /// - `GCE_REGION`: region (e.g. `us-central1`)
    /// - `GOOGLE_OAUTH_ACCESS_TOKEN`: access token
    ///
    /// # Optional Environment Variables
    /// - `GCE_COMPUTE_ENDPOINT`: compute API base URL
    /// - `GCE_OPERATION_TIMEOUT_SECS`: operation timeout (default: 300)
    /// - `GCE_OPERATION_POLL_INTERVAL_SECS`: poll interval (default: 2)
    ///
    /// # Errors
    /// Returns [`CloudupError::Config`] if a required variable is missing.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns [`CloudupError::Config`] if a required key is missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| CloudupError::Config(format!("{key} environment variable not set")))
        };

        let operation_timeout = lookup("GCE_OPERATION_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_OPERATION_TIMEOUT_SECS);

        let operation_poll_interval = lookup("GCE_OPERATION_POLL_INTERVAL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_OPERATION_POLL_INTERVAL_SECS);

        Ok(Self {
            project: required("GCE_PROJECT")?,
            region: required("GCE_REGION")?,
            access_token: required("GOOGLE_OAUTH_ACCESS_TOKEN")?,
            endpoint: lookup("GCE_COMPUTE_ENDPOINT").filter(|v| !v.is_empty()),
            operation_timeout: Duration::from_secs(operation_timeout),
            operation_poll_interval: Duration::from_secs(operation_poll_interval),
        })
    }
}

/// Configuration for the OpenStack load balancer (Octavia) API.
#[derive(Debug, Clone, Default)]
pub struct OpenstackConfig {
    /// Keystone token sent as `X-Auth-Token`.
    pub auth_token: String,
    /// Octavia endpoint. `None` means load balancing is not provisioned.
    pub loadbalancer_endpoint: Option<String>,
}

impl OpenstackConfig {
    /// Create configuration from environment variables.
    ///
    /// - `OS_AUTH_TOKEN`: Keystone token (required when an endpoint is set)
    /// - `OS_LOADBALANCER_ENDPOINT`: Octavia endpoint (optional)
    ///
    /// # Errors
    /// Returns [`CloudupError::Config`] if an endpoint is set without a token.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns [`CloudupError::Config`] if an endpoint is set without a token.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let loadbalancer_endpoint = lookup("OS_LOADBALANCER_ENDPOINT").filter(|v| !v.is_empty());
        let auth_token = lookup("OS_AUTH_TOKEN").unwrap_or_default();

        if loadbalancer_endpoint.is_some() && auth_token.is_empty() {
            return Err(CloudupError::Config(
                "OS_AUTH_TOKEN environment variable not set".to_string(),
            ));
        }

        Ok(Self {
            auth_token,
            loadbalancer_endpoint,
        })
    }
}
