//! Octavia (OpenStack load balancer v2) request and response models.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to another resource by ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    /// Resource ID.
    pub id: String,
}

/// Compute server, as far as pool membership is concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Server ID; also used as the member ID.
    pub id: String,
    /// Server name.
    #[serde(default)]
    pub name: String,
}

// ============================================================================
// Health monitors
// ============================================================================

/// Pool health monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Monitor {
    /// Monitor ID.
    pub id: String,
    /// Monitor name.
    #[serde(default)]
    pub name: String,
    /// `HTTP`, `TCP`, `PING`, ...
    #[serde(rename = "type", default)]
    pub monitor_type: String,
    /// Seconds between probes.
    #[serde(default)]
    pub delay: u32,
    /// Seconds before a probe times out.
    #[serde(default)]
    pub timeout: u32,
    /// Successful probes before a member is marked online.
    #[serde(default)]
    pub max_retries: u32,
    /// Failed probes before a member is marked offline.
    #[serde(default)]
    pub max_retries_down: u32,
    /// Pools the monitor is attached to.
    #[serde(default)]
    pub pools: Vec<IdRef>,
    /// Provisioning status.
    #[serde(default)]
    pub provisioning_status: String,
    /// Operating status.
    #[serde(default)]
    pub operating_status: String,
}

/// Options for creating a health monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateMonitorOpts {
    /// Pool to monitor.
    pub pool_id: String,
    /// `HTTP`, `TCP`, `PING`, ...
    #[serde(rename = "type")]
    pub monitor_type: String,
    /// Seconds between probes.
    pub delay: u32,
    /// Seconds before a probe times out.
    pub timeout: u32,
    /// Successful probes before a member is marked online.
    pub max_retries: u32,
    /// Failed probes before a member is marked offline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries_down: Option<u32>,
    /// Monitor name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// HTTP path to probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    /// Expected HTTP codes, e.g. `200-299`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_codes: Option<String>,
}

/// Filters for listing health monitors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListMonitorsOpts {
    /// Monitor name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Pool the monitor belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,
}

// ============================================================================
// Pools and members
// ============================================================================

/// Load balancer pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Pool {
    /// Pool ID.
    pub id: String,
    /// Pool name.
    #[serde(default)]
    pub name: String,
    /// `ROUND_ROBIN`, `LEAST_CONNECTIONS`, ...
    #[serde(default)]
    pub lb_algorithm: String,
    /// `TCP`, `HTTP`, ...
    #[serde(default)]
    pub protocol: String,
    /// Load balancers using the pool.
    #[serde(default)]
    pub loadbalancers: Vec<IdRef>,
    /// Listeners using the pool.
    #[serde(default)]
    pub listeners: Vec<IdRef>,
    /// Members of the pool.
    #[serde(default)]
    pub members: Vec<IdRef>,
    /// Attached health monitor.
    pub healthmonitor_id: Option<String>,
    /// Provisioning status.
    #[serde(default)]
    pub provisioning_status: String,
    /// Operating status.
    #[serde(default)]
    pub operating_status: String,
}

/// Options for creating a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreatePoolOpts {
    /// `ROUND_ROBIN`, `LEAST_CONNECTIONS`, ...
    pub lb_algorithm: String,
    /// `TCP`, `HTTP`, ...
    pub protocol: String,
    /// Pool name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Owning load balancer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loadbalancer_id: Option<String>,
    /// Listener that uses this pool by default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listener_id: Option<String>,
}

/// Filters for listing pools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListPoolsOpts {
    /// Pool name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Owning load balancer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loadbalancer_id: Option<String>,
}

/// Pool member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Member {
    /// Member ID.
    pub id: String,
    /// Member name.
    #[serde(default)]
    pub name: String,
    /// Backend IP address.
    #[serde(default)]
    pub address: String,
    /// Backend port.
    #[serde(default)]
    pub protocol_port: u16,
    /// Relative weight.
    #[serde(default)]
    pub weight: u32,
    /// Subnet the address lives on.
    pub subnet_id: Option<String>,
    /// Administrative state.
    #[serde(default)]
    pub admin_state_up: bool,
    /// Provisioning status.
    #[serde(default)]
    pub provisioning_status: String,
    /// Operating status.
    #[serde(default)]
    pub operating_status: String,
}

/// Options for creating a pool member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateMemberOpts {
    /// Backend IP address.
    pub address: String,
    /// Backend port.
    pub protocol_port: u16,
    /// Member name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Subnet the address lives on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    /// Relative weight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

/// Options for updating a pool member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateMemberOpts {
    /// Member name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Relative weight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    /// Administrative state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,
}

/// Filters for listing pool members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListMembersOpts {
    /// Member name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Backend IP address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Backend port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_port: Option<u16>,
}

// ============================================================================
// Listeners
// ============================================================================

/// Load balancer listener.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Listener {
    /// Listener ID.
    pub id: String,
    /// Listener name.
    #[serde(default)]
    pub name: String,
    /// `TCP`, `HTTP`, ...
    #[serde(default)]
    pub protocol: String,
    /// Front-end port.
    #[serde(default)]
    pub protocol_port: u16,
    /// Default pool.
    pub default_pool_id: Option<String>,
    /// Load balancers the listener belongs to.
    #[serde(default)]
    pub loadbalancers: Vec<IdRef>,
    /// Source CIDRs allowed to connect.
    #[serde(default)]
    pub allowed_cidrs: Vec<String>,
    /// Provisioning status.
    #[serde(default)]
    pub provisioning_status: String,
    /// Operating status.
    #[serde(default)]
    pub operating_status: String,
}

/// Options for creating a listener.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateListenerOpts {
    /// Owning load balancer.
    pub loadbalancer_id: String,
    /// `TCP`, `HTTP`, ...
    pub protocol: String,
    /// Front-end port.
    pub protocol_port: u16,
    /// Listener name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Default pool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_pool_id: Option<String>,
    /// Source CIDRs allowed to connect.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_cidrs: Vec<String>,
}

/// Filters for listing listeners.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListListenersOpts {
    /// Listener name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Owning load balancer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loadbalancer_id: Option<String>,
}

// ============================================================================
// Load balancers
// ============================================================================

/// Octavia load balancer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoadBalancer {
    /// Load balancer ID.
    pub id: String,
    /// Load balancer name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Virtual IP.
    #[serde(default)]
    pub vip_address: String,
    /// Port holding the VIP.
    #[serde(default)]
    pub vip_port_id: String,
    /// Subnet of the VIP.
    #[serde(default)]
    pub vip_subnet_id: String,
    /// Octavia provider driver.
    #[serde(default)]
    pub provider: String,
    /// Listeners.
    #[serde(default)]
    pub listeners: Vec<IdRef>,
    /// Pools.
    #[serde(default)]
    pub pools: Vec<IdRef>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Provisioning status.
    #[serde(default)]
    pub provisioning_status: String,
    /// Operating status.
    #[serde(default)]
    pub operating_status: String,
    /// Creation time, without timezone (UTC).
    pub created_at: Option<String>,
}

impl LoadBalancer {
    /// Parsed creation time.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }
}

/// Options for creating a load balancer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateLoadBalancerOpts {
    /// Load balancer name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Subnet to allocate the VIP from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip_subnet_id: Option<String>,
    /// Network to allocate the VIP from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip_network_id: Option<String>,
    /// Fixed VIP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip_address: Option<String>,
    /// Octavia provider driver.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Flavor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor_id: Option<String>,
    /// Tags.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Filters for listing load balancers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListLoadBalancersOpts {
    /// Load balancer name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Virtual IP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vip_address: Option<String>,
    /// Comma-separated tags that must all match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

/// Options for deleting a load balancer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteLoadBalancerOpts {
    /// Delete listeners, pools and members along with the load balancer.
    pub cascade: bool,
}

/// Load balancer traffic counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoadBalancerStats {
    /// Currently open connections.
    #[serde(default)]
    pub active_connections: u64,
    /// Bytes received.
    #[serde(default)]
    pub bytes_in: u64,
    /// Bytes sent.
    #[serde(default)]
    pub bytes_out: u64,
    /// Requests that failed.
    #[serde(default)]
    pub request_errors: u64,
    /// Connections handled in total.
    #[serde(default)]
    pub total_connections: u64,
}
