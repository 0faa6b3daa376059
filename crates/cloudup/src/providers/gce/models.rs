//! GCE compute API request and response models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Operation status reported once an operation has finished.
pub const OPERATION_DONE: &str = "DONE";

// ============================================================================
// Forwarding rules
// ============================================================================

/// Compute API forwarding rule resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeForwardingRule {
    /// Rule name.
    pub name: String,
    /// IP address served by the rule.
    #[serde(rename = "IPAddress", default, skip_serializing_if = "String::is_empty")]
    pub ip_address: String,
    /// IP protocol (TCP, UDP, ...).
    #[serde(rename = "IPProtocol", default, skip_serializing_if = "String::is_empty")]
    pub ip_protocol: String,
    /// Port range, e.g. `443-443`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub port_range: String,
    /// Individual ports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    /// Target pool URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
    /// Backend service URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub backend_service: String,
    /// `EXTERNAL`, `INTERNAL`, ...
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub load_balancing_scheme: String,
    /// Network URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,
    /// Subnetwork URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnetwork: String,
    /// `PREMIUM` or `STANDARD`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_tier: String,
    /// Region URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
    /// Labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Fingerprint of the current labels.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_fingerprint: String,
    /// Self link.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub self_link: String,
}

/// Body of `forwardingRules.setLabels`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSetLabelsRequest {
    /// Fingerprint read from the resource just before this call.
    pub label_fingerprint: String,
    /// Complete label set to store.
    pub labels: BTreeMap<String, String>,
}

// ============================================================================
// Addresses
// ============================================================================

/// Compute API address resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeAddress {
    /// Address name.
    pub name: String,
    /// Reserved IP.
    #[serde(default)]
    pub address: String,
    /// `INTERNAL` or `EXTERNAL`.
    #[serde(default)]
    pub address_type: String,
    /// `RESERVED`, `IN_USE`, ...
    #[serde(default)]
    pub status: String,
    /// Region URL.
    #[serde(default)]
    pub region: String,
    /// Self link.
    #[serde(default)]
    pub self_link: String,
}

/// Address list page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressListResponse {
    /// Addresses on this page.
    #[serde(default)]
    pub items: Vec<ComputeAddress>,
    /// Token for the next page.
    pub next_page_token: Option<String>,
}

// ============================================================================
// Operations
// ============================================================================

/// Long-running compute operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Operation name.
    pub name: String,
    /// `PENDING`, `RUNNING` or `DONE`.
    #[serde(default)]
    pub status: String,
    /// `insert`, `setLabels`, ...
    #[serde(default)]
    pub operation_type: String,
    /// Resource the operation acts on.
    #[serde(default)]
    pub target_link: String,
    /// Region URL; empty for global operations.
    #[serde(default)]
    pub region: String,
    /// Errors, set once a failed operation is done.
    pub error: Option<OperationError>,
    /// RFC 3339 insert time.
    pub insert_time: Option<String>,
    /// RFC 3339 end time.
    pub end_time: Option<String>,
}

impl Operation {
    /// Whether the operation has finished.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == OPERATION_DONE
    }

    /// Seconds between insert and end, when both are known.
    #[must_use]
    pub fn duration_secs(&self) -> Option<i64> {
        let parse = |s: &Option<String>| {
            s.as_deref()
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        };
        let start = parse(&self.insert_time)?;
        let end = parse(&self.end_time)?;
        Some((end - start).num_seconds())
    }

    /// Joined error messages, if the operation failed.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        let errors = &self.error.as_ref()?.errors;
        if errors.is_empty() {
            return None;
        }
        Some(
            errors
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Operation error block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    /// Individual errors.
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

/// One operation error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationErrorItem {
    /// Error code.
    #[serde(default)]
    pub code: String,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarding_rule_wire_names() {
        let rule = ComputeForwardingRule {
            name: "api".to_string(),
            ip_address: "10.0.0.5".to_string(),
            ip_protocol: "TCP".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["IPAddress"], "10.0.0.5");
        assert_eq!(value["IPProtocol"], "TCP");
        assert!(value.get("target").is_none());
    }

    #[test]
    fn test_operation_errors() {
        let op: Operation = serde_json::from_str(
            r#"{"name":"op-1","status":"DONE","insertTime":"2024-01-01T00:00:00Z","endTime":"2024-01-01T00:00:30Z",
                "error":{"errors":[{"code":"QUOTA_EXCEEDED","message":"quota"}]}}"#,
        )
        .unwrap();
        assert!(op.is_done());
        assert_eq!(op.duration_secs(), Some(30));
        assert_eq!(op.error_message().unwrap(), "QUOTA_EXCEEDED: quota");
    }
}
