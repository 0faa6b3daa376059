//! GCE forwarding rule task.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::address::Address;
use super::references::{BackendService, Network, Subnet, TargetPool};
use crate::error::{required_field, CloudupError, Result};
use crate::fi::terraform::{Literal, TerraformTarget};
use crate::fi::{Lifecycle, Render, Task};
use crate::providers::gce::urls::last_component;
use crate::providers::gce::{ComputeForwardingRule, GceApiTarget, GceCloud, RegionSetLabelsRequest};

/// Terraform resource type for forwarding rules.
const TERRAFORM_KIND: &str = "google_compute_forwarding_rule";

/// Network tier used for every rule created through the API.
const NETWORK_TIER: &str = "PREMIUM";

/// Where the rule sends traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ForwardingTarget {
    /// Legacy network load balancing through a target pool.
    TargetPool(TargetPool),
    /// A regional backend service.
    BackendService(BackendService),
}

/// Where the rule's IP comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IpSource {
    /// A reserved address managed by another task.
    Address(Address),
    /// An IP owned by the rule itself.
    Literal(String),
}

/// Desired (or actual) state of a regional forwarding rule.
///
/// As a changeset, only differing fields are populated; the default value
/// is the empty changeset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingRule {
    /// Rule name, unique within the region.
    pub name: String,
    /// How reconciliation treats this rule.
    pub lifecycle: Lifecycle,
    /// Port range such as `443-443`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_range: Option<String>,
    /// Individual ports, used instead of a range.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    /// Where traffic is sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<ForwardingTarget>,
    /// Where the rule's IP comes from. `None` lets the cloud assign one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpSource>,
    /// IP protocol (`TCP`, `UDP`).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ip_protocol: String,
    /// `EXTERNAL` or `INTERNAL`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancing_scheme: Option<String>,
    /// Network for internal rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    /// Subnetwork for internal rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnetwork: Option<Subnet>,
    /// Empty means the cloud's default region.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
    /// Labels applied after creation.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Server-assigned; only set on actual state returned by `find`.
    #[serde(skip)]
    pub label_fingerprint: String,
}

/// Serialized form of a forwarding rule, as written in cluster specs.
///
/// The target and IP fields are mutually exclusive pairs; converting into a
/// [`ForwardingRule`] rejects specs that set both halves of a pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ForwardingRuleSpec {
    /// Rule name.
    pub name: String,
    /// Reconciliation lifecycle; defaults to `Sync`.
    #[serde(default)]
    pub lifecycle: Lifecycle,
    /// Region; empty means the cloud's default.
    #[serde(default)]
    pub region: String,
    /// IP protocol.
    #[serde(default)]
    pub ip_protocol: String,
    /// Port range such as `443-443`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range: Option<String>,
    /// Individual ports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    /// Target pool; exclusive with `backend_service`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_pool: Option<TargetPool>,
    /// Backend service; exclusive with `target_pool`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_service: Option<BackendService>,
    /// Reserved address; exclusive with `rule_ip_address`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<Address>,
    /// Literal IP owned by the rule; exclusive with `ip_address`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_ip_address: Option<String>,
    /// `EXTERNAL` or `INTERNAL`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancing_scheme: Option<String>,
    /// Network for internal rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    /// Subnetwork for internal rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnetwork: Option<Subnet>,
    /// Labels applied after creation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl TryFrom<ForwardingRuleSpec> for ForwardingRule {
    type Error = CloudupError;

    fn try_from(spec: ForwardingRuleSpec) -> Result<Self> {
        let target = match (spec.target_pool, spec.backend_service) {
            (Some(pool), Some(service)) => {
                return Err(CloudupError::Config(format!(
                    "cannot specify both targetPool {:?} and backendService {:?} \
                     for forwarding rule {:?}",
                    pool.name, service.name, spec.name
                )));
            }
            (Some(pool), None) => Some(ForwardingTarget::TargetPool(pool)),
            (None, Some(service)) => Some(ForwardingTarget::BackendService(service)),
            (None, None) => None,
        };

        let ip = match (spec.ip_address, spec.rule_ip_address) {
            (Some(address), Some(literal)) => {
                return Err(CloudupError::Config(format!(
                    "specified both IP Address {:?} and rule-managed IP address {literal:?} \
                     for forwarding rule {:?}",
                    address.name, spec.name
                )));
            }
            (Some(address), None) => Some(IpSource::Address(address)),
            (None, Some(literal)) => Some(IpSource::Literal(literal)),
            (None, None) => None,
        };

        Ok(Self {
            name: spec.name,
            lifecycle: spec.lifecycle,
            port_range: spec.port_range,
            ports: spec.ports,
            target,
            ip,
            ip_protocol: spec.ip_protocol,
            load_balancing_scheme: spec.load_balancing_scheme,
            network: spec.network,
            subnetwork: spec.subnetwork,
            region: spec.region,
            labels: spec.labels,
            label_fingerprint: String::new(),
        })
    }
}

/// `Some(expected)` when the caller cares about the field and it differs.
fn changed<T: Clone + PartialEq>(actual: Option<&T>, expected: Option<&T>) -> Option<T> {
    match expected {
        Some(e) if actual != Some(e) => Some(e.clone()),
        _ => None,
    }
}

fn changed_str(actual: &str, expected: &str) -> String {
    if expected.is_empty() || actual == expected {
        String::new()
    } else {
        expected.to_string()
    }
}

impl ForwardingRule {
    /// Label fingerprint read by `find`; empty on desired state.
    #[must_use]
    pub fn label_fingerprint(&self) -> &str {
        &self.label_fingerprint
    }

    /// Symbolic Terraform reference to this rule's self link.
    #[must_use]
    pub fn terraform_link(&self) -> Literal {
        Literal::self_link(TERRAFORM_KIND, &self.name)
    }

    fn region_in<'a>(&'a self, cloud: &'a GceCloud) -> &'a str {
        if self.region.is_empty() {
            cloud.region()
        } else {
            &self.region
        }
    }

    /// IP of a referenced address: the known value, else a live lookup.
    async fn resolve_address(address: &Address, cloud: &GceCloud, region: &str) -> Result<String> {
        if let Some(ip) = address.ip_address.as_deref().filter(|ip| !ip.is_empty()) {
            return Ok(ip.to_string());
        }
        let found = address
            .find(cloud, region)
            .await?
            .ok_or_else(|| {
                CloudupError::NotFound(format!("Address {:?} was not found", address.name))
            })?;
        found
            .ip_address
            .ok_or_else(|| CloudupError::Config(format!("Address {:?} had no IP", address.name)))
    }

    async fn compute_request(
        &self,
        cloud: &GceCloud,
        region: &str,
    ) -> Result<ComputeForwardingRule> {
        let mut rule = ComputeForwardingRule {
            name: self.name.clone(),
            ip_protocol: self.ip_protocol.clone(),
            network_tier: NETWORK_TIER.to_string(),
            port_range: self.port_range.clone().unwrap_or_default(),
            ports: self.ports.clone(),
            load_balancing_scheme: self.load_balancing_scheme.clone().unwrap_or_default(),
            ..Default::default()
        };

        match &self.target {
            Some(ForwardingTarget::TargetPool(pool)) => rule.target = pool.url(cloud),
            Some(ForwardingTarget::BackendService(service)) => {
                rule.backend_service = service.url(cloud, region);
            }
            None => {}
        }

        match &self.ip {
            Some(IpSource::Address(address)) => {
                rule.ip_address = Self::resolve_address(address, cloud, region)
                    .await
                    .map_err(|e| {
                        e.with_context(format!("error finding Address {:?}", address.name))
                    })?;
            }
            Some(IpSource::Literal(ip)) => rule.ip_address.clone_from(ip),
            None => {}
        }

        let network_project = self
            .network
            .as_ref()
            .and_then(|n| n.project.as_deref())
            .unwrap_or(cloud.project());
        if let Some(network) = &self.network {
            rule.network = network.url(network_project);
        }
        if let Some(subnet) = &self.subnetwork {
            rule.subnetwork = subnet.url(network_project, region);
        }

        Ok(rule)
    }

    /// Replace the rule's labels, guarded by `fingerprint`.
    async fn set_labels(&self, cloud: &GceCloud, region: &str, fingerprint: String) -> Result<()> {
        let req = RegionSetLabelsRequest {
            label_fingerprint: fingerprint,
            labels: self.labels.clone(),
        };
        let op = cloud
            .compute()
            .set_forwarding_rule_labels(cloud.project(), region, &self.name, &req)
            .await
            .map_err(|e| e.with_context("setting ForwardingRule labels"))?;
        cloud
            .wait_for_op(&op)
            .await
            .map_err(|e| e.with_context("setting ForwardingRule labels"))
    }

    async fn create(&self, cloud: &GceCloud, region: &str) -> Result<()> {
        let request = self.compute_request(cloud, region).await?;

        info!(name = %self.name, region = %region, "Creating ForwardingRule");
        let op = cloud
            .compute()
            .insert_forwarding_rule(cloud.project(), region, &request)
            .await
            .map_err(|e| e.with_context(format!("error creating ForwardingRule {:?}", self.name)))?;
        cloud
            .wait_for_op(&op)
            .await
            .map_err(|e| e.with_context("error creating forwarding rule"))?;

        if !self.labels.is_empty() {
            // Labels cannot be set on insert; the fingerprint only exists once created.
            let created = cloud
                .compute()
                .get_forwarding_rule(cloud.project(), region, &self.name)
                .await
                .map_err(|e| {
                    e.with_context(format!("reading created ForwardingRule {:?}", self.name))
                })?;
            self.set_labels(cloud, region, created.label_fingerprint)
                .await?;
        }
        Ok(())
    }

    async fn update(
        &self,
        cloud: &GceCloud,
        region: &str,
        actual: &Self,
        changes: &mut Self,
    ) -> Result<()> {
        if !changes.labels.is_empty() {
            debug!(name = %self.name, "Updating ForwardingRule labels");
            self.set_labels(cloud, region, actual.label_fingerprint.clone())
                .await?;
            changes.labels.clear();
        }

        if *changes != Self::default() {
            return Err(CloudupError::CannotApplyChanges {
                kind: Self::KIND,
                changes: format!("{changes:?}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Task for ForwardingRule {
    type Cloud = GceCloud;

    const KIND: &'static str = "ForwardingRule";

    fn name(&self) -> &str {
        &self.name
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    async fn find(&self, cloud: &GceCloud) -> Result<Option<Self>> {
        let region = self.region_in(cloud);
        let r = match cloud
            .compute()
            .get_forwarding_rule(cloud.project(), region, &self.name)
            .await
        {
            Ok(r) => r,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => {
                return Err(
                    err.with_context(format!("error getting ForwardingRule {:?}", self.name))
                );
            }
        };

        let target = if !r.target.is_empty() {
            Some(ForwardingTarget::TargetPool(TargetPool::new(last_component(&r.target))))
        } else if !r.backend_service.is_empty() {
            Some(ForwardingTarget::BackendService(BackendService::new(last_component(
                &r.backend_service,
            ))))
        } else {
            None
        };

        let ip = if r.ip_address.is_empty() {
            None
        } else if matches!(&self.ip, Some(IpSource::Literal(ip)) if *ip == r.ip_address) {
            Some(IpSource::Literal(r.ip_address.clone()))
        } else {
            match Address::find_by_ip(cloud, &r.ip_address, region)
                .await
                .map_err(|e| {
                    e.with_context(format!("error finding Address with IP={:?}", r.ip_address))
                })?
            {
                Some(address) => Some(IpSource::Address(address)),
                None if matches!(self.ip, Some(IpSource::Literal(_))) => {
                    Some(IpSource::Literal(r.ip_address.clone()))
                }
                // Ephemeral IP assigned by the cloud.
                None => None,
            }
        };

        let actual_region = if r.region.is_empty() {
            region.to_string()
        } else {
            last_component(&r.region)
        };

        Ok(Some(Self {
            name: r.name,
            // Lifecycle is local state, never read from the cloud.
            lifecycle: self.lifecycle,
            port_range: Some(r.port_range).filter(|p| !p.is_empty()),
            ports: r.ports,
            target,
            ip,
            ip_protocol: r.ip_protocol,
            load_balancing_scheme: Some(r.load_balancing_scheme).filter(|s| !s.is_empty()),
            network: Some(r.network)
                .filter(|n| !n.is_empty())
                .map(|n| Network::new(last_component(&n))),
            subnetwork: Some(r.subnetwork)
                .filter(|s| !s.is_empty())
                .map(|s| Subnet::new(last_component(&s))),
            region: actual_region,
            labels: r.labels,
            label_fingerprint: r.label_fingerprint,
        }))
    }

    fn build_changes(actual: &Self, expected: &Self) -> Self {
        Self {
            name: changed_str(&actual.name, &expected.name),
            lifecycle: Lifecycle::default(),
            port_range: changed(actual.port_range.as_ref(), expected.port_range.as_ref()),
            ports: if expected.ports.is_empty() || actual.ports == expected.ports {
                Vec::new()
            } else {
                expected.ports.clone()
            },
            target: changed(actual.target.as_ref(), expected.target.as_ref()),
            ip: changed(actual.ip.as_ref(), expected.ip.as_ref()),
            ip_protocol: changed_str(&actual.ip_protocol, &expected.ip_protocol),
            load_balancing_scheme: changed(
                actual.load_balancing_scheme.as_ref(),
                expected.load_balancing_scheme.as_ref(),
            ),
            network: changed(actual.network.as_ref(), expected.network.as_ref()),
            subnetwork: changed(actual.subnetwork.as_ref(), expected.subnetwork.as_ref()),
            region: changed_str(&actual.region, &expected.region),
            labels: if expected.labels.is_empty() || actual.labels == expected.labels {
                BTreeMap::new()
            } else {
                expected.labels.clone()
            },
            label_fingerprint: String::new(),
        }
    }

    fn check_changes(_actual: Option<&Self>, expected: &Self, _changes: &Self) -> Result<()> {
        if expected.name.is_empty() {
            return Err(required_field("Name"));
        }
        Ok(())
    }
}

#[async_trait]
impl Render<ForwardingRule> for GceApiTarget {
    async fn render(
        &self,
        actual: Option<&ForwardingRule>,
        expected: &ForwardingRule,
        changes: &mut ForwardingRule,
    ) -> Result<()> {
        let cloud = self.cloud();
        let region = expected.region_in(cloud);
        match actual {
            None => expected.create(cloud, region).await,
            Some(actual) => expected.update(cloud, region, actual, changes).await,
        }
    }
}

/// `google_compute_forwarding_rule` resource body.
#[derive(Debug, Serialize)]
struct TerraformForwardingRule<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    port_range: Option<&'a str>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    ports: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<Literal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_address: Option<Literal>,
    #[serde(skip_serializing_if = "str::is_empty")]
    ip_protocol: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    load_balancing_scheme: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<Literal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subnetwork: Option<Literal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend_service: Option<Literal>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    labels: &'a BTreeMap<String, String>,
}

impl<'a> From<&'a ForwardingRule> for TerraformForwardingRule<'a> {
    fn from(e: &'a ForwardingRule) -> Self {
        let (target, backend_service) = match &e.target {
            Some(ForwardingTarget::TargetPool(pool)) => (Some(pool.terraform_link()), None),
            Some(ForwardingTarget::BackendService(service)) => {
                (None, Some(service.terraform_address()))
            }
            None => (None, None),
        };
        let ip_address = e.ip.as_ref().map(|ip| match ip {
            IpSource::Address(address) => address.terraform_address(),
            IpSource::Literal(ip) => Literal::from_string_value(ip),
        });

        Self {
            name: &e.name,
            port_range: e.port_range.as_deref(),
            ports: &e.ports,
            target,
            ip_address,
            ip_protocol: &e.ip_protocol,
            load_balancing_scheme: e.load_balancing_scheme.as_deref(),
            network: e.network.as_ref().map(Network::terraform_link),
            subnetwork: e.subnetwork.as_ref().map(Subnet::terraform_link),
            backend_service,
            labels: &e.labels,
        }
    }
}

#[async_trait]
impl Render<ForwardingRule> for TerraformTarget {
    async fn render(
        &self,
        _actual: Option<&ForwardingRule>,
        expected: &ForwardingRule,
        _changes: &mut ForwardingRule,
    ) -> Result<()> {
        let record = TerraformForwardingRule::from(expected);
        self.render_resource(TERRAFORM_KIND, &expected.name, &record)
            .await
    }
}
