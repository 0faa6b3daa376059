//! In-memory fakes of the cloud APIs that record every call.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cto_cloudup::error::{CloudupError, Result};
use cto_cloudup::providers::gce::{
    ComputeAddress, ComputeApi, ComputeForwardingRule, Operation, OperationError,
    OperationErrorItem, RegionSetLabelsRequest,
};
use cto_cloudup::providers::openstack::{
    CreateListenerOpts, CreateLoadBalancerOpts, CreateMemberOpts, CreateMonitorOpts,
    CreatePoolOpts, DeleteLoadBalancerOpts, ListListenersOpts, ListLoadBalancersOpts,
    ListMembersOpts, ListMonitorsOpts, ListPoolsOpts, Listener, LoadBalancer, LoadBalancerApi,
    LoadBalancerStats, Member, Monitor, Pool, UpdateMemberOpts,
};
use cto_cloudup::GceCloud;

pub const PROJECT: &str = "test-project";
pub const REGION: &str = "us-east1";

pub fn region_url(region: &str) -> String {
    format!("https://www.googleapis.com/compute/v1/projects/{PROJECT}/regions/{region}")
}

// =============================================================================
// Fake compute API
// =============================================================================

/// Fake compute API backed by a map of forwarding rules.
///
/// Every mutation returns a `RUNNING` operation that reports `DONE` on the
/// first poll, so callers must wait for it.
#[derive(Default)]
pub struct FakeCompute {
    pub calls: Mutex<Vec<String>>,
    pub rules: Mutex<HashMap<String, ComputeForwardingRule>>,
    pub addresses: Mutex<Vec<ComputeAddress>>,
    pub inserted: Mutex<Vec<ComputeForwardingRule>>,
    pub label_requests: Mutex<Vec<RegionSetLabelsRequest>>,
    /// Error returned by the next insert.
    pub insert_error: Mutex<Option<CloudupError>>,
    /// Operations stay `RUNNING` on every poll.
    pub operations_never_finish: AtomicBool,
    /// Error reported by operations once they are `DONE`.
    pub operation_error: Mutex<Option<OperationError>>,
    fingerprints: AtomicU32,
}

impl FakeCompute {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn with_rule(self: Arc<Self>, rule: ComputeForwardingRule) -> Arc<Self> {
        self.rules.lock().unwrap().insert(rule.name.clone(), rule);
        self
    }

    pub fn with_address(self: Arc<Self>, name: &str, ip: &str) -> Arc<Self> {
        self.addresses.lock().unwrap().push(ComputeAddress {
            name: name.to_string(),
            address: ip.to_string(),
            ..Default::default()
        });
        self
    }

    /// A cloud over this fake that polls operations without delay.
    pub fn cloud(self: &Arc<Self>) -> GceCloud {
        GceCloud::new(self.clone(), PROJECT, REGION)
            .with_operation_polling(Duration::from_millis(1), Duration::from_secs(5))
    }

    /// Make every operation finish with `code: message`.
    pub fn fail_operations(&self, code: &str, message: &str) {
        *self.operation_error.lock().unwrap() = Some(OperationError {
            errors: vec![OperationErrorItem {
                code: code.to_string(),
                message: message.to_string(),
            }],
        });
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn next_fingerprint(&self) -> String {
        format!("fp-{}", self.fingerprints.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn running(name: &str) -> Operation {
        Operation {
            name: name.to_string(),
            status: "RUNNING".to_string(),
            region: region_url(REGION),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ComputeApi for FakeCompute {
    async fn get_forwarding_rule(
        &self,
        _project: &str,
        _region: &str,
        name: &str,
    ) -> Result<ComputeForwardingRule> {
        self.record(format!("get_forwarding_rule {name}"));
        self.rules
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| CloudupError::NotFound(format!("forwardingRules/{name}")))
    }

    async fn insert_forwarding_rule(
        &self,
        _project: &str,
        region: &str,
        rule: &ComputeForwardingRule,
    ) -> Result<Operation> {
        self.record(format!("insert_forwarding_rule {}", rule.name));
        if let Some(err) = self.insert_error.lock().unwrap().take() {
            return Err(err);
        }
        self.inserted.lock().unwrap().push(rule.clone());

        let mut stored = rule.clone();
        stored.region = region_url(region);
        stored.label_fingerprint = self.next_fingerprint();
        self.rules.lock().unwrap().insert(rule.name.clone(), stored);
        Ok(Self::running("op-insert"))
    }

    async fn set_forwarding_rule_labels(
        &self,
        _project: &str,
        _region: &str,
        name: &str,
        req: &RegionSetLabelsRequest,
    ) -> Result<Operation> {
        self.record(format!("set_forwarding_rule_labels {name} {}", req.label_fingerprint));
        self.label_requests.lock().unwrap().push(req.clone());

        let fingerprint = self.next_fingerprint();
        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .get_mut(name)
            .ok_or_else(|| CloudupError::NotFound(format!("forwardingRules/{name}")))?;
        if rule.label_fingerprint != req.label_fingerprint {
            return Err(CloudupError::Api {
                status: 412,
                message: "Labels fingerprint either invalid or resource labels have changed"
                    .to_string(),
            });
        }
        rule.labels.clone_from(&req.labels);
        rule.label_fingerprint = fingerprint;
        Ok(Self::running("op-labels"))
    }

    async fn get_address(
        &self,
        _project: &str,
        _region: &str,
        name: &str,
    ) -> Result<ComputeAddress> {
        self.record(format!("get_address {name}"));
        self.addresses
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.name == name)
            .cloned()
            .ok_or_else(|| CloudupError::NotFound(format!("addresses/{name}")))
    }

    async fn list_addresses(
        &self,
        _project: &str,
        _region: &str,
        filter: &str,
    ) -> Result<Vec<ComputeAddress>> {
        self.record(format!("list_addresses {filter}"));
        let ip = filter.trim_start_matches("address eq ");
        Ok(self
            .addresses
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.address == ip)
            .cloned()
            .collect())
    }

    async fn get_region_operation(
        &self,
        _project: &str,
        _region: &str,
        name: &str,
    ) -> Result<Operation> {
        self.record(format!("get_region_operation {name}"));
        if self.operations_never_finish.load(Ordering::SeqCst) {
            return Ok(Self::running(name));
        }
        Ok(Operation {
            status: "DONE".to_string(),
            error: self.operation_error.lock().unwrap().clone(),
            ..Self::running(name)
        })
    }
}

/// A forwarding rule as the API returns it.
pub fn live_rule(name: &str) -> ComputeForwardingRule {
    ComputeForwardingRule {
        name: name.to_string(),
        ip_protocol: "TCP".to_string(),
        port_range: "443-443".to_string(),
        target: format!("{}/targetPools/api", region_url(REGION)),
        region: region_url(REGION),
        label_fingerprint: "fp-live".to_string(),
        labels: BTreeMap::new(),
        ..Default::default()
    }
}

// =============================================================================
// Fake load balancer API
// =============================================================================

/// Fake Octavia API with scripted results for the calls the tests exercise.
#[derive(Default)]
pub struct FakeLoadBalancer {
    pub calls: Mutex<Vec<String>>,
    /// Existing members keyed by `(pool_id, member_id)`.
    pub members: Mutex<HashMap<(String, String), Member>>,
    /// Load balancers that still exist.
    pub load_balancers: Mutex<HashMap<String, LoadBalancer>>,
    /// Results returned by successive `update_member` calls before falling
    /// back to updating `members`.
    pub update_results: Mutex<VecDeque<Result<Member>>>,
    /// Deletes are accepted but load balancers never go away.
    pub deletes_never_finish: AtomicBool,
}

impl FakeLoadBalancer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn not_found(what: &str) -> CloudupError {
        CloudupError::NotFound(format!("{what} could not be found"))
    }
}

#[async_trait]
impl LoadBalancerApi for FakeLoadBalancer {
    async fn create_monitor(&self, opts: &CreateMonitorOpts) -> Result<Monitor> {
        self.record(format!("create_monitor {}", opts.pool_id));
        Ok(Monitor {
            id: "monitor-1".to_string(),
            monitor_type: opts.monitor_type.clone(),
            delay: opts.delay,
            timeout: opts.timeout,
            max_retries: opts.max_retries,
            ..Default::default()
        })
    }

    async fn list_monitors(&self, _opts: &ListMonitorsOpts) -> Result<Vec<Monitor>> {
        self.record("list_monitors");
        Ok(Vec::new())
    }

    async fn delete_monitor(&self, monitor_id: &str) -> Result<()> {
        self.record(format!("delete_monitor {monitor_id}"));
        Err(Self::not_found("monitor"))
    }

    async fn create_pool(&self, opts: &CreatePoolOpts) -> Result<Pool> {
        self.record("create_pool");
        Ok(Pool {
            id: "pool-1".to_string(),
            name: opts.name.clone().unwrap_or_default(),
            lb_algorithm: opts.lb_algorithm.clone(),
            protocol: opts.protocol.clone(),
            ..Default::default()
        })
    }

    async fn get_pool(&self, pool_id: &str) -> Result<Pool> {
        self.record(format!("get_pool {pool_id}"));
        Err(Self::not_found("pool"))
    }

    async fn list_pools(&self, _opts: &ListPoolsOpts) -> Result<Vec<Pool>> {
        self.record("list_pools");
        Ok(Vec::new())
    }

    async fn delete_pool(&self, pool_id: &str) -> Result<()> {
        self.record(format!("delete_pool {pool_id}"));
        Err(Self::not_found("pool"))
    }

    async fn get_member(&self, pool_id: &str, member_id: &str) -> Result<Member> {
        self.record(format!("get_member {pool_id} {member_id}"));
        self.members
            .lock()
            .unwrap()
            .get(&(pool_id.to_string(), member_id.to_string()))
            .cloned()
            .ok_or_else(|| Self::not_found("member"))
    }

    async fn list_members(&self, pool_id: &str, _opts: &ListMembersOpts) -> Result<Vec<Member>> {
        self.record(format!("list_members {pool_id}"));
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .filter(|((pool, _), _)| pool == pool_id)
            .map(|(_, member)| member.clone())
            .collect())
    }

    async fn create_member(&self, pool_id: &str, opts: &CreateMemberOpts) -> Result<Member> {
        self.record(format!("create_member {pool_id}"));
        // Octavia assigns its own ID; the fake keys members by server name so
        // a follow-up lookup by server ID finds it.
        let id = opts.name.clone().unwrap_or_else(|| "member-1".to_string());
        let member = Member {
            id: id.clone(),
            name: id.clone(),
            address: opts.address.clone(),
            protocol_port: opts.protocol_port,
            weight: opts.weight.unwrap_or(1),
            admin_state_up: true,
            ..Default::default()
        };
        self.members
            .lock()
            .unwrap()
            .insert((pool_id.to_string(), id), member.clone());
        Ok(member)
    }

    async fn update_member(
        &self,
        pool_id: &str,
        member_id: &str,
        opts: &UpdateMemberOpts,
    ) -> Result<Member> {
        self.record(format!("update_member {pool_id} {member_id}"));
        if let Some(result) = self.update_results.lock().unwrap().pop_front() {
            return result;
        }
        let mut members = self.members.lock().unwrap();
        let member = members
            .get_mut(&(pool_id.to_string(), member_id.to_string()))
            .ok_or_else(|| Self::not_found("member"))?;
        if let Some(weight) = opts.weight {
            member.weight = weight;
        }
        Ok(member.clone())
    }

    async fn create_listener(&self, opts: &CreateListenerOpts) -> Result<Listener> {
        self.record(format!("create_listener {}", opts.loadbalancer_id));
        Ok(Listener {
            id: "listener-1".to_string(),
            protocol: opts.protocol.clone(),
            protocol_port: opts.protocol_port,
            ..Default::default()
        })
    }

    async fn list_listeners(&self, _opts: &ListListenersOpts) -> Result<Vec<Listener>> {
        self.record("list_listeners");
        Ok(Vec::new())
    }

    async fn delete_listener(&self, listener_id: &str) -> Result<()> {
        self.record(format!("delete_listener {listener_id}"));
        Err(Self::not_found("listener"))
    }

    async fn create_load_balancer(&self, opts: &CreateLoadBalancerOpts) -> Result<LoadBalancer> {
        self.record("create_load_balancer");
        let lb = LoadBalancer {
            id: "lb-1".to_string(),
            name: opts.name.clone().unwrap_or_default(),
            provisioning_status: "PENDING_CREATE".to_string(),
            ..Default::default()
        };
        self.load_balancers
            .lock()
            .unwrap()
            .insert(lb.id.clone(), lb.clone());
        Ok(lb)
    }

    async fn get_load_balancer(&self, lb_id: &str) -> Result<LoadBalancer> {
        self.record(format!("get_load_balancer {lb_id}"));
        self.load_balancers
            .lock()
            .unwrap()
            .get(lb_id)
            .cloned()
            .ok_or_else(|| Self::not_found("loadbalancer"))
    }

    async fn list_load_balancers(
        &self,
        _opts: &ListLoadBalancersOpts,
    ) -> Result<Vec<LoadBalancer>> {
        self.record("list_load_balancers");
        Ok(self.load_balancers.lock().unwrap().values().cloned().collect())
    }

    async fn get_load_balancer_stats(&self, lb_id: &str) -> Result<LoadBalancerStats> {
        self.record(format!("get_load_balancer_stats {lb_id}"));
        Ok(LoadBalancerStats {
            active_connections: 3,
            ..Default::default()
        })
    }

    /// The first delete is accepted; the resource is gone on the next call.
    async fn delete_load_balancer(
        &self,
        lb_id: &str,
        _opts: DeleteLoadBalancerOpts,
    ) -> Result<()> {
        self.record(format!("delete_load_balancer {lb_id}"));
        if self.deletes_never_finish.load(Ordering::SeqCst) {
            return Ok(());
        }
        match self.load_balancers.lock().unwrap().remove(lb_id) {
            Some(_) => Ok(()),
            None => Err(Self::not_found("loadbalancer")),
        }
    }
}
