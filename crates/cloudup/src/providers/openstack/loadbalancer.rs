//! Load balancer adapters.
//!
//! Every call goes through [`retry_with_backoff`] with the policy for its
//! verb. Deletes poll until the resource is gone, so calling them for a
//! resource that no longer exists succeeds.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::{LoadBalancerApi, Octavia};
use super::models::{
    CreateListenerOpts, CreateLoadBalancerOpts, CreateMemberOpts, CreateMonitorOpts,
    CreatePoolOpts, DeleteLoadBalancerOpts, ListListenersOpts, ListLoadBalancersOpts,
    ListMembersOpts, ListMonitorsOpts, ListPoolsOpts, Listener, LoadBalancer, LoadBalancerStats,
    Member, Monitor, Pool, Server, UpdateMemberOpts,
};
use crate::config::OpenstackConfig;
use crate::error::{CloudupError, Result};
use crate::retry::{
    retry_with_backoff, Attempt, DELETE_BACKOFF, MEMBER_BACKOFF, READ_BACKOFF, WRITE_BACKOFF,
};

/// Capability name reported when the deployment has no load balancer service.
const LOADBALANCER: &str = "loadbalancer";

/// OpenStack cloud handle.
#[derive(Clone, Default)]
pub struct OpenstackCloud {
    lb: Option<Arc<dyn LoadBalancerApi>>,
    cancel: CancellationToken,
}

/// Treat not-found as done and anything else as "not gone yet".
fn delete_attempt(result: Result<()>, what: &str) -> Attempt<()> {
    match result {
        Err(err) if err.is_not_found() => Attempt::Done(()),
        Err(err) if err.is_permanent() => Attempt::Fatal(err),
        Err(err) => Attempt::Retry(Some(err.with_context(format!("error deleting {what}")))),
        // Deletion accepted; the next attempt confirms it is gone.
        Ok(()) => Attempt::Retry(None),
    }
}

/// Done on success, retry on failure with `context` prefixed.
fn call_attempt<T>(result: Result<T>, context: &str) -> Attempt<T> {
    match result {
        Ok(value) => Attempt::Done(value),
        Err(err) => Attempt::from_error(err.with_context(context)),
    }
}

/// Like [`call_attempt`], but a missing resource is final and errors keep no context.
fn get_attempt<T>(result: Result<T>) -> Attempt<T> {
    match result {
        Ok(value) => Attempt::Done(value),
        Err(err) if err.is_not_found() => Attempt::Fatal(err),
        Err(err) => Attempt::from_error(err),
    }
}

impl OpenstackCloud {
    /// Create a handle; `None` means the deployment has no load balancer service.
    #[must_use]
    pub fn new(lb: Option<Arc<dyn LoadBalancerApi>>) -> Self {
        Self {
            lb,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a REST-backed handle from configuration.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn from_config(config: &OpenstackConfig) -> Result<Self> {
        let lb = match &config.loadbalancer_endpoint {
            Some(endpoint) => {
                let octavia = Octavia::new(endpoint, &config.auth_token)?;
                Some(Arc::new(octavia) as Arc<dyn LoadBalancerApi>)
            }
            None => {
                debug!("No load balancer endpoint configured");
                None
            }
        };
        Ok(Self::new(lb))
    }

    /// Stop retrying when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The load balancer client, if this deployment has one.
    #[must_use]
    pub fn load_balancer_client(&self) -> Option<&dyn LoadBalancerApi> {
        self.lb.as_deref()
    }

    fn require_lb(&self) -> Result<&dyn LoadBalancerApi> {
        self.load_balancer_client()
            .ok_or(CloudupError::CapabilityUnavailable(LOADBALANCER))
    }

    // ------------------------------------------------------------------
    // Health monitors
    // ------------------------------------------------------------------

    /// Create a health monitor for a pool.
    ///
    /// # Errors
    /// Returns the last API error once the write policy is exhausted.
    pub async fn create_pool_monitor(&self, opts: &CreateMonitorOpts) -> Result<Monitor> {
        let lb = self.require_lb()?;
        retry_with_backoff(&WRITE_BACKOFF, &self.cancel, "create_pool_monitor", move || async move {
            call_attempt(
                lb.create_monitor(opts).await,
                "failed to create pool monitor",
            )
        })
        .await
    }

    /// List health monitors.
    ///
    /// # Errors
    /// Returns the last API error once the read policy is exhausted.
    pub async fn list_monitors(&self, opts: &ListMonitorsOpts) -> Result<Vec<Monitor>> {
        let lb = self.require_lb()?;
        retry_with_backoff(&READ_BACKOFF, &self.cancel, "list_monitors", move || async move {
            call_attempt(lb.list_monitors(opts).await, "failed to list monitors")
        })
        .await
    }

    /// Delete a health monitor and wait until it is gone.
    ///
    /// # Errors
    /// Returns [`CloudupError::WaitTimeout`] if the monitor is still present
    /// when the delete policy is exhausted.
    pub async fn delete_monitor(&self, monitor_id: &str) -> Result<()> {
        let lb = self.require_lb()?;
        retry_with_backoff(&DELETE_BACKOFF, &self.cancel, "delete_monitor", move || async move {
            delete_attempt(lb.delete_monitor(monitor_id).await, "monitor")
        })
        .await
    }

    // ------------------------------------------------------------------
    // Pools
    // ------------------------------------------------------------------

    /// Create a pool.
    ///
    /// # Errors
    /// Returns the last API error once the write policy is exhausted.
    pub async fn create_pool(&self, opts: &CreatePoolOpts) -> Result<Pool> {
        let lb = self.require_lb()?;
        retry_with_backoff(&WRITE_BACKOFF, &self.cancel, "create_pool", move || async move {
            call_attempt(lb.create_pool(opts).await, "failed to create pool")
        })
        .await
    }

    /// Get a pool by ID.
    ///
    /// # Errors
    /// Returns [`CloudupError::NotFound`] immediately if the pool does not exist.
    pub async fn get_pool(&self, pool_id: &str) -> Result<Pool> {
        let lb = self.require_lb()?;
        retry_with_backoff(&READ_BACKOFF, &self.cancel, "get_pool", move || async move {
            get_attempt(lb.get_pool(pool_id).await)
        })
        .await
    }

    /// List pools.
    ///
    /// # Errors
    /// Returns the last API error once the read policy is exhausted.
    pub async fn list_pools(&self, opts: &ListPoolsOpts) -> Result<Vec<Pool>> {
        let lb = self.require_lb()?;
        retry_with_backoff(&READ_BACKOFF, &self.cancel, "list_pools", move || async move {
            call_attempt(lb.list_pools(opts).await, "failed to list pools")
        })
        .await
    }

    /// Delete a pool and wait until it is gone.
    ///
    /// # Errors
    /// Returns [`CloudupError::WaitTimeout`] if the pool is still present
    /// when the delete policy is exhausted.
    pub async fn delete_pool(&self, pool_id: &str) -> Result<()> {
        let lb = self.require_lb()?;
        retry_with_backoff(&DELETE_BACKOFF, &self.cancel, "delete_pool", move || async move {
            delete_attempt(lb.delete_pool(pool_id).await, "pool")
        })
        .await
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    /// Get a pool member.
    ///
    /// # Errors
    /// Returns [`CloudupError::NotFound`] immediately if the member does not exist.
    pub async fn get_pool_member(&self, pool_id: &str, member_id: &str) -> Result<Member> {
        let lb = self.require_lb()?;
        retry_with_backoff(&READ_BACKOFF, &self.cancel, "get_pool_member", move || async move {
            get_attempt(lb.get_member(pool_id, member_id).await)
        })
        .await
    }

    /// List the members of a pool.
    ///
    /// # Errors
    /// Returns the last API error once the read policy is exhausted.
    pub async fn list_pool_members(
        &self,
        pool_id: &str,
        opts: &ListMembersOpts,
    ) -> Result<Vec<Member>> {
        let lb = self.require_lb()?;
        retry_with_backoff(&READ_BACKOFF, &self.cancel, "list_pool_members", move || async move {
            call_attempt(lb.list_members(pool_id, opts).await, "failed to list members")
        })
        .await
    }

    /// Make `server` a member of the pool unless it already is one.
    ///
    /// Membership is keyed by the server ID. An existing member is returned
    /// as is, without comparing it to `opts`.
    ///
    /// # Errors
    /// Returns the last create error once the write policy is exhausted.
    pub async fn associate_to_pool(
        &self,
        server: &Server,
        pool_id: &str,
        opts: &CreateMemberOpts,
    ) -> Result<Member> {
        let lb = self.require_lb()?;
        retry_with_backoff(&WRITE_BACKOFF, &self.cancel, "associate_to_pool", move || async move {
            match lb.get_member(pool_id, &server.id).await {
                Ok(existing) => {
                    if existing.address != opts.address
                        || existing.protocol_port != opts.protocol_port
                    {
                        warn!(
                            pool_id = %pool_id,
                            member_id = %existing.id,
                            address = %existing.address,
                            port = existing.protocol_port,
                            wanted_address = %opts.address,
                            wanted_port = opts.protocol_port,
                            "Existing pool member differs from requested options, leaving it unchanged"
                        );
                    }
                    Attempt::Done(existing)
                }
                Err(err) => {
                    debug!(
                        pool_id = %pool_id,
                        server_id = %server.id,
                        error = %err,
                        "Pool member not found, creating"
                    );
                    call_attempt(
                        lb.create_member(pool_id, opts).await,
                        "failed to create pool association",
                    )
                }
            }
        })
        .await
    }

    /// Update a pool member.
    ///
    /// Returns `Ok(None)` if the member has already been removed.
    ///
    /// # Errors
    /// Returns [`CloudupError::WaitTimeout`] if the pool stays immutable for
    /// the whole member policy, or the last API error.
    pub async fn update_member_in_pool(
        &self,
        pool_id: &str,
        member_id: &str,
        opts: &UpdateMemberOpts,
    ) -> Result<Option<Member>> {
        let lb = self.require_lb()?;
        retry_with_backoff(
            &MEMBER_BACKOFF,
            &self.cancel,
            "update_member_in_pool",
            move || async move {
                match lb.update_member(pool_id, member_id, opts).await {
                    Ok(member) => Attempt::Done(Some(member)),
                    Err(err) if err.is_not_found() => Attempt::Done(None),
                    Err(err) if err.is_conflict() => {
                        info!(
                            pool_id = %pool_id,
                            member_id = %member_id,
                            "Pool is immutable, retrying"
                        );
                        Attempt::Retry(None)
                    }
                    Err(err) => {
                        Attempt::from_error(err.with_context("failed to update pool membership"))
                    }
                }
            },
        )
        .await
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Create a listener.
    ///
    /// # Errors
    /// Returns the last API error once the write policy is exhausted.
    pub async fn create_listener(&self, opts: &CreateListenerOpts) -> Result<Listener> {
        let lb = self.require_lb()?;
        retry_with_backoff(&WRITE_BACKOFF, &self.cancel, "create_listener", move || async move {
            call_attempt(lb.create_listener(opts).await, "unable to create listener")
        })
        .await
    }

    /// List listeners.
    ///
    /// # Errors
    /// Returns the last API error once the read policy is exhausted.
    pub async fn list_listeners(&self, opts: &ListListenersOpts) -> Result<Vec<Listener>> {
        let lb = self.require_lb()?;
        retry_with_backoff(&READ_BACKOFF, &self.cancel, "list_listeners", move || async move {
            call_attempt(lb.list_listeners(opts).await, "failed to list listeners")
        })
        .await
    }

    /// Delete a listener and wait until it is gone.
    ///
    /// # Errors
    /// Returns [`CloudupError::WaitTimeout`] if the listener is still present
    /// when the delete policy is exhausted.
    pub async fn delete_listener(&self, listener_id: &str) -> Result<()> {
        let lb = self.require_lb()?;
        retry_with_backoff(&DELETE_BACKOFF, &self.cancel, "delete_listener", move || async move {
            delete_attempt(lb.delete_listener(listener_id).await, "listener")
        })
        .await
    }

    // ------------------------------------------------------------------
    // Load balancers
    // ------------------------------------------------------------------

    /// Create a load balancer.
    ///
    /// # Errors
    /// Returns the last API error once the write policy is exhausted.
    pub async fn create_lb(&self, opts: &CreateLoadBalancerOpts) -> Result<LoadBalancer> {
        let lb = self.require_lb()?;
        retry_with_backoff(&WRITE_BACKOFF, &self.cancel, "create_lb", move || async move {
            call_attempt(
                lb.create_load_balancer(opts).await,
                "error creating loadbalancer",
            )
        })
        .await
    }

    /// Get a load balancer by ID.
    ///
    /// # Errors
    /// Returns [`CloudupError::NotFound`] immediately if it does not exist.
    pub async fn get_lb(&self, lb_id: &str) -> Result<LoadBalancer> {
        let lb = self.require_lb()?;
        retry_with_backoff(&READ_BACKOFF, &self.cancel, "get_lb", move || async move {
            get_attempt(lb.get_load_balancer(lb_id).await)
        })
        .await
    }

    /// List load balancers.
    ///
    /// Without a load balancer service there is nothing to list, so this
    /// returns an empty list instead of failing.
    ///
    /// # Errors
    /// Returns the last API error once the read policy is exhausted.
    pub async fn list_lbs(&self, opts: &ListLoadBalancersOpts) -> Result<Vec<LoadBalancer>> {
        let Some(lb) = self.load_balancer_client() else {
            return Ok(Vec::new());
        };
        retry_with_backoff(&READ_BACKOFF, &self.cancel, "list_lbs", move || async move {
            call_attempt(
                lb.list_load_balancers(opts).await,
                "failed to list loadbalancers",
            )
        })
        .await
    }

    /// Traffic counters for a load balancer, `None` without a load balancer service.
    ///
    /// # Errors
    /// Returns the last API error once the read policy is exhausted.
    pub async fn get_lb_stats(&self, lb_id: &str) -> Result<Option<LoadBalancerStats>> {
        let Some(lb) = self.load_balancer_client() else {
            return Ok(None);
        };
        retry_with_backoff(&READ_BACKOFF, &self.cancel, "get_lb_stats", move || async move {
            call_attempt(
                lb.get_load_balancer_stats(lb_id).await,
                "error getting load balancer stats",
            )
        })
        .await
        .map(Some)
    }

    /// Delete a load balancer and wait until it is gone.
    ///
    /// # Errors
    /// Returns [`CloudupError::WaitTimeout`] if the load balancer is still
    /// present when the delete policy is exhausted.
    pub async fn delete_lb(&self, lb_id: &str, opts: DeleteLoadBalancerOpts) -> Result<()> {
        let lb = self.require_lb()?;
        retry_with_backoff(&DELETE_BACKOFF, &self.cancel, "delete_lb", move || async move {
            delete_attempt(lb.delete_load_balancer(lb_id, opts).await, "loadbalancer")
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_attempt_classification() {
        assert!(matches!(
            delete_attempt(Err(CloudupError::NotFound("gone".into())), "pool"),
            Attempt::Done(())
        ));
        assert!(matches!(delete_attempt(Ok(()), "pool"), Attempt::Retry(None)));
        assert!(matches!(
            delete_attempt(
                Err(CloudupError::Api {
                    status: 500,
                    message: "boom".into()
                }),
                "pool"
            ),
            Attempt::Retry(Some(_))
        ));
        assert!(matches!(
            delete_attempt(Err(CloudupError::Auth("denied".into())), "pool"),
            Attempt::Fatal(_)
        ));
    }

    #[test]
    fn test_get_attempt_not_found_is_fatal() {
        let attempt: Attempt<Pool> = get_attempt(Err(CloudupError::NotFound("pool".into())));
        assert!(matches!(attempt, Attempt::Fatal(_)));
    }

    #[tokio::test]
    async fn test_missing_client() {
        let cloud = OpenstackCloud::new(None);

        let err = cloud.get_pool("pool-1").await.unwrap_err();
        assert!(matches!(err, CloudupError::CapabilityUnavailable(_)));
        assert_eq!(
            err.to_string(),
            "loadbalancer support not available in this deployment"
        );

        assert!(cloud
            .list_lbs(&ListLoadBalancersOpts::default())
            .await
            .unwrap()
            .is_empty());
        assert!(cloud.get_lb_stats("lb-1").await.unwrap().is_none());
    }
}
