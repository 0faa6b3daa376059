//! Octavia load balancer v2 API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::models::{
    CreateListenerOpts, CreateLoadBalancerOpts, CreateMemberOpts, CreateMonitorOpts,
    CreatePoolOpts, DeleteLoadBalancerOpts, ListListenersOpts, ListLoadBalancersOpts,
    ListMembersOpts, ListMonitorsOpts, ListPoolsOpts, Listener, LoadBalancer, LoadBalancerStats,
    Member, Monitor, Pool, UpdateMemberOpts,
};
use crate::error::{CloudupError, Result};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Header carrying the Keystone token.
const AUTH_HEADER: &str = "X-Auth-Token";

/// Octavia API surface used by the load balancer adapters.
///
/// List calls return every page.
#[async_trait]
pub trait LoadBalancerApi: Send + Sync {
    async fn create_monitor(&self, opts: &CreateMonitorOpts) -> Result<Monitor>;
    async fn list_monitors(&self, opts: &ListMonitorsOpts) -> Result<Vec<Monitor>>;
    async fn delete_monitor(&self, monitor_id: &str) -> Result<()>;

    async fn create_pool(&self, opts: &CreatePoolOpts) -> Result<Pool>;
    async fn get_pool(&self, pool_id: &str) -> Result<Pool>;
    async fn list_pools(&self, opts: &ListPoolsOpts) -> Result<Vec<Pool>>;
    async fn delete_pool(&self, pool_id: &str) -> Result<()>;

    async fn get_member(&self, pool_id: &str, member_id: &str) -> Result<Member>;
    async fn list_members(&self, pool_id: &str, opts: &ListMembersOpts) -> Result<Vec<Member>>;
    async fn create_member(&self, pool_id: &str, opts: &CreateMemberOpts) -> Result<Member>;
    async fn update_member(
        &self,
        pool_id: &str,
        member_id: &str,
        opts: &UpdateMemberOpts,
    ) -> Result<Member>;

    async fn create_listener(&self, opts: &CreateListenerOpts) -> Result<Listener>;
    async fn list_listeners(&self, opts: &ListListenersOpts) -> Result<Vec<Listener>>;
    async fn delete_listener(&self, listener_id: &str) -> Result<()>;

    async fn create_load_balancer(&self, opts: &CreateLoadBalancerOpts) -> Result<LoadBalancer>;
    async fn get_load_balancer(&self, lb_id: &str) -> Result<LoadBalancer>;
    async fn list_load_balancers(&self, opts: &ListLoadBalancersOpts)
        -> Result<Vec<LoadBalancer>>;
    async fn get_load_balancer_stats(&self, lb_id: &str) -> Result<LoadBalancerStats>;
    async fn delete_load_balancer(&self, lb_id: &str, opts: DeleteLoadBalancerOpts)
        -> Result<()>;
}

/// REST implementation of [`LoadBalancerApi`].
#[derive(Clone)]
pub struct Octavia {
    /// HTTP client.
    client: Client,
    /// Keystone token.
    auth_token: String,
    /// Load balancer endpoint from the service catalog.
    endpoint: String,
}

impl Octavia {
    /// Create a new Octavia client.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(endpoint: impl Into<String>, auth_token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            auth_token: auth_token.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/lbaas/{path}", self.endpoint)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTH_HEADER, &self.auth_token)
    }

    /// GET a single resource wrapped in `{key: ...}`.
    async fn get_one<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<T> {
        let url = self.url(path);
        debug!(url = %url, "GET request");

        let response = self.authed(self.client.get(&url)).send().await?;
        let body: Value = Self::handle_response(response).await?;
        unwrap_body(body, key)
    }

    /// GET every page of a collection, following `<key>_links` "next".
    async fn list_all<T, Q>(&self, path: &str, key: &str, query: &Q) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + Sync,
    {
        let links_key = format!("{key}_links");
        let mut items = Vec::new();
        let mut url = self.url(path);
        let mut first_page = true;

        loop {
            debug!(url = %url, "GET request");
            let mut request = self.authed(self.client.get(&url));
            if first_page {
                request = request.query(query);
            }
            let mut page: Value = Self::handle_response(request.send().await?).await?;

            let batch = page.get_mut(key).map(Value::take).unwrap_or_default();
            if !batch.is_null() {
                items.extend(serde_json::from_value::<Vec<T>>(batch)?);
            }

            match next_link(&page, &links_key) {
                Some(next) => {
                    url = next;
                    first_page = false;
                }
                None => break,
            }
        }

        Ok(items)
    }

    /// POST a body wrapped in `{key: ...}` and unwrap the response.
    async fn create<T, B>(&self, path: &str, key: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let url = self.url(path);
        debug!(url = %url, "POST request");

        let response = self
            .authed(self.client.post(&url))
            .json(&wrap_body(key, body)?)
            .send()
            .await?;
        let body: Value = Self::handle_response(response).await?;
        unwrap_body(body, key)
    }

    /// PUT a body wrapped in `{key: ...}` and unwrap the response.
    async fn update<T, B>(&self, path: &str, key: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let url = self.url(path);
        debug!(url = %url, "PUT request");

        let response = self
            .authed(self.client.put(&url))
            .json(&wrap_body(key, body)?)
            .send()
            .await?;
        let body: Value = Self::handle_response(response).await?;
        unwrap_body(body, key)
    }

    async fn delete(&self, path: &str, query: &[(&str, &str)]) -> Result<()> {
        let url = self.url(path);
        debug!(url = %url, "DELETE request");

        let response = self
            .authed(self.client.delete(&url))
            .query(query)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(Self::error_for(status, response.text().await?))
    }

    /// Handle API response.
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse response");
                CloudupError::Serialization(e)
            })
        } else {
            Err(Self::error_for(status, text))
        }
    }

    fn error_for(status: StatusCode, text: String) -> CloudupError {
        match status {
            StatusCode::NOT_FOUND => CloudupError::NotFound(text),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CloudupError::Auth(text),
            _ => CloudupError::Api {
                status: status.as_u16(),
                message: text,
            },
        }
    }
}

fn wrap_body<B: Serialize>(key: &str, body: &B) -> Result<Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), serde_json::to_value(body)?);
    Ok(Value::Object(map))
}

fn unwrap_body<T: DeserializeOwned>(mut body: Value, key: &str) -> Result<T> {
    let inner = body.get_mut(key).map(Value::take).unwrap_or(body);
    Ok(serde_json::from_value(inner)?)
}

fn next_link(page: &Value, links_key: &str) -> Option<String> {
    page.get(links_key)?
        .as_array()?
        .iter()
        .find(|link| link.get("rel").and_then(Value::as_str) == Some("next"))?
        .get("href")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl LoadBalancerApi for Octavia {
    async fn create_monitor(&self, opts: &CreateMonitorOpts) -> Result<Monitor> {
        self.create("healthmonitors", "healthmonitor", opts).await
    }

    async fn list_monitors(&self, opts: &ListMonitorsOpts) -> Result<Vec<Monitor>> {
        self.list_all("healthmonitors", "healthmonitors", opts).await
    }

    async fn delete_monitor(&self, monitor_id: &str) -> Result<()> {
        self.delete(&format!("healthmonitors/{monitor_id}"), &[]).await
    }

    async fn create_pool(&self, opts: &CreatePoolOpts) -> Result<Pool> {
        self.create("pools", "pool", opts).await
    }

    async fn get_pool(&self, pool_id: &str) -> Result<Pool> {
        self.get_one(&format!("pools/{pool_id}"), "pool").await
    }

    async fn list_pools(&self, opts: &ListPoolsOpts) -> Result<Vec<Pool>> {
        self.list_all("pools", "pools", opts).await
    }

    async fn delete_pool(&self, pool_id: &str) -> Result<()> {
        self.delete(&format!("pools/{pool_id}"), &[]).await
    }

    async fn get_member(&self, pool_id: &str, member_id: &str) -> Result<Member> {
        self.get_one(&format!("pools/{pool_id}/members/{member_id}"), "member")
            .await
    }

    async fn list_members(&self, pool_id: &str, opts: &ListMembersOpts) -> Result<Vec<Member>> {
        self.list_all(&format!("pools/{pool_id}/members"), "members", opts)
            .await
    }

    async fn create_member(&self, pool_id: &str, opts: &CreateMemberOpts) -> Result<Member> {
        self.create(&format!("pools/{pool_id}/members"), "member", opts)
            .await
    }

    async fn update_member(
        &self,
        pool_id: &str,
        member_id: &str,
        opts: &UpdateMemberOpts,
    ) -> Result<Member> {
        self.update(&format!("pools/{pool_id}/members/{member_id}"), "member", opts)
            .await
    }

    async fn create_listener(&self, opts: &CreateListenerOpts) -> Result<Listener> {
        self.create("listeners", "listener", opts).await
    }

    async fn list_listeners(&self, opts: &ListListenersOpts) -> Result<Vec<Listener>> {
        self.list_all("listeners", "listeners", opts).await
    }

    async fn delete_listener(&self, listener_id: &str) -> Result<()> {
        self.delete(&format!("listeners/{listener_id}"), &[]).await
    }

    async fn create_load_balancer(&self, opts: &CreateLoadBalancerOpts) -> Result<LoadBalancer> {
        self.create("loadbalancers", "loadbalancer", opts).await
    }

    async fn get_load_balancer(&self, lb_id: &str) -> Result<LoadBalancer> {
        self.get_one(&format!("loadbalancers/{lb_id}"), "loadbalancer")
            .await
    }

    async fn list_load_balancers(
        &self,
        opts: &ListLoadBalancersOpts,
    ) -> Result<Vec<LoadBalancer>> {
        self.list_all("loadbalancers", "loadbalancers", opts).await
    }

    async fn get_load_balancer_stats(&self, lb_id: &str) -> Result<LoadBalancerStats> {
        self.get_one(&format!("loadbalancers/{lb_id}/stats"), "stats")
            .await
    }

    async fn delete_load_balancer(
        &self,
        lb_id: &str,
        opts: DeleteLoadBalancerOpts,
    ) -> Result<()> {
        let query: &[(&str, &str)] = if opts.cascade {
            &[("cascade", "true")]
        } else {
            &[]
        };
        self.delete(&format!("loadbalancers/{lb_id}"), query).await
    }
}
