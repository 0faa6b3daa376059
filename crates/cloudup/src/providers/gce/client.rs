//! GCE compute API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::models::{
    AddressListResponse, ComputeAddress, ComputeForwardingRule, Operation, RegionSetLabelsRequest,
};
use crate::error::{CloudupError, Result};

/// Default compute API base URL.
pub const DEFAULT_COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The subset of the compute API used by the GCE tasks.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// `forwardingRules.get`
    async fn get_forwarding_rule(
        &self,
        project: &str,
        region: &str,
        name: &str,
    ) -> Result<ComputeForwardingRule>;

    /// `forwardingRules.insert`
    async fn insert_forwarding_rule(
        &self,
        project: &str,
        region: &str,
        rule: &ComputeForwardingRule,
    ) -> Result<Operation>;

    /// `forwardingRules.setLabels`
    async fn set_forwarding_rule_labels(
        &self,
        project: &str,
        region: &str,
        name: &str,
        req: &RegionSetLabelsRequest,
    ) -> Result<Operation>;

    /// `addresses.get`
    async fn get_address(&self, project: &str, region: &str, name: &str)
        -> Result<ComputeAddress>;

    /// `addresses.list` with a filter expression, all pages.
    async fn list_addresses(
        &self,
        project: &str,
        region: &str,
        filter: &str,
    ) -> Result<Vec<ComputeAddress>>;

    /// `regionOperations.get`
    async fn get_region_operation(
        &self,
        project: &str,
        region: &str,
        name: &str,
    ) -> Result<Operation>;
}

/// REST implementation of [`ComputeApi`].
#[derive(Clone)]
pub struct Gce {
    /// HTTP client.
    client: Client,
    /// Access token (from service account or user).
    access_token: String,
    /// API base URL.
    endpoint: String,
}

impl Gce {
    /// Create a new compute client.
    ///
    /// # Arguments
    /// * `access_token` - `OAuth2` access token
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            access_token: access_token.into(),
            endpoint: DEFAULT_COMPUTE_ENDPOINT.to_string(),
        })
    }

    /// Use a different API base URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn regional(&self, project: &str, region: &str, path: &str) -> String {
        format!(
            "{}/projects/{project}/regions/{region}/{path}",
            self.endpoint
        )
    }

    /// Make an authenticated GET request.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Make an authenticated POST request.
    async fn post<T, B>(&self, url: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + Sync,
    {
        debug!(url = %url, "POST request");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle API response.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse response");
                CloudupError::Serialization(e)
            })
        } else if status == StatusCode::NOT_FOUND {
            Err(CloudupError::NotFound(text))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(CloudupError::Auth(text))
        } else {
            Err(CloudupError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

#[async_trait]
impl ComputeApi for Gce {
    async fn get_forwarding_rule(
        &self,
        project: &str,
        region: &str,
        name: &str,
    ) -> Result<ComputeForwardingRule> {
        let url = self.regional(project, region, &format!("forwardingRules/{name}"));
        self.get(&url, &[]).await
    }

    async fn insert_forwarding_rule(
        &self,
        project: &str,
        region: &str,
        rule: &ComputeForwardingRule,
    ) -> Result<Operation> {
        let url = self.regional(project, region, "forwardingRules");
        self.post(&url, rule).await
    }

    async fn set_forwarding_rule_labels(
        &self,
        project: &str,
        region: &str,
        name: &str,
        req: &RegionSetLabelsRequest,
    ) -> Result<Operation> {
        let url = self.regional(project, region, &format!("forwardingRules/{name}/setLabels"));
        self.post(&url, req).await
    }

    async fn get_address(
        &self,
        project: &str,
        region: &str,
        name: &str,
    ) -> Result<ComputeAddress> {
        let url = self.regional(project, region, &format!("addresses/{name}"));
        self.get(&url, &[]).await
    }

    async fn list_addresses(
        &self,
        project: &str,
        region: &str,
        filter: &str,
    ) -> Result<Vec<ComputeAddress>> {
        let url = self.regional(project, region, "addresses");
        let mut addresses = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("filter", filter)];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }
            let page: AddressListResponse = self.get(&url, &query).await?;
            addresses.extend(page.items);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(addresses)
    }

    async fn get_region_operation(
        &self,
        project: &str,
        region: &str,
        name: &str,
    ) -> Result<Operation> {
        let url = self.regional(project, region, &format!("operations/{name}"));
        self.get(&url, &[]).await
    }
}
