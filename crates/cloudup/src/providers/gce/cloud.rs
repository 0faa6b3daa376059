//! GCE cloud handle and the live-API render target.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::client::{ComputeApi, Gce};
use super::models::Operation;
use super::urls::last_component;
use crate::config::{
    GceConfig, DEFAULT_OPERATION_POLL_INTERVAL_SECS, DEFAULT_OPERATION_TIMEOUT_SECS,
};
use crate::error::{CloudupError, Result};
use crate::fi::RenderTarget;

/// Compute client bound to a project and region.
#[derive(Clone)]
pub struct GceCloud {
    compute: Arc<dyn ComputeApi>,
    project: String,
    region: String,
    poll_interval: Duration,
    operation_timeout: Duration,
    cancel: CancellationToken,
}

impl GceCloud {
    /// Create a cloud handle around any [`ComputeApi`] implementation.
    pub fn new(
        compute: Arc<dyn ComputeApi>,
        project: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            compute,
            project: project.into(),
            region: region.into(),
            poll_interval: Duration::from_secs(DEFAULT_OPERATION_POLL_INTERVAL_SECS),
            operation_timeout: Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS),
            cancel: CancellationToken::new(),
        }
    }

    /// Create a REST-backed cloud handle from configuration.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn from_config(config: &GceConfig) -> Result<Self> {
        let mut gce = Gce::new(&config.access_token)?;
        if let Some(endpoint) = &config.endpoint {
            gce = gce.with_endpoint(endpoint);
        }
        Ok(Self::new(Arc::new(gce), &config.project, &config.region)
            .with_operation_polling(config.operation_poll_interval, config.operation_timeout))
    }

    /// Override how operations are polled.
    #[must_use]
    pub fn with_operation_polling(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.operation_timeout = timeout;
        self
    }

    /// Abort operation polling when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The compute API.
    #[must_use]
    pub fn compute(&self) -> &dyn ComputeApi {
        self.compute.as_ref()
    }

    /// Project ID.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Default region.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Poll a regional operation until it is done.
    ///
    /// # Errors
    /// Returns [`CloudupError::OperationFailed`] if the operation finished
    /// with errors, [`CloudupError::WaitTimeout`] if it did not finish in
    /// time, or the polling error.
    pub async fn wait_for_op(&self, op: &Operation) -> Result<()> {
        let region = if op.region.is_empty() {
            self.region.clone()
        } else {
            last_component(&op.region)
        };

        let start = Instant::now();
        let mut current = op.clone();

        loop {
            if current.is_done() {
                if let Some(message) = current.error_message() {
                    return Err(CloudupError::OperationFailed {
                        name: current.name,
                        message,
                    });
                }
                debug!(
                    operation = %current.name,
                    duration_secs = current.duration_secs(),
                    "Operation completed"
                );
                return Ok(());
            }

            if start.elapsed() > self.operation_timeout {
                info!(
                    operation = %current.name,
                    timeout_secs = self.operation_timeout.as_secs(),
                    "Timed out waiting for operation"
                );
                return Err(CloudupError::WaitTimeout);
            }

            tokio::select! {
                () = self.cancel.cancelled() => return Err(CloudupError::Cancelled),
                () = tokio::time::sleep(self.poll_interval) => {}
            }

            debug!(
                operation = %current.name,
                status = %current.status,
                elapsed_secs = start.elapsed().as_secs(),
                "Polling operation status"
            );
            current = self
                .compute
                .get_region_operation(&self.project, &region, &op.name)
                .await?;
        }
    }
}

/// Render target that applies changes through the compute API.
#[derive(Clone)]
pub struct GceApiTarget {
    cloud: GceCloud,
}

impl GceApiTarget {
    /// Create a target for `cloud`.
    #[must_use]
    pub fn new(cloud: GceCloud) -> Self {
        Self { cloud }
    }

    /// The cloud this target writes to.
    #[must_use]
    pub fn cloud(&self) -> &GceCloud {
        &self.cloud
    }
}

impl RenderTarget for GceApiTarget {
    fn name(&self) -> &'static str {
        "gce"
    }
}
