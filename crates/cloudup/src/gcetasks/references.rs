//! Named references to GCE resources managed by other tasks.
//!
//! References compare by name only. The cloud returns them as URLs, which
//! `find` reduces to the last path component.

use serde::{Deserialize, Serialize};

use crate::fi::terraform::Literal;
use crate::providers::gce::urls::{global_url, regional_url};
use crate::providers::gce::GceCloud;

/// Reference to a target pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPool {
    pub name: String,
}

impl TargetPool {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Full URL in the cloud's project and region.
    #[must_use]
    pub fn url(&self, cloud: &GceCloud) -> String {
        regional_url(cloud.project(), cloud.region(), "targetPools", &self.name)
    }

    #[must_use]
    pub fn terraform_link(&self) -> Literal {
        Literal::self_link("google_compute_target_pool", &self.name)
    }
}

/// Reference to a regional backend service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendService {
    pub name: String,
}

impl BackendService {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Full URL of the backend service in `region`.
    #[must_use]
    pub fn url(&self, cloud: &GceCloud, region: &str) -> String {
        regional_url(cloud.project(), region, "backendServices", &self.name)
    }

    /// Terraform expects the service ID, not its self link.
    #[must_use]
    pub fn terraform_address(&self) -> Literal {
        Literal::property("google_compute_region_backend_service", &self.name, "id")
    }
}

/// Reference to a VPC network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    /// Project owning the network when it is not the cluster project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Network is not managed here, so there is no Terraform resource for it.
    #[serde(default)]
    pub shared: bool,
}

impl PartialEq for Network {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Network {}

impl Network {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Full URL of the network in `project`.
    #[must_use]
    pub fn url(&self, project: &str) -> String {
        global_url(project, "networks", &self.name)
    }

    #[must_use]
    pub fn terraform_link(&self) -> Literal {
        if self.shared {
            Literal::from_string_value(&self.name)
        } else {
            Literal::self_link("google_compute_network", &self.name)
        }
    }
}

/// Reference to a subnetwork.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub name: String,
}

impl Subnet {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Full URL of the subnetwork in `project` and `region`.
    #[must_use]
    pub fn url(&self, project: &str, region: &str) -> String {
        regional_url(project, region, "subnetworks", &self.name)
    }

    #[must_use]
    pub fn terraform_link(&self) -> Literal {
        Literal::self_link("google_compute_subnetwork", &self.name)
    }
}
