//! Reserved IP address reference.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CloudupError, Result};
use crate::fi::terraform::Literal;
use crate::providers::gce::{ComputeAddress, GceCloud};

/// A reserved address, by name.
///
/// `ip_address` is filled in when the address is read from the cloud or when
/// the desired state already knows it; it is not part of the identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Address {}

impl From<ComputeAddress> for Address {
    fn from(address: ComputeAddress) -> Self {
        Self {
            name: address.name,
            ip_address: Some(address.address).filter(|ip| !ip.is_empty()),
        }
    }
}

impl Address {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ip_address: None,
        }
    }

    /// Read the address by name in `region`. `Ok(None)` if it does not exist.
    ///
    /// # Errors
    /// Returns API errors other than not-found.
    pub async fn find(&self, cloud: &GceCloud, region: &str) -> Result<Option<Self>> {
        match cloud
            .compute()
            .get_address(cloud.project(), region, &self.name)
            .await
        {
            Ok(address) => Ok(Some(address.into())),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.with_context(format!("error getting Address {:?}", self.name))),
        }
    }

    /// Reverse lookup: the address in `region` that reserves `ip`.
    ///
    /// # Errors
    /// Returns API errors, or [`CloudupError::Config`] if more than one
    /// address holds the IP.
    pub async fn find_by_ip(cloud: &GceCloud, ip: &str, region: &str) -> Result<Option<Self>> {
        let filter = format!("address eq {ip}");
        let mut matches = cloud
            .compute()
            .list_addresses(cloud.project(), region, &filter)
            .await
            .map_err(|e| e.with_context(format!("error listing Addresses with IP {ip:?}")))?;

        match matches.len() {
            0 => {
                debug!(ip = %ip, region = %region, "No Address reserves IP");
                Ok(None)
            }
            1 => Ok(matches.pop().map(Self::from)),
            n => Err(CloudupError::Config(format!(
                "found {n} Addresses with IP {ip:?}"
            ))),
        }
    }

    #[must_use]
    pub fn terraform_address(&self) -> Literal {
        Literal::property("google_compute_address", &self.name, "address")
    }
}
