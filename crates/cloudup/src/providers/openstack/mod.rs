//! OpenStack provider: Octavia load balancer adapters.
//!
//! - [`LoadBalancerApi`] is the Octavia API surface.
//! - [`Octavia`] implements it over the REST API.
//! - [`OpenstackCloud`] wraps every call in the retry policy for its verb.

mod client;
mod loadbalancer;
mod models;

pub use client::{LoadBalancerApi, Octavia};
pub use loadbalancer::OpenstackCloud;
pub use models::*;
