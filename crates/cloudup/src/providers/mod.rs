//! Cloud provider clients.

pub mod gce;
pub mod openstack;

pub use gce::{GceApiTarget, GceCloud};
pub use openstack::OpenstackCloud;
