//! GCE (Google Compute Engine) provider.
//!
//! - [`ComputeApi`] is the compute API surface the tasks call.
//! - [`Gce`] implements it over the REST API.
//! - [`GceCloud`] binds a client to a project and region and waits for
//!   long-running operations.
//! - [`GceApiTarget`] is the render target that applies changes live.

mod client;
mod cloud;
mod models;
pub mod urls;

pub use client::{ComputeApi, Gce, DEFAULT_COMPUTE_ENDPOINT};
pub use cloud::{GceApiTarget, GceCloud};
pub use models::*;
