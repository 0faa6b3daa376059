//! Declarative cloud resource reconciliation for CTO Platform.
//!
//! This crate reconciles desired cloud state against what actually exists:
//!
//! - **GCE** - forwarding rules, rendered either through the compute API or
//!   as Terraform JSON
//! - **OpenStack** - Octavia load balancers, pools, members, listeners and
//!   health monitors
//!
//! ## Reconciliation
//!
//! A task ([`fi::Task`]) describes one resource. [`fi::run_delta`] reads the
//! actual state, computes the changeset and hands it to a render target:
//!
//! 1. [`GceApiTarget`] - applies changes live and waits for operations
//! 2. [`TerraformTarget`] - records resources with symbolic cross-references
//!
//! ## Retries
//!
//! Provider calls go through [`retry::retry_with_backoff`] with a bounded
//! exponential policy per verb (read, write, delete, member update).

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod fi;
pub mod gcetasks;
pub mod providers;
pub mod retry;

pub use config::{GceConfig, OpenstackConfig};
pub use error::{CloudupError, Result};
pub use fi::terraform::TerraformTarget;
pub use fi::{run_delta, Lifecycle, Render, RenderTarget, Task};
pub use gcetasks::{ForwardingRule, ForwardingRuleSpec};
pub use providers::{GceApiTarget, GceCloud, OpenstackCloud};
