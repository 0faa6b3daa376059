//! GCE tasks.

mod address;
mod forwarding_rule;
mod references;

pub use address::Address;
pub use forwarding_rule::{ForwardingRule, ForwardingRuleSpec, ForwardingTarget, IpSource};
pub use references::{BackendService, Network, Subnet, TargetPool};
