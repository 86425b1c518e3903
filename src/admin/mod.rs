//! Gateway admin API access.
//!
//! - [`AdminApi`]: the contract the planner and executor depend on
//! - [`AdminClient`]: its HTTP implementation
//! - Resource types shared by payloads and remote state

mod api;
mod client;
mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use api::AdminApi;
pub use client::AdminClient;
pub use types::{
    split_target_key, target_key, Resource, ResourceKind, Route, Service, ServiceRef, Target,
    Upstream,
};
