//! Admin API contract.

use async_trait::async_trait;

use crate::error::Result;

use super::types::{Resource, ResourceKind};

/// Operations the reconciliation pipeline needs from a gateway control plane.
///
/// Targets are addressed by the name `<upstream>/<address>`; every other kind
/// by its own name.
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Looks up a resource by name.
    ///
    /// Returns `Ok(None)` when the control plane reports it as not found.
    ///
    /// # Errors
    ///
    /// Returns an error for any other non-success response or transport failure.
    async fn get_by_name(&self, kind: ResourceKind, name: &str) -> Result<Option<Resource>>;

    /// Lists every resource of a kind, following pagination.
    ///
    /// Targets of all upstreams are listed, each carrying its upstream name.
    ///
    /// # Errors
    ///
    /// Returns an error for any non-success response or transport failure.
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>>;

    /// Creates a resource from a full payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn create(&self, payload: &Resource) -> Result<Resource>;

    /// Partially updates the named resource with the declared fields of `payload`.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn patch(&self, name: &str, payload: &Resource) -> Result<Resource>;
}
