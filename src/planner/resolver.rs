//! Remote state resolution.
//!
//! One get-by-name lookup per desired resource. A not-found answer means the
//! resource is absent; any other failure aborts planning. The resolver also
//! remembers which services exist (with their ids) or are planned for
//! creation, so routes can be checked against them.

use std::collections::HashMap;
use tracing::{debug, trace};

use crate::admin::{target_key, AdminApi, Resource, ResourceKind, Route, Service, Target, Upstream};
use crate::error::{AdminError, GatesyncError, PlanError, Result};

/// Resolves remote state through an [`AdminApi`].
pub struct RemoteResolver<'a, A: AdminApi + ?Sized> {
    admin: &'a A,
    /// Known services by name: `Some(id)` when present remotely, `None` when
    /// only planned for creation.
    services: HashMap<String, Option<String>>,
    lookups: usize,
}

impl<'a, A: AdminApi + ?Sized> RemoteResolver<'a, A> {
    /// Creates a resolver over an admin client.
    #[must_use]
    pub fn new(admin: &'a A) -> Self {
        Self {
            admin,
            services: HashMap::new(),
            lookups: 0,
        }
    }

    /// Number of remote lookups performed so far.
    #[must_use]
    pub const fn lookups(&self) -> usize {
        self.lookups
    }

    /// Looks up a resource by name.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::FetchFailed`] for any failure other than not found.
    pub async fn fetch(&mut self, kind: ResourceKind, name: &str) -> Result<Option<Resource>> {
        self.lookups += 1;
        trace!("Resolving {kind} '{name}'");

        let found = self
            .admin
            .get_by_name(kind, name)
            .await
            .map_err(|e| fetch_failed(kind, name, &e))?;

        if let Some(resource) = &found {
            if resource.kind() != kind {
                let e = GatesyncError::from(AdminError::invalid_response(format!(
                    "expected a {kind}, got a {}",
                    resource.kind()
                )));
                return Err(fetch_failed(kind, name, &e));
            }
        }

        debug!(
            "{kind} '{name}' is {}",
            if found.is_some() { "present" } else { "absent" }
        );
        Ok(found)
    }

    /// Looks up an upstream.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn upstream(&mut self, name: &str) -> Result<Option<Upstream>> {
        Ok(self
            .fetch(ResourceKind::Upstream, name)
            .await?
            .and_then(|r| match r {
                Resource::Upstream(u) => Some(u),
                _ => None,
            }))
    }

    /// Looks up a target under an upstream.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn target(&mut self, upstream: &str, address: &str) -> Result<Option<Target>> {
        Ok(self
            .fetch(ResourceKind::Target, &target_key(upstream, address))
            .await?
            .and_then(|r| match r {
                Resource::Target(t) => Some(t),
                _ => None,
            }))
    }

    /// Looks up a service and remembers its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn service(&mut self, name: &str) -> Result<Option<Service>> {
        let service = self
            .fetch(ResourceKind::Service, name)
            .await?
            .and_then(|r| match r {
                Resource::Service(s) => Some(s),
                _ => None,
            });

        if let Some(s) = &service {
            self.services.insert(name.to_string(), s.id.clone());
        }
        Ok(service)
    }

    /// Looks up a route.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn route(&mut self, name: &str) -> Result<Option<Route>> {
        Ok(self
            .fetch(ResourceKind::Route, name)
            .await?
            .and_then(|r| match r {
                Resource::Route(route) => Some(route),
                _ => None,
            }))
    }

    /// Records a service that is planned for creation earlier in this pass.
    pub fn plan_service(&mut self, name: &str) {
        self.services.entry(name.to_string()).or_insert(None);
    }

    /// Resolves the service a route references.
    ///
    /// Returns the remote id, or `None` when the service is planned for
    /// creation earlier in this pass. Services never seen before are looked up
    /// remotely.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::DependencyResolutionFailed`] if the service is
    /// neither present remotely nor planned, or a fetch error.
    pub async fn require_service(&mut self, route: &str, service: &str) -> Result<Option<String>> {
        if let Some(id) = self.services.get(service) {
            return Ok(id.clone());
        }

        match self.service(service).await? {
            Some(s) => Ok(s.id),
            None => Err(PlanError::missing_service(route, service).into()),
        }
    }
}

fn fetch_failed(kind: ResourceKind, name: &str, error: &GatesyncError) -> GatesyncError {
    PlanError::FetchFailed {
        kind,
        name: name.to_string(),
        reason: error.to_string(),
    }
    .into()
}
