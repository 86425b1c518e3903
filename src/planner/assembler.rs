//! Plan assembly.
//!
//! Walks an expanded document in order (explicit upstreams, explicit
//! services, then routes), resolves each resource remotely, classifies it and
//! appends a [`Change`]. Dependencies are planned before their dependents and
//! no resource is planned twice.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::admin::{target_key, AdminApi, ResourceKind};
use crate::config::{ExpandedDocument, RouteSpec, ServiceSpec, TargetSpec, UpstreamSpec};
use crate::error::Result;

use super::diff::{Action, DiffEngine};
use super::payload;
use super::plan::{Change, Plan};
use super::resolver::RemoteResolver;

/// Builds an ordered [`Plan`] from an expanded document.
pub struct PlanAssembler<'a, A: AdminApi + ?Sized> {
    resolver: RemoteResolver<'a, A>,
    engine: DiffEngine,
    changes: Vec<Change>,
    planned: HashSet<(ResourceKind, String)>,
    created_upstreams: HashSet<String>,
}

impl<'a, A: AdminApi + ?Sized> PlanAssembler<'a, A> {
    /// Creates an assembler resolving through `admin`.
    #[must_use]
    pub fn new(admin: &'a A) -> Self {
        Self {
            resolver: RemoteResolver::new(admin),
            engine: DiffEngine::new(),
            changes: Vec::new(),
            planned: HashSet::new(),
            created_upstreams: HashSet::new(),
        }
    }

    /// Assembles the plan.
    ///
    /// # Errors
    ///
    /// Returns a fetch error if a lookup fails, or a dependency error if a
    /// route references a service that neither exists nor is planned earlier.
    pub async fn assemble(mut self, document: &ExpandedDocument) -> Result<Plan> {
        info!("Assembling plan for {} resources", document.resource_count());

        for upstream in &document.upstreams {
            self.plan_upstream(upstream, None).await?;
        }

        for service in &document.services {
            if let Some(upstream) = service.upstream.as_deref().filter(|u| !u.is_empty()) {
                let bound = UpstreamSpec {
                    name: upstream.to_string(),
                    targets: Vec::new(),
                };
                self.plan_upstream(&bound, None).await?;
                for target in &service.targets {
                    self.plan_target(upstream, target, None).await?;
                }
            }
            self.plan_service(service, None).await?;
        }

        for expanded in &document.routes {
            let owner = expanded.route.name.as_str();
            if let Some(generated) = &expanded.generated {
                self.plan_upstream(&generated.upstream, Some(owner)).await?;
                self.plan_service(&generated.service, Some(owner)).await?;
            }
            self.plan_route(&expanded.route).await?;
        }

        let plan = Plan::new(self.changes, document.shorthand_links());
        info!(
            "Plan assembled: {} to create, {} to update, {} unchanged ({} lookups)",
            plan.count(Action::Create),
            plan.count(Action::Update),
            plan.count(Action::NoChange),
            self.resolver.lookups()
        );
        Ok(plan)
    }

    /// Marks a resource as planned; returns false if it already was.
    fn claim(&mut self, kind: ResourceKind, name: &str) -> bool {
        let fresh = self.planned.insert((kind, name.to_string()));
        if !fresh {
            debug!("{kind} '{name}' already planned");
        }
        fresh
    }

    async fn plan_upstream(&mut self, spec: &UpstreamSpec, owner: Option<&str>) -> Result<()> {
        if self.claim(ResourceKind::Upstream, &spec.name) {
            let remote = self.resolver.upstream(&spec.name).await?;
            let diff = self.engine.diff_upstream(remote.as_ref());
            if diff.action == Action::Create {
                self.created_upstreams.insert(spec.name.clone());
            }
            self.changes.push(Change {
                kind: ResourceKind::Upstream,
                name: spec.name.clone(),
                action: diff.action,
                diffs: diff.details,
                auto_generated_for: owner.map(String::from),
                payload: payload::upstream(spec),
            });
        }

        for target in &spec.targets {
            self.plan_target(&spec.name, target, owner).await?;
        }
        Ok(())
    }

    async fn plan_target(
        &mut self,
        upstream: &str,
        spec: &TargetSpec,
        owner: Option<&str>,
    ) -> Result<()> {
        let name = target_key(upstream, &spec.target);
        if !self.claim(ResourceKind::Target, &name) {
            return Ok(());
        }

        // Targets of an upstream being created cannot exist yet.
        let remote = if self.created_upstreams.contains(upstream) {
            None
        } else {
            self.resolver.target(upstream, &spec.target).await?
        };

        let diff = self.engine.diff_target(spec, remote.as_ref());
        self.changes.push(Change {
            kind: ResourceKind::Target,
            name,
            action: diff.action,
            diffs: diff.details,
            auto_generated_for: owner.map(String::from),
            payload: payload::target(upstream, spec),
        });
        Ok(())
    }

    async fn plan_service(&mut self, spec: &ServiceSpec, owner: Option<&str>) -> Result<()> {
        if !self.claim(ResourceKind::Service, &spec.name) {
            return Ok(());
        }

        let remote = self.resolver.service(&spec.name).await?;
        let diff = self.engine.diff_service(spec, remote.as_ref());
        if diff.action == Action::Create {
            self.resolver.plan_service(&spec.name);
        }

        self.changes.push(Change {
            kind: ResourceKind::Service,
            name: spec.name.clone(),
            action: diff.action,
            diffs: diff.details,
            auto_generated_for: owner.map(String::from),
            payload: payload::service(spec),
        });
        Ok(())
    }

    async fn plan_route(&mut self, spec: &RouteSpec) -> Result<()> {
        if !self.claim(ResourceKind::Route, &spec.name) {
            return Ok(());
        }

        let service = spec.service.as_deref().unwrap_or_default();
        let service_id = self.resolver.require_service(&spec.name, service).await?;

        let remote = self.resolver.route(&spec.name).await?;
        let diff = self
            .engine
            .diff_route(spec, remote.as_ref(), service_id.as_deref());

        let payload = if diff.action == Action::Create {
            payload::route_create(spec)
        } else {
            payload::route_update(spec)
        };

        self.changes.push(Change {
            kind: ResourceKind::Route,
            name: spec.name.clone(),
            action: diff.action,
            diffs: diff.details,
            auto_generated_for: None,
            payload,
        });
        Ok(())
    }
}
