//! Export of the gateway's current configuration as a desired-state document.
//!
//! Every upstream (with its targets), service and route is listed through the
//! admin API and mapped back onto document types, so the result can be fed to
//! `plan` or `apply` unchanged. Services whose host is the name of an upstream
//! are exported bound to it; every other service is exported by URL.
//!
//! With shorthand folding, the first route of each upstream-bound service
//! absorbs that service and its upstream into a `backend` block. Resources that
//! cannot be folded stay declared explicitly.

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::admin::{AdminApi, Resource, ResourceKind, Route, Service, Target, Upstream};
use crate::config::{DesiredDocument, RouteBackend, RouteSpec, ServiceSpec, TargetSpec, UpstreamSpec};
use crate::error::{GatesyncError, Result};
use crate::planner::reconstruct_url;

/// Options controlling an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Fold upstream-bound services into the `backend` of their first route.
    pub shorthand: bool,
    /// With shorthand folding, also export upstreams no route folded.
    pub include_orphans: bool,
}

/// Remote state listed for an export.
#[derive(Debug, Default)]
struct Snapshot {
    upstreams: Vec<Upstream>,
    targets: BTreeMap<String, Vec<TargetSpec>>,
    services: Vec<Service>,
    routes: Vec<Route>,
}

/// Exports gateway state through an [`AdminApi`].
pub struct Exporter<'a, A: AdminApi + ?Sized> {
    admin: &'a A,
}

impl<'a, A: AdminApi + ?Sized> Exporter<'a, A> {
    /// Creates an exporter over an admin client.
    #[must_use]
    pub const fn new(admin: &'a A) -> Self {
        Self { admin }
    }

    /// Lists the gateway's resources and maps them onto a document.
    ///
    /// # Errors
    ///
    /// Returns the first admin API error hit while listing.
    pub async fn export(&self, options: ExportOptions) -> Result<DesiredDocument> {
        let snapshot = self.snapshot().await?;
        info!(
            "Exporting {} upstreams, {} services and {} routes",
            snapshot.upstreams.len(),
            snapshot.services.len(),
            snapshot.routes.len()
        );

        let document = if options.shorthand {
            fold(&snapshot, options.include_orphans)
        } else {
            full(&snapshot)
        };
        Ok(document)
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let mut snapshot = Snapshot::default();

        for resource in self.admin.list(ResourceKind::Upstream).await? {
            if let Resource::Upstream(upstream) = resource {
                if !upstream.name.trim().is_empty() {
                    snapshot.targets.entry(upstream.name.clone()).or_default();
                    snapshot.upstreams.push(upstream);
                }
            }
        }

        for resource in self.admin.list(ResourceKind::Target).await? {
            if let Resource::Target(target) = resource {
                add_target(&mut snapshot.targets, target);
            }
        }

        for resource in self.admin.list(ResourceKind::Service).await? {
            if let Resource::Service(service) = resource {
                snapshot.services.push(service);
            }
        }

        for resource in self.admin.list(ResourceKind::Route).await? {
            if let Resource::Route(route) = resource {
                snapshot.routes.push(route);
            }
        }

        snapshot.upstreams.sort_by(|a, b| a.name.cmp(&b.name));
        snapshot.services.sort_by(|a, b| a.name.cmp(&b.name));
        snapshot.routes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(snapshot)
    }
}

/// Serializes an exported document as YAML.
///
/// A document holding only routes is written as a top-level route list.
///
/// # Errors
///
/// Returns an internal error if serialization fails.
pub fn to_yaml(document: &DesiredDocument) -> Result<String> {
    let rendered = if document.upstreams.is_empty() && document.services.is_empty() {
        serde_yaml::to_string(&document.routes)
    } else {
        serde_yaml::to_string(document)
    };
    rendered.map_err(|e| GatesyncError::internal(format!("failed to serialize document: {e}")))
}

fn add_target(targets: &mut BTreeMap<String, Vec<TargetSpec>>, target: Target) {
    if target.target.trim().is_empty() {
        return;
    }
    match targets.get_mut(&target.upstream) {
        Some(list) => list.push(TargetSpec {
            target: target.target,
            weight: target.weight,
        }),
        None => debug!("Ignoring target '{}' of unknown upstream '{}'", target.target, target.upstream),
    }
}

/// Exports every resource explicitly.
fn full(snapshot: &Snapshot) -> DesiredDocument {
    let upstreams = snapshot
        .upstreams
        .iter()
        .map(|u| upstream_spec(snapshot, &u.name))
        .collect();
    let services = snapshot
        .services
        .iter()
        .filter_map(|s| service_spec(snapshot, s))
        .collect();
    let names = service_names(snapshot);
    let routes = snapshot
        .routes
        .iter()
        .filter_map(|r| route_spec(r, &names))
        .collect();

    DesiredDocument {
        upstreams,
        services,
        routes,
    }
}

/// Exports routes with their services and upstreams folded into backends.
fn fold(snapshot: &Snapshot, include_orphans: bool) -> DesiredDocument {
    let names = service_names(snapshot);
    let by_name: HashMap<&str, &Service> = snapshot.services.iter().map(|s| (s.name.as_str(), s)).collect();

    let mut folded_services: HashSet<&str> = HashSet::new();
    let mut folded_upstreams: HashSet<&str> = HashSet::new();
    let mut explicit: Vec<&Service> = Vec::new();
    let mut routes = Vec::with_capacity(snapshot.routes.len());

    for route in &snapshot.routes {
        let Some(mut spec) = route_spec(route, &names) else {
            continue;
        };
        let Some(service) = spec.service.as_deref().and_then(|name| by_name.get(name).copied()) else {
            routes.push(spec);
            continue;
        };

        if folded_services.contains(service.name.as_str()) {
            routes.push(spec);
            continue;
        }

        match bound_upstream(snapshot, service) {
            Some(upstream) if folded_upstreams.insert(upstream) => {
                folded_services.insert(service.name.as_str());
                spec.backend = Some(RouteBackend {
                    protocol: non_empty(service.protocol.as_deref()),
                    port: service.port.filter(|p| *p != 0),
                    path: non_empty(service.path.as_deref()),
                    targets: snapshot.targets.get(upstream).cloned().unwrap_or_default(),
                });
                spec.service_name =
                    Some(service.name.clone()).filter(|n| *n != format!("{}-service", spec.name));
                spec.upstream_name =
                    Some(upstream.to_string()).filter(|n| *n != format!("{}-upstream", spec.name));
                spec.service = None;
                debug!("Folded service '{}' into route '{}'", service.name, spec.name);
            }
            _ => {
                if !explicit.iter().any(|s| s.name == service.name) {
                    explicit.push(service);
                }
            }
        }
        routes.push(spec);
    }

    let services = explicit
        .into_iter()
        .filter_map(|s| service_spec(snapshot, s))
        .collect();
    let upstreams = if include_orphans {
        snapshot
            .upstreams
            .iter()
            .filter(|u| !folded_upstreams.contains(u.name.as_str()))
            .map(|u| upstream_spec(snapshot, &u.name))
            .collect()
    } else {
        Vec::new()
    };

    DesiredDocument {
        upstreams,
        services,
        routes,
    }
}

fn upstream_spec(snapshot: &Snapshot, name: &str) -> UpstreamSpec {
    UpstreamSpec {
        name: name.to_string(),
        targets: snapshot.targets.get(name).cloned().unwrap_or_default(),
    }
}

/// Returns the upstream a service is bound to, if its host names one.
fn bound_upstream<'s>(snapshot: &'s Snapshot, service: &Service) -> Option<&'s str> {
    let host = service.host.as_deref()?;
    snapshot
        .upstreams
        .iter()
        .find(|u| u.name == host)
        .map(|u| u.name.as_str())
}

fn service_spec(snapshot: &Snapshot, service: &Service) -> Option<ServiceSpec> {
    let mut spec = ServiceSpec {
        name: service.name.clone(),
        retries: service.retries,
        connect_timeout: service.connect_timeout,
        read_timeout: service.read_timeout,
        write_timeout: service.write_timeout,
        ..ServiceSpec::default()
    };

    if let Some(upstream) = bound_upstream(snapshot, service) {
        spec.upstream = Some(upstream.to_string());
        spec.protocol = non_empty(service.protocol.as_deref());
        spec.port = service.port.filter(|p| *p != 0);
        spec.path = non_empty(service.path.as_deref());
        return Some(spec);
    }

    match non_empty(service.url.as_deref()).or_else(|| reconstruct_url(service)) {
        Some(url) => {
            spec.url = Some(url);
            Some(spec)
        }
        None => {
            warn!("Skipping service '{}': it has neither a host nor a url", service.name);
            None
        }
    }
}

/// Maps service ids to names.
fn service_names(snapshot: &Snapshot) -> HashMap<&str, &str> {
    snapshot
        .services
        .iter()
        .filter_map(|s| s.id.as_deref().map(|id| (id, s.name.as_str())))
        .collect()
}

fn route_spec(route: &Route, names: &HashMap<&str, &str>) -> Option<RouteSpec> {
    if route.name.trim().is_empty() {
        warn!("Skipping a route without a name ({})", route.id.as_deref().unwrap_or("no id"));
        return None;
    }

    let reference = route.service.as_ref();
    let service = reference
        .and_then(|r| non_empty(r.name.as_deref()))
        .or_else(|| {
            reference
                .and_then(|r| r.id.as_deref())
                .and_then(|id| names.get(id))
                .map(|name| (*name).to_string())
        });
    let Some(service) = service else {
        warn!("Skipping route '{}': its service could not be resolved", route.name);
        return None;
    };

    Some(RouteSpec {
        name: route.name.clone(),
        service: Some(service),
        hosts: route.hosts.clone().unwrap_or_default(),
        paths: route.paths.clone().unwrap_or_default(),
        methods: route.methods.clone().unwrap_or_default(),
        protocols: route.protocols.clone().unwrap_or_default(),
        headers: route.headers.clone().unwrap_or_default(),
        snis: route.snis.clone().unwrap_or_default(),
        tags: route.tags.clone().unwrap_or_default(),
        strip_path: route.strip_path,
        preserve_host: route.preserve_host,
        path_handling: non_empty(route.path_handling.as_deref()).map(|v| v.to_lowercase()),
        regex_priority: route.regex_priority,
        https_redirect_status_code: route.https_redirect_status_code.filter(|c| *c != 0),
        request_buffering: route.request_buffering,
        response_buffering: route.response_buffering,
        ..RouteSpec::default()
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}
