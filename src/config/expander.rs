//! Shorthand expansion.
//!
//! A route declared without a `service` is a shorthand: it gets its own
//! upstream (with the backend's targets) and a service bound to that upstream.
//! Synthesized names derive from the route name unless overridden with
//! `service_name` / `upstream_name`.

use serde::Serialize;
use tracing::debug;

use crate::error::{ConfigError, Result};

use super::spec::{
    default_port, DesiredDocument, RouteSpec, ServiceSpec, TargetSpec, UpstreamSpec,
    DEFAULT_BACKEND_PROTOCOL,
};

/// A desired document after shorthand expansion and default filling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandedDocument {
    /// Explicitly declared upstreams.
    pub upstreams: Vec<UpstreamSpec>,
    /// Explicitly declared services.
    pub services: Vec<ServiceSpec>,
    /// Routes, each with its synthesized backend when it was a shorthand.
    pub routes: Vec<ExpandedRoute>,
}

/// A route whose service reference is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedRoute {
    /// The route; `service` is always set.
    pub route: RouteSpec,
    /// Upstream and service synthesized for a shorthand route.
    pub generated: Option<GeneratedBackend>,
}

impl ExpandedRoute {
    /// Returns the name of the service this route is bound to.
    #[must_use]
    pub fn service_name(&self) -> &str {
        self.route.service.as_deref().unwrap_or_default()
    }
}

/// Resources synthesized for one shorthand route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedBackend {
    /// Synthesized upstream with its targets.
    pub upstream: UpstreamSpec,
    /// Synthesized service bound to the upstream.
    pub service: ServiceSpec,
}

/// Linkage from a shorthand route to the names synthesized for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShorthandLink {
    /// Route name.
    pub route: String,
    /// Synthesized service name.
    pub service: String,
    /// Synthesized upstream name.
    pub upstream: String,
    /// Target addresses registered under the upstream.
    pub targets: Vec<String>,
}

impl ExpandedDocument {
    /// Returns the route → synthesized names linkage of every shorthand route.
    #[must_use]
    pub fn shorthand_links(&self) -> Vec<ShorthandLink> {
        self.routes
            .iter()
            .filter_map(|r| {
                r.generated.as_ref().map(|g| ShorthandLink {
                    route: r.route.name.clone(),
                    service: g.service.name.clone(),
                    upstream: g.upstream.name.clone(),
                    targets: g.upstream.targets.iter().map(|t| t.target.clone()).collect(),
                })
            })
            .collect()
    }

    /// Iterates over every declared upstream, explicit then synthesized.
    pub fn all_upstreams(&self) -> impl Iterator<Item = &UpstreamSpec> {
        self.upstreams.iter().chain(
            self.routes
                .iter()
                .filter_map(|r| r.generated.as_ref().map(|g| &g.upstream)),
        )
    }

    /// Iterates over every declared service, explicit then synthesized.
    pub fn all_services(&self) -> impl Iterator<Item = &ServiceSpec> {
        self.services.iter().chain(
            self.routes
                .iter()
                .filter_map(|r| r.generated.as_ref().map(|g| &g.service)),
        )
    }

    /// Total number of resources the document declares, targets included.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        let targets: usize = self.all_upstreams().map(|u| u.targets.len()).sum::<usize>()
            + self.services.iter().map(|s| s.targets.len()).sum::<usize>();
        self.all_upstreams().count() + self.all_services().count() + self.routes.len() + targets
    }
}

/// Expands shorthand routes and fills defaults.
#[derive(Debug, Default)]
pub struct ShorthandExpander;

impl ShorthandExpander {
    /// Creates a new expander.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Expands a parsed document.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a route has neither a service nor a name.
    pub fn expand(&self, document: DesiredDocument) -> Result<ExpandedDocument> {
        let upstreams = document
            .upstreams
            .into_iter()
            .map(|mut u| {
                normalize_targets(&mut u.targets);
                u
            })
            .collect();

        let services = document
            .services
            .into_iter()
            .map(|mut s| {
                normalize_targets(&mut s.targets);
                fill_service_defaults(&mut s);
                s
            })
            .collect();

        let routes = document
            .routes
            .into_iter()
            .enumerate()
            .map(|(i, route)| Self::expand_route(i, route))
            .collect::<Result<Vec<_>>>()?;

        Ok(ExpandedDocument {
            upstreams,
            services,
            routes,
        })
    }

    fn expand_route(index: usize, mut route: RouteSpec) -> Result<ExpandedRoute> {
        if let Some(service) = non_empty(route.service.as_deref()) {
            let service = service.to_string();
            if route.name.trim().is_empty() {
                route.name = derive_route_name(&service, &route.paths, &route.methods);
                debug!("Derived route name '{}'", route.name);
            }
            route.service = Some(service);
            return Ok(ExpandedRoute {
                route,
                generated: None,
            });
        }

        if route.name.trim().is_empty() {
            return Err(ConfigError::validation(
                "a route without a service must have a name to derive its service and upstream",
                format!("routes[{index}].name"),
            )
            .into());
        }

        let service_name = non_empty(route.service_name.as_deref())
            .map_or_else(|| format!("{}-service", route.name), String::from);
        let upstream_name = non_empty(route.upstream_name.as_deref())
            .map_or_else(|| format!("{}-upstream", route.name), String::from);

        let mut backend = route.backend.take().unwrap_or_default();
        normalize_targets(&mut backend.targets);

        let upstream = UpstreamSpec {
            name: upstream_name.clone(),
            targets: backend.targets,
        };

        let mut service = ServiceSpec {
            name: service_name.clone(),
            upstream: Some(upstream_name),
            protocol: backend.protocol,
            port: backend.port,
            path: backend.path,
            ..ServiceSpec::default()
        };
        fill_service_defaults(&mut service);

        debug!(
            "Expanded shorthand route '{}' into service '{}' and upstream '{}'",
            route.name, service.name, upstream.name
        );

        route.service = Some(service_name);
        Ok(ExpandedRoute {
            route,
            generated: Some(GeneratedBackend { upstream, service }),
        })
    }
}

/// Derives a route name from its service and match fields.
///
/// `svc` with paths `/api/v1` and methods `post, get` becomes
/// `svc-api-v1-GET+POST`; without methods the suffix is `ANY`.
#[must_use]
pub fn derive_route_name(service: &str, paths: &[String], methods: &[String]) -> String {
    let joined = paths.join("-");
    let mut slug = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');

    let mut methods: Vec<String> = methods.iter().map(|m| m.trim().to_uppercase()).collect();
    methods.sort();
    methods.dedup();
    let methods = if methods.is_empty() {
        String::from("ANY")
    } else {
        methods.join("+")
    };

    format!("{service}-{slug}-{methods}")
}

/// Sets every target weight to its effective value.
fn normalize_targets(targets: &mut [TargetSpec]) {
    for target in targets {
        target.weight = Some(target.effective_weight());
    }
}

/// Applies protocol and port defaults to an upstream-bound service.
fn fill_service_defaults(service: &mut ServiceSpec) {
    if non_empty(service.upstream.as_deref()).is_none() {
        return;
    }
    let protocol = non_empty(service.protocol.as_deref())
        .unwrap_or(DEFAULT_BACKEND_PROTOCOL)
        .to_lowercase();
    if service.port.is_none_or(|p| p == 0) {
        service.port = Some(default_port(&protocol));
    }
    service.protocol = Some(protocol);
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::spec::RouteBackend;

    fn shorthand(name: &str, targets: &[&str]) -> RouteSpec {
        RouteSpec {
            name: name.to_string(),
            paths: vec![String::from("/demo")],
            backend: Some(RouteBackend {
                targets: targets
                    .iter()
                    .map(|t| TargetSpec {
                        target: (*t).to_string(),
                        weight: None,
                    })
                    .collect(),
                ..RouteBackend::default()
            }),
            ..RouteSpec::default()
        }
    }

    #[test]
    fn test_shorthand_expansion_is_deterministic() {
        let doc = DesiredDocument {
            routes: vec![shorthand("demo", &["a:80"])],
            ..DesiredDocument::default()
        };
        let expanded = ShorthandExpander::new().expand(doc).expect("expand");
        let route = &expanded.routes[0];
        let generated = route.generated.as_ref().expect("generated backend");

        assert_eq!(route.service_name(), "demo-service");
        assert_eq!(generated.service.name, "demo-service");
        assert_eq!(generated.upstream.name, "demo-upstream");
        assert_eq!(generated.service.upstream.as_deref(), Some("demo-upstream"));
        assert_eq!(generated.service.protocol.as_deref(), Some("http"));
        assert_eq!(generated.service.port, Some(80));
        assert_eq!(generated.upstream.targets[0].target, "a:80");
        assert_eq!(generated.upstream.targets[0].weight, Some(100));

        let links = expanded.shorthand_links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].targets, vec!["a:80"]);
    }

    #[test]
    fn test_shorthand_overrides_and_https_port() {
        let mut route = shorthand("demo", &[]);
        route.service_name = Some(String::from("custom-svc"));
        route.upstream_name = Some(String::from("custom-up"));
        if let Some(backend) = route.backend.as_mut() {
            backend.protocol = Some(String::from("https"));
        }
        let doc = DesiredDocument {
            routes: vec![route],
            ..DesiredDocument::default()
        };
        let expanded = ShorthandExpander::new().expand(doc).expect("expand");
        let generated = expanded.routes[0].generated.as_ref().expect("generated");
        assert_eq!(generated.service.name, "custom-svc");
        assert_eq!(generated.upstream.name, "custom-up");
        assert_eq!(generated.service.port, Some(443));
    }

    #[test]
    fn test_shorthand_without_name_is_rejected() {
        let doc = DesiredDocument {
            routes: vec![shorthand("", &["a:80"])],
            ..DesiredDocument::default()
        };
        let err = ShorthandExpander::new().expand(doc).expect_err("should fail");
        assert!(err.to_string().contains("must have a name"));
    }

    #[test]
    fn test_named_service_route_gets_derived_name() {
        let route = RouteSpec {
            service: Some(String::from("svc")),
            paths: vec![String::from("/api/v1/"), String::from("/health")],
            methods: vec![String::from("post"), String::from("GET")],
            ..RouteSpec::default()
        };
        let doc = DesiredDocument {
            routes: vec![route],
            ..DesiredDocument::default()
        };
        let expanded = ShorthandExpander::new().expand(doc).expect("expand");
        assert_eq!(expanded.routes[0].route.name, "svc-api-v1-health-GET+POST");
        assert!(expanded.routes[0].generated.is_none());
    }

    #[test]
    fn test_derive_route_name_any_method() {
        assert_eq!(derive_route_name("svc", &[String::from("/")], &[]), "svc--ANY");
        assert_eq!(
            derive_route_name("svc", &[String::from("/users")], &[]),
            "svc-users-ANY"
        );
    }

    #[test]
    fn test_explicit_service_defaults_filled() {
        let doc = DesiredDocument {
            services: vec![
                ServiceSpec {
                    name: String::from("bound"),
                    upstream: Some(String::from("up")),
                    targets: vec![TargetSpec {
                        target: String::from("b:80"),
                        weight: Some(0),
                    }],
                    ..ServiceSpec::default()
                },
                ServiceSpec {
                    name: String::from("direct"),
                    url: Some(String::from("http://example.com")),
                    ..ServiceSpec::default()
                },
            ],
            ..DesiredDocument::default()
        };
        let expanded = ShorthandExpander::new().expand(doc).expect("expand");
        assert_eq!(expanded.services[0].port, Some(80));
        assert_eq!(expanded.services[0].targets[0].weight, Some(100));
        assert_eq!(expanded.services[1].protocol, None);
        assert_eq!(expanded.services[1].port, None);
    }
}
