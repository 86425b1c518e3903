//! Request payloads built from declared resources.
//!
//! Payloads carry only the fields a document declares; zero numbers and empty
//! strings or lists count as undeclared. Route create payloads default
//! `strip_path` to `true`.

use crate::admin::{Resource, Route, Service, ServiceRef, Target, Upstream};
use crate::config::{RouteSpec, ServiceSpec, TargetSpec, UpstreamSpec};

/// Builds an upstream payload.
#[must_use]
pub fn upstream(spec: &UpstreamSpec) -> Resource {
    Resource::Upstream(Upstream {
        id: None,
        name: spec.name.clone(),
    })
}

/// Builds a target payload under `upstream_name`.
#[must_use]
pub fn target(upstream_name: &str, spec: &TargetSpec) -> Resource {
    Resource::Target(Target {
        id: None,
        target: spec.target.clone(),
        weight: Some(spec.effective_weight()),
        upstream: upstream_name.to_string(),
    })
}

/// Builds a service payload, used for both create and update.
#[must_use]
pub fn service(spec: &ServiceSpec) -> Resource {
    let mut payload = Service {
        name: spec.name.clone(),
        retries: non_zero(spec.retries),
        connect_timeout: non_zero(spec.connect_timeout),
        read_timeout: non_zero(spec.read_timeout),
        write_timeout: non_zero(spec.write_timeout),
        ..Service::default()
    };

    if let Some(upstream) = non_empty(spec.upstream.as_ref()) {
        payload.host = Some(upstream);
        payload.protocol = non_empty(spec.protocol.as_ref());
        payload.port = non_zero(spec.port);
        payload.path = non_empty(spec.path.as_ref());
    } else {
        payload.url = non_empty(spec.url.as_ref());
    }

    Resource::Service(payload)
}

/// Builds a route create payload.
#[must_use]
pub fn route_create(spec: &RouteSpec) -> Resource {
    let mut route = route_fields(spec);
    route.strip_path = Some(spec.strip_path.unwrap_or(true));
    Resource::Route(route)
}

/// Builds a route update payload with declared fields only.
#[must_use]
pub fn route_update(spec: &RouteSpec) -> Resource {
    Resource::Route(route_fields(spec))
}

fn route_fields(spec: &RouteSpec) -> Route {
    Route {
        id: None,
        name: spec.name.clone(),
        hosts: non_empty_list(&spec.hosts),
        paths: non_empty_list(&spec.paths),
        methods: non_empty_list(&spec.methods),
        protocols: non_empty_list(&spec.protocols),
        headers: (!spec.headers.is_empty()).then(|| spec.headers.clone()),
        snis: non_empty_list(&spec.snis),
        tags: non_empty_list(&spec.tags),
        strip_path: spec.strip_path,
        preserve_host: spec.preserve_host,
        path_handling: non_empty(spec.path_handling.as_ref()),
        regex_priority: non_zero(spec.regex_priority),
        https_redirect_status_code: non_zero(spec.https_redirect_status_code),
        request_buffering: spec.request_buffering,
        response_buffering: spec.response_buffering,
        service: spec.service.as_ref().map(|name| ServiceRef {
            id: None,
            name: Some(name.clone()),
        }),
    }
}

fn non_zero<T: PartialEq + Default>(value: Option<T>) -> Option<T> {
    value.filter(|v| *v != T::default())
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

fn non_empty_list(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}
