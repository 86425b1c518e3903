//! Diff engine for comparing desired vs remote state.
//!
//! Only fields the document declares are compared. Collections compare as
//! sets, header maps key by key with value sets. Every difference is recorded
//! as a [`FieldDiff`]; the records are advisory and never drive execution.

use reqwest::Url;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Write};

use crate::admin::{Route, Service, Target, Upstream};
use crate::config::{default_port, RouteSpec, ServiceSpec, TargetSpec, DEFAULT_TARGET_WEIGHT};

/// Action computed for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// The resource is absent remotely.
    Create,
    /// The resource is present and at least one declared field differs.
    Update,
    /// The resource is present and no declared field differs.
    NoChange,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::NoChange => "no change",
        };
        write!(f, "{s}")
    }
}

/// Difference in a single field.
///
/// Collection fields produce one record per added or removed element, with
/// the other side left empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    /// Field that differs.
    pub field: String,
    /// Remote value.
    pub old_value: Option<String>,
    /// Desired value.
    pub new_value: Option<String>,
}

impl FieldDiff {
    fn scalar(field: &str, old: Option<impl Display>, new: impl Display) -> Self {
        Self {
            field: field.to_string(),
            old_value: old.map(|v| v.to_string()),
            new_value: Some(new.to_string()),
        }
    }
}

/// Classification of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDiff {
    /// Computed action.
    pub action: Action,
    /// Field-level differences (empty unless `action` is `Update`).
    pub details: Vec<FieldDiff>,
}

impl ResourceDiff {
    /// A resource that does not exist remotely.
    #[must_use]
    pub const fn create() -> Self {
        Self {
            action: Action::Create,
            details: Vec::new(),
        }
    }

    /// A present resource with the given differences.
    #[must_use]
    pub fn present(details: Vec<FieldDiff>) -> Self {
        let action = if details.is_empty() {
            Action::NoChange
        } else {
            Action::Update
        };
        Self { action, details }
    }
}

/// Engine classifying desired resources against their remote state.
#[derive(Debug, Default)]
pub struct DiffEngine;

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Classifies an upstream. Upstreams carry no comparable fields.
    #[must_use]
    pub fn diff_upstream(&self, remote: Option<&Upstream>) -> ResourceDiff {
        remote.map_or_else(ResourceDiff::create, |_| ResourceDiff::present(Vec::new()))
    }

    /// Classifies a target by its weight.
    #[must_use]
    pub fn diff_target(&self, desired: &TargetSpec, remote: Option<&Target>) -> ResourceDiff {
        let Some(remote) = remote else {
            return ResourceDiff::create();
        };

        let want = desired.effective_weight();
        let have = remote.weight.unwrap_or(DEFAULT_TARGET_WEIGHT);
        let mut details = Vec::new();
        if have != want {
            details.push(FieldDiff::scalar("weight", Some(have), want));
        }
        ResourceDiff::present(details)
    }

    /// Classifies a service.
    ///
    /// Upstream-bound services compare host (the upstream name), protocol,
    /// port and path; URL services compare the URL reconstructed from the
    /// remote parts.
    #[must_use]
    pub fn diff_service(&self, desired: &ServiceSpec, remote: Option<&Service>) -> ResourceDiff {
        let Some(remote) = remote else {
            return ResourceDiff::create();
        };

        let mut details = Vec::new();

        if let Some(upstream) = declared_str(desired.upstream.as_ref()) {
            compare_str(&mut details, "host", remote.host.as_deref(), Some(upstream));
            compare_str(&mut details, "protocol", remote.protocol.as_deref(), declared_str(desired.protocol.as_ref()));
            compare(&mut details, "port", remote.port, declared(desired.port));
            compare_str(&mut details, "path", remote.path.as_deref(), declared_str(desired.path.as_ref()));
        } else if let Some(url) = declared_str(desired.url.as_ref()) {
            if !same_endpoint(url, remote) {
                details.push(FieldDiff::scalar("url", reconstruct_url(remote), url));
            }
        }

        compare(&mut details, "retries", remote.retries, declared(desired.retries));
        compare(&mut details, "connect_timeout", remote.connect_timeout, declared(desired.connect_timeout));
        compare(&mut details, "read_timeout", remote.read_timeout, declared(desired.read_timeout));
        compare(&mut details, "write_timeout", remote.write_timeout, declared(desired.write_timeout));

        ResourceDiff::present(details)
    }

    /// Classifies a route.
    ///
    /// `service_id` is the remote id of the service the route should point
    /// at, or `None` when that service is only planned for creation.
    #[must_use]
    pub fn diff_route(
        &self,
        desired: &RouteSpec,
        remote: Option<&Route>,
        service_id: Option<&str>,
    ) -> ResourceDiff {
        let Some(remote) = remote else {
            return ResourceDiff::create();
        };

        let mut details = Vec::new();

        compare_set(&mut details, "hosts", remote.hosts.as_deref(), &desired.hosts, false);
        compare_set(&mut details, "paths", remote.paths.as_deref(), &desired.paths, false);
        compare_set(&mut details, "methods", remote.methods.as_deref(), &desired.methods, true);
        compare_set(&mut details, "protocols", remote.protocols.as_deref(), &desired.protocols, false);
        compare_headers(&mut details, remote.headers.as_ref(), &desired.headers);
        compare_set(&mut details, "snis", remote.snis.as_deref(), &desired.snis, false);
        compare_set(&mut details, "tags", remote.tags.as_deref(), &desired.tags, false);

        compare(&mut details, "strip_path", remote.strip_path, desired.strip_path);
        compare(&mut details, "preserve_host", remote.preserve_host, desired.preserve_host);
        compare_str(&mut details, "path_handling", remote.path_handling.as_deref(), declared_str(desired.path_handling.as_ref()));
        compare(&mut details, "regex_priority", remote.regex_priority, declared(desired.regex_priority));
        compare(
            &mut details,
            "https_redirect_status_code",
            remote.https_redirect_status_code,
            declared(desired.https_redirect_status_code),
        );
        compare(&mut details, "request_buffering", remote.request_buffering, desired.request_buffering);
        compare(&mut details, "response_buffering", remote.response_buffering, desired.response_buffering);

        let remote_service = remote.service.as_ref().and_then(|s| s.id.as_deref());
        let points_elsewhere = service_id.is_none_or(|id| remote_service != Some(id));
        if points_elsewhere {
            let wanted = service_id
                .or(desired.service.as_deref())
                .unwrap_or_default();
            details.push(FieldDiff::scalar("service", remote_service, wanted));
        }

        ResourceDiff::present(details)
    }
}

/// Rebuilds a service URL from its protocol, host, port and path.
///
/// Default ports (80 for http, 443 for https) are omitted. Returns `None`
/// when protocol or host is missing.
#[must_use]
pub fn reconstruct_url(service: &Service) -> Option<String> {
    let protocol = service.protocol.as_deref().filter(|p| !p.is_empty())?;
    let host = service.host.as_deref().filter(|h| !h.is_empty())?;

    let mut url = format!("{protocol}://{host}");

    if let Some(port) = service.port.filter(|p| *p != 0) {
        let default = matches!((protocol, port), ("http", 80) | ("https", 443));
        if !default {
            let _ = write!(url, ":{port}");
        }
    }

    if let Some(path) = service.path.as_deref().filter(|p| !p.is_empty()) {
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
    }

    Some(url)
}

/// Returns true if a desired service URL addresses the remote parts.
///
/// Scheme and host compare case-insensitively, ports by their effective
/// value (an omitted port is the protocol default) and a bare `/` path
/// equals no path. Unparseable URLs fall back to text comparison.
fn same_endpoint(url: &str, remote: &Service) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return reconstruct_url(remote).as_deref() == Some(url);
    };

    let protocol = remote.protocol.as_deref().unwrap_or_default().to_ascii_lowercase();
    let host = remote.host.as_deref().unwrap_or_default();
    let remote_port = remote
        .port
        .filter(|p| *p != 0)
        .unwrap_or_else(|| default_port(&protocol));
    let desired_port = parsed.port().unwrap_or_else(|| default_port(parsed.scheme()));

    parsed.scheme() == protocol
        && parsed
            .host_str()
            .is_some_and(|h| h.eq_ignore_ascii_case(host))
        && desired_port == remote_port
        && bare_path(Some(parsed.path())) == bare_path(remote.path.as_deref())
}

fn bare_path(path: Option<&str>) -> Option<&str> {
    path.filter(|p| !p.is_empty() && *p != "/")
}

/// Treats the zero value of a scalar as undeclared.
fn declared<T: PartialEq + Default>(value: Option<T>) -> Option<T> {
    value.filter(|v| *v != T::default())
}

/// Treats an empty string as undeclared.
fn declared_str(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

fn compare<T: PartialEq + Display>(details: &mut Vec<FieldDiff>, field: &str, remote: Option<T>, desired: Option<T>) {
    if let Some(want) = desired {
        if remote.as_ref() != Some(&want) {
            details.push(FieldDiff::scalar(field, remote, want));
        }
    }
}

fn compare_str(details: &mut Vec<FieldDiff>, field: &str, remote: Option<&str>, desired: Option<&str>) {
    compare(details, field, remote.filter(|r| !r.is_empty()), desired);
}

fn to_set(values: &[String], upper: bool) -> BTreeSet<String> {
    values
        .iter()
        .map(|v| if upper { v.to_uppercase() } else { v.clone() })
        .collect()
}

/// Compares a declared collection as a set, recording removed then added elements.
fn compare_set(
    details: &mut Vec<FieldDiff>,
    field: &str,
    remote: Option<&[String]>,
    desired: &[String],
    upper: bool,
) {
    if desired.is_empty() {
        return;
    }

    let have = to_set(remote.unwrap_or_default(), upper);
    let want = to_set(desired, upper);

    for removed in have.difference(&want) {
        details.push(FieldDiff {
            field: field.to_string(),
            old_value: Some(removed.clone()),
            new_value: None,
        });
    }
    for added in want.difference(&have) {
        details.push(FieldDiff {
            field: field.to_string(),
            old_value: None,
            new_value: Some(added.clone()),
        });
    }
}

/// Compares a declared header map key by key; header names are case-insensitive.
fn compare_headers(
    details: &mut Vec<FieldDiff>,
    remote: Option<&BTreeMap<String, Vec<String>>>,
    desired: &BTreeMap<String, Vec<String>>,
) {
    if desired.is_empty() {
        return;
    }

    let normalize = |map: &BTreeMap<String, Vec<String>>| -> BTreeMap<String, BTreeSet<String>> {
        map.iter()
            .map(|(k, v)| (k.to_lowercase(), to_set(v, false)))
            .collect()
    };
    let have = remote.map(normalize).unwrap_or_default();
    let want = normalize(desired);

    let render = |key: &str, values: &BTreeSet<String>| {
        format!("{key}: {}", values.iter().cloned().collect::<Vec<_>>().join(", "))
    };

    let keys: BTreeSet<&String> = have.keys().chain(want.keys()).collect();
    for key in keys {
        match (have.get(key), want.get(key)) {
            (Some(old), Some(new)) if old == new => {}
            (old, new) => details.push(FieldDiff {
                field: String::from("headers"),
                old_value: old.map(|v| render(key, v)),
                new_value: new.map(|v| render(key, v)),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::ServiceRef;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    fn remote_route() -> Route {
        Route {
            id: Some(String::from("r-1")),
            name: String::from("r1"),
            paths: Some(strings(&["/a", "/b"])),
            methods: Some(strings(&["GET"])),
            strip_path: Some(true),
            service: Some(ServiceRef {
                id: Some(String::from("s-1")),
                name: None,
            }),
            ..Route::default()
        }
    }

    #[test]
    fn test_absent_resources_are_created() {
        let engine = DiffEngine::new();
        assert_eq!(engine.diff_upstream(None).action, Action::Create);
        assert_eq!(
            engine.diff_route(&RouteSpec::default(), None, None).action,
            Action::Create
        );
    }

    #[test]
    fn test_method_set_diff_reports_added_element() {
        let desired = RouteSpec {
            name: String::from("r1"),
            methods: strings(&["get", "post"]),
            ..RouteSpec::default()
        };
        let diff = DiffEngine::new().diff_route(&desired, Some(&remote_route()), Some("s-1"));

        assert_eq!(diff.action, Action::Update);
        assert_eq!(
            diff.details,
            vec![FieldDiff {
                field: String::from("methods"),
                old_value: None,
                new_value: Some(String::from("POST")),
            }]
        );
    }

    #[test]
    fn test_set_order_and_duplicates_irrelevant() {
        let desired = RouteSpec {
            name: String::from("r1"),
            paths: strings(&["/b", "/a", "/a"]),
            methods: strings(&["GET"]),
            ..RouteSpec::default()
        };
        let diff = DiffEngine::new().diff_route(&desired, Some(&remote_route()), Some("s-1"));
        assert_eq!(diff.action, Action::NoChange);
    }

    #[test]
    fn test_undeclared_fields_not_compared() {
        let desired = RouteSpec {
            name: String::from("r1"),
            regex_priority: Some(0),
            ..RouteSpec::default()
        };
        let mut remote = remote_route();
        remote.regex_priority = Some(5);
        let diff = DiffEngine::new().diff_route(&desired, Some(&remote), Some("s-1"));
        assert_eq!(diff.action, Action::NoChange);
    }

    #[test]
    fn test_explicit_false_is_compared() {
        let desired = RouteSpec {
            name: String::from("r1"),
            strip_path: Some(false),
            ..RouteSpec::default()
        };
        let diff = DiffEngine::new().diff_route(&desired, Some(&remote_route()), Some("s-1"));
        assert_eq!(diff.details.len(), 1);
        assert_eq!(diff.details[0].field, "strip_path");
        assert_eq!(diff.details[0].old_value.as_deref(), Some("true"));
        assert_eq!(diff.details[0].new_value.as_deref(), Some("false"));
    }

    #[test]
    fn test_service_reference_change() {
        let desired = RouteSpec {
            name: String::from("r1"),
            service: Some(String::from("svc-b")),
            ..RouteSpec::default()
        };
        let engine = DiffEngine::new();

        let diff = engine.diff_route(&desired, Some(&remote_route()), Some("s-2"));
        assert_eq!(diff.details[0].field, "service");
        assert_eq!(diff.details[0].new_value.as_deref(), Some("s-2"));

        let diff = engine.diff_route(&desired, Some(&remote_route()), None);
        assert_eq!(diff.details[0].new_value.as_deref(), Some("svc-b"));
    }

    #[test]
    fn test_header_map_diff() {
        let mut remote = remote_route();
        remote.headers = Some(BTreeMap::from([
            (String::from("x-env"), strings(&["prod"])),
            (String::from("x-old"), strings(&["1"])),
        ]));
        let desired = RouteSpec {
            name: String::from("r1"),
            headers: BTreeMap::from([
                (String::from("X-Env"), strings(&["prod"])),
                (String::from("x-team"), strings(&["a", "b"])),
            ]),
            ..RouteSpec::default()
        };
        let diff = DiffEngine::new().diff_route(&desired, Some(&remote), Some("s-1"));
        assert_eq!(diff.details.len(), 2);
        assert_eq!(diff.details[0].old_value.as_deref(), Some("x-old: 1"));
        assert_eq!(diff.details[1].new_value.as_deref(), Some("x-team: a, b"));
    }

    #[test]
    fn test_target_weight() {
        let engine = DiffEngine::new();
        let desired = TargetSpec {
            target: String::from("a:80"),
            weight: None,
        };
        let remote = Target {
            target: String::from("a:80"),
            weight: Some(100),
            ..Target::default()
        };
        assert_eq!(engine.diff_target(&desired, Some(&remote)).action, Action::NoChange);

        let heavier = TargetSpec {
            weight: Some(50),
            ..desired
        };
        let diff = engine.diff_target(&heavier, Some(&remote));
        assert_eq!(diff.action, Action::Update);
        assert_eq!(diff.details[0].old_value.as_deref(), Some("100"));
    }

    #[test]
    fn test_service_url_mode() {
        let remote = Service {
            name: String::from("svc"),
            protocol: Some(String::from("https")),
            host: Some(String::from("example.com")),
            port: Some(443),
            path: Some(String::from("/api")),
            ..Service::default()
        };
        let desired = ServiceSpec {
            name: String::from("svc"),
            url: Some(String::from("https://example.com/api")),
            ..ServiceSpec::default()
        };
        let engine = DiffEngine::new();
        assert_eq!(engine.diff_service(&desired, Some(&remote)).action, Action::NoChange);

        let moved = ServiceSpec {
            url: Some(String::from("https://example.com:8443/api")),
            retries: Some(3),
            ..desired
        };
        let diff = engine.diff_service(&moved, Some(&remote));
        let fields: Vec<&str> = diff.details.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(fields, vec!["url", "retries"]);
    }

    #[test]
    fn test_service_url_normalized_comparison() {
        let remote = Service {
            name: String::from("web"),
            protocol: Some(String::from("http")),
            host: Some(String::from("web")),
            port: Some(80),
            ..Service::default()
        };
        let engine = DiffEngine::new();
        let url = |u: &str| ServiceSpec {
            name: String::from("web"),
            url: Some(u.to_string()),
            ..ServiceSpec::default()
        };

        for same in ["http://web", "http://web:80", "http://web/", "HTTP://Web:80/"] {
            assert_eq!(
                engine.diff_service(&url(same), Some(&remote)).action,
                Action::NoChange,
                "{same}"
            );
        }

        for other in ["https://web", "http://web:8080", "http://web/api", "http://api"] {
            let diff = engine.diff_service(&url(other), Some(&remote));
            assert_eq!(diff.action, Action::Update, "{other}");
            assert_eq!(diff.details[0].old_value.as_deref(), Some("http://web"));
        }
    }

    #[test]
    fn test_service_url_path_and_https_default_port() {
        let remote = Service {
            name: String::from("api"),
            protocol: Some(String::from("https")),
            host: Some(String::from("api.example.com")),
            port: Some(443),
            path: Some(String::from("/v1/")),
            ..Service::default()
        };
        let engine = DiffEngine::new();
        let with_url = |u: &str| ServiceSpec {
            name: String::from("api"),
            url: Some(u.to_string()),
            ..ServiceSpec::default()
        };

        let same = with_url("https://API.example.com:443/v1/");
        assert_eq!(engine.diff_service(&same, Some(&remote)).action, Action::NoChange);

        let trailing = with_url("https://api.example.com/v1");
        assert_eq!(engine.diff_service(&trailing, Some(&remote)).action, Action::Update);
    }

    #[test]
    fn test_undeclared_strip_path_not_compared() {
        let mut remote = remote_route();
        remote.strip_path = Some(false);
        let engine = DiffEngine::new();

        let undeclared = RouteSpec {
            name: String::from("r1"),
            ..RouteSpec::default()
        };
        assert_eq!(
            engine.diff_route(&undeclared, Some(&remote), Some("s-1")).action,
            Action::NoChange
        );

        let declared = RouteSpec {
            strip_path: Some(true),
            ..undeclared
        };
        let diff = engine.diff_route(&declared, Some(&remote), Some("s-1"));
        assert_eq!(diff.action, Action::Update);
        assert_eq!(diff.details[0].field, "strip_path");
        assert_eq!(diff.details[0].old_value.as_deref(), Some("false"));
    }

    #[test]
    fn test_service_upstream_mode() {
        let remote = Service {
            name: String::from("svc"),
            protocol: Some(String::from("http")),
            host: Some(String::from("up")),
            port: Some(80),
            ..Service::default()
        };
        let desired = ServiceSpec {
            name: String::from("svc"),
            upstream: Some(String::from("up")),
            protocol: Some(String::from("http")),
            port: Some(8080),
            ..ServiceSpec::default()
        };
        let diff = DiffEngine::new().diff_service(&desired, Some(&remote));
        assert_eq!(diff.action, Action::Update);
        assert_eq!(diff.details[0].field, "port");
    }

    #[test]
    fn test_reconstruct_url() {
        let mut service = Service {
            protocol: Some(String::from("http")),
            host: Some(String::from("h")),
            port: Some(80),
            path: Some(String::from("p")),
            ..Service::default()
        };
        assert_eq!(reconstruct_url(&service).as_deref(), Some("http://h/p"));
        service.port = Some(8080);
        assert_eq!(reconstruct_url(&service).as_deref(), Some("http://h:8080/p"));
        service.host = None;
        assert_eq!(reconstruct_url(&service), None);
    }
}
