//! Admin API types and data structures.
//!
//! These types mirror the JSON objects of the gateway admin API. Every field
//! other than the identifying name is optional and omitted from requests when
//! unset, so the same types serve as full create payloads and as partial
//! update payloads that carry only declared fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of gateway resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Load-balancing upstream.
    Upstream,
    /// Backend service.
    Service,
    /// Routing rule bound to a service.
    Route,
    /// Backend target registered under an upstream.
    Target,
}

impl ResourceKind {
    /// All kinds, in dependency order.
    pub const ALL: [Self; 4] = [Self::Upstream, Self::Service, Self::Route, Self::Target];

    /// Admin API collection path segment for this kind.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Upstream => "upstreams",
            Self::Service => "services",
            Self::Route => "routes",
            Self::Target => "targets",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Upstream => "Upstream",
            Self::Service => "Service",
            Self::Route => "Route",
            Self::Target => "Target",
        };
        write!(f, "{s}")
    }
}

/// A load-balancing upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upstream {
    /// Unique identifier assigned by the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Upstream name.
    pub name: String,
}

/// A backend target (`host:port`) registered under an upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Unique identifier assigned by the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Target address (`host:port`).
    pub target: String,
    /// Load-balancing weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    /// Name of the owning upstream. Carried in the request path, never in the body.
    #[serde(skip)]
    pub upstream: String,
}

/// A backend service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Unique identifier assigned by the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Service name.
    pub name: String,
    /// Full URL shorthand; only sent, the gateway answers with its parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Upstream protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Upstream host (or upstream name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Upstream port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Upstream base path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Number of retries on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Connect timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<u64>,
    /// Read timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout: Option<u64>,
    /// Write timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_timeout: Option<u64>,
}

/// Reference from a route to its service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    /// Service identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Service name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A routing rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Unique identifier assigned by the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Route name.
    pub name: String,
    /// Host match list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<Vec<String>>,
    /// Path match list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<String>>,
    /// Method match list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<String>>,
    /// Protocol match list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<String>>,
    /// Header match map (name to accepted values).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, Vec<String>>>,
    /// SNI match list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snis: Option<Vec<String>>,
    /// Tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Whether the matched prefix is stripped before proxying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_path: Option<bool>,
    /// Whether the client `Host` header is preserved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_host: Option<bool>,
    /// Path handling version (`v0` or `v1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_handling: Option<String>,
    /// Regex route priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_priority: Option<i32>,
    /// Status code used to redirect plain HTTP to HTTPS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_redirect_status_code: Option<u16>,
    /// Whether requests are buffered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_buffering: Option<bool>,
    /// Whether responses are buffered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_buffering: Option<bool>,
    /// Bound service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceRef>,
}

/// A gateway resource of any kind.
///
/// Used both for remote state returned by the admin API and for request
/// payloads sent to it; the variant carries the resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Resource {
    /// An upstream.
    Upstream(Upstream),
    /// A service.
    Service(Service),
    /// A route.
    Route(Route),
    /// A target.
    Target(Target),
}

impl Resource {
    /// Returns the kind of this resource.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Upstream(_) => ResourceKind::Upstream,
            Self::Service(_) => ResourceKind::Service,
            Self::Route(_) => ResourceKind::Route,
            Self::Target(_) => ResourceKind::Target,
        }
    }

    /// Returns the name used to address this resource.
    ///
    /// Targets are addressed as `<upstream>/<address>`.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Upstream(u) => u.name.clone(),
            Self::Service(s) => s.name.clone(),
            Self::Route(r) => r.name.clone(),
            Self::Target(t) => target_key(&t.upstream, &t.target),
        }
    }

    /// Returns the gateway-assigned identifier, if known.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Upstream(u) => u.id.as_deref(),
            Self::Service(s) => s.id.as_deref(),
            Self::Route(r) => r.id.as_deref(),
            Self::Target(t) => t.id.as_deref(),
        }
    }
}

/// Builds the name under which a target is addressed.
#[must_use]
pub fn target_key(upstream: &str, address: &str) -> String {
    format!("{upstream}/{address}")
}

/// Splits a target name into its upstream and address parts.
#[must_use]
pub fn split_target_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('/')
        .filter(|(upstream, address)| !upstream.is_empty() && !address.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_key_round_trip() {
        let key = target_key("demo-upstream", "a:80");
        assert_eq!(key, "demo-upstream/a:80");
        assert_eq!(split_target_key(&key), Some(("demo-upstream", "a:80")));
        assert_eq!(split_target_key("no-separator"), None);
        assert_eq!(split_target_key("/a:80"), None);
    }

    #[test]
    fn test_route_deserializes_null_collections() {
        let json = r#"{
            "id": "r-1",
            "name": "r1",
            "hosts": null,
            "paths": ["/p"],
            "methods": ["GET"],
            "headers": null,
            "strip_path": true,
            "service": {"id": "s-1"}
        }"#;
        let route: Route = serde_json::from_str(json).expect("route should parse");
        assert_eq!(route.hosts, None);
        assert_eq!(route.paths, Some(vec![String::from("/p")]));
        assert_eq!(route.service.and_then(|s| s.id), Some(String::from("s-1")));
    }

    #[test]
    fn test_partial_payload_omits_undeclared_fields() {
        let payload = Service {
            name: String::from("svc"),
            protocol: Some(String::from("https")),
            ..Service::default()
        };
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value, serde_json::json!({ "name": "svc", "protocol": "https" }));
    }

    #[test]
    fn test_target_upstream_not_serialized() {
        let target = Target {
            target: String::from("a:80"),
            weight: Some(100),
            upstream: String::from("up"),
            ..Target::default()
        };
        let value = serde_json::to_value(&target).expect("serialize");
        assert_eq!(value, serde_json::json!({ "target": "a:80", "weight": 100 }));
        assert_eq!(Resource::Target(target).name(), "up/a:80");
    }
}
