//! Desired-state document types.
//!
//! This module defines the structs that map to a desired-state document.
//! Every optional field is an `Option`; an absent field is never compared or
//! sent to the gateway.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weight given to a target declared without one (or with zero).
pub const DEFAULT_TARGET_WEIGHT: u32 = 100;

/// Protocol used for synthesized services when the backend declares none.
pub const DEFAULT_BACKEND_PROTOCOL: &str = "http";

/// The root of a desired-state document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DesiredDocument {
    /// Upstreams with their targets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstreams: Vec<UpstreamSpec>,
    /// Services.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceSpec>,
    /// Routes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteSpec>,
}

impl DesiredDocument {
    /// Returns true if the document declares no resources at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty() && self.services.is_empty() && self.routes.is_empty()
    }
}

/// An upstream declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpstreamSpec {
    /// Upstream name.
    #[serde(default)]
    pub name: String,
    /// Targets registered under this upstream.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetSpec>,
}

/// A backend target declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetSpec {
    /// Address (`host:port`).
    #[serde(default)]
    pub target: String,
    /// Load-balancing weight; absent or zero means [`DEFAULT_TARGET_WEIGHT`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

impl TargetSpec {
    /// Returns the weight after default normalization.
    #[must_use]
    pub fn effective_weight(&self) -> u32 {
        match self.weight {
            Some(w) if w > 0 => w,
            _ => DEFAULT_TARGET_WEIGHT,
        }
    }
}

/// A service declaration.
///
/// A service either points at a direct `url`, or is bound to an `upstream`
/// with optional `protocol`, `port` and `path`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSpec {
    /// Service name.
    #[serde(default)]
    pub name: String,
    /// Direct URL mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Upstream-bound mode: name of the upstream used as host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    /// Protocol in upstream-bound mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Port in upstream-bound mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Path in upstream-bound mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Retries.
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
    /// Targets ensured under the bound upstream.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetSpec>,
}

/// A route declaration.
///
/// A route without `service` is a shorthand: its service and upstream are
/// synthesized from `backend`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteSpec {
    /// Route name; derived from the service and match fields when empty.
    #[serde(default)]
    pub name: String,
    /// Name of the service this route is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Host matches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    /// Path matches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    /// Method matches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    /// Protocol matches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
    /// Header matches.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
    /// SNI matches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub snis: Vec<String>,
    /// Tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Strip the matched path prefix; `true` on create when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_path: Option<bool>,
    /// Preserve the client `Host` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_host: Option<bool>,
    /// Path handling version (`v0` or `v1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_handling: Option<String>,
    /// Regex priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_priority: Option<i32>,
    /// HTTPS redirect status code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_redirect_status_code: Option<u16>,
    /// Request buffering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_buffering: Option<bool>,
    /// Response buffering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_buffering: Option<bool>,
    /// Shorthand: overrides the synthesized service name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    /// Shorthand: overrides the synthesized upstream name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_name: Option<String>,
    /// Shorthand: backend the synthesized service points at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<RouteBackend>,
}

/// Backend block of a shorthand route.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteBackend {
    /// Protocol; `http` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Port; 80 (443 for `https`) when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Targets registered under the synthesized upstream.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetSpec>,
}

impl RouteBackend {
    /// Returns true if the block declares nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.protocol.is_none()
            && self.port.is_none_or(|p| p == 0)
            && self.path.is_none()
            && self.targets.is_empty()
    }
}

/// Returns the default port for a backend protocol.
#[must_use]
pub fn default_port(protocol: &str) -> u16 {
    if protocol.eq_ignore_ascii_case("https") {
        443
    } else {
        80
    }
}
