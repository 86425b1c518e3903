//! Annotated example documents.

use std::path::Path;
use tracing::info;

use crate::error::{ConfigError, Result};

/// Kind of example document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ExampleKind {
    /// Upstreams, services and routes declared explicitly.
    #[default]
    Full,
    /// A top-level list of shorthand routes.
    RoutesSimple,
    /// A single route bound to an existing service.
    RouteBasic,
}

const FULL: &str = r#"# Apply with: gatesync apply -f <file>
# Full document: upstreams, services and routes declared explicitly.

upstreams:
  - name: user-service-upstream     # services bind to it by name
    targets:                        # backend instances (host:port)
      - target: user-svc-1:8080
        weight: 100                 # 0..1000, defaults to 100
      - target: user-svc-2:8080
        weight: 100

services:
  - name: user-service
    upstream: user-service-upstream # the service host becomes the upstream name
    protocol: http                  # defaults to http
    port: 8080                      # defaults to 80 (http) or 443 (https)
    path: /api                      # base path on the backend
    retries: 5
    connect_timeout: 60000          # milliseconds
    read_timeout: 60000
    write_timeout: 60000

routes:
  - name: user-list
    service: user-service           # service this route forwards to
    hosts: ["api.example.com"]
    paths: ["/v1/users"]
    methods: ["GET"]
    protocols: ["http", "https"]
    path_handling: v1               # v0 or v1
    strip_path: true                # strip the matched prefix before forwarding
    preserve_host: false
    regex_priority: 0
    https_redirect_status_code: 426 # 301, 302, 307, 308 or 426
    request_buffering: true
    response_buffering: true
    headers:                        # match on request headers
      X-Env: ["prod"]
    tags: ["team:user", "env:prod"]
"#;

const ROUTES_SIMPLE: &str = r#"# A top-level list of shorthand routes.
# A route without a service gets <name>-service and <name>-upstream created
# from its backend, with the backend targets registered under the upstream.
# Use service_name / upstream_name to choose those names.

- name: demo-route
  hosts: ["api.example.com"]
  paths: ["/demo"]
  methods: ["GET", "POST"]
  protocols: ["http", "https"]
  path_handling: v1
  strip_path: true
  preserve_host: false
  # service_name: custom-svc
  # upstream_name: custom-up
  backend:
    protocol: http
    port: 8080
    path: /api
    targets:
      - target: demo-svc-1:8080
        weight: 100
      - target: demo-svc-2:8080
        weight: 100

- name: status-route
  paths: ["/status"]
  methods: ["GET"]
  path_handling: v1
  strip_path: true
  backend:
    targets:
      - target: status-svc:80
"#;

const ROUTE_BASIC: &str = r#"# A single route bound to an existing service.
# Nothing but the route is created.

routes:
  - name: echo-root
    service: echo                   # must already exist on the gateway
    hosts: ["example.com"]
    paths: ["/"]
    methods: ["GET", "HEAD"]
    protocols: ["http", "https"]
    path_handling: v1
    strip_path: false
    # preserve_host: false
    # headers:
    #   X-Debug: ["1"]
    # tags: ["team:core"]
"#;

/// Returns the annotated template for a kind.
#[must_use]
pub const fn template(kind: ExampleKind) -> &'static str {
    match kind {
        ExampleKind::Full => FULL,
        ExampleKind::RoutesSimple => ROUTES_SIMPLE,
        ExampleKind::RouteBasic => ROUTE_BASIC,
    }
}

/// Removes whole-line comments, keeping trailing ones.
#[must_use]
pub fn strip_comments(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .fold(String::with_capacity(content.len()), |mut out, line| {
            out.push_str(line);
            out.push('\n');
            out
        })
}

/// Renders an example, without whole-line comments if requested.
#[must_use]
pub fn render(kind: ExampleKind, no_comments: bool) -> String {
    let content = template(kind);
    if no_comments {
        strip_comments(content)
    } else {
        content.to_string()
    }
}

/// Writes a generated document to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`ConfigError::FileExists`] if the file exists and `force` is not
/// set, or an IO error if writing fails.
pub fn write_document(path: &Path, content: &str, force: bool) -> Result<()> {
    if !force && path.exists() {
        return Err(ConfigError::FileExists {
            path: path.to_path_buf(),
        }
        .into());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    info!("Wrote {}", path.display());
    Ok(())
}
