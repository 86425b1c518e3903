//! Validation of expanded desired-state documents.
//!
//! Runs after shorthand expansion so synthesized names take part in the
//! uniqueness checks. All problems are collected; the first one is returned
//! as the error.

use crate::admin::ResourceKind;
use crate::error::{ConfigError, GatesyncError, Result};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::expander::ExpandedDocument;
use super::spec::{RouteSpec, ServiceSpec, TargetSpec, UpstreamSpec};

/// Accepted `path_handling` versions.
const PATH_HANDLING_VERSIONS: &[&str] = &["v0", "v1"];

/// Accepted HTTPS redirect status codes.
const REDIRECT_STATUS_CODES: &[u16] = &[301, 302, 307, 308, 426];

/// Validator for expanded documents.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all problems found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Fatal problems.
    pub errors: Vec<ValidationIssue>,
    /// Non-fatal observations.
    pub warnings: Vec<String>,
}

/// A single validation problem.
#[derive(Debug)]
pub enum ValidationIssue {
    /// A field holds an invalid value.
    Field {
        /// Path of the offending field.
        field: String,
        /// Description of the problem.
        message: String,
    },
    /// A name is declared twice for one kind.
    Duplicate {
        /// Kind of resource.
        kind: ResourceKind,
        /// Duplicated name.
        name: String,
    },
}

impl ValidationIssue {
    fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            message: message.into(),
        }
    }

    fn into_error(self) -> GatesyncError {
        match self {
            Self::Field { field, message } => ConfigError::validation(message, field).into(),
            Self::Duplicate { kind, name } => ConfigError::DuplicateName { kind, name }.into(),
        }
    }
}

/// Tracks names per kind and records duplicates.
#[derive(Default)]
struct NameRegistry<'a> {
    seen: HashSet<(ResourceKind, &'a str)>,
}

impl<'a> NameRegistry<'a> {
    fn register(&mut self, kind: ResourceKind, name: &'a str, result: &mut ValidationResult) {
        if !name.is_empty() && !self.seen.insert((kind, name)) {
            result.errors.push(ValidationIssue::Duplicate {
                kind,
                name: name.to_string(),
            });
        }
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates an expanded document.
    ///
    /// # Errors
    ///
    /// Returns the first validation or duplicate-name error found.
    pub fn validate(&self, document: &ExpandedDocument) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();
        let mut names = NameRegistry::default();

        for (i, upstream) in document.upstreams.iter().enumerate() {
            Self::validate_upstream(upstream, &format!("upstreams[{i}]"), &mut names, &mut result);
        }

        for (i, service) in document.services.iter().enumerate() {
            Self::validate_service(service, &format!("services[{i}]"), &mut result);
            names.register(ResourceKind::Service, &service.name, &mut result);
        }

        for (i, expanded) in document.routes.iter().enumerate() {
            let prefix = format!("routes[{i}]");
            // Synthesized resources are reported under the route they came from.
            if let Some(generated) = &expanded.generated {
                let backend = format!("{prefix}.backend");
                Self::validate_upstream(&generated.upstream, &backend, &mut names, &mut result);
                Self::validate_service(&generated.service, &backend, &mut result);
                names.register(ResourceKind::Service, &generated.service.name, &mut result);
            }
            Self::validate_route(&expanded.route, &prefix, &mut result);
            names.register(ResourceKind::Route, &expanded.route.name, &mut result);
        }

        for warning in &result.warnings {
            warn!("{warning}");
        }

        if result.errors.is_empty() {
            debug!("Document validation passed");
            Ok(result)
        } else {
            Err(result.errors.remove(0).into_error())
        }
    }

    fn validate_upstream<'a>(
        upstream: &'a UpstreamSpec,
        prefix: &str,
        names: &mut NameRegistry<'a>,
        result: &mut ValidationResult,
    ) {
        if upstream.name.trim().is_empty() {
            result
                .errors
                .push(ValidationIssue::field(format!("{prefix}.name"), "upstream name cannot be empty"));
        }
        names.register(ResourceKind::Upstream, &upstream.name, result);
        Self::validate_targets(&upstream.targets, prefix, result);
    }

    fn validate_service(service: &ServiceSpec, prefix: &str, result: &mut ValidationResult) {
        if service.name.trim().is_empty() {
            result
                .errors
                .push(ValidationIssue::field(format!("{prefix}.name"), "service name cannot be empty"));
        }

        let has_url = service.url.as_deref().is_some_and(|u| !u.trim().is_empty());
        let has_upstream = service.upstream.as_deref().is_some_and(|u| !u.trim().is_empty());

        if !has_url && !has_upstream {
            result.errors.push(ValidationIssue::field(
                prefix,
                format!("service '{}' needs either a url or an upstream", service.name),
            ));
        }

        if has_url && has_upstream {
            result.warnings.push(format!(
                "service '{}' declares both url and upstream; the upstream binding is used",
                service.name
            ));
        }

        if !has_upstream && !service.targets.is_empty() {
            result.errors.push(ValidationIssue::field(
                format!("{prefix}.targets"),
                format!("service '{}' declares targets but no upstream", service.name),
            ));
        }

        Self::validate_targets(&service.targets, prefix, result);
    }

    fn validate_route(route: &RouteSpec, prefix: &str, result: &mut ValidationResult) {
        if route.name.trim().is_empty() {
            result
                .errors
                .push(ValidationIssue::field(format!("{prefix}.name"), "route name cannot be empty"));
        }

        if route.service.as_deref().is_none_or(|s| s.trim().is_empty()) {
            result.errors.push(ValidationIssue::field(
                format!("{prefix}.service"),
                format!("route '{}' has no service reference", route.name),
            ));
        }

        if let Some(version) = &route.path_handling {
            if !PATH_HANDLING_VERSIONS.contains(&version.as_str()) {
                result.errors.push(ValidationIssue::field(
                    format!("{prefix}.path_handling"),
                    format!("path_handling must be v0 or v1, got '{version}'"),
                ));
            }
        }

        if let Some(code) = route.https_redirect_status_code.filter(|c| *c != 0) {
            if !REDIRECT_STATUS_CODES.contains(&code) {
                result.errors.push(ValidationIssue::field(
                    format!("{prefix}.https_redirect_status_code"),
                    format!("https_redirect_status_code must be one of 301, 302, 307, 308, 426, got {code}"),
                ));
            }
        }

        let matches_nothing = route.paths.is_empty()
            && route.hosts.is_empty()
            && route.methods.is_empty()
            && route.headers.is_empty()
            && route.snis.is_empty();
        if matches_nothing {
            result.warnings.push(format!(
                "route '{}' declares no paths, hosts, methods, headers or snis",
                route.name
            ));
        }
    }

    fn validate_targets(targets: &[TargetSpec], prefix: &str, result: &mut ValidationResult) {
        let mut seen = HashSet::new();
        for (j, target) in targets.iter().enumerate() {
            let address = target.target.trim();
            if address.is_empty() {
                result.errors.push(ValidationIssue::field(
                    format!("{prefix}.targets[{j}].target"),
                    "target address cannot be empty",
                ));
            } else if !seen.insert(address) {
                result.errors.push(ValidationIssue::Duplicate {
                    kind: ResourceKind::Target,
                    name: address.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::expander::ShorthandExpander;
    use crate::config::parser::DocumentParser;

    fn expand(yaml: &str) -> ExpandedDocument {
        let doc = DocumentParser::new().parse_str(yaml).expect("parse");
        ShorthandExpander::new().expand(doc).expect("expand")
    }

    #[test]
    fn test_valid_document_passes() {
        let doc = expand(
            r"
services:
  - name: svc
    url: http://example.com
routes:
  - name: r1
    service: svc
    paths: [/r1]
    path_handling: v1
    https_redirect_status_code: 301
",
        );
        assert!(ConfigValidator::new().validate(&doc).is_ok());
    }

    #[test]
    fn test_synthesized_name_collides_with_explicit() {
        let doc = expand(
            r"
services:
  - name: demo-service
    url: http://example.com
routes:
  - name: demo
    paths: [/demo]
    backend:
      targets:
        - target: a:80
",
        );
        let err = ConfigValidator::new().validate(&doc).expect_err("duplicate");
        assert!(matches!(
            err,
            GatesyncError::Config(ConfigError::DuplicateName {
                kind: ResourceKind::Service,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_path_handling_rejected() {
        let doc = expand(
            r"
- name: r1
  service: svc
  paths: [/x]
  path_handling: v2
",
        );
        let err = ConfigValidator::new().validate(&doc).expect_err("invalid");
        assert!(err.to_string().contains("path_handling"));
    }

    #[test]
    fn test_service_without_url_or_upstream() {
        let doc = expand(
            r"
services:
  - name: lonely
",
        );
        let err = ConfigValidator::new().validate(&doc).expect_err("invalid");
        assert!(err.to_string().contains("url or an upstream"));
    }

    #[test]
    fn test_bad_redirect_code_and_empty_target() {
        let doc = expand(
            r"
upstreams:
  - name: up
    targets:
      - target: ''
",
        );
        assert!(ConfigValidator::new().validate(&doc).is_err());

        let doc = expand(
            r"
- name: r1
  service: svc
  paths: [/x]
  https_redirect_status_code: 200
",
        );
        let err = ConfigValidator::new().validate(&doc).expect_err("invalid");
        assert!(err.to_string().contains("https_redirect_status_code"));
    }

    #[test]
    fn test_field_paths_follow_declaration() {
        let doc = expand(
            r"
services:
  - name: ok
    url: http://example.com
  - name: broken
    url: http://example.com
    targets:
      - target: a:80
routes:
  - name: demo
    paths: [/demo]
    backend:
      targets:
        - target: b:80
",
        );
        match ConfigValidator::new().validate(&doc).expect_err("invalid") {
            GatesyncError::Config(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field.as_deref(), Some("services[1].targets"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let doc = expand(
            r"
services:
  - name: ok
    url: http://example.com
routes:
  - name: demo
    paths: [/demo]
    backend:
      targets:
        - target: ' '
",
        );
        match ConfigValidator::new().validate(&doc).expect_err("invalid") {
            GatesyncError::Config(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field.as_deref(), Some("routes[0].backend.targets[0].target"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_route_names() {
        let doc = expand(
            r"
- name: r1
  service: svc
  paths: [/a]
- name: r1
  service: svc
  paths: [/b]
",
        );
        let err = ConfigValidator::new().validate(&doc).expect_err("duplicate");
        assert!(err.to_string().contains("Duplicate Route name: r1"));
    }
}
