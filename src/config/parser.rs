//! Desired-state document parser.
//!
//! Accepts YAML or JSON text in one of three shapes, tried in order:
//! a full document with `upstreams` / `services` / `routes`, a bare list of
//! routes, or a single route object.

use crate::error::{ConfigError, GatesyncError, Result};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tracing::{debug, info};

use super::spec::{DesiredDocument, RouteSpec};

/// Top-level keys of a full document.
const DOCUMENT_KEYS: &[&str] = &["upstreams", "services", "routes"];

/// Keys whose presence marks a mapping as a single route.
const ROUTE_KEYS: &[&str] = &["name", "paths", "hosts", "methods", "service", "backend"];

/// Shape a document was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    /// Object with resource collections.
    Full,
    /// Bare list of routes.
    RouteList,
    /// Single route object.
    SingleRoute,
}

/// Parser that turns document text into a canonical [`DesiredDocument`].
#[derive(Debug, Default)]
pub struct DocumentParser;

impl DocumentParser {
    /// Creates a new document parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads and parses a document from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DesiredDocument> {
        let path = path.as_ref();
        info!("Loading desired state from: {}", path.display());

        if !path.exists() {
            return Err(GatesyncError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            GatesyncError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_str(&content).map_err(|e| match e {
            GatesyncError::Config(ConfigError::ParseError { message, location: None }) => {
                GatesyncError::Config(ConfigError::ParseError {
                    message,
                    location: Some(path.display().to_string()),
                })
            }
            other => other,
        })
    }

    /// Parses and normalizes a document from YAML or JSON text.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the text is not valid YAML/JSON, matches none
    /// of the accepted shapes, or declares no resources.
    pub fn parse_str(&self, content: &str) -> Result<DesiredDocument> {
        let value: Value = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::parse(format!("YAML/JSON parse error: {e}")))?;

        let shape = detect_shape(&value).ok_or_else(|| {
            ConfigError::parse(
                "no resources recognized; provide an object with upstreams/services/routes, \
                 a list of routes, or a single route",
            )
        })?;
        debug!("Recognized document shape: {shape:?}");

        let mut document = match shape {
            DocumentShape::Full => serde_yaml::from_value::<DesiredDocument>(value),
            DocumentShape::RouteList => serde_yaml::from_value::<Vec<RouteSpec>>(value)
                .map(|routes| DesiredDocument {
                    routes,
                    ..DesiredDocument::default()
                }),
            DocumentShape::SingleRoute => serde_yaml::from_value::<RouteSpec>(value).map(|route| {
                DesiredDocument {
                    routes: vec![route],
                    ..DesiredDocument::default()
                }
            }),
        }
        .map_err(|e| ConfigError::parse(format!("invalid {shape:?} document: {e}")))?;

        if document.is_empty() {
            return Err(ConfigError::parse("document declares no resources").into());
        }

        normalize(&mut document);

        debug!(
            "Parsed {} upstreams, {} services, {} routes",
            document.upstreams.len(),
            document.services.len(),
            document.routes.len()
        );
        Ok(document)
    }
}

/// Detects which accepted shape a parsed value has.
#[must_use]
pub fn detect_shape(value: &Value) -> Option<DocumentShape> {
    match value {
        Value::Mapping(map) if has_collection(map) => Some(DocumentShape::Full),
        Value::Sequence(items) if !items.is_empty() => Some(DocumentShape::RouteList),
        Value::Mapping(map) if is_route_shaped(map) => Some(DocumentShape::SingleRoute),
        _ => None,
    }
}

fn has_collection(map: &Mapping) -> bool {
    DOCUMENT_KEYS.iter().any(|key| {
        map.get(*key)
            .and_then(Value::as_sequence)
            .is_some_and(|items| !items.is_empty())
    })
}

fn is_route_shaped(map: &Mapping) -> bool {
    ROUTE_KEYS
        .iter()
        .any(|key| map.get(*key).is_some_and(|v| !v.is_null()))
}

/// Canonicalizes case-insensitive route fields.
fn normalize(document: &mut DesiredDocument) {
    for route in &mut document.routes {
        for method in &mut route.methods {
            *method = method.trim().to_uppercase();
        }
        route.path_handling = route
            .path_handling
            .take()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_document() {
        let yaml = r"
upstreams:
  - name: up-a
    targets:
      - target: 10.0.0.1:80
services:
  - name: svc-a
    upstream: up-a
routes:
  - name: r1
    service: svc-a
    paths: [/a]
    methods: [get, Post]
    path_handling: ' V1 '
";
        let doc = DocumentParser::new().parse_str(yaml).expect("document should parse");
        assert_eq!(doc.upstreams.len(), 1);
        assert_eq!(doc.services[0].upstream.as_deref(), Some("up-a"));
        assert_eq!(doc.routes[0].methods, vec!["GET", "POST"]);
        assert_eq!(doc.routes[0].path_handling.as_deref(), Some("v1"));
    }

    #[test]
    fn test_parse_route_list() {
        let yaml = r"
- name: demo
  paths: [/demo]
  backend:
    targets:
      - target: a:80
- name: other
  service: svc
";
        let doc = DocumentParser::new().parse_str(yaml).expect("list should parse");
        assert_eq!(doc.routes.len(), 2);
        assert!(doc.upstreams.is_empty());
        assert!(doc.routes[0].backend.is_some());
    }

    #[test]
    fn test_parse_single_route_json() {
        let json = r#"{"name": "r1", "service": "svcX", "paths": ["/x"], "unknown": 1}"#;
        let doc = DocumentParser::new().parse_str(json).expect("single route should parse");
        assert_eq!(doc.routes.len(), 1);
        assert_eq!(doc.routes[0].service.as_deref(), Some("svcX"));
    }

    #[test]
    fn test_empty_collections_fall_through_to_error() {
        let parser = DocumentParser::new();
        assert!(parser.parse_str("routes: []\n").is_err());
        assert!(parser.parse_str("[]").is_err());
        assert!(parser.parse_str("").is_err());
        assert!(parser.parse_str("foo: bar\n").is_err());
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let err = DocumentParser::new()
            .parse_str("routes: [\n")
            .expect_err("should fail");
        assert!(matches!(
            err,
            GatesyncError::Config(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = DocumentParser::new()
            .load_file("/nonexistent/gatesync.yaml")
            .expect_err("should fail");
        assert!(matches!(
            err,
            GatesyncError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_load_file_reports_location() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.yaml");
        std::fs::write(&path, "foo: bar\n").expect("write");

        let err = DocumentParser::new().load_file(&path).expect_err("should fail");
        match err {
            GatesyncError::Config(ConfigError::ParseError { location, .. }) => {
                assert_eq!(location, Some(path.display().to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
