//! Desired-state document and settings handling.
//!
//! - Parsing the accepted document shapes into a canonical document
//! - Expanding shorthand routes into their upstream and service
//! - Validating names and field values before any remote call
//! - Resolving admin API connection settings

mod expander;
mod parser;
mod settings;
mod spec;
mod validator;

pub use expander::{
    derive_route_name, ExpandedDocument, ExpandedRoute, GeneratedBackend, ShorthandExpander,
    ShorthandLink,
};
pub use parser::{detect_shape, DocumentParser, DocumentShape};
pub use settings::{
    default_settings_path, load_dotenv, with_scheme, AdminSettings, SettingsOverrides,
    DEFAULT_TIMEOUT_SECS,
};
pub use spec::{
    default_port, DesiredDocument, RouteBackend, RouteSpec, ServiceSpec, TargetSpec, UpstreamSpec,
    DEFAULT_BACKEND_PROTOCOL, DEFAULT_TARGET_WEIGHT,
};
pub use validator::{ConfigValidator, ValidationIssue, ValidationResult};
