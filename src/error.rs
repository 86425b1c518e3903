//! Error types for the gatesync reconciliation engine.
//!
//! This module provides the error hierarchy for every stage of a run:
//! document parsing and validation, admin API access, plan assembly and
//! plan execution.

use std::path::PathBuf;
use thiserror::Error;

use crate::admin::ResourceKind;

/// The main error type for gatesync.
#[derive(Debug, Error)]
pub enum GatesyncError {
    /// Desired-state document or settings errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Gateway admin API errors.
    #[error("Admin API error: {0}")]
    Admin(#[from] AdminError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Execution errors.
    #[error("Apply error: {0}")]
    Apply(#[from] ApplyError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Desired-state document and settings errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file was not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Refused to overwrite an existing file.
    #[error("File already exists: {path} (use --force to overwrite)")]
    FileExists {
        /// Path to the existing file.
        path: PathBuf,
    },

    /// The document could not be parsed or its shape was not recognized.
    #[error("Failed to parse document: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Document validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Duplicate resource definition.
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName {
        /// Kind of resource.
        kind: ResourceKind,
        /// The duplicated name.
        name: String,
    },

    /// A required setting is missing.
    #[error("Missing setting: {name} ({hint})")]
    MissingSetting {
        /// Name of the missing setting.
        name: String,
        /// How to provide it.
        hint: String,
    },
}

/// Gateway admin API errors.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Authentication failed.
    #[error("Admin API authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed with a non-success status.
    #[error("Admin API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with the admin API: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("Admin API request timed out: {message}")]
    Timeout {
        /// Description of the timed out request.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid response from the admin API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Fetching the remote state of a resource failed.
    #[error("Failed to fetch {kind} '{name}': {reason}")]
    FetchFailed {
        /// Kind of resource.
        kind: ResourceKind,
        /// Name of the resource.
        name: String,
        /// Underlying failure.
        reason: String,
    },

    /// A referenced resource neither exists remotely nor is planned earlier.
    #[error("Failed to resolve dependencies: {message}")]
    DependencyResolutionFailed {
        /// Description of the dependency issue.
        message: String,
    },
}

/// Execution errors.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// A mutating call failed; the remaining plan was not executed.
    #[error("Failed to apply {kind} '{name}' ({completed} earlier changes applied): {reason}")]
    ResourceFailed {
        /// Kind of resource.
        kind: ResourceKind,
        /// Name of the resource.
        name: String,
        /// Number of mutating calls that succeeded before the failure.
        completed: usize,
        /// Reason for failure.
        reason: String,
    },
}

/// Result type alias for gatesync operations.
pub type Result<T> = std::result::Result<T, GatesyncError>;

impl GatesyncError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the error was raised before any remote call was made.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Io(_))
    }
}

impl ConfigError {
    /// Creates a parse error without a source location.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: None,
        }
    }

    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl AdminError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

impl PlanError {
    /// Creates a dependency error for a route whose service cannot be resolved.
    #[must_use]
    pub fn missing_service(route: &str, service: &str) -> Self {
        Self::DependencyResolutionFailed {
            message: format!(
                "route '{route}' references service '{service}', which does not exist remotely \
                 and is not created earlier in this document"
            ),
        }
    }
}
