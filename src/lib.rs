// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # gatesync
//!
//! Declarative, idempotent reconciliation of API gateway configuration:
//! upstreams, targets, services and routes.
//!
//! ## Overview
//!
//! A desired-state document declares the gateway resources a team wants.
//! gatesync compares each declared resource with what the gateway's admin API
//! reports and converges the gateway toward the document:
//!
//! - Missing resources are created
//! - Existing resources are updated only when overwrite is enabled
//! - Resources that already match are left untouched
//! - Nothing is ever deleted
//!
//! ## Architecture
//!
//! 1. **Document**: parsed and normalized, shorthand routes expanded, validated
//! 2. **Plan**: every resource resolved remotely and classified as
//!    create, update or no change, in dependency order
//! 3. **Execution**: the plan applied one call at a time, stopping at the
//!    first failure
//!
//! ## Modules
//!
//! - [`config`]: Document parsing, shorthand expansion, validation and settings
//! - [`admin`]: Admin API contract and HTTP client
//! - [`planner`]: Diffing, plan assembly and execution
//! - [`reconciler`]: The end-to-end pipeline
//! - [`exporter`]: Export of the gateway's configuration as a document
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! # A shorthand route: demo-service and demo-upstream are created for it
//! - name: demo
//!   paths: ["/demo"]
//!   backend:
//!     port: 8080
//!     targets:
//!       - target: demo-svc-1:8080
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod admin;
pub mod cli;
pub mod config;
pub mod error;
pub mod exporter;
pub mod planner;
pub mod reconciler;

// ============================================================================
// Re-exports
// ============================================================================

pub use admin::{AdminApi, AdminClient, Resource, ResourceKind};
pub use config::{AdminSettings, DesiredDocument, ExpandedDocument};
pub use error::{GatesyncError, Result};
pub use exporter::{ExportOptions, Exporter};
pub use planner::{Action, ApplyOptions, ExecutionReport, Plan};
pub use reconciler::{prepare, prepare_file, ApplyOutcome, Reconciler};
