//! Reconciler wiring the pipeline together.
//!
//! Parse and normalize, expand shorthands, validate (no remote calls up to
//! here), then resolve and classify into a plan, and finally execute it
//! unless this is a dry run.

use std::path::Path;
use tracing::{debug, info};

use crate::admin::AdminApi;
use crate::config::{ConfigValidator, DocumentParser, ExpandedDocument, ShorthandExpander};
use crate::error::Result;
use crate::planner::{ApplyOptions, ExecutionReport, Plan, PlanAssembler, PlanExecutor};

/// Result of [`Reconciler::apply`].
#[derive(Debug)]
pub enum ApplyOutcome {
    /// Dry run: the plan was computed but nothing executed.
    DryRun(Plan),
    /// The plan was executed.
    Applied {
        /// The executed plan.
        plan: Plan,
        /// What happened to each change.
        report: ExecutionReport,
    },
}

impl ApplyOutcome {
    /// Returns the plan.
    #[must_use]
    pub const fn plan(&self) -> &Plan {
        match self {
            Self::DryRun(plan) | Self::Applied { plan, .. } => plan,
        }
    }

    /// Returns the execution report, if the plan was executed.
    #[must_use]
    pub const fn report(&self) -> Option<&ExecutionReport> {
        match self {
            Self::DryRun(_) => None,
            Self::Applied { report, .. } => Some(report),
        }
    }
}

/// Parses, expands and validates a document without touching the gateway.
///
/// # Errors
///
/// Returns a parse or validation error.
pub fn prepare(content: &str) -> Result<ExpandedDocument> {
    let document = DocumentParser::new().parse_str(content)?;
    finish_prepare(document)
}

/// Loads a document from a file, then expands and validates it.
///
/// # Errors
///
/// Returns a file, parse or validation error.
pub fn prepare_file(path: impl AsRef<Path>) -> Result<ExpandedDocument> {
    let document = DocumentParser::new().load_file(path)?;
    finish_prepare(document)
}

fn finish_prepare(document: crate::config::DesiredDocument) -> Result<ExpandedDocument> {
    let expanded = ShorthandExpander::new().expand(document)?;
    let result = ConfigValidator::new().validate(&expanded)?;
    debug!(
        "Document prepared: {} resources, {} warnings",
        expanded.resource_count(),
        result.warnings.len()
    );
    Ok(expanded)
}

/// Reconciler converging a gateway toward a desired document.
pub struct Reconciler<'a, A: AdminApi + ?Sized> {
    admin: &'a A,
}

impl<'a, A: AdminApi + ?Sized> Reconciler<'a, A> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(admin: &'a A) -> Self {
        Self { admin }
    }

    /// Computes the plan for a prepared document.
    ///
    /// # Errors
    ///
    /// Returns a fetch or dependency error.
    pub async fn plan(&self, document: &ExpandedDocument) -> Result<Plan> {
        PlanAssembler::new(self.admin).assemble(document).await
    }

    /// Plans and, unless `options.dry_run` is set, executes a prepared document.
    ///
    /// # Errors
    ///
    /// Returns a planning error, or the first failed change during execution.
    pub async fn apply(&self, document: &ExpandedDocument, options: ApplyOptions) -> Result<ApplyOutcome> {
        let plan = self.plan(document).await?;

        if options.dry_run {
            info!("Dry run: {} changes planned, nothing executed", plan.len());
            return Ok(ApplyOutcome::DryRun(plan));
        }

        let report = PlanExecutor::new(self.admin, options).execute(&plan).await?;
        Ok(ApplyOutcome::Applied { plan, report })
    }

    /// Prepares and applies document text in one call.
    ///
    /// # Errors
    ///
    /// Returns any error of [`prepare`] or [`Reconciler::apply`].
    pub async fn apply_str(&self, content: &str, options: ApplyOptions) -> Result<ApplyOutcome> {
        let document = prepare(content)?;
        self.apply(&document, options).await
    }
}
