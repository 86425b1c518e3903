//! Plan executor.
//!
//! Applies a plan in order, one awaited call at a time. Creates always run;
//! updates run only with overwrite enabled and are otherwise recorded as skip
//! notices. The first failing call stops execution. Nothing is retried or
//! rolled back.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::admin::{AdminApi, ResourceKind};
use crate::error::{ApplyError, Result};

use super::diff::Action;
use super::plan::{Change, Plan};

/// Options controlling a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Plan and render only; never execute.
    pub dry_run: bool,
    /// Allow updates of resources that already exist.
    pub overwrite: bool,
}

/// What happened to one change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Created.
    Created,
    /// Updated.
    Updated,
    /// Already matching; no call issued.
    Unchanged,
    /// Update withheld because overwrite is disabled.
    Skipped,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeOutcome {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource name.
    pub name: String,
    /// Outcome.
    pub outcome: Outcome,
}

/// An update that was not applied because overwrite is disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipNotice {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource name.
    pub name: String,
    /// Number of differing fields.
    pub differences: usize,
}

impl std::fmt::Display for SkipNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} '{}' differs in {} field(s); skipped (enable overwrite to apply)",
            self.kind, self.name, self.differences
        )
    }
}

/// Report of a completed execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    /// Per-change outcomes, in plan order.
    pub outcomes: Vec<ChangeOutcome>,
    /// Updates withheld.
    pub skipped: Vec<SkipNotice>,
}

impl ExecutionReport {
    /// Number of changes with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.iter().filter(|o| o.outcome == outcome).count()
    }

    /// Number of mutating calls issued.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.count(Outcome::Created) + self.count(Outcome::Updated)
    }
}

impl std::fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Applied {} changes: {} created, {} updated, {} unchanged, {} skipped",
            self.applied(),
            self.count(Outcome::Created),
            self.count(Outcome::Updated),
            self.count(Outcome::Unchanged),
            self.count(Outcome::Skipped)
        )
    }
}

/// Executor for plans.
pub struct PlanExecutor<'a, A: AdminApi + ?Sized> {
    admin: &'a A,
    options: ApplyOptions,
}

impl<'a, A: AdminApi + ?Sized> PlanExecutor<'a, A> {
    /// Creates a new executor.
    #[must_use]
    pub const fn new(admin: &'a A, options: ApplyOptions) -> Self {
        Self { admin, options }
    }

    /// Executes a plan.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::ResourceFailed`] naming the first change whose
    /// call failed; the remaining changes are not executed.
    pub async fn execute(&self, plan: &Plan) -> Result<ExecutionReport> {
        info!(
            "Executing plan with {} changes (overwrite: {})",
            plan.len(),
            self.options.overwrite
        );

        let mut report = ExecutionReport::default();

        for (idx, change) in plan.changes.iter().enumerate() {
            let result = self.execute_change(change, &mut report).await;
            let outcome = result.map_err(|e| {
                error!("Failed to apply {} '{}': {e}", change.kind, change.name);
                ApplyError::ResourceFailed {
                    kind: change.kind,
                    name: change.name.clone(),
                    completed: report.applied(),
                    reason: e.to_string(),
                }
            })?;

            debug!("Change {}: {} '{}' {outcome}", idx + 1, change.kind, change.name);
            report.outcomes.push(ChangeOutcome {
                kind: change.kind,
                name: change.name.clone(),
                outcome,
            });
        }

        if !report.skipped.is_empty() {
            warn!(
                "{} update(s) skipped because overwrite is disabled",
                report.skipped.len()
            );
        }
        info!("{report}");
        Ok(report)
    }

    async fn execute_change(&self, change: &Change, report: &mut ExecutionReport) -> Result<Outcome> {
        match change.action {
            Action::NoChange => Ok(Outcome::Unchanged),
            Action::Create => {
                info!("Creating {} '{}'", change.kind, change.name);
                self.admin.create(&change.payload).await?;
                Ok(Outcome::Created)
            }
            Action::Update if self.options.overwrite => {
                info!("Updating {} '{}'", change.kind, change.name);
                self.admin.patch(&change.name, &change.payload).await?;
                Ok(Outcome::Updated)
            }
            Action::Update => {
                let notice = SkipNotice {
                    kind: change.kind,
                    name: change.name.clone(),
                    differences: change.diffs.len(),
                };
                warn!("{notice}");
                report.skipped.push(notice);
                Ok(Outcome::Skipped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::mock::MockAdmin;
    use crate::admin::{Resource, Upstream};
    use crate::error::{AdminError, GatesyncError};
    use crate::planner::diff::FieldDiff;

    fn change(kind: ResourceKind, name: &str, action: Action) -> Change {
        Change {
            kind,
            name: name.to_string(),
            action,
            diffs: if action == Action::Update {
                vec![FieldDiff {
                    field: String::from("weight"),
                    old_value: Some(String::from("100")),
                    new_value: Some(String::from("50")),
                }]
            } else {
                Vec::new()
            },
            auto_generated_for: None,
            payload: Resource::Upstream(Upstream {
                id: None,
                name: name.to_string(),
            }),
        }
    }

    fn echo(payload: &Resource) -> Result<Resource> {
        Ok(payload.clone())
    }

    #[tokio::test]
    async fn test_update_skipped_without_overwrite() {
        let mut admin = MockAdmin::new();
        admin.expect_patch().times(0);
        admin.expect_create().times(0);

        let plan = Plan::new(vec![change(ResourceKind::Upstream, "up", Action::Update)], Vec::new());
        let report = PlanExecutor::new(&admin, ApplyOptions::default())
            .execute(&plan)
            .await
            .expect("execute");

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].name, "up");
        assert_eq!(report.skipped[0].differences, 1);
        assert_eq!(report.count(Outcome::Skipped), 1);
    }

    #[tokio::test]
    async fn test_update_applied_with_overwrite() {
        let mut admin = MockAdmin::new();
        admin
            .expect_patch()
            .withf(|name, _| name == "up")
            .times(1)
            .returning(|_, payload| echo(payload));

        let plan = Plan::new(vec![change(ResourceKind::Upstream, "up", Action::Update)], Vec::new());
        let options = ApplyOptions {
            overwrite: true,
            ..ApplyOptions::default()
        };
        let report = PlanExecutor::new(&admin, options)
            .execute(&plan)
            .await
            .expect("execute");

        assert!(report.skipped.is_empty());
        assert_eq!(report.count(Outcome::Updated), 1);
    }

    #[tokio::test]
    async fn test_failure_stops_execution() {
        let mut admin = MockAdmin::new();
        let mut calls = 0;
        admin.expect_create().times(2).returning(move |payload| {
            calls += 1;
            if calls == 2 {
                Err(AdminError::api_error(409, "conflict").into())
            } else {
                echo(payload)
            }
        });

        let plan = Plan::new(
            vec![
                change(ResourceKind::Upstream, "a", Action::Create),
                change(ResourceKind::Upstream, "b", Action::Create),
                change(ResourceKind::Upstream, "c", Action::Create),
            ],
            Vec::new(),
        );
        let err = PlanExecutor::new(&admin, ApplyOptions::default())
            .execute(&plan)
            .await
            .expect_err("should fail");

        match err {
            GatesyncError::Apply(ApplyError::ResourceFailed {
                name,
                completed,
                reason,
                ..
            }) => {
                assert_eq!(name, "b");
                assert_eq!(completed, 1);
                assert!(reason.contains("conflict"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_change_issues_no_call() {
        let admin = MockAdmin::new();
        let plan = Plan::new(
            vec![change(ResourceKind::Upstream, "up", Action::NoChange)],
            Vec::new(),
        );
        let report = tokio_test::block_on(
            PlanExecutor::new(&admin, ApplyOptions::default()).execute(&plan),
        )
        .expect("execute");

        assert_eq!(report.count(Outcome::Unchanged), 1);
        assert_eq!(report.applied(), 0);
    }
}
