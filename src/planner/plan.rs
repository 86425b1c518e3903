//! Reconciliation plan types.
//!
//! A plan is the ordered list of classified changes produced before anything
//! is executed. Order respects dependencies: an upstream and its targets come
//! before the services bound to it, which come before their routes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::admin::{Resource, ResourceKind};
use crate::config::ShorthandLink;

use super::diff::{Action, FieldDiff};

/// A classified change for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource name (`<upstream>/<address>` for targets).
    pub name: String,
    /// Computed action.
    pub action: Action,
    /// Field-level differences for updates.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diffs: Vec<FieldDiff>,
    /// Shorthand route this change was synthesized for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_generated_for: Option<String>,
    /// Payload sent on create or update.
    pub payload: Resource,
}

impl Change {
    /// Returns true if executing this change may issue a mutating call.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.action, Action::Create | Action::Update)
    }
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} '{}'", self.action, self.kind, self.name)?;
        if let Some(route) = &self.auto_generated_for {
            write!(f, " (for route '{route}')")?;
        }
        Ok(())
    }
}

/// Per-kind action counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionCounts {
    /// Creates.
    pub create: usize,
    /// Updates.
    pub update: usize,
    /// Unchanged.
    pub no_change: usize,
}

impl ActionCounts {
    fn record(&mut self, action: Action) {
        match action {
            Action::Create => self.create += 1,
            Action::Update => self.update += 1,
            Action::NoChange => self.no_change += 1,
        }
    }
}

/// A complete reconciliation plan.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Changes in execution order.
    pub changes: Vec<Change>,
    /// Shorthand route linkage, used for rendering.
    pub shorthand: Vec<ShorthandLink>,
}

impl Plan {
    /// Creates a plan from ordered changes.
    #[must_use]
    pub fn new(changes: Vec<Change>, shorthand: Vec<ShorthandLink>) -> Self {
        Self {
            created_at: Utc::now(),
            changes,
            shorthand,
        }
    }

    /// Returns true if no change would issue a mutating call.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.changes.iter().any(Change::is_pending)
    }

    /// Returns the number of changes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.changes.len()
    }

    /// Finds the change for a resource.
    #[must_use]
    pub fn find(&self, kind: ResourceKind, name: &str) -> Option<&Change> {
        self.changes.iter().find(|c| c.kind == kind && c.name == name)
    }

    /// Returns the shorthand linkage of a route, if it was declared with a backend.
    #[must_use]
    pub fn shorthand_for(&self, route: &str) -> Option<&ShorthandLink> {
        self.shorthand.iter().find(|link| link.route == route)
    }

    /// Returns true if the plan already holds a change for this resource.
    #[must_use]
    pub fn contains(&self, kind: ResourceKind, name: &str) -> bool {
        self.find(kind, name).is_some()
    }

    /// Returns the number of changes with the given action.
    #[must_use]
    pub fn count(&self, action: Action) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }

    /// Returns action counts per kind, over the whole plan.
    #[must_use]
    pub fn counts_by_kind(&self) -> BTreeMap<ResourceKind, ActionCounts> {
        let mut counts: BTreeMap<ResourceKind, ActionCounts> = BTreeMap::new();
        for change in &self.changes {
            counts.entry(change.kind).or_default().record(change.action);
        }
        counts
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Plan ({} changes):", self.len())?;
        for (i, change) in self.changes.iter().enumerate() {
            writeln!(f, "  {}. {change}", i + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::Upstream;

    fn change(kind: ResourceKind, name: &str, action: Action) -> Change {
        Change {
            kind,
            name: name.to_string(),
            action,
            diffs: Vec::new(),
            auto_generated_for: None,
            payload: Resource::Upstream(Upstream {
                id: None,
                name: name.to_string(),
            }),
        }
    }

    #[test]
    fn test_counts_by_kind() {
        let plan = Plan::new(
            vec![
                change(ResourceKind::Upstream, "up", Action::NoChange),
                change(ResourceKind::Target, "up/a:80", Action::Create),
                change(ResourceKind::Route, "r1", Action::Update),
                change(ResourceKind::Route, "r2", Action::Create),
            ],
            Vec::new(),
        );

        let counts = plan.counts_by_kind();
        assert_eq!(counts[&ResourceKind::Upstream].no_change, 1);
        assert_eq!(counts[&ResourceKind::Target].create, 1);
        assert_eq!(
            counts[&ResourceKind::Route],
            ActionCounts {
                create: 1,
                update: 1,
                no_change: 0
            }
        );
        assert!(!plan.is_empty());
        assert_eq!(plan.count(Action::Create), 2);
        assert!(plan.contains(ResourceKind::Route, "r2"));
    }

    #[test]
    fn test_display_empty_plan() {
        let plan = Plan::new(
            vec![change(ResourceKind::Upstream, "up", Action::NoChange)],
            Vec::new(),
        );
        assert!(plan.is_empty());
        assert_eq!(plan.to_string(), "No changes required");
    }
}
