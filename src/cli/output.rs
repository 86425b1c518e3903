//! Output formatting for CLI commands.
//!
//! Plans render as a hierarchy: upstreams with their targets, services with
//! service-level targets, and routes with the resources synthesized for a
//! shorthand nested beneath them. Every string is built in memory; the caller
//! decides where it goes.

use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::admin::{target_key, ResourceKind};
use crate::config::{ExpandedDocument, ServiceSpec, ShorthandLink, UpstreamSpec};
use crate::planner::{Action, ActionCounts, Change, ExecutionReport, FieldDiff, Outcome, Plan};

use super::commands::OutputFormat;

const RULE_WIDTH: usize = 40;

/// Options controlling plan rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Show the field differences of updates.
    pub diff: bool,
    /// Hide unchanged entries that have no changed children.
    pub compact: bool,
    /// Use ASCII icons and rules instead of emoji and box drawing.
    pub ascii: bool,
    /// Colorize output.
    pub color: bool,
    /// Whether updates will be applied; a hint is printed when they will not.
    pub overwrite: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            diff: false,
            compact: false,
            ascii: false,
            color: true,
            overwrite: false,
        }
    }
}

/// Summary row for table display.
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Create")]
    create: usize,
    #[tabled(rename = "Update")]
    update: usize,
    #[tabled(rename = "No change")]
    no_change: usize,
}

/// Report row for table display.
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Result")]
    outcome: String,
}

#[derive(Clone, Copy)]
enum Tone {
    Header,
    Accent,
    Subtle,
    Create,
    Update,
    Removed,
    Added,
}

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    format: OutputFormat,
    options: RenderOptions,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat, options: RenderOptions) -> Self {
        Self { format, options }
    }

    /// Formats a plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &Plan, document: &ExpandedDocument) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(plan)).unwrap_or_default()
            }
            OutputFormat::Text => self.format_plan_text(plan, document),
        }
    }

    /// Formats an `apply` run: the plan, followed by the execution report when
    /// the plan was executed. JSON output is one object holding both.
    #[must_use]
    pub fn format_apply(
        &self,
        plan: &Plan,
        report: Option<&ExecutionReport>,
        document: &ExpandedDocument,
    ) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&ApplyJson {
                plan: PlanJson::from(plan),
                report,
            })
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = self.format_plan_text(plan, document);
                if let Some(report) = report {
                    output.push('\n');
                    output.push_str(&self.format_report_text(report));
                }
                output
            }
        }
    }

    /// Formats the summary of a document that passed validation.
    #[must_use]
    pub fn format_validation(&self, document: &ExpandedDocument) -> String {
        let shorthand = document.shorthand_links().len();
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "valid": true,
                "upstreams": document.all_upstreams().count(),
                "services": document.all_services().count(),
                "routes": document.routes.len(),
                "shorthand_routes": shorthand,
                "resources": document.resource_count(),
            }))
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("{} Document is valid\n\n", self.mark_ok());
                let _ = writeln!(output, "   Upstreams: {}", document.all_upstreams().count());
                let _ = writeln!(output, "   Services: {}", document.all_services().count());
                let _ = writeln!(output, "   Routes: {} ({shorthand} shorthand)", document.routes.len());
                let _ = writeln!(output, "   Resources: {}", document.resource_count());
                output
            }
        }
    }

    fn format_plan_text(&self, plan: &Plan, document: &ExpandedDocument) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "{}", self.paint("Plan:", Tone::Header));
        let _ = writeln!(output, "{}", self.rule());

        if !document.upstreams.is_empty() {
            let _ = writeln!(output, "  {}", self.paint("Upstreams:", Tone::Header));
            for upstream in &document.upstreams {
                self.write_upstream(&mut output, plan, upstream);
            }
            let _ = writeln!(output, "{}", self.rule());
        }

        if !document.services.is_empty() {
            let _ = writeln!(output, "  {}", self.paint("Services:", Tone::Header));
            for service in &document.services {
                self.write_service(&mut output, plan, service, document);
            }
            let _ = writeln!(output, "{}", self.rule());
        }

        let routes: Vec<&Change> = plan
            .changes
            .iter()
            .filter(|c| c.kind == ResourceKind::Route)
            .collect();
        if !routes.is_empty() {
            let _ = writeln!(output, "  {}", self.paint("Routes:", Tone::Header));
            let mut printed = false;
            for route in routes {
                let link = plan.shorthand_for(&route.name);
                if self.hidden(plan, ResourceKind::Route, &route.name, route_children(plan, link)) {
                    continue;
                }
                if printed {
                    let _ = writeln!(output, "    {}", self.paint(&self.route_rule(), Tone::Accent));
                }
                self.write_route(&mut output, plan, route, link);
                printed = true;
            }
            let _ = writeln!(output, "{}", self.rule());
        }

        self.write_summary(&mut output, plan);
        output
    }

    fn write_upstream(&self, output: &mut String, plan: &Plan, upstream: &UpstreamSpec) {
        let targets = target_entries(plan, &upstream.name, upstream.targets.iter().map(|t| t.target.as_str()));
        if self.hidden(plan, ResourceKind::Upstream, &upstream.name, changed(&targets)) {
            return;
        }

        let change = plan.find(ResourceKind::Upstream, &upstream.name);
        self.write_entry(output, 2, ResourceKind::Upstream, None, &upstream.name, change);
        if !targets.is_empty() {
            let _ = writeln!(output, "      {}", self.paint("Targets:", Tone::Subtle));
        }
        self.write_targets(output, 4, &targets);
    }

    fn write_service(
        &self,
        output: &mut String,
        plan: &Plan,
        service: &ServiceSpec,
        document: &ExpandedDocument,
    ) {
        let bound = service.upstream.as_deref().filter(|u| !u.is_empty());
        let mut children: Vec<&Change> = Vec::new();
        let bound_change = bound
            .filter(|u| !document.upstreams.iter().any(|x| x.name == *u))
            .and_then(|u| plan.find(ResourceKind::Upstream, u));
        children.extend(bound_change);
        let targets = bound.map_or_else(Vec::new, |u| {
            target_entries(plan, u, service.targets.iter().map(|t| t.target.as_str()))
        });
        children.extend(changed(&targets));

        if self.hidden(plan, ResourceKind::Service, &service.name, children) {
            return;
        }

        let change = plan.find(ResourceKind::Service, &service.name);
        self.write_entry(output, 2, ResourceKind::Service, None, &service.name, change);

        if let (Some(upstream), Some(change)) = (bound, bound_change) {
            self.write_entry(output, 3, ResourceKind::Upstream, Some("Upstream"), upstream, Some(change));
        }
        if let Some(upstream) = bound.filter(|_| !targets.is_empty()) {
            let label = format!("Targets (upstream {upstream}):");
            let _ = writeln!(output, "      {}", self.paint(&label, Tone::Subtle));
            self.write_targets(output, 4, &targets);
        }
    }

    fn write_route(&self, output: &mut String, plan: &Plan, route: &Change, link: Option<&ShorthandLink>) {
        self.write_entry(output, 2, ResourceKind::Route, None, &route.name, Some(route));

        let Some(link) = link else {
            return;
        };

        self.write_entry(
            output,
            3,
            ResourceKind::Service,
            Some("Service"),
            &link.service,
            plan.find(ResourceKind::Service, &link.service),
        );
        self.write_entry(
            output,
            3,
            ResourceKind::Upstream,
            Some("Upstream"),
            &link.upstream,
            plan.find(ResourceKind::Upstream, &link.upstream),
        );

        let targets = target_entries(plan, &link.upstream, link.targets.iter().map(String::as_str));
        if !targets.is_empty() {
            let _ = writeln!(output, "        {}", self.paint("Targets:", Tone::Subtle));
        }
        self.write_targets(output, 5, &targets);
    }

    fn write_targets(&self, output: &mut String, indent: usize, targets: &[TargetEntry<'_, '_>]) {
        for (address, change) in targets {
            if self.options.compact && action_of(*change) == Action::NoChange {
                continue;
            }
            self.write_entry(output, indent, ResourceKind::Target, None, address, *change);
        }
    }

    fn write_entry(
        &self,
        output: &mut String,
        indent: usize,
        kind: ResourceKind,
        label: Option<&str>,
        name: &str,
        change: Option<&Change>,
    ) {
        let pad = "  ".repeat(indent);
        let label = label.map(|l| format!("{l}: ")).unwrap_or_default();
        let _ = writeln!(
            output,
            "{pad}{} {label}{name} ({})",
            self.icon(kind),
            self.action_tag(action_of(change))
        );

        if self.options.diff {
            if let Some(change) = change.filter(|c| c.action == Action::Update) {
                for line in change.diffs.iter().flat_map(diff_lines) {
                    let tone = if line.starts_with('-') { Tone::Removed } else { Tone::Added };
                    let _ = writeln!(output, "{pad}  {}", self.paint(&line, tone));
                }
            }
        }
    }

    fn write_summary(&self, output: &mut String, plan: &Plan) {
        let counts = plan.counts_by_kind();
        let rows: Vec<SummaryRow> = [
            ResourceKind::Upstream,
            ResourceKind::Service,
            ResourceKind::Route,
            ResourceKind::Target,
        ]
        .into_iter()
        .map(|kind| {
            let c = counts.get(&kind).copied().unwrap_or_default();
            SummaryRow {
                kind: format!("{kind}s"),
                create: c.create,
                update: c.update,
                no_change: c.no_change,
            }
        })
        .collect();

        let _ = writeln!(output, "{}", self.paint("Summary:", Tone::Header));
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        if plan.is_empty() {
            let _ = writeln!(output, "\n{} No changes required", self.mark_ok());
        }
        if !self.options.overwrite && plan.count(Action::Update) > 0 {
            let hint = "Overwrite is disabled: only missing resources will be created; updates are skipped (use --overwrite to apply them).";
            let _ = writeln!(output, "\n{}", self.paint(hint, Tone::Subtle));
        }
    }

    fn format_report_text(&self, report: &ExecutionReport) -> String {
        let mut output = String::new();

        if !report.outcomes.is_empty() {
            let rows: Vec<OutcomeRow> = report
                .outcomes
                .iter()
                .enumerate()
                .map(|(i, o)| OutcomeRow {
                    index: i + 1,
                    kind: o.kind.to_string(),
                    name: o.name.clone(),
                    outcome: o.outcome.to_string(),
                })
                .collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let _ = write!(
            output,
            "\n{} {} created, {} updated, {} unchanged, {} skipped\n",
            self.mark_ok(),
            self.paint(&report.count(Outcome::Created).to_string(), Tone::Create),
            self.paint(&report.count(Outcome::Updated).to_string(), Tone::Update),
            report.count(Outcome::Unchanged),
            report.count(Outcome::Skipped)
        );

        if !report.skipped.is_empty() {
            let _ = writeln!(output, "\n{} Skipped updates:", self.mark_warn());
            for notice in &report.skipped {
                let _ = writeln!(output, "   - {notice}");
            }
        }

        output
    }

    /// Returns true if an entry and all of its children are unchanged in compact mode.
    fn hidden<'p>(
        &self,
        plan: &Plan,
        kind: ResourceKind,
        name: &str,
        children: impl IntoIterator<Item = &'p Change>,
    ) -> bool {
        self.options.compact
            && action_of(plan.find(kind, name)) == Action::NoChange
            && children.into_iter().all(|c| c.action == Action::NoChange)
    }

    fn icon(&self, kind: ResourceKind) -> &'static str {
        match (self.options.ascii, kind) {
            (true, ResourceKind::Upstream) => "[U]",
            (true, ResourceKind::Target) => "[T]",
            (true, ResourceKind::Service) => "[S]",
            (true, ResourceKind::Route) => "[R]",
            (false, ResourceKind::Upstream) => "🌐",
            (false, ResourceKind::Target) => "🎯",
            (false, ResourceKind::Service) => "🧩",
            (false, ResourceKind::Route) => "🛣️",
        }
    }

    fn action_tag(&self, action: Action) -> String {
        match (action, self.options.ascii) {
            (Action::Create, true) => self.paint("create", Tone::Create),
            (Action::Create, false) => self.paint("create ✨", Tone::Create),
            (Action::Update, true) => self.paint("update", Tone::Update),
            (Action::Update, false) => self.paint("update ♻️", Tone::Update),
            (Action::NoChange, _) => self.paint("no change", Tone::Subtle),
        }
    }

    fn rule(&self) -> String {
        let ch = if self.options.ascii { "=" } else { "─" };
        ch.repeat(RULE_WIDTH)
    }

    fn route_rule(&self) -> String {
        let ch = if self.options.ascii { "-" } else { "━" };
        ch.repeat(RULE_WIDTH)
    }

    fn mark_ok(&self) -> String {
        self.paint(if self.options.ascii { "OK" } else { "✓" }, Tone::Create)
    }

    fn mark_warn(&self) -> String {
        self.paint(if self.options.ascii { "!" } else { "⚠" }, Tone::Update)
    }

    fn paint(&self, text: &str, tone: Tone) -> String {
        if !self.options.color {
            return text.to_string();
        }
        match tone {
            Tone::Header => text.cyan().bold().to_string(),
            Tone::Accent => text.magenta().bold().to_string(),
            Tone::Subtle => text.dimmed().to_string(),
            Tone::Create | Tone::Added => text.green().to_string(),
            Tone::Update => text.yellow().to_string(),
            Tone::Removed => text.red().to_string(),
        }
    }
}

fn action_of(change: Option<&Change>) -> Action {
    change.map_or(Action::NoChange, |c| c.action)
}

/// A target address with its planned change.
type TargetEntry<'s, 'p> = (&'s str, Option<&'p Change>);

fn target_entries<'s, 'p>(
    plan: &'p Plan,
    upstream: &str,
    addresses: impl Iterator<Item = &'s str>,
) -> Vec<TargetEntry<'s, 'p>> {
    addresses
        .map(|address| (address, plan.find(ResourceKind::Target, &target_key(upstream, address))))
        .collect()
}

fn changed<'p>(targets: &[TargetEntry<'_, 'p>]) -> Vec<&'p Change> {
    targets.iter().filter_map(|(_, change)| *change).collect()
}

fn route_children<'p>(plan: &'p Plan, link: Option<&ShorthandLink>) -> Vec<&'p Change> {
    let Some(link) = link else {
        return Vec::new();
    };
    let mut children: Vec<&Change> = Vec::new();
    children.extend(plan.find(ResourceKind::Service, &link.service));
    children.extend(plan.find(ResourceKind::Upstream, &link.upstream));
    children.extend(changed(&target_entries(
        plan,
        &link.upstream,
        link.targets.iter().map(String::as_str),
    )));
    children
}

/// Renders one field difference as `-` (remote) and `+` (desired) lines.
fn diff_lines(diff: &FieldDiff) -> Vec<String> {
    let mut lines = Vec::with_capacity(2);
    if let Some(old) = &diff.old_value {
        lines.push(format!("- {}: {old}", diff.field));
    }
    if let Some(new) = &diff.new_value {
        lines.push(format!("+ {}: {new}", diff.field));
    }
    lines
}

// JSON serialization helpers

#[derive(Serialize)]
struct PlanJson<'a> {
    created_at: String,
    pending: bool,
    summary: BTreeMap<ResourceKind, ActionCounts>,
    changes: &'a [Change],
    shorthand: &'a [ShorthandLink],
}

#[derive(Serialize)]
struct ApplyJson<'a> {
    plan: PlanJson<'a>,
    report: Option<&'a ExecutionReport>,
}

impl<'a> From<&'a Plan> for PlanJson<'a> {
    fn from(plan: &'a Plan) -> Self {
        Self {
            created_at: plan.created_at.to_rfc3339(),
            pending: !plan.is_empty(),
            summary: plan.counts_by_kind(),
            changes: &plan.changes,
            shorthand: &plan.shorthand,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::{Resource, Upstream};
    use crate::config::{DocumentParser, ShorthandExpander};

    fn plain(compact: bool, diff: bool) -> OutputFormatter {
        OutputFormatter::new(
            OutputFormat::Text,
            RenderOptions {
                diff,
                compact,
                ascii: true,
                color: false,
                overwrite: false,
            },
        )
    }

    fn change(kind: ResourceKind, name: &str, action: Action, diffs: Vec<FieldDiff>) -> Change {
        Change {
            kind,
            name: name.to_string(),
            action,
            diffs,
            auto_generated_for: None,
            payload: Resource::Upstream(Upstream {
                id: None,
                name: name.to_string(),
            }),
        }
    }

    fn document(yaml: &str) -> ExpandedDocument {
        let parsed = DocumentParser::new().parse_str(yaml).expect("parse");
        ShorthandExpander::new().expand(parsed).expect("expand")
    }

    #[test]
    fn test_shorthand_nested_under_route() {
        let doc = document("name: demo\nbackend:\n  targets:\n    - target: a:80\n");
        let plan = Plan::new(
            vec![
                change(ResourceKind::Upstream, "demo-upstream", Action::Create, Vec::new()),
                change(ResourceKind::Target, "demo-upstream/a:80", Action::Create, Vec::new()),
                change(ResourceKind::Service, "demo-service", Action::Create, Vec::new()),
                change(ResourceKind::Route, "demo", Action::Create, Vec::new()),
            ],
            doc.shorthand_links(),
        );

        let text = plain(false, false).format_plan(&plan, &doc);

        assert!(!text.contains("Upstreams:"));
        assert!(text.contains("[R] demo (create)"));
        assert!(text.contains("[S] Service: demo-service (create)"));
        assert!(text.contains("[U] Upstream: demo-upstream (create)"));
        assert!(text.contains("[T] a:80 (create)"));
    }

    #[test]
    fn test_diff_lines_for_updates() {
        let doc = document("routes:\n  - name: r1\n    service: svc\n    methods: [GET, POST]\n");
        let plan = Plan::new(
            vec![change(
                ResourceKind::Route,
                "r1",
                Action::Update,
                vec![FieldDiff {
                    field: String::from("methods"),
                    old_value: None,
                    new_value: Some(String::from("POST")),
                }],
            )],
            Vec::new(),
        );

        let text = plain(false, true).format_plan(&plan, &doc);
        assert!(text.contains("[R] r1 (update)"));
        assert!(text.contains("+ methods: POST"));
        assert!(text.contains("--overwrite"));
    }

    #[test]
    fn test_compact_hides_unchanged() {
        let doc = document(
            "upstreams:\n  - name: quiet\n  - name: busy\n    targets:\n      - target: b:80\n",
        );
        let plan = Plan::new(
            vec![
                change(ResourceKind::Upstream, "quiet", Action::NoChange, Vec::new()),
                change(ResourceKind::Upstream, "busy", Action::NoChange, Vec::new()),
                change(ResourceKind::Target, "busy/b:80", Action::Create, Vec::new()),
            ],
            Vec::new(),
        );

        let text = plain(true, false).format_plan(&plan, &doc);
        assert!(!text.contains("quiet"));
        assert!(text.contains("[U] busy (no change)"));
        assert!(text.contains("[T] b:80 (create)"));
    }

    #[test]
    fn test_summary_counts_whole_plan() {
        let doc = document("name: demo\nbackend:\n  targets:\n    - target: a:80\n");
        let plan = Plan::new(
            vec![
                change(ResourceKind::Upstream, "demo-upstream", Action::NoChange, Vec::new()),
                change(ResourceKind::Target, "demo-upstream/a:80", Action::NoChange, Vec::new()),
                change(ResourceKind::Service, "demo-service", Action::NoChange, Vec::new()),
                change(ResourceKind::Route, "demo", Action::NoChange, Vec::new()),
            ],
            doc.shorthand_links(),
        );

        let text = plain(true, false).format_plan(&plan, &doc);
        assert!(text.contains("Upstreams"));
        assert!(text.contains("No changes required"));
        assert!(!text.contains("[R] demo"));
    }

    #[test]
    fn test_json_plan() {
        let doc = document("routes:\n  - name: r1\n    service: svc\n");
        let plan = Plan::new(
            vec![change(ResourceKind::Route, "r1", Action::Create, Vec::new())],
            Vec::new(),
        );
        let formatter = OutputFormatter::new(OutputFormat::Json, RenderOptions::default());

        let json: serde_json::Value =
            serde_json::from_str(&formatter.format_plan(&plan, &doc)).expect("json");
        assert_eq!(json["pending"], true);
        assert_eq!(json["changes"][0]["action"], "create");
        assert_eq!(json["summary"]["route"]["create"], 1);
    }

    #[test]
    fn test_route_nesting_follows_plan_links() {
        // The document carries no shorthand; the nesting comes from the plan.
        let doc = document("routes:\n  - name: other\n    service: svc\n");
        let plan = Plan::new(
            vec![
                change(ResourceKind::Upstream, "api-up", Action::NoChange, Vec::new()),
                change(ResourceKind::Target, "api-up/b:80", Action::Create, Vec::new()),
                change(ResourceKind::Service, "api-svc", Action::NoChange, Vec::new()),
                change(ResourceKind::Route, "api", Action::NoChange, Vec::new()),
            ],
            vec![ShorthandLink {
                route: String::from("api"),
                service: String::from("api-svc"),
                upstream: String::from("api-up"),
                targets: vec![String::from("b:80")],
            }],
        );

        let text = plain(true, false).format_plan(&plan, &doc);
        assert!(text.contains("[R] api (no change)"));
        assert!(text.contains("[S] Service: api-svc (no change)"));
        assert!(text.contains("[U] Upstream: api-up (no change)"));
        assert!(text.contains("[T] b:80 (create)"));
        assert!(!text.contains("other"));
    }

    #[test]
    fn test_json_apply_is_single_object() {
        let doc = document("routes:\n  - name: r1\n    service: svc\n");
        let plan = Plan::new(
            vec![change(ResourceKind::Route, "r1", Action::Create, Vec::new())],
            Vec::new(),
        );
        let report = ExecutionReport {
            outcomes: vec![crate::planner::ChangeOutcome {
                kind: ResourceKind::Route,
                name: String::from("r1"),
                outcome: Outcome::Created,
            }],
            skipped: Vec::new(),
        };
        let formatter = OutputFormatter::new(OutputFormat::Json, RenderOptions::default());

        let json: serde_json::Value =
            serde_json::from_str(&formatter.format_apply(&plan, Some(&report), &doc)).expect("json");
        assert_eq!(json["plan"]["changes"][0]["name"], "r1");
        assert_eq!(json["report"]["outcomes"][0]["outcome"], "created");

        let dry: serde_json::Value =
            serde_json::from_str(&formatter.format_apply(&plan, None, &doc)).expect("json");
        assert_eq!(dry["plan"]["pending"], true);
        assert!(dry["report"].is_null());
    }
}
