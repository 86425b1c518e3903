//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::SettingsOverrides;
use crate::planner::ApplyOptions;

use super::examples::ExampleKind;
use super::output::RenderOptions;

/// gatesync - Declarative gateway configuration reconciler.
#[derive(Parser, Debug)]
#[command(name = "gatesync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the settings file (defaults to ~/.gatesync/config.yaml).
    #[arg(long, global = true, env = "GATESYNC_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Admin API base URL.
    #[arg(long, global = true, env = "GATESYNC_ADMIN_URL")]
    pub admin_url: Option<String>,

    /// Admin API token.
    #[arg(long, global = true, env = "GATESYNC_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Workspace to operate in.
    #[arg(long, global = true, env = "GATESYNC_WORKSPACE")]
    pub workspace: Option<String>,

    /// Skip TLS certificate verification.
    #[arg(
        long,
        global = true,
        env = "GATESYNC_TLS_SKIP_VERIFY",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub tls_skip_verify: Option<bool>,

    /// Request timeout in seconds.
    #[arg(long, global = true, env = "GATESYNC_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Rendering flags shared by `plan` and `apply`.
#[derive(clap::Args, Debug, Clone, Copy, Default)]
pub struct RenderArgs {
    /// Show field differences for updates.
    #[arg(long)]
    pub diff: bool,

    /// Hide unchanged entries.
    #[arg(long)]
    pub compact: bool,

    /// Use ASCII icons instead of emoji.
    #[arg(long)]
    pub ascii: bool,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a document without contacting the gateway.
    Validate {
        /// Document to validate (YAML or JSON).
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show what applying a document would change.
    Plan {
        /// Document to plan (YAML or JSON).
        #[arg(short, long)]
        file: PathBuf,

        /// Rendering flags.
        #[command(flatten)]
        render: RenderArgs,
    },

    /// Apply a document to the gateway.
    Apply {
        /// Document to apply (YAML or JSON).
        #[arg(short, long)]
        file: PathBuf,

        /// Plan and render only.
        #[arg(long)]
        dry_run: bool,

        /// Update resources that already exist (by default only missing ones are created).
        #[arg(long)]
        overwrite: bool,

        /// Rendering flags.
        #[command(flatten)]
        render: RenderArgs,
    },

    /// Export the gateway's configuration as a document `apply` accepts.
    Export {
        /// Write to a file instead of stdout ("-" for stdout).
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,

        /// Fold services and upstreams into the backend of their routes.
        #[arg(long)]
        shorthand: bool,

        /// With --shorthand, also export upstreams no route uses.
        #[arg(long, requires = "shorthand")]
        include_orphans: bool,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Print an annotated example document.
    Example {
        /// Example type.
        #[arg(long = "type", value_enum, default_value = "full")]
        kind: ExampleKind,

        /// Write to a file instead of stdout ("-" for stdout).
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,

        /// Remove comment lines.
        #[arg(long)]
        no_comments: bool,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Settings given on the command line or through the environment.
    #[must_use]
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            admin_url: self.admin_url.clone(),
            token: self.token.clone(),
            workspace: self.workspace.clone(),
            tls_skip_verify: self.tls_skip_verify,
            timeout_secs: self.timeout,
        }
    }

    /// Whether output should be colored.
    #[must_use]
    pub fn color(&self) -> bool {
        !self.no_color && std::env::var_os("NO_COLOR").is_none()
    }

    /// Render options for a command.
    #[must_use]
    pub fn render_options(&self, render: RenderArgs, overwrite: bool) -> RenderOptions {
        RenderOptions {
            diff: render.diff,
            compact: render.compact,
            ascii: render.ascii,
            color: self.color(),
            overwrite,
        }
    }
}

impl Commands {
    /// Run options for `plan` and `apply`; `plan` is always a dry run.
    #[must_use]
    pub const fn apply_options(&self) -> ApplyOptions {
        match self {
            Self::Apply {
                dry_run, overwrite, ..
            } => ApplyOptions {
                dry_run: *dry_run,
                overwrite: *overwrite,
            },
            Self::Plan { .. } | Self::Validate { .. } | Self::Export { .. } | Self::Example { .. } => {
                ApplyOptions {
                    dry_run: true,
                    overwrite: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_flags() {
        let cli = Cli::parse_from([
            "gatesync",
            "--admin-url",
            "localhost:8001",
            "apply",
            "-f",
            "routes.yaml",
            "--overwrite",
            "--diff",
        ]);

        let options = cli.command.apply_options();
        assert!(options.overwrite);
        assert!(!options.dry_run);
        assert_eq!(cli.overrides().admin_url.as_deref(), Some("localhost:8001"));
        match cli.command {
            Commands::Apply { render, .. } => assert!(render.diff),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_plan_is_dry_run() {
        let cli = Cli::parse_from(["gatesync", "plan", "-f", "doc.yaml", "--compact", "--ascii"]);
        assert!(cli.command.apply_options().dry_run);
        let render = match cli.command {
            Commands::Plan { render, .. } => render,
            other => panic!("unexpected command: {other:?}"),
        };
        let options = Cli::parse_from(["gatesync", "--no-color", "validate", "-f", "x"])
            .render_options(render, false);
        assert!(options.compact && options.ascii && !options.color);
    }

    #[test]
    fn test_export_flags() {
        let cli = Cli::parse_from([
            "gatesync",
            "export",
            "--shorthand",
            "--include-orphans",
            "-o",
            "routes.yaml",
        ]);
        match cli.command {
            Commands::Export {
                out,
                shorthand,
                include_orphans,
                force,
            } => {
                assert_eq!(out, Some(PathBuf::from("routes.yaml")));
                assert!(shorthand && include_orphans && !force);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["gatesync", "export", "--include-orphans"]).is_err());
    }

    #[test]
    fn test_example_type() {
        let cli = Cli::parse_from(["gatesync", "example", "--type", "routes-simple", "--no-comments"]);
        match cli.command {
            Commands::Example {
                kind, no_comments, ..
            } => {
                assert_eq!(kind, ExampleKind::RoutesSimple);
                assert!(no_comments);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
