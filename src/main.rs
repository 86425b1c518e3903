//! gatesync CLI entrypoint.
//!
//! This is the main entrypoint for the gatesync command-line tool.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use gatesync::admin::AdminClient;
use gatesync::cli::{
    render_example, write_document, Cli, Commands, OutputFormat, OutputFormatter, RenderArgs,
};
use gatesync::config::{load_dotenv, AdminSettings};
use gatesync::error::{GatesyncError, Result};
use gatesync::exporter::{to_yaml, ExportOptions, Exporter};
use gatesync::planner::ApplyOptions;
use gatesync::reconciler::{prepare_file, ApplyOutcome, Reconciler};

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    // Load .env before parsing so it feeds clap's env fallbacks
    if let Err(e) = load_dotenv(None) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse_args();

    init_logging(cli.verbose);
    if !cli.color() {
        colored::control::set_override(false);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Validate { file } => cmd_validate(&cli, file),
        Commands::Plan { file, render } | Commands::Apply { file, render, .. } => {
            cmd_apply(&cli, file, *render, cli.command.apply_options()).await
        }
        Commands::Export {
            out,
            shorthand,
            include_orphans,
            force,
        } => {
            let options = ExportOptions {
                shorthand: *shorthand,
                include_orphans: *include_orphans,
            };
            cmd_export(&cli, out.as_deref(), options, *force).await
        }
        Commands::Example {
            kind,
            out,
            no_comments,
            force,
        } => {
            let content = render_example(*kind, *no_comments);
            write_or_emit(out.as_deref(), &content, *force, "Example")
        }
    }
}

/// Validate a document without contacting the gateway.
fn cmd_validate(cli: &Cli, file: &Path) -> Result<()> {
    info!("Validating document: {}", file.display());

    let document = prepare_file(file)?;
    let formatter = OutputFormatter::new(cli.output, cli.render_options(RenderArgs::default(), false));
    emit(&formatter.format_validation(&document))
}

/// Plan a document and, unless this is a dry run, apply it.
async fn cmd_apply(cli: &Cli, file: &Path, render: RenderArgs, options: ApplyOptions) -> Result<()> {
    // Local checks come before anything that needs the gateway
    let document = prepare_file(file)?;

    let settings = AdminSettings::resolve(&cli.overrides(), cli.settings.as_deref())?;
    let client = AdminClient::new(&settings)?;
    debug!("Using admin API at {}", client.base_url());

    let formatter = OutputFormatter::new(cli.output, cli.render_options(render, options.overwrite));
    let outcome = Reconciler::new(&client).apply(&document, options).await?;

    emit(&formatter.format_apply(outcome.plan(), outcome.report(), &document))?;
    if matches!(outcome, ApplyOutcome::DryRun(_)) {
        eprintln!("Dry run: nothing was applied.");
    }
    Ok(())
}

/// Export the gateway's configuration.
async fn cmd_export(cli: &Cli, out: Option<&Path>, options: ExportOptions, force: bool) -> Result<()> {
    let settings = AdminSettings::resolve(&cli.overrides(), cli.settings.as_deref())?;
    let client = AdminClient::new(&settings)?;
    debug!("Using admin API at {}", client.base_url());

    let document = Exporter::new(&client).export(options).await?;
    if document.is_empty() {
        warn!("The gateway has nothing to export");
    }

    let content = match cli.output {
        OutputFormat::Json => serde_json::to_string_pretty(&document)
            .map_err(|e| GatesyncError::internal(format!("failed to serialize document: {e}")))?,
        OutputFormat::Text => to_yaml(&document)?,
    };
    write_or_emit(out, &content, force, "Export")
}

/// Writes generated content to a file, or to stdout when no file (or "-") is given.
fn write_or_emit(out: Option<&Path>, content: &str, force: bool, what: &str) -> Result<()> {
    match out.filter(|p| *p != Path::new("-")) {
        Some(path) => {
            write_document(path, content, force)?;
            eprintln!("{what} written to {}", path.display());
            Ok(())
        }
        None => emit(content),
    }
}

/// Writes command output to stdout.
fn emit(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}
