//! Command-line interface for gatesync.
//!
//! Argument parsing, plan and report rendering, and the example documents
//! printed by `gatesync example`.

mod commands;
mod examples;
mod output;

pub use commands::{Cli, Commands, OutputFormat, RenderArgs};
pub use examples::{render as render_example, strip_comments, template, write_document, ExampleKind};
pub use output::{OutputFormatter, RenderOptions};
