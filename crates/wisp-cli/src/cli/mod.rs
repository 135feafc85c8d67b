//! Command-line interface definition.
//!
//! # Command Structure
//!
//! - `wisp build` - one-shot build written to the output directory
//! - `wisp serve` - development server with hot module replacement

mod commands;
mod tests;

use clap::Parser;

pub use commands::{BuildArgs, Command, ServeArgs};

/// Wisp - a bundler and development server for browser applications
#[derive(Parser, Debug)]
#[command(
    name = "wisp",
    version,
    about = "A bundler and development server for browser applications",
    long_about = "Wisp turns a module graph of scripts, stylesheets and assets into\n\
                  optimized chunks, and serves them during development with\n\
                  incremental rebuilds and hot module replacement."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    ///
    /// Also honoured through the NO_COLOR environment variable.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
