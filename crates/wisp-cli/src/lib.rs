//! Wisp CLI.
//!
//! Command-line front end for the wisp bundler: `wisp build` writes a
//! production build to disk, `wisp serve` runs the development server with
//! hot module replacement.
//!
//! # Architecture
//!
//! - [`cli`] - argument definitions
//! - [`commands`] - one module per subcommand
//! - [`dev`] - the development server, file watcher and rebuild loop
//! - [`error`] - CLI error type and diagnostic rendering
//! - [`logger`] - tracing setup
//! - [`ui`] - terminal messages, spinners and summaries
//!
//! # Example
//!
//! ```rust,no_run
//! use wisp_cli::{error::Result, logger};
//!
//! fn main() -> Result<()> {
//!     logger::init_logger(false, false, false);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result, ResultExt};
