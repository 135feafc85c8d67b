#![cfg_attr(docsrs, feature(doc_cfg))]

//! # wisp-bundler
//!
//! Turns a project's source files into a module graph and the graph into
//! output files, both from scratch and incrementally.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use wisp_bundler::{Bundler, BundlerRuntime, EmitOptions};
//! use wisp_config::WispConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WispConfig::from_value(serde_json::json!({
//!     "entry": { "main": "./src/index.js" }
//! }))?;
//! let runtime = BundlerRuntime::new(&config.context);
//! let bundler = Bundler::new(Arc::new(config), Arc::new(runtime))?;
//!
//! let outcome = bundler.build();
//! for error in &outcome.errors {
//!     eprintln!("{error}");
//! }
//! let artifacts = bundler.emit(&outcome.graph, &EmitOptions::default())?;
//! let dir = bundler.config().out_dir();
//! wisp_bundler::output::writer::write_artifacts(&artifacts, &dir, true)?;
//! # Ok(()) }
//! ```
//!
//! ## Layout
//!
//! - [`transform`] turns one file into a script module.
//! - [`builder`] walks imports to build a [`wisp_graph::ModuleGraph`], and
//!   rebuilds the stale part of one.
//! - [`chunk`] groups modules into chunks and renders them.
//! - [`hmr`] decides what a change invalidates and packages updates.
//! - [`output`] produces files, the HTML document and the manifest.

pub mod builder;
pub mod bundler;
pub mod chunk;
pub mod error;
pub mod hmr;
pub mod lexer;
pub mod output;
pub mod resolve;
pub mod runtime;
pub mod scan;
pub mod transform;

pub use builder::{BuildOutcome, GraphBuilder, RebuildOutcome};
pub use bundler::{Bundler, UpdateOutcome};
pub use error::{BuildError, CycleWarning, Result};
pub use hmr::{HmrBatch, HmrPlan, HmrUpdate, plan_update};
pub use output::{BuildArtifacts, EmitOptions, Manifest};
pub use resolve::Resolver;
pub use runtime::BundlerRuntime;
pub use transform::TransformPipeline;
