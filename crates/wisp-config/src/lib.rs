//! Build configuration for wisp.
//!
//! A [`WispConfig`] is resolved once at process start (defaults, config file,
//! environment, command-line overrides, then the active mode's profile) and is
//! treated as immutable for the rest of the run.

pub mod bundle;
pub mod config;
pub mod defaults;
pub mod dev;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod mode;
pub mod validation;

pub use bundle::*;
pub use config::*;
pub use dev::*;
pub use error::*;
pub use mode::Mode;

pub use discovery::{ConfigDiscovery, ConfigSource};
pub use loader::{ConfigLoader, ConfigOverrides};
