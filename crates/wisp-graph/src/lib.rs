//! Module graph data structures for wisp.
//!
//! This crate holds no I/O: the bundler discovers modules through a
//! [`Runtime`] and records them here. A finished [`ModuleGraph`] is published
//! through a [`SnapshotStore`]; readers hold an `Arc` to a complete version
//! and never observe a graph mid-rebuild.
//!
//! ```
//! use wisp_graph::{BuildState, Module, ModuleGraph, ModuleId, ModuleKind};
//!
//! let id = ModuleId::new("/app/src/index.js").unwrap();
//! let module = Module::builder(id.clone(), ModuleKind::Script)
//!     .code("console.log(1);")
//!     .state(BuildState::Built)
//!     .entry(true)
//!     .build();
//!
//! let mut graph = ModuleGraph::new();
//! graph.add_module(module);
//! graph.add_entry_point("main", id.clone());
//! assert_eq!(graph.topological_order(), vec![id]);
//! ```

pub mod fingerprint;
pub mod graph;
pub mod module;
pub mod module_id;
pub mod runtime;
pub mod snapshot;
pub mod state;

pub use fingerprint::Fingerprint;
pub use graph::ModuleGraph;
pub use module::{
    Acceptance, Dependency, EmittedAsset, Module, ModuleBuilder, ModuleKind, StyleResource,
};
pub use module_id::{ModuleId, ModuleIdError};
pub use runtime::{FileMetadata, Runtime, RuntimeError, RuntimeResult};
pub use snapshot::{SnapshotError, SnapshotStore};
pub use state::{BuildState, StateError};
