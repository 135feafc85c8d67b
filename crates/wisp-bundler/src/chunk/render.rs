//! Chunk content.
//!
//! A chunk is the module registry runtime followed by one `__wisp__.define`
//! call per module. Entry chunks end by requiring their entry module.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use wisp_graph::{Module, ModuleGraph, ModuleId};

use super::Chunk;
use super::minify;

/// Module registry runtime, prepended to every chunk.
pub const RUNTIME: &str = include_str!("../../assets/runtime.js");

/// How modules are named inside the registry.
#[derive(Debug, Clone)]
pub enum ModuleNaming {
    /// `./src/app.js`, relative to the project root. Stable across rebuilds.
    Relative(PathBuf),
    /// Position in the graph's topological order.
    Numeric(FxHashMap<ModuleId, usize>),
}

impl ModuleNaming {
    pub fn relative(root: impl Into<PathBuf>) -> Self {
        Self::Relative(root.into())
    }

    pub fn numeric(graph: &ModuleGraph) -> Self {
        Self::Numeric(
            graph
                .topological_order()
                .into_iter()
                .enumerate()
                .map(|(index, id)| (id, index))
                .collect(),
        )
    }

    pub fn name(&self, id: &ModuleId) -> String {
        match self {
            Self::Relative(root) => id.display_relative(root),
            Self::Numeric(ids) => match ids.get(id) {
                Some(index) => index.to_string(),
                None => id.display_relative(Path::new("")),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub minimize: bool,
    pub drop_console: bool,
}

/// The registry definition of one module.
pub fn module_definition(module: &Module, naming: &ModuleNaming) -> String {
    definition(module, &module.code, naming)
}

fn definition(module: &Module, code: &str, naming: &ModuleNaming) -> String {
    let mut deps = String::from("{");
    for (i, dep) in module.dependencies.iter().enumerate() {
        if i > 0 {
            deps.push(',');
        }
        let _ = write!(deps, "{}:{}", json(&dep.specifier), json(&naming.name(&dep.target)));
    }
    deps.push('}');

    format!(
        "__wisp__.define({}, function (module, exports, require) {{\n{}\n}}, {});\n",
        json(&naming.name(&module.id)),
        code.trim_end_matches('\n'),
        deps
    )
}

pub fn render_chunk(
    graph: &ModuleGraph,
    chunk: &Chunk,
    naming: &ModuleNaming,
    options: RenderOptions,
) -> String {
    let mut out = String::with_capacity(RUNTIME.len());
    out.push_str(RUNTIME);
    if !out.ends_with('\n') {
        out.push('\n');
    }

    for id in &chunk.modules {
        let Some(module) = graph.module(id) else {
            continue;
        };
        if options.drop_console {
            let code = minify::drop_console(&module.code);
            out.push_str(&definition(module, &code, naming));
        } else {
            out.push_str(&module_definition(module, naming));
        }
    }
    if let Some(entry) = &chunk.entry {
        let _ = writeln!(out, "__wisp__.require({});", json(&naming.name(entry)));
    }

    if options.minimize {
        minify::minify(&out)
    } else {
        out
    }
}

fn json(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
