//! Chunk partitioning.
//!
//! Without splitting every entry gets one self-contained chunk. With
//! `splitChunks: "all"`, modules reached from two or more entries move into
//! shared chunks grouped by the exact set of entries reaching them, and every
//! entry chunk lists the shared chunks it needs, in load order.

pub mod minify;
pub mod render;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use wisp_config::SplitChunks;
use wisp_graph::{ModuleGraph, ModuleId};

pub use render::{ModuleNaming, RenderOptions, module_definition, render_chunk};

/// Separator between entry names in a shared chunk's name.
const SHARED_SEPARATOR: &str = "~";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Entry,
    Shared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub name: String,
    pub kind: ChunkKind,
    /// Emission order: every module after the modules it imports.
    pub modules: Vec<ModuleId>,
    /// The module an entry chunk starts by requiring.
    pub entry: Option<ModuleId>,
    /// Shared chunks that must load before this one.
    pub imports: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkSet {
    chunks: Vec<Chunk>,
}

impl ChunkSet {
    /// Shared chunks first, then entry chunks in entry declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|chunk| chunk.name == name)
    }

    pub fn entry_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().filter(|c| c.kind == ChunkKind::Entry)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Partition `graph` into chunks. Output depends only on the graph, so the
/// same graph always yields the same chunks.
pub fn optimize(graph: &ModuleGraph, split: SplitChunks) -> ChunkSet {
    let reach: IndexMap<&str, Vec<ModuleId>> = graph
        .entry_points()
        .iter()
        .map(|(name, id)| (name.as_str(), graph.post_order([id])))
        .collect();

    if split == SplitChunks::None || reach.len() < 2 {
        let chunks = graph
            .entry_points()
            .iter()
            .map(|(name, id)| Chunk {
                name: name.clone(),
                kind: ChunkKind::Entry,
                modules: reach.get(name.as_str()).cloned().unwrap_or_default(),
                entry: Some(id.clone()),
                imports: Vec::new(),
            })
            .collect();
        return ChunkSet { chunks };
    }

    // module -> entries reaching it, in declaration order
    let mut owners: IndexMap<&ModuleId, Vec<&str>> = IndexMap::new();
    for (name, modules) in &reach {
        for id in modules {
            owners.entry(id).or_default().push(*name);
        }
    }

    // Group shared modules; groups and their members follow the global
    // topological order.
    let mut groups: IndexMap<String, Vec<ModuleId>> = IndexMap::new();
    let mut group_of: IndexMap<&ModuleId, String> = IndexMap::new();
    let order = graph.topological_order();
    for id in &order {
        let Some(entries) = owners.get(id) else {
            continue;
        };
        if entries.len() < 2 {
            continue;
        }
        let mut key: Vec<&str> = entries.clone();
        key.sort_unstable();
        let name = key.join(SHARED_SEPARATOR);
        groups.entry(name.clone()).or_default().push(id.clone());
        if let Some((stored, _)) = owners.get_key_value(id) {
            group_of.insert(*stored, name);
        }
    }

    let mut chunks: Vec<Chunk> = groups
        .iter()
        .map(|(name, modules)| Chunk {
            name: name.clone(),
            kind: ChunkKind::Shared,
            modules: modules.clone(),
            entry: None,
            imports: Vec::new(),
        })
        .collect();

    for (name, id) in graph.entry_points() {
        let modules = reach.get(name.as_str()).map(Vec::as_slice).unwrap_or_default();
        let needed: IndexSet<&String> = modules.iter().filter_map(|m| group_of.get(m)).collect();
        let imports = groups
            .keys()
            .filter(|group| needed.contains(group))
            .cloned()
            .collect();
        chunks.push(Chunk {
            name: name.clone(),
            kind: ChunkKind::Entry,
            modules: modules
                .iter()
                .filter(|m| !group_of.contains_key(m))
                .cloned()
                .collect(),
            entry: Some(id.clone()),
            imports,
        });
    }
    ChunkSet { chunks }
}
