use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use crate::fingerprint::Fingerprint;
use crate::module_id::ModuleId;
use crate::state::BuildState;

/// What kind of source a module came from. Decided by the transform stages
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    #[default]
    Script,
    Style,
    Asset,
    Json,
    Raw,
    /// Provided by a global at runtime; never read from disk.
    External,
}

/// One resolved import: the specifier as written and the module it names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Dependency {
    pub specifier: String,
    pub target: ModuleId,
}

/// Which updates a module absorbs instead of propagating to its importers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Acceptance {
    pub self_accepting: bool,
    pub dependencies: BTreeSet<ModuleId>,
}

impl Acceptance {
    pub fn accepts(&self, dependency: &ModuleId) -> bool {
        self.dependencies.contains(dependency)
    }

    pub fn is_empty(&self) -> bool {
        !self.self_accepting && self.dependencies.is_empty()
    }
}

/// A stylesheet registered with the runtime when its module executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleResource {
    pub id: String,
    pub css: String,
}

/// A file written next to the chunks, e.g. an image above the inline limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    pub file_name: String,
    pub content: Arc<[u8]>,
}

/// A resolved, transformed source unit.
///
/// Content is behind `Arc` so graph snapshots clone cheaply.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub kind: ModuleKind,
    pub raw: Arc<[u8]>,
    /// Output of the transform pipeline.
    pub code: Arc<str>,
    /// In source order.
    pub dependencies: Vec<Dependency>,
    pub acceptance: Acceptance,
    pub style: Option<StyleResource>,
    pub emitted: Vec<EmittedAsset>,
    pub fingerprint: Fingerprint,
    pub state: BuildState,
    pub is_entry: bool,
}

impl Module {
    pub fn builder(id: ModuleId, kind: ModuleKind) -> ModuleBuilder {
        ModuleBuilder::new(id, kind)
    }

    pub fn dependency_ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.dependencies.iter().map(|d| &d.target)
    }

    /// The module a specifier written in this module resolved to.
    pub fn resolve_specifier(&self, specifier: &str) -> Option<&ModuleId> {
        self.dependencies
            .iter()
            .find(|d| d.specifier == specifier)
            .map(|d| &d.target)
    }
}

pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    fn new(id: ModuleId, kind: ModuleKind) -> Self {
        Self {
            module: Module {
                id,
                kind,
                raw: Arc::from(Vec::new()),
                code: Arc::from(""),
                dependencies: Vec::new(),
                acceptance: Acceptance::default(),
                style: None,
                emitted: Vec::new(),
                fingerprint: Fingerprint::default(),
                state: BuildState::Unbuilt,
                is_entry: false,
            },
        }
    }

    pub fn raw(mut self, raw: impl Into<Arc<[u8]>>) -> Self {
        self.module.raw = raw.into();
        self
    }

    /// Sets the transformed content and its fingerprint.
    pub fn code(mut self, code: impl Into<Arc<str>>) -> Self {
        self.module.code = code.into();
        self.module.fingerprint = Fingerprint::of(self.module.code.as_bytes());
        self
    }

    pub fn dependency(mut self, specifier: impl Into<String>, target: ModuleId) -> Self {
        self.module.dependencies.push(Dependency {
            specifier: specifier.into(),
            target,
        });
        self
    }

    pub fn dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.module.dependencies = dependencies;
        self
    }

    pub fn acceptance(mut self, acceptance: Acceptance) -> Self {
        self.module.acceptance = acceptance;
        self
    }

    pub fn accepts(mut self, dependency: ModuleId) -> Self {
        self.module.acceptance.dependencies.insert(dependency);
        self
    }

    pub fn self_accepting(mut self, value: bool) -> Self {
        self.module.acceptance.self_accepting = value;
        self
    }

    pub fn style(mut self, style: Option<StyleResource>) -> Self {
        self.module.style = style;
        self
    }

    pub fn emitted(mut self, emitted: Vec<EmittedAsset>) -> Self {
        self.module.emitted = emitted;
        self
    }

    pub fn state(mut self, state: BuildState) -> Self {
        self.module.state = state;
        self
    }

    pub fn entry(mut self, is_entry: bool) -> Self {
        self.module.is_entry = is_entry;
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}
