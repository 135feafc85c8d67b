//! The bundler facade used by the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use rustc_hash::FxHashSet;
use tracing::info;
use wisp_config::WispConfig;
use wisp_graph::{BuildState, ModuleGraph, ModuleId, Runtime};

use crate::builder::{BuildOutcome, GraphBuilder, RebuildOutcome};
use crate::error::Result;
use crate::hmr::{self, HmrBatch, HmrPlan};
use crate::output::{self, BuildArtifacts, EmitOptions};
use crate::resolve::Resolver;
use crate::transform::TransformPipeline;

/// Result of one incremental cycle.
#[derive(Debug)]
pub struct UpdateOutcome {
    pub plan: HmrPlan,
    pub rebuild: RebuildOutcome,
}

impl UpdateOutcome {
    pub fn is_success(&self) -> bool {
        self.rebuild.is_success()
    }

    /// Every module the client needs a new definition for, dependencies
    /// first.
    pub fn changed_modules(&self) -> Vec<ModuleId> {
        let changed: FxHashSet<&ModuleId> = self
            .rebuild
            .rebuilt
            .iter()
            .chain(&self.rebuild.added)
            .collect();
        self.rebuild
            .graph
            .topological_order()
            .into_iter()
            .filter(|id| changed.contains(id))
            .collect()
    }
}

/// Owns everything derived from the configuration. Immutable and shareable
/// across threads; graphs are passed in and returned by value.
#[derive(Debug)]
pub struct Bundler {
    config: Arc<WispConfig>,
    runtime: Arc<dyn Runtime>,
    pipeline: TransformPipeline,
    resolver: Resolver,
}

impl Bundler {
    pub fn new(config: Arc<WispConfig>, runtime: Arc<dyn Runtime>) -> Result<Self> {
        let pipeline = TransformPipeline::from_config(&config)?;
        let resolver = Resolver::from_config(&config);
        Ok(Self {
            config,
            runtime,
            pipeline,
            resolver,
        })
    }

    pub fn config(&self) -> &WispConfig {
        &self.config
    }

    fn builder(&self) -> GraphBuilder<'_> {
        GraphBuilder::new(&self.config, self.runtime.as_ref(), &self.pipeline, &self.resolver)
    }

    pub fn build(&self) -> BuildOutcome {
        self.builder().build()
    }

    /// Whether a change to `paths` can alter the output built from `graph`.
    pub fn is_affected_by(&self, graph: &ModuleGraph, paths: &[PathBuf]) -> bool {
        if has_errors(graph) || graph.entry_points().len() < self.config.entry.len() {
            return true;
        }
        let template = self
            .config
            .html
            .as_ref()
            .and_then(|html| html.template.as_ref())
            .map(|t| self.config.resolve_path(t));
        let copy_sources: Vec<PathBuf> = self
            .config
            .copy
            .iter()
            .map(|pattern| self.config.resolve_path(&pattern.from))
            .collect();

        paths.iter().any(|path| {
            module_id(path).is_some_and(|id| graph.contains(&id))
                || template.as_deref() == Some(path.as_path())
                || copy_sources.iter().any(|source| path.starts_with(source))
        })
    }

    /// Plan and run one incremental rebuild of `base` for the changed files.
    ///
    /// Modules left in the `Error` state by an earlier cycle are retried
    /// every time. Returns `None` when `cancelled` was set mid-way.
    pub fn rebuild(
        &self,
        base: &ModuleGraph,
        changed: &[PathBuf],
        cancelled: &AtomicBool,
    ) -> Option<UpdateOutcome> {
        let mut changed: Vec<ModuleId> = changed.iter().filter_map(|p| module_id(p)).collect();
        // Retried modules bubble like any other change.
        for module in base.modules() {
            if module.state == BuildState::Error && !changed.contains(&module.id) {
                changed.push(module.id.clone());
            }
        }
        let plan = hmr::plan_update(base, &changed);
        info!(
            changed = changed.len(),
            stale = plan.stale.len(),
            full_reload = plan.full_reload,
            "planned update"
        );
        let rebuild = self.builder().rebuild(base, &plan.stale, cancelled)?;
        Some(UpdateOutcome { plan, rebuild })
    }

    pub fn emit(&self, graph: &ModuleGraph, options: &EmitOptions) -> Result<BuildArtifacts> {
        output::emit(&self.config, self.runtime.as_ref(), graph, options)
    }

    /// The update batch a successful cycle sends to clients.
    pub fn hmr_batch(&self, outcome: &UpdateOutcome, cycle: u64) -> HmrBatch {
        let graph = &outcome.rebuild.graph;
        let naming = output::module_naming(&self.config, graph, true);
        hmr::batch(graph, &outcome.plan, &outcome.changed_modules(), &naming, cycle)
    }
}

fn module_id(path: &Path) -> Option<ModuleId> {
    ModuleId::new(path).ok()
}

fn has_errors(graph: &ModuleGraph) -> bool {
    graph.modules().any(|m| m.state == BuildState::Error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmr::{ClientOutcome, HmrClient};
    use crate::runtime::BundlerRuntime;
    use serde_json::json;

    fn bundler(runtime: &BundlerRuntime) -> Bundler {
        let config = WispConfig::from_value(json!({
            "context": "/app",
            "entry": { "main": "./main.js" }
        }))
        .unwrap();
        Bundler::new(Arc::new(config), Arc::new(runtime.clone())).unwrap()
    }

    fn files() -> BundlerRuntime {
        let runtime = BundlerRuntime::in_memory("/app");
        runtime.add_virtual_file(
            "/app/main.js",
            "import { render } from './view';\nrender();\nif (module.hot) module.hot.accept('./view', () => render());\n",
        );
        runtime.add_virtual_file("/app/view.js", "import { label } from './label';\nexport function render() { return label; }\n");
        runtime.add_virtual_file("/app/label.js", "export const label = 'a';\n");
        runtime.add_virtual_file("/app/style.css", "body { color: red }");
        runtime
    }

    #[test]
    fn accepted_change_produces_an_applicable_batch() {
        let runtime = files();
        let bundler = bundler(&runtime);
        let base = bundler.build().graph;

        runtime.add_virtual_file("/app/label.js", "export const label = 'b';\n");
        let outcome = bundler
            .rebuild(&base, &[PathBuf::from("/app/label.js")], &AtomicBool::new(false))
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(
            outcome.plan.stale,
            [ModuleId::new("/app/label.js").unwrap(), ModuleId::new("/app/view.js").unwrap()]
        );
        assert!(!outcome.plan.full_reload);

        let batch = bundler.hmr_batch(&outcome, 1);
        let paths: Vec<&str> = batch.updates.iter().map(|u| u.module_path.as_str()).collect();
        assert_eq!(paths, ["./label.js", "./view.js"]);
        assert_eq!(batch.updates[1].accepted_by, ["./main.js"]);
        assert_eq!(batch.version, base.version() + 1);

        let mut client = HmrClient::new();
        for path in ["./main.js", "./view.js", "./label.js"] {
            client.load(path, "old");
        }
        client.accept("./main.js", "./view.js");
        assert!(matches!(client.apply(&batch), ClientOutcome::Applied { .. }));
    }

    #[test]
    fn change_reaching_the_entry_requests_a_reload() {
        let runtime = files();
        let bundler = bundler(&runtime);
        let base = bundler.build().graph;
        runtime.add_virtual_file("/app/main.js", "console.log('no hmr');\n");

        let outcome = bundler
            .rebuild(&base, &[PathBuf::from("/app/main.js")], &AtomicBool::new(false))
            .unwrap();
        assert!(outcome.plan.full_reload);
        assert!(bundler.hmr_batch(&outcome, 2).full_reload);
        // The view subtree is no longer imported.
        assert_eq!(outcome.rebuild.removed.len(), 2);
    }

    #[test]
    fn relevance_of_changes() {
        let runtime = files();
        let bundler = bundler(&runtime);
        let graph = bundler.build().graph;
        assert!(bundler.is_affected_by(&graph, &[PathBuf::from("/app/view.js")]));
        // Not imported by anything.
        assert!(!bundler.is_affected_by(&graph, &[PathBuf::from("/app/style.css")]));
        assert!(!bundler.is_affected_by(&graph, &[PathBuf::from("/elsewhere/x.js")]));
    }

    #[test]
    fn failed_modules_are_retried_on_any_change() {
        let runtime = files();
        runtime.add_virtual_file("/app/label.js", "import './missing';\n");
        let bundler = bundler(&runtime);
        let base = bundler.build();
        assert!(!base.is_success());
        assert!(bundler.is_affected_by(&base.graph, &[PathBuf::from("/app/missing.js")]));

        runtime.add_virtual_file("/app/missing.js", "export {};\n");
        let outcome = bundler
            .rebuild(&base.graph, &[PathBuf::from("/app/missing.js")], &AtomicBool::new(false))
            .unwrap();
        assert!(outcome.is_success(), "{:?}", outcome.rebuild.errors);
        assert!(
            outcome
                .rebuild
                .graph
                .modules()
                .all(|m| m.state == BuildState::Built)
        );
    }
}
