use std::sync::Arc;

use rustc_hash::FxHashSet;

use super::ModuleGraph;
use crate::module::Module;
use crate::module_id::ModuleId;
use crate::state::{BuildState, StateError};

impl ModuleGraph {
    /// Advance to the next snapshot version.
    pub fn bump_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    pub fn remove_module(&mut self, id: &ModuleId) -> Option<Arc<Module>> {
        let module = self.modules.shift_remove(id)?;
        for dep in module.dependency_ids() {
            if let Some(set) = self.dependents.get_mut(dep) {
                set.shift_remove(id);
            }
        }
        Some(module)
    }

    /// Drop every module no entry point reaches any more.
    pub fn remove_unreachable(&mut self) -> Vec<ModuleId> {
        let reachable: FxHashSet<ModuleId> = self
            .post_order(self.entry_points.values())
            .into_iter()
            .collect();
        let orphans: Vec<ModuleId> = self
            .modules
            .keys()
            .filter(|id| !reachable.contains(*id))
            .cloned()
            .collect();

        for id in &orphans {
            self.remove_module(id);
        }
        // Keep reverse-edge keys only for modules still present.
        self.dependents.retain(|id, importers| {
            reachable.contains(id) && {
                importers.retain(|importer| reachable.contains(importer));
                true
            }
        });
        orphans
    }

    /// Apply a state transition to one module.
    pub fn transition(
        &mut self,
        id: &ModuleId,
        step: impl FnOnce(BuildState) -> Result<BuildState, StateError>,
    ) -> Result<BuildState, StateError> {
        let Some(module) = self.modules.get_mut(id) else {
            return Err(StateError::UnknownModule(id.clone()));
        };
        let next = step(module.state)?;
        Arc::make_mut(module).state = next;
        Ok(next)
    }

    pub fn state(&self, id: &ModuleId) -> Option<BuildState> {
        self.modules.get(id).map(|m| m.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleKind;

    fn id(name: &str) -> ModuleId {
        ModuleId::new(format!("/app/{name}.js")).unwrap()
    }

    #[test]
    fn unreachable_modules_are_removed() {
        let mut graph = ModuleGraph::new();
        graph.add_module(
            Module::builder(id("main"), ModuleKind::Script)
                .dependency("./kept", id("kept"))
                .build(),
        );
        graph.add_module(Module::builder(id("kept"), ModuleKind::Script).build());
        graph.add_module(
            Module::builder(id("orphan"), ModuleKind::Script)
                .dependency("./kept", id("kept"))
                .build(),
        );
        graph.add_entry_point("main", id("main"));

        assert_eq!(graph.remove_unreachable(), vec![id("orphan")]);
        assert!(!graph.contains(&id("orphan")));
        assert_eq!(
            graph.dependents(&id("kept")).collect::<Vec<_>>(),
            vec![&id("main")]
        );
    }

    #[test]
    fn transitions_are_checked() {
        let mut graph = ModuleGraph::new();
        graph.add_module(Module::builder(id("a"), ModuleKind::Script).build());

        assert_eq!(
            graph.transition(&id("a"), BuildState::complete),
            Ok(BuildState::Built)
        );
        assert!(graph.transition(&id("a"), BuildState::begin_rebuild).is_err());
        assert_eq!(
            graph.transition(&id("missing"), BuildState::complete),
            Err(StateError::UnknownModule(id("missing")))
        );
        assert_eq!(graph.state(&id("a")), Some(BuildState::Built));
    }

    #[test]
    fn snapshot_copies_share_modules() {
        let mut graph = ModuleGraph::new();
        graph.add_module(Module::builder(id("a"), ModuleKind::Script).build());
        let copy = graph.clone();
        assert!(Arc::ptr_eq(
            graph.module(&id("a")).unwrap(),
            copy.module(&id("a")).unwrap()
        ));
    }
}
