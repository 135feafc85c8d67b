use std::sync::Arc;

use indexmap::IndexSet;

use super::ModuleGraph;
use crate::module::Module;
use crate::module_id::ModuleId;

impl ModuleGraph {
    /// Insert or replace a module, keeping reverse edges in sync with its
    /// dependency list.
    pub fn add_module(&mut self, module: Module) -> Arc<Module> {
        let id = module.id.clone();
        if let Some(previous) = self.modules.get(&id).cloned() {
            for dep in previous.dependency_ids() {
                if let Some(set) = self.dependents.get_mut(dep) {
                    set.shift_remove(&id);
                }
            }
        }

        for dep in module.dependency_ids() {
            self.dependents
                .entry(dep.clone())
                .or_insert_with(IndexSet::new)
                .insert(id.clone());
        }

        let module = Arc::new(module);
        self.modules.insert(id, Arc::clone(&module));
        module
    }

    pub fn add_entry_point(&mut self, name: impl Into<String>, id: ModuleId) {
        self.entry_points.insert(name.into(), id);
    }

    /// Record a cycle once, however many times the traversal meets it.
    pub fn record_cycle(&mut self, cycle: Vec<ModuleId>) {
        let key = canonical_rotation(&cycle);
        if !self.cycles.iter().any(|known| canonical_rotation(known) == key) {
            self.cycles.push(cycle);
        }
    }

    pub fn clear_cycles(&mut self) {
        self.cycles.clear();
    }
}

fn canonical_rotation(cycle: &[ModuleId]) -> Vec<&ModuleId> {
    let Some(start) = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(index, _)| index)
    else {
        return Vec::new();
    };
    cycle[start..].iter().chain(&cycle[..start]).collect()
}
