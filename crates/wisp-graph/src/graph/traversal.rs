use std::collections::VecDeque;

use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};

use super::ModuleGraph;
use crate::fingerprint::Fingerprint;
use crate::module_id::ModuleId;

impl ModuleGraph {
    /// Depth-first post-order from `roots`: every module appears after the
    /// modules it imports.
    ///
    /// An edge back into the active path is skipped, so inside a cycle the
    /// order falls back to declaration order.
    pub fn post_order<'a>(
        &self,
        roots: impl IntoIterator<Item = &'a ModuleId>,
    ) -> Vec<ModuleId> {
        let mut order = Vec::new();
        let mut visited: FxHashSet<&ModuleId> = FxHashSet::default();

        for root in roots {
            if visited.contains(root) || !self.modules.contains_key(root) {
                continue;
            }
            self.walk(root, &mut visited, &mut order, &mut |_| {});
        }
        order
    }

    /// Modules reachable from `root`, dependencies first.
    pub fn reachable_from(&self, root: &ModuleId) -> IndexSet<ModuleId> {
        self.post_order([root]).into_iter().collect()
    }

    /// Dependencies-first order over the whole graph: entries in declaration
    /// order, then anything not reachable from an entry.
    pub fn topological_order(&self) -> Vec<ModuleId> {
        let mut order = self.post_order(self.entry_points.values());
        let seen: FxHashSet<ModuleId> = order.iter().cloned().collect();
        let rest: Vec<&ModuleId> = self
            .modules
            .keys()
            .filter(|id| !seen.contains(*id))
            .collect();
        order.extend(self.post_order(rest).into_iter().filter(|id| !seen.contains(id)));
        order
    }

    /// Cycles in the current edge set, found on the active traversal path.
    pub fn detect_cycles(&self) -> Vec<Vec<ModuleId>> {
        let mut cycles = Vec::new();
        let mut visited: FxHashSet<&ModuleId> = FxHashSet::default();
        let mut order = Vec::new();
        let roots: Vec<&ModuleId> = self
            .entry_points
            .values()
            .chain(self.modules.keys())
            .collect();
        for root in roots {
            if visited.contains(root) || !self.modules.contains_key(root) {
                continue;
            }
            self.walk(root, &mut visited, &mut order, &mut |cycle| cycles.push(cycle));
        }
        cycles
    }

    /// Entry names whose dependency tree contains `id`.
    pub fn entries_reaching(&self, id: &ModuleId) -> Vec<&str> {
        let mut seen: FxHashSet<&ModuleId> = FxHashSet::default();
        let mut queue: VecDeque<&ModuleId> = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            queue.extend(self.dependents(current));
        }

        self.entry_points
            .iter()
            .filter(|(_, entry)| seen.contains(entry))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Fingerprint of a module combined with those of everything it imports.
    ///
    /// Changes whenever the module or any transitive dependency changes.
    pub fn deep_fingerprint(&self, id: &ModuleId) -> Option<Fingerprint> {
        let order = self.post_order([id]);
        let mut deep: FxHashMap<&ModuleId, Fingerprint> = FxHashMap::default();

        for current in &order {
            let module = self.modules.get(current)?;
            let mut parts = vec![module.fingerprint];
            // Back edges inside a cycle have no deep value yet; they are skipped.
            parts.extend(module.dependency_ids().filter_map(|dep| deep.get(dep).copied()));
            deep.insert(current, Fingerprint::combine(&parts));
        }
        deep.get(id).copied()
    }

    fn walk<'a>(
        &'a self,
        root: &'a ModuleId,
        visited: &mut FxHashSet<&'a ModuleId>,
        order: &mut Vec<ModuleId>,
        on_cycle: &mut dyn FnMut(Vec<ModuleId>),
    ) {
        // (module, index of the next dependency to visit)
        let mut stack: Vec<(&'a ModuleId, usize)> = vec![(root, 0)];
        let mut on_stack: FxHashSet<&'a ModuleId> = FxHashSet::default();
        visited.insert(root);
        on_stack.insert(root);

        while let Some(&(current, next)) = stack.last() {
            let deps = self
                .modules
                .get(current)
                .map(|m| m.dependencies.as_slice())
                .unwrap_or_default();

            let Some(dep) = deps.get(next) else {
                stack.pop();
                on_stack.remove(current);
                order.push(current.clone());
                continue;
            };

            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            let target = &dep.target;
            if on_stack.contains(target) {
                let start = stack
                    .iter()
                    .position(|(id, _)| *id == target)
                    .unwrap_or_default();
                on_cycle(stack[start..].iter().map(|(id, _)| (*id).clone()).collect());
            } else if !visited.contains(target) && self.modules.contains_key(target) {
                visited.insert(target);
                on_stack.insert(target);
                stack.push((target, 0));
            }
        }
    }
}
