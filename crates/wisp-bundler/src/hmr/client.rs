//! A model of the browser-side update contract.
//!
//! The embedded client runtime follows the same rules; this type lets the
//! server side reason about and test them:
//!
//! - a batch is applied only if every boundary in it is registered by the
//!   client, otherwise the client reloads the page;
//! - validation happens before anything changes, so a rejected batch leaves
//!   no module replaced.

use rustc_hash::{FxHashMap, FxHashSet};

use super::HmrBatch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOutcome {
    Applied {
        /// Modules whose definition was replaced.
        installed: Vec<String>,
        /// `(accepter, accepted)` pairs whose handler ran, in batch order.
        handled: Vec<(String, String)>,
    },
    FullReload,
}

#[derive(Debug, Clone, Default)]
pub struct HmrClient {
    /// Module path -> fingerprint of the definition in use.
    modules: FxHashMap<String, String>,
    self_accepting: FxHashSet<String>,
    /// Accepter -> modules it accepts.
    accepts: FxHashMap<String, FxHashSet<String>>,
}

impl HmrClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `module` is loaded with the given fingerprint.
    pub fn load(&mut self, module: impl Into<String>, fingerprint: impl Into<String>) {
        self.modules.insert(module.into(), fingerprint.into());
    }

    pub fn accept_self(&mut self, module: impl Into<String>) {
        self.self_accepting.insert(module.into());
    }

    pub fn accept(&mut self, accepter: impl Into<String>, dependency: impl Into<String>) {
        self.accepts
            .entry(accepter.into())
            .or_default()
            .insert(dependency.into());
    }

    pub fn fingerprint(&self, module: &str) -> Option<&str> {
        self.modules.get(module).map(String::as_str)
    }

    pub fn apply(&mut self, batch: &HmrBatch) -> ClientOutcome {
        if batch.full_reload || !self.can_apply(batch) {
            return ClientOutcome::FullReload;
        }

        let mut installed = Vec::with_capacity(batch.updates.len());
        let mut handled = Vec::new();
        for update in &batch.updates {
            self.modules
                .insert(update.module_path.clone(), update.fingerprint.clone());
            installed.push(update.module_path.clone());
        }
        for update in &batch.updates {
            for accepter in &update.accepted_by {
                if self.modules.contains_key(accepter) {
                    handled.push((accepter.clone(), update.module_path.clone()));
                }
            }
        }
        ClientOutcome::Applied { installed, handled }
    }

    fn can_apply(&self, batch: &HmrBatch) -> bool {
        let mut boundaries = 0;
        for update in &batch.updates {
            for accepter in &update.accepted_by {
                if !self.modules.contains_key(accepter) {
                    continue;
                }
                boundaries += 1;
                let registered = if *accepter == update.module_path {
                    self.self_accepting.contains(accepter)
                } else {
                    self.accepts
                        .get(accepter)
                        .is_some_and(|set| set.contains(&update.module_path))
                };
                if !registered {
                    return false;
                }
            }
        }
        boundaries > 0 || batch.updates.is_empty()
    }
}
