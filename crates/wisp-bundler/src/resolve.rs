//! Import specifier resolution.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use path_clean::PathClean;
use tracing::trace;
use wisp_config::WispConfig;
use wisp_graph::Runtime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    File(PathBuf),
    /// Provided by a global at runtime.
    External { specifier: String, global: String },
}

#[derive(Debug, Clone)]
pub struct Resolver {
    extensions: Vec<String>,
    modules: Vec<PathBuf>,
    main_fields: Vec<String>,
    externals: IndexMap<String, String>,
}

impl Resolver {
    pub fn from_config(config: &WispConfig) -> Self {
        Self {
            extensions: config.resolve.extensions.clone(),
            modules: config.resolve.modules.clone(),
            main_fields: config.resolve.main_fields.clone(),
            externals: config.externals.clone(),
        }
    }

    /// Resolve `specifier` as written in `importer`.
    pub fn resolve(&self, runtime: &dyn Runtime, specifier: &str, importer: &Path) -> Option<Resolved> {
        if let Some(global) = self.externals.get(specifier) {
            return Some(Resolved::External {
                specifier: specifier.to_string(),
                global: global.clone(),
            });
        }

        let base_dir = importer.parent().unwrap_or(Path::new("/"));
        let resolved = if is_path_like(specifier) {
            let candidate = if Path::new(specifier).is_absolute() {
                PathBuf::from(specifier)
            } else {
                base_dir.join(specifier)
            };
            self.resolve_path(runtime, &candidate.clean())
        } else {
            self.resolve_bare(runtime, specifier, base_dir)
        };
        trace!(specifier, importer = %importer.display(), resolved = ?resolved, "resolve");
        resolved.map(Resolved::File)
    }

    /// Global name an external specifier maps to.
    pub fn external_global(&self, specifier: &str) -> Option<&str> {
        self.externals.get(specifier).map(String::as_str)
    }

    /// Resolve an entry point path. Extensions are probed the same way as for
    /// relative imports.
    pub fn resolve_entry(&self, runtime: &dyn Runtime, path: &Path) -> Option<PathBuf> {
        self.resolve_path(runtime, &path.clean())
    }

    fn resolve_path(&self, runtime: &dyn Runtime, path: &Path) -> Option<PathBuf> {
        self.try_file(runtime, path)
            .or_else(|| self.try_directory(runtime, path))
    }

    fn try_file(&self, runtime: &dyn Runtime, path: &Path) -> Option<PathBuf> {
        if runtime.is_file(path) {
            return Some(path.to_path_buf());
        }
        self.extensions.iter().find_map(|ext| {
            let mut candidate = path.as_os_str().to_owned();
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            runtime.is_file(&candidate).then_some(candidate)
        })
    }

    fn try_directory(&self, runtime: &dyn Runtime, dir: &Path) -> Option<PathBuf> {
        if !runtime.is_dir(dir) {
            return None;
        }
        if let Some(main) = self.package_main(runtime, dir) {
            let main = dir.join(main).clean();
            if let Some(found) = self
                .try_file(runtime, &main)
                .or_else(|| self.try_index(runtime, &main))
            {
                return Some(found);
            }
        }
        self.try_index(runtime, dir)
    }

    fn try_index(&self, runtime: &dyn Runtime, dir: &Path) -> Option<PathBuf> {
        self.try_file(runtime, &dir.join("index"))
    }

    /// The first configured main field of `dir/package.json` holding a string.
    fn package_main(&self, runtime: &dyn Runtime, dir: &Path) -> Option<String> {
        let raw = runtime.read_file(&dir.join("package.json")).ok()?;
        let manifest: serde_json::Value = serde_json::from_slice(&raw).ok()?;
        self.main_fields
            .iter()
            .find_map(|field| manifest.get(field)?.as_str().map(str::to_string))
    }

    /// Look the specifier up in each module directory, walking up from the
    /// importer's directory. Absolute module directories are searched once.
    fn resolve_bare(&self, runtime: &dyn Runtime, specifier: &str, from: &Path) -> Option<PathBuf> {
        for modules in &self.modules {
            if modules.is_absolute() {
                if let Some(found) = self.resolve_path(runtime, &modules.join(specifier)) {
                    return Some(found);
                }
                continue;
            }
            for ancestor in from.ancestors() {
                let candidate = ancestor.join(modules).join(specifier);
                if let Some(found) = self.resolve_path(runtime, &candidate) {
                    return Some(found);
                }
            }
        }
        None
    }
}

fn is_path_like(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || Path::new(specifier).is_absolute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::BundlerRuntime;
    use serde_json::json;

    fn setup() -> (BundlerRuntime, Resolver) {
        let runtime = BundlerRuntime::in_memory("/app");
        runtime.add_virtual_file("/app/src/index.js", "");
        runtime.add_virtual_file("/app/src/util.js", "");
        runtime.add_virtual_file("/app/src/data.json", "{}");
        runtime.add_virtual_file("/app/src/components/index.js", "");
        runtime.add_virtual_file(
            "/app/node_modules/lib/package.json",
            r#"{ "main": "dist/lib.cjs", "module": "esm/index.js" }"#,
        );
        runtime.add_virtual_file("/app/node_modules/lib/esm/index.js", "");
        runtime.add_virtual_file("/app/node_modules/@scope/pkg/index.js", "");
        runtime.add_virtual_file("/app/node_modules/lib/feature.js", "");

        let config = WispConfig::from_value(json!({
            "context": "/app",
            "entry": { "main": "./src/index.js" },
            "externals": { "axios": "axios" }
        }))
        .unwrap();
        (runtime, Resolver::from_config(&config))
    }

    fn file(path: &str) -> Option<Resolved> {
        Some(Resolved::File(PathBuf::from(path)))
    }

    #[test]
    fn relative_specifiers_probe_extensions_and_indexes() {
        let (runtime, resolver) = setup();
        let importer = Path::new("/app/src/index.js");
        assert_eq!(resolver.resolve(&runtime, "./util", importer), file("/app/src/util.js"));
        assert_eq!(resolver.resolve(&runtime, "./data.json", importer), file("/app/src/data.json"));
        assert_eq!(
            resolver.resolve(&runtime, "./components", importer),
            file("/app/src/components/index.js")
        );
        assert_eq!(
            resolver.resolve(&runtime, "../src/./util.js", importer),
            file("/app/src/util.js")
        );
        assert_eq!(resolver.resolve(&runtime, "./missing", importer), None);
    }

    #[test]
    fn bare_specifiers_use_module_directories() {
        let (runtime, resolver) = setup();
        let importer = Path::new("/app/src/components/index.js");
        // `module` is listed before `main` in the default main fields.
        assert_eq!(
            resolver.resolve(&runtime, "lib", importer),
            file("/app/node_modules/lib/esm/index.js")
        );
        assert_eq!(
            resolver.resolve(&runtime, "lib/feature", importer),
            file("/app/node_modules/lib/feature.js")
        );
        assert_eq!(
            resolver.resolve(&runtime, "@scope/pkg", importer),
            file("/app/node_modules/@scope/pkg/index.js")
        );
    }

    #[test]
    fn externals_are_not_resolved() {
        let (runtime, resolver) = setup();
        assert_eq!(
            resolver.resolve(&runtime, "axios", Path::new("/app/src/index.js")),
            Some(Resolved::External {
                specifier: "axios".to_string(),
                global: "axios".to_string()
            })
        );
    }
}
