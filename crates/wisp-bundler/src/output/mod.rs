//! Turning a module graph into output files.
//!
//! [`emit`] renders every chunk, collects emitted assets and copy patterns,
//! generates the HTML document and the manifest. The result lives in memory
//! as [`BuildArtifacts`]; the dev server serves it directly and one-shot
//! builds hand it to [`writer::write_artifacts`].

mod copy;
pub mod html;
pub mod writer;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;
use wisp_config::{HtmlOptions, WispConfig};
use wisp_graph::{ModuleGraph, Runtime};

use crate::chunk::{self, ModuleNaming, RenderOptions};
use crate::error::{BuildError, Result};
use crate::transform::hash_content;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Maps entry names to the files a page must load, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub entries: IndexMap<String, Vec<String>>,
    pub assets: Vec<String>,
}

/// Output files keyed by their path relative to the output directory.
#[derive(Debug, Clone, Default)]
pub struct BuildArtifacts {
    files: IndexMap<String, Arc<[u8]>>,
    pub manifest: Manifest,
}

impl BuildArtifacts {
    pub fn get(&self, path: &str) -> Option<&Arc<[u8]>> {
        self.files.get(path.trim_start_matches('/'))
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &Arc<[u8]>)> {
        self.files.iter().map(|(name, content)| (name.as_str(), content))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Combined size of every file.
    pub fn total_size(&self) -> usize {
        self.files.values().map(|content| content.len()).sum()
    }

    /// Add or replace a file. `name` is relative to the output directory.
    pub fn insert(&mut self, name: String, content: impl Into<Arc<[u8]>>) {
        self.files.insert(name, content.into());
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    /// URL of the HMR client script to inject into the HTML document.
    pub hmr_client: Option<String>,
    /// Generate a default document even when `html` is not configured, so
    /// there is always a fallback page to serve.
    pub html_fallback: bool,
}

/// How modules are named in emitted chunks. Numeric ids only when the
/// output is minimized and no HMR client will ask for modules by name.
pub fn module_naming(config: &WispConfig, graph: &ModuleGraph, hmr: bool) -> ModuleNaming {
    if config.optimization.minimize_enabled(config.mode) && !hmr {
        ModuleNaming::numeric(graph)
    } else {
        ModuleNaming::relative(&config.context)
    }
}

pub fn emit(
    config: &WispConfig,
    runtime: &dyn Runtime,
    graph: &ModuleGraph,
    options: &EmitOptions,
) -> Result<BuildArtifacts> {
    let mut artifacts = BuildArtifacts::default();
    let naming = module_naming(config, graph, options.hmr_client.is_some());
    let render = RenderOptions {
        minimize: config.optimization.minimize_enabled(config.mode),
        drop_console: config.optimization.drop_console_enabled(config.mode),
    };

    let chunks = chunk::optimize(graph, config.optimization.split_chunks);
    let mut chunk_files: IndexMap<&str, String> = IndexMap::new();
    for chunk in chunks.iter() {
        let content = chunk::render_chunk(graph, chunk, &naming, render);
        let file = chunk_file_name(&config.output.filename, &chunk.name, content.as_bytes());
        debug!(chunk = %chunk.name, file = %file, bytes = content.len(), "rendered chunk");
        artifacts.insert(file.clone(), content.into_bytes());
        chunk_files.insert(&chunk.name, file);
    }

    for chunk in chunks.entry_chunks() {
        let files = chunk
            .imports
            .iter()
            .chain(std::iter::once(&chunk.name))
            .filter_map(|name| chunk_files.get(name.as_str()).cloned())
            .collect();
        artifacts.manifest.entries.insert(chunk.name.clone(), files);
    }

    for id in graph.topological_order() {
        let Some(module) = graph.module(&id) else {
            continue;
        };
        for asset in &module.emitted {
            if !artifacts.files.contains_key(&asset.file_name) {
                artifacts.manifest.assets.push(asset.file_name.clone());
                artifacts.insert(asset.file_name.clone(), Arc::clone(&asset.content));
            }
        }
    }

    for pattern in &config.copy {
        for (name, content) in copy::collect(config, pattern)? {
            artifacts.manifest.assets.push(name.clone());
            artifacts.insert(name, content);
        }
    }

    let html = config
        .html
        .clone()
        .or_else(|| options.html_fallback.then(HtmlOptions::default));
    if let Some(html) = html {
        let template = match &html.template {
            Some(path) => {
                let path = config.resolve_path(path);
                let raw = runtime.read_file(&path)?;
                Some(String::from_utf8(raw).map_err(|e| BuildError::Template {
                    file: path.display().to_string(),
                    message: e.to_string(),
                })?)
            }
            None => None,
        };
        let scripts = script_urls(&config.output.public_path, &artifacts.manifest);
        let document = html::render(
            &html,
            template.as_deref(),
            config.mode,
            &scripts,
            options.hmr_client.as_deref(),
        )?;
        artifacts.insert(html.filename.clone(), document.into_bytes());
    }

    let manifest = serde_json::to_vec_pretty(&artifacts.manifest).map_err(|e| {
        BuildError::Template {
            file: MANIFEST_FILE.to_string(),
            message: e.to_string(),
        }
    })?;
    artifacts.insert(MANIFEST_FILE.to_string(), manifest);
    Ok(artifacts)
}

/// `[name]` and `[hash]` substituted into the output filename template.
fn chunk_file_name(template: &str, name: &str, content: &[u8]) -> String {
    let mut file = template.replace("[name]", name);
    if file.contains("[hash]") {
        file = file.replace("[hash]", &hash_content(content));
    }
    file
}

/// Every entry's files, shared chunks first, each listed once.
fn script_urls(public_path: &str, manifest: &Manifest) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for files in manifest.entries.values() {
        for file in files {
            let url = format!("{public_path}{file}");
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::resolve::Resolver;
    use crate::runtime::BundlerRuntime;
    use crate::transform::TransformPipeline;
    use serde_json::json;

    fn fixture(mode: &str, extra: serde_json::Value) -> (BundlerRuntime, WispConfig) {
        let runtime = BundlerRuntime::in_memory("/app");
        runtime.add_virtual_file("/app/a.js", "import { shared } from './shared';\nconsole.log(shared);\n");
        runtime.add_virtual_file("/app/b.js", "import { shared } from './shared';\nshared();\n");
        runtime.add_virtual_file("/app/shared.js", "// helper\nexport function shared() {}\n");
        let mut value = json!({
            "mode": mode,
            "context": "/app",
            "entry": { "a": "./a.js", "b": "./b.js" },
            "html": { "title": "Demo" }
        });
        wisp_config::merge_values(&mut value, &extra);
        (runtime, WispConfig::from_value(value).unwrap())
    }

    fn build(runtime: &BundlerRuntime, config: &WispConfig, options: &EmitOptions) -> BuildArtifacts {
        let pipeline = TransformPipeline::from_config(config).unwrap();
        let resolver = Resolver::from_config(config);
        let outcome = GraphBuilder::new(config, runtime, &pipeline, &resolver).build();
        assert!(outcome.is_success(), "{:?}", outcome.errors);
        emit(config, runtime, &outcome.graph, options).unwrap()
    }

    fn text(artifacts: &BuildArtifacts, name: &str) -> String {
        String::from_utf8(artifacts.get(name).unwrap().to_vec()).unwrap()
    }

    #[test]
    fn emits_chunks_html_and_manifest() {
        let (runtime, config) = fixture("development", json!({}));
        let artifacts = build(&runtime, &config, &EmitOptions::default());

        let names: Vec<&str> = artifacts.files().map(|(name, _)| name).collect();
        assert_eq!(names, ["a~b.js", "a.js", "b.js", "index.html", "manifest.json"]);
        insta::assert_snapshot!(text(&artifacts, "manifest.json"), @r#"
        {
          "entries": {
            "a": [
              "a~b.js",
              "a.js"
            ],
            "b": [
              "a~b.js",
              "b.js"
            ]
          },
          "assets": []
        }
        "#);

        let html = text(&artifacts, "index.html");
        assert!(html.contains("<title>Demo</title>"));
        let shared = html.find("<script src=\"/a~b.js\"></script>").unwrap();
        let a = html.find("<script src=\"/a.js\"></script>").unwrap();
        assert!(shared < a);
        assert_eq!(html.matches("a~b.js").count(), 1);
    }

    #[test]
    fn hashed_file_names_follow_content() {
        let (runtime, config) =
            fixture("development", json!({ "output": { "filename": "[name].[hash].js" } }));
        let first = build(&runtime, &config, &EmitOptions::default());
        let second = build(&runtime, &config, &EmitOptions::default());
        let names: Vec<&str> = first.files().map(|(name, _)| name).collect();
        assert!(names[0].starts_with("a~b.") && names[0].len() == "a~b.12345678.js".len());
        assert_eq!(
            names,
            second.files().map(|(name, _)| name).collect::<Vec<_>>()
        );
    }

    #[test]
    fn production_output_is_smaller() {
        let (runtime, dev) = fixture("development", json!({}));
        let (_, prod) = fixture("production", json!({}));
        let dev = build(&runtime, &dev, &EmitOptions::default());
        let prod = build(&runtime, &prod, &EmitOptions::default());
        assert!(prod.total_size() <= dev.total_size());
        assert!(!text(&prod, "a.js").contains("console.log"));
        assert!(text(&dev, "a.js").contains("console.log"));
    }

    #[test]
    fn hmr_client_is_injected_after_chunks() {
        let (runtime, config) = fixture("development", json!({}));
        let artifacts = build(
            &runtime,
            &config,
            &EmitOptions {
                hmr_client: Some("/__wisp/client.js".to_string()),
                html_fallback: true,
            },
        );
        let html = text(&artifacts, "index.html");
        let chunk = html.find("/b.js").unwrap();
        let client = html.find("<script src=\"/__wisp/client.js\"></script>").unwrap();
        assert!(chunk < client);
    }

    #[test]
    fn fallback_document_without_html_option() {
        let (runtime, mut config) = fixture("development", json!({}));
        config.html = None;
        let without = build(&runtime, &config, &EmitOptions::default());
        assert!(without.get("index.html").is_none());
        let with = build(
            &runtime,
            &config,
            &EmitOptions {
                html_fallback: true,
                ..Default::default()
            },
        );
        assert!(with.get("/index.html").is_some());
    }
}
