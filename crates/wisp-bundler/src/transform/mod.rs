//! Per-file transform pipeline.
//!
//! A file's path is matched against the configured rules in order; the first
//! rule whose `test` matches (and whose `exclude` does not) decides the chain
//! of stages. Each stage rewrites the unit produced by the previous one.

mod asset;
mod downlevel;
mod esm;
mod style;

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;
use wisp_config::{ConfigError, Mode, StageName, StageOptions, WispConfig};
use wisp_graph::{EmittedAsset, ModuleKind, StyleResource};

use crate::error::{BuildError, Result};

pub use downlevel::DefineTable;
pub(crate) use asset::hash_content;

/// Extensions executed as-is when no rule claims them.
const NATIVE_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub kind: ModuleKind,
    pub code: String,
    pub style: Option<StyleResource>,
    pub emitted: Vec<EmittedAsset>,
}

#[derive(Debug)]
struct CompiledRule {
    test: Regex,
    exclude: Option<Regex>,
    stages: Vec<StageName>,
    options: StageOptions,
}

impl CompiledRule {
    fn matches(&self, path: &str) -> bool {
        self.test.is_match(path) && !self.exclude.as_ref().is_some_and(|re| re.is_match(path))
    }
}

#[derive(Debug)]
pub struct TransformPipeline {
    rules: Vec<CompiledRule>,
    root: PathBuf,
    mode: Mode,
    defines: DefineTable,
    public_path: String,
    minify_css: bool,
}

/// The value flowing through a rule's stages.
pub(crate) struct TransformUnit<'a> {
    pub path: &'a Path,
    /// Stable name relative to the project root.
    pub display: String,
    pub content: Vec<u8>,
    pub kind: ModuleKind,
    pub style: Option<StyleResource>,
    pub emitted: Vec<EmittedAsset>,
}

impl TransformUnit<'_> {
    fn text(&self, stage: StageName) -> Result<&str> {
        std::str::from_utf8(&self.content)
            .map_err(|e| BuildError::transform(self.path, stage, format!("not valid UTF-8: {e}")))
    }

    fn set_code(&mut self, code: String, kind: ModuleKind) {
        self.content = code.into_bytes();
        self.kind = kind;
    }
}

impl TransformPipeline {
    pub fn from_config(config: &WispConfig) -> Result<Self> {
        let rules = config
            .module
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                Ok(CompiledRule {
                    test: compile(&format!("module.rules[{index}].test"), &rule.test)?,
                    exclude: rule
                        .exclude
                        .as_deref()
                        .map(|pattern| compile(&format!("module.rules[{index}].exclude"), pattern))
                        .transpose()?,
                    stages: rule.stages.clone(),
                    options: rule.options.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            root: config.context.clone(),
            mode: config.mode,
            defines: DefineTable::new(&config.defines()),
            public_path: config.output.public_path.clone(),
            minify_css: config.optimization.minimize_enabled(config.mode),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether some rule claims `path`.
    pub fn has_rule_for(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        self.rules.iter().any(|rule| rule.matches(&normalized))
    }

    /// Run the matching rule's stages over `raw`.
    ///
    /// `importer` is the module that imported this file, or `None` for entry
    /// points. A file no rule matches passes through when it is plain
    /// JavaScript or an entry; importing anything else is an error.
    pub fn transform(
        &self,
        path: &Path,
        raw: &[u8],
        importer: Option<&Path>,
    ) -> Result<TransformOutput> {
        let normalized = normalize(path);
        let mut unit = TransformUnit {
            path,
            display: display_name(path, &self.root),
            content: raw.to_vec(),
            kind: ModuleKind::Script,
            style: None,
            emitted: Vec::new(),
        };

        match self.rules.iter().find(|rule| rule.matches(&normalized)) {
            Some(rule) => {
                for &stage in &rule.stages {
                    debug!(path = %unit.display, stage = stage.as_str(), "transform");
                    self.run_stage(stage, &mut unit, &rule.options)?;
                }
            }
            None => {
                let native = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| NATIVE_EXTENSIONS.contains(&ext));
                match importer {
                    Some(importer) if !native => {
                        return Err(BuildError::UnresolvedTransform {
                            path: path.to_path_buf(),
                            importer: importer.to_path_buf(),
                        });
                    }
                    _ => {
                        debug!(path = %unit.display, "no rule matched, passing through");
                        if std::str::from_utf8(&unit.content).is_err() {
                            return Err(BuildError::Transform {
                                path: path.to_path_buf(),
                                stage: "passthrough",
                                message: "not valid UTF-8".to_string(),
                            });
                        }
                    }
                }
            }
        }

        let code = String::from_utf8(unit.content).map_err(|_| BuildError::Transform {
            path: path.to_path_buf(),
            stage: "output",
            message: "stage chain did not produce text; end binary rules with `asset`".to_string(),
        })?;
        Ok(TransformOutput {
            kind: unit.kind,
            code,
            style: unit.style,
            emitted: unit.emitted,
        })
    }

    fn run_stage(
        &self,
        stage: StageName,
        unit: &mut TransformUnit<'_>,
        options: &StageOptions,
    ) -> Result<()> {
        match stage {
            StageName::Downlevel => {
                let code = downlevel::run(unit.text(stage)?, options.target, &self.defines);
                unit.set_code(code, ModuleKind::Script);
            }
            StageName::Style => {
                let (glue, style) =
                    style::run(unit.text(stage)?, &unit.display, self.minify_css)
                        .map_err(|message| BuildError::transform(unit.path, stage, message))?;
                unit.style = Some(style);
                unit.set_code(glue, ModuleKind::Style);
            }
            StageName::Asset => {
                let public_path = options.public_path.as_deref().unwrap_or(&self.public_path);
                let (code, emitted) = asset::run(unit.path, &unit.content, options, public_path);
                unit.emitted.extend(emitted);
                unit.set_code(code, ModuleKind::Asset);
            }
            StageName::Json => {
                let value: serde_json::Value = serde_json::from_str(unit.text(stage)?)
                    .map_err(|e| BuildError::transform(unit.path, stage, e))?;
                let code = format!("module.exports = {value};\n");
                unit.set_code(code, ModuleKind::Json);
            }
            StageName::Raw => {
                let literal = serde_json::Value::String(unit.text(stage)?.to_string());
                let code = format!("module.exports = {literal};\n");
                unit.set_code(code, ModuleKind::Raw);
            }
        }
        Ok(())
    }
}

fn compile(field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        BuildError::Config(ConfigError::InvalidPattern {
            field: field.to_string(),
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
    })
}

fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// `./src/app.css` for files under `root`, the full path otherwise.
pub(crate) fn display_name(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => format!("./{}", normalize(rel)),
        Err(_) => normalize(path),
    }
}
