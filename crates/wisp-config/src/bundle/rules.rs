//! Transform rule declarations.
//!
//! Rules are matched against a module's path in declaration order; the first
//! match decides which stages run. Patterns are kept as strings here and
//! compiled by the bundler, after [`crate::validation`] has checked them.

use serde::{Deserialize, Serialize};

use crate::defaults::{default_asset_name, default_inline_limit, default_rules};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModuleOptions {
    #[serde(default = "default_rules")]
    pub rules: Vec<TransformRule>,
}

impl Default for ModuleOptions {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransformRule {
    /// Regular expression matched against the module path.
    pub test: String,

    /// Paths matching this expression skip the rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,

    /// Stages applied in order, each receiving the previous stage's output.
    #[serde(rename = "use")]
    pub stages: Vec<StageName>,

    #[serde(default)]
    pub options: StageOptions,
}

impl TransformRule {
    pub fn new(test: impl Into<String>, stages: impl IntoIterator<Item = StageName>) -> Self {
        Self {
            test: test.into(),
            exclude: None,
            stages: stages.into_iter().collect(),
            options: StageOptions::default(),
        }
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude = Some(pattern.into());
        self
    }

    pub fn with_options(mut self, options: StageOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    /// Module syntax to registry form, constant replacement, optional es5 lowering.
    Downlevel,
    /// Stylesheet to injectable glue plus a style resource.
    Style,
    /// Binary content to a data URI or an emitted file.
    Asset,
    /// JSON document to an exported value.
    Json,
    /// Text exported verbatim as a string.
    Raw,
}

impl StageName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Downlevel => "downlevel",
            Self::Style => "style",
            Self::Asset => "asset",
            Self::Json => "json",
            Self::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EsTarget {
    Es5,
    #[default]
    Es2015,
}

/// Options shared by every stage of a rule. Each stage reads the fields it
/// understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StageOptions {
    #[serde(default)]
    pub target: EsTarget,

    /// Assets strictly smaller than this many bytes are inlined.
    #[serde(default = "default_inline_limit")]
    pub limit: u64,

    /// Emitted asset name template: `[name]`, `[ext]`, `[hash]`.
    #[serde(default = "default_asset_name")]
    pub name: String,

    /// Overrides `output.publicPath` for emitted assets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_path: Option<String>,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            target: EsTarget::default(),
            limit: default_inline_limit(),
            name: default_asset_name(),
            public_path: None,
        }
    }
}
