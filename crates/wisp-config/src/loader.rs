//! Layered configuration loading.
//!
//! Priority, lowest first: built-in defaults (mode from `NODE_ENV`), the
//! config file, `WISP_*` environment variables, command-line overrides. The
//! active mode's profile is merged between the environment and the
//! command-line layers.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized, Toml},
};
use serde::Serialize;

use crate::config::WispConfig;
use crate::discovery::{ConfigDiscovery, ConfigSource};
use crate::error::{ConfigError, Result};
use crate::mode::Mode;
use crate::validation::validate;

/// Values supplied on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputOverrides>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_server: Option<DevServerOverrides>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevServerOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hot: Option<bool>,
}

impl ConfigOverrides {
    pub fn with_mode(mut self, mode: Option<Mode>) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_out_dir(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.output = Some(OutputOverrides { path });
        }
        self
    }

    pub fn with_dev_server(
        mut self,
        host: Option<String>,
        port: Option<u16>,
        hot: Option<bool>,
    ) -> Self {
        if host.is_some() || port.is_some() || hot.is_some() {
            self.dev_server = Some(DevServerOverrides { host, port, hot });
        }
        self
    }
}

pub struct ConfigLoader {
    root: PathBuf,
    config_file: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config_file: None,
        }
    }

    /// Use this file instead of searching the root.
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Resolve, profile-merge and validate the configuration.
    pub fn load(&self, overrides: &ConfigOverrides) -> Result<WispConfig> {
        let defaults = WispConfig {
            mode: Mode::from_env(),
            ..WispConfig::default()
        };
        let mut figment = Figment::from(Serialized::defaults(defaults));

        let source = match &self.config_file {
            Some(path) => Some(ConfigSource::from_path(&self.root.join(path))?),
            None => ConfigDiscovery::new(&self.root).find()?,
        };
        if let Some(source) = &source {
            tracing::debug!(path = %source.path().display(), "loading config");
            figment = match source {
                ConfigSource::Toml(path) => figment.merge(Toml::file(path)),
                ConfigSource::Json(path) => figment.merge(Json::file(path)),
                ConfigSource::PackageJson { value, .. } => {
                    figment.merge(Serialized::defaults(value.clone()))
                }
            };
        }

        figment = figment.merge(
            Env::prefixed("WISP_").filter_map(|key| env_key(key.as_str()).map(Into::into)),
        );

        let base: WispConfig = figment.extract().map_err(extract_error)?;
        let mode = overrides.mode.unwrap_or(base.mode);

        if let Some(profile) = base.profiles.get(mode.as_str()).filter(|p| !p.is_null()) {
            tracing::debug!(profile = %mode, "applying profile");
            figment = figment.merge(Serialized::defaults(profile.clone()));
        }
        figment = figment.merge(Serialized::defaults(overrides));

        let mut config: WispConfig = figment.extract().map_err(extract_error)?;
        config.mode = mode;
        config.context = if config.context == Path::new(".") {
            self.root.clone()
        } else {
            self.root.join(&config.context)
        };

        validate(&config)?;
        Ok(config)
    }
}

/// Environment variables understood without the nested `__` syntax.
fn env_key(key: &str) -> Option<&'static str> {
    match key.to_ascii_lowercase().as_str() {
        "mode" => Some("mode"),
        "out_dir" => Some("output.path"),
        "public_path" => Some("output.publicPath"),
        "host" => Some("devServer.host"),
        "port" => Some("devServer.port"),
        "hot" => Some("devServer.hot"),
        _ => None,
    }
}

fn extract_error(err: figment::Error) -> ConfigError {
    let field = if err.path.is_empty() {
        "configuration".to_string()
    } else {
        err.path.join(".")
    };
    ConfigError::InvalidValue {
        field,
        value: err.kind.to_string(),
        hint: "Check the config file syntax and field types".to_string(),
    }
}
