use serde::{Deserialize, Serialize};

use crate::mode::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitChunks {
    /// One self-contained chunk per entry point.
    None,
    /// Hoist modules reached from two or more entries into shared chunks.
    #[default]
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OptimizationOptions {
    #[serde(default)]
    pub split_chunks: SplitChunks,

    /// Defaults to on in production, off in development.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimize: Option<bool>,

    /// Strip `console.*` calls. Defaults to on in production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_console: Option<bool>,
}

impl OptimizationOptions {
    pub fn minimize_enabled(&self, mode: Mode) -> bool {
        self.minimize.unwrap_or(mode.is_production())
    }

    pub fn drop_console_enabled(&self, mode: Mode) -> bool {
        self.drop_console.unwrap_or(mode.is_production())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_defaults_enable_minification() {
        let options = OptimizationOptions::default();
        assert!(options.minimize_enabled(Mode::Production));
        assert!(!options.minimize_enabled(Mode::Development));
        assert!(options.drop_console_enabled(Mode::Production));
    }

    #[test]
    fn explicit_flags_win_over_mode() {
        let options = OptimizationOptions {
            minimize: Some(true),
            drop_console: Some(false),
            ..Default::default()
        };
        assert!(options.minimize_enabled(Mode::Development));
        assert!(!options.drop_console_enabled(Mode::Production));
    }
}
