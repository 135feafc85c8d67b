//! Semantic checks run after a configuration has been extracted.
//!
//! Parsing guarantees types; these checks cover what serde cannot express:
//! patterns that must compile, URLs that must be absolute, names that must be
//! unique. The first failure is returned.

use std::collections::HashSet;

use regex::Regex;

use crate::config::WispConfig;
use crate::dev::{DevServerConfig, MockRoute};
use crate::error::{ConfigError, Result};

const HTTP_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS",
];

pub fn validate(config: &WispConfig) -> Result<()> {
    validate_entries(config)?;
    validate_output(config)?;
    validate_rules(config)?;
    validate_dev_server(&config.dev_server)?;
    Ok(())
}

fn validate_entries(config: &WispConfig) -> Result<()> {
    if config.entry.is_empty() {
        return Err(ConfigError::MissingField {
            field: "entry".to_string(),
            hint: "Declare at least one entry, e.g. entry = { main = \"./src/index.js\" }"
                .to_string(),
        });
    }

    for (name, path) in &config.entry {
        if name.trim().is_empty() {
            return Err(ConfigError::invalid(
                "entry",
                format!("\"{name}\""),
                "Entry names must not be empty",
            ));
        }
        if path.as_os_str().is_empty() {
            return Err(ConfigError::invalid(
                format!("entry.{name}"),
                "\"\"",
                "Entry paths must not be empty",
            ));
        }
    }
    Ok(())
}

fn validate_output(config: &WispConfig) -> Result<()> {
    let filename = &config.output.filename;
    if config.entry.len() > 1 && !filename.contains("[name]") {
        return Err(ConfigError::invalid(
            "output.filename",
            filename,
            "Several entries would write the same file; include [name] in the template",
        ));
    }
    if !config.output.public_path.ends_with('/') {
        return Err(ConfigError::invalid(
            "output.publicPath",
            &config.output.public_path,
            "Public paths must end with '/'",
        ));
    }
    if let Some(html) = &config.html {
        if html.filename.trim().is_empty() {
            return Err(ConfigError::invalid(
                "html.filename",
                "\"\"",
                "Name the generated document, e.g. index.html",
            ));
        }
    }
    Ok(())
}

fn validate_rules(config: &WispConfig) -> Result<()> {
    for (index, rule) in config.module.rules.iter().enumerate() {
        let field = format!("module.rules[{index}]");
        compile(&format!("{field}.test"), &rule.test)?;
        if let Some(exclude) = &rule.exclude {
            compile(&format!("{field}.exclude"), exclude)?;
        }
        if rule.stages.is_empty() {
            return Err(ConfigError::MissingField {
                field: format!("{field}.use"),
                hint: "List at least one stage: downlevel, style, asset, json or raw".to_string(),
            });
        }
        if !rule.options.name.contains("[name]") && !rule.options.name.contains("[hash]") {
            return Err(ConfigError::invalid(
                format!("{field}.options.name"),
                &rule.options.name,
                "Asset names need [name] or [hash] to stay unique",
            ));
        }
    }
    Ok(())
}

fn validate_dev_server(dev: &DevServerConfig) -> Result<()> {
    for (prefix, target) in &dev.proxy {
        if !prefix.starts_with('/') {
            return Err(ConfigError::invalid(
                "devServer.proxy",
                prefix,
                "Proxy prefixes are absolute paths such as /api",
            ));
        }
        let url = target.target();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::invalid(
                format!("devServer.proxy.{prefix}"),
                url,
                "Upstreams must be http:// or https:// URLs",
            ));
        }
    }

    let mut routes = HashSet::new();
    for mock in &dev.mocks {
        validate_mock(mock)?;
        if !routes.insert((mock.method.to_ascii_uppercase(), mock.path.clone())) {
            return Err(ConfigError::invalid(
                "devServer.mocks",
                format!("{} {}", mock.method, mock.path),
                "Each method and path pair may be mocked once",
            ));
        }
    }

    for dir in &dev.mock_dirs {
        if !dir.prefix.starts_with('/') {
            return Err(ConfigError::invalid(
                "devServer.mockDirs",
                &dir.prefix,
                "Mock prefixes are absolute paths such as /api",
            ));
        }
    }

    let mut names = HashSet::new();
    for middleware in &dev.middleware {
        if middleware.name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "devServer.middleware.name".to_string(),
                hint: "Every middleware entry needs a name".to_string(),
            });
        }
        if !names.insert(middleware.name.as_str()) {
            return Err(ConfigError::invalid(
                "devServer.middleware",
                &middleware.name,
                "Middleware names must be unique",
            ));
        }
        if let Some(path) = &middleware.path {
            if !path.starts_with('/') {
                return Err(ConfigError::invalid(
                    format!("devServer.middleware.{}.path", middleware.name),
                    path,
                    "Paths must start with '/'",
                ));
            }
        }
        check_status("devServer.middleware.status", middleware.status)?;
    }

    Ok(())
}

fn validate_mock(mock: &MockRoute) -> Result<()> {
    let method = mock.method.to_ascii_uppercase();
    if !HTTP_METHODS.contains(&method.as_str()) {
        return Err(ConfigError::invalid(
            "devServer.mocks.method",
            &mock.method,
            "Use a standard HTTP method such as GET or POST",
        ));
    }
    if !mock.path.starts_with('/') {
        return Err(ConfigError::invalid(
            "devServer.mocks.path",
            &mock.path,
            "Mock paths must start with '/'",
        ));
    }
    if mock.response_sources() != 1 {
        return Err(ConfigError::invalid(
            format!("devServer.mocks[{} {}]", mock.method, mock.path),
            format!("{} response sources", mock.response_sources()),
            "Set exactly one of json, body or file",
        ));
    }
    check_status("devServer.mocks.status", mock.status)
}

fn check_status(field: &str, status: u16) -> Result<()> {
    if (100..=599).contains(&status) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            status.to_string(),
            "HTTP status codes range from 100 to 599",
        ))
    }
}

fn compile(field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        field: field.to_string(),
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}
