//! HTML document generation.

use minijinja::Environment;
use serde_json::{Map, Value};
use wisp_config::{HtmlOptions, Mode};

use crate::error::{BuildError, Result};

const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{ title }}</title>
</head>
<body>
<div id="app"></div>
</body>
</html>
"#;

const DEFAULT_TITLE: &str = "wisp app";

/// Render the document and inject `<script>` tags for `scripts`, then the
/// HMR client, right before the closing `</body>`.
pub fn render(
    options: &HtmlOptions,
    template: Option<&str>,
    mode: Mode,
    scripts: &[String],
    hmr_client: Option<&str>,
) -> Result<String> {
    let source = template.unwrap_or(DEFAULT_TEMPLATE);
    let mut context = Map::new();
    for (key, value) in &options.parameters {
        context.insert(key.clone(), value.clone());
    }
    context.insert("mode".to_string(), Value::String(mode.as_str().to_string()));
    context.insert(
        "title".to_string(),
        Value::String(options.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string())),
    );

    let env = Environment::new();
    let rendered = env
        .template_from_str(source)
        .and_then(|tmpl| tmpl.render(Value::Object(context)))
        .map_err(|e| BuildError::Template {
            file: options.filename.clone(),
            message: e.to_string(),
        })?;

    let mut tags: Vec<String> = scripts.iter().map(|src| script_tag(src)).collect();
    if let Some(client) = hmr_client {
        tags.push(script_tag(client));
    }
    Ok(inject(&rendered, &tags.join("\n")))
}

fn script_tag(src: &str) -> String {
    format!("<script src=\"{src}\"></script>")
}

fn inject(document: &str, tags: &str) -> String {
    if tags.is_empty() {
        return document.to_string();
    }
    match document.rfind("</body>") {
        Some(at) => format!("{}{}\n{}", &document[..at], tags, &document[at..]),
        None => format!("{document}\n{tags}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_document() {
        let out = render(
            &HtmlOptions::default(),
            None,
            Mode::Development,
            &["/main.js".to_string()],
            None,
        )
        .unwrap();
        insta::assert_snapshot!(out, @r#"
        <!DOCTYPE html>
        <html>
        <head>
        <meta charset="utf-8">
        <meta name="viewport" content="width=device-width, initial-scale=1">
        <title>wisp app</title>
        </head>
        <body>
        <div id="app"></div>
        <script src="/main.js"></script>
        </body>
        </html>
        "#);
    }

    #[test]
    fn template_sees_parameters_and_mode() {
        let mut options = HtmlOptions::default();
        options.parameters.insert("lang".to_string(), json!("en"));
        let template = "<html lang=\"{{ lang }}\"><body data-mode=\"{{ mode }}\"></body></html>";
        let out = render(
            &options,
            Some(template),
            Mode::Production,
            &[],
            Some("/__wisp/client.js"),
        )
        .unwrap();
        assert_eq!(
            out,
            "<html lang=\"en\"><body data-mode=\"production\"><script src=\"/__wisp/client.js\"></script>\n</body></html>"
        );
    }

    #[test]
    fn template_errors_name_the_file() {
        let err = render(&HtmlOptions::default(), Some("{% if %}"), Mode::Development, &[], None)
            .unwrap_err();
        assert!(matches!(err, BuildError::Template { ref file, .. } if file == "index.html"));
    }

    #[test]
    fn documents_without_body_get_tags_appended() {
        assert_eq!(inject("<p>hi</p>", "<script></script>"), "<p>hi</p>\n<script></script>\n");
    }
}
