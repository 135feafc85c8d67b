//! The `style` stage.
//!
//! A stylesheet becomes a script that registers it with the runtime's style
//! registry, plus a [`StyleResource`] the dev server can push on its own when
//! only CSS changed. Stylesheet modules accept their own updates. The
//! stylesheet is always parsed so syntax errors surface at build time; it is
//! minified only when minimization is on.

use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use wisp_graph::StyleResource;

pub(crate) fn run(source: &str, id: &str, minify: bool) -> Result<(String, StyleResource), String> {
    let css = process_css(source, id, minify)?;
    let glue = format!(
        "require.style({}, {});\nmodule.exports = {{}};\nif (module.hot) module.hot.accept();\n",
        json_string(id),
        json_string(&css)
    );
    Ok((
        glue,
        StyleResource {
            id: id.to_string(),
            css,
        },
    ))
}

fn process_css(source: &str, filename: &str, minify: bool) -> Result<String, String> {
    let mut stylesheet = StyleSheet::parse(
        source,
        ParserOptions {
            filename: filename.to_string(),
            ..Default::default()
        },
    )
    .map_err(|e| format!("failed to parse CSS: {e}"))?;

    if !minify {
        return Ok(source.to_string());
    }

    stylesheet
        .minify(MinifyOptions::default())
        .map_err(|e| format!("failed to minify CSS: {e}"))?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| format!("failed to print CSS: {e}"))?;
    Ok(result.code)
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
