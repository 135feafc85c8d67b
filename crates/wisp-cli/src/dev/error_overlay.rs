//! Error page served in place of the application while the last build is
//! broken. It listens on the HMR channel and reloads once a build succeeds.

use minijinja::{Environment, context};

use crate::dev::INTERNAL_PREFIX;

const TEMPLATE_NAME: &str = "overlay.html";

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Build failed</title>
<style>
  body { margin: 0; background: #181818; color: #e8e8e8; font: 14px/1.5 ui-monospace, Menlo, Consolas, monospace; }
  main { max-width: 960px; margin: 0 auto; padding: 32px; }
  h1 { color: #ff5555; font-size: 18px; }
  pre { background: #242424; border-left: 4px solid #ff5555; padding: 16px; overflow-x: auto; white-space: pre-wrap; }
  footer { color: #888; }
</style>
</head>
<body>
<main>
<h1>Build failed with {{ errors|length }} error{{ "s" if errors|length != 1 }}</h1>
{% for error in errors %}<pre>{{ error }}</pre>
{% endfor %}
<footer>Fix the error and save; this page reloads when the build succeeds.</footer>
</main>
<script>
  (function () {
    var source = new EventSource("{{ channel|safe }}");
    source.onmessage = function (message) {
      var event = JSON.parse(message.data);
      if (event.type === "update" || event.type === "fullReload") location.reload();
    };
  })();
</script>
</body>
</html>
"#;

/// Render the overlay listing `errors`. Messages are HTML-escaped.
pub fn render(errors: &[String]) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template(TEMPLATE_NAME, TEMPLATE)?;
    env.get_template(TEMPLATE_NAME)?.render(context! {
        errors => errors,
        channel => format!("{INTERNAL_PREFIX}/hmr"),
    })
}
