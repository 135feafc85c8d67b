//! Files copied verbatim into the output.

use std::io;
use std::path::Path;
use std::sync::Arc;

use walkdir::WalkDir;
use wisp_config::{CopyPattern, WispConfig};

use crate::error::{BuildError, Result};

/// Output-relative names and contents for one copy pattern.
///
/// A file lands at `to` when `to` has an extension, otherwise inside `to`.
/// A directory is copied recursively below `to`.
pub(super) fn collect(config: &WispConfig, pattern: &CopyPattern) -> Result<Vec<(String, Arc<[u8]>)>> {
    let from = config.resolve_path(&pattern.from);
    if !from.exists() {
        return Err(BuildError::io(
            from,
            io::Error::new(io::ErrorKind::NotFound, "copy source does not exist"),
        ));
    }

    if from.is_file() {
        let target = if pattern.to.extension().is_some() {
            pattern.to.clone()
        } else {
            let name = from.file_name().map(Path::new).unwrap_or(Path::new(""));
            pattern.to.join(name)
        };
        let content = std::fs::read(&from).map_err(|e| BuildError::io(&from, e))?;
        return Ok(vec![(output_name(&target), Arc::from(content))]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&from).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| from.clone());
            BuildError::io(path, io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(&from) else {
            continue;
        };
        let content = std::fs::read(entry.path()).map_err(|e| BuildError::io(entry.path(), e))?;
        files.push((output_name(&pattern.to.join(relative)), Arc::from(content)));
    }
    Ok(files)
}

fn output_name(path: &Path) -> String {
    let name = path.to_string_lossy().replace('\\', "/");
    name.trim_start_matches("./").trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn config(root: &Path) -> WispConfig {
        WispConfig::from_value(json!({
            "context": root,
            "entry": { "main": "./main.js" }
        }))
        .unwrap()
    }

    fn pattern(from: &str, to: &str) -> CopyPattern {
        CopyPattern {
            from: PathBuf::from(from),
            to: PathBuf::from(to),
        }
    }

    #[test]
    fn copies_directories_recursively_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("static/img")).unwrap();
        std::fs::write(dir.path().join("static/robots.txt"), "ok").unwrap();
        std::fs::write(dir.path().join("static/img/logo.svg"), "<svg/>").unwrap();

        let files = collect(&config(dir.path()), &pattern("static", "assets")).unwrap();
        let names: Vec<&str> = files.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["assets/img/logo.svg", "assets/robots.txt"]);
        assert_eq!(&*files[1].1, b"ok");
    }

    #[test]
    fn single_files_go_into_or_onto_the_target() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("favicon.ico"), [0u8, 1]).unwrap();
        let cfg = config(dir.path());

        let into = collect(&cfg, &pattern("favicon.ico", "")).unwrap();
        assert_eq!(into[0].0, "favicon.ico");
        let onto = collect(&cfg, &pattern("favicon.ico", "icons/site.ico")).unwrap();
        assert_eq!(onto[0].0, "icons/site.ico");
    }

    #[test]
    fn missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect(&config(dir.path()), &pattern("nope", "")).unwrap_err();
        assert!(matches!(err, BuildError::Io { ref source, .. } if source.kind() == io::ErrorKind::NotFound));
    }
}
