//! Writing build artifacts to disk.
//!
//! Every output name is checked to stay inside the output directory. Files
//! are first written next to their target with a `.tmp` suffix and renamed
//! once all writes succeeded; on failure the temporary files are removed.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use tracing::{debug, warn};

use super::BuildArtifacts;
use crate::error::{BuildError, Result};

/// Write `artifacts` below `dir`, emptying it first when `clean` is set.
pub fn write_artifacts(artifacts: &BuildArtifacts, dir: &Path, clean: bool) -> Result<Vec<PathBuf>> {
    let dir = dir.clean();
    if clean && dir.exists() {
        fs::remove_dir_all(&dir).map_err(|e| BuildError::io(&dir, e))?;
        debug!(dir = %dir.display(), "cleaned output directory");
    }
    fs::create_dir_all(&dir).map_err(|e| BuildError::io(&dir, e))?;

    let mut operations = Vec::with_capacity(artifacts.len());
    for (name, content) in artifacts.files() {
        operations.push((validate_output_path(&dir, name)?, content.as_ref()));
    }
    write_files_atomic(&operations)?;
    Ok(operations.into_iter().map(|(path, _)| path).collect())
}

/// Join `file` onto `base_dir`, refusing names that escape it.
fn validate_output_path(base_dir: &Path, file: &str) -> Result<PathBuf> {
    let invalid = || BuildError::InvalidOutputPath {
        file: file.to_string(),
        dir: base_dir.to_path_buf(),
    };
    if file.contains('\0') || Path::new(file).is_absolute() {
        return Err(invalid());
    }
    let full_path = base_dir.join(Path::new(file).clean()).clean();
    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(invalid());
    }
    Ok(full_path)
}

fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_files_atomic(operations: &[(PathBuf, &[u8])]) -> Result<()> {
    let mut written: Vec<(PathBuf, &Path)> = Vec::with_capacity(operations.len());

    for (target, content) in operations {
        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                cleanup_temp_files(&written);
                return Err(BuildError::io(parent, e));
            }
        }
        let temp = temp_path(target);
        if let Err(e) = fs::write(&temp, content) {
            cleanup_temp_files(&written);
            return Err(BuildError::io(&temp, e));
        }
        written.push((temp, target.as_path()));
    }

    for (temp, target) in &written {
        if let Err(e) = fs::rename(temp, target) {
            cleanup_temp_files(&written);
            return Err(BuildError::io(*target, e));
        }
    }
    Ok(())
}

fn cleanup_temp_files(written: &[(PathBuf, &Path)]) {
    for (temp, _) in written {
        if temp.exists() {
            if let Err(e) = fs::remove_file(temp) {
                warn!(path = %temp.display(), error = %e, "failed to remove temporary file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_and_dotted_names_stay_inside() {
        let base = Path::new("/tmp/out");
        assert_eq!(
            validate_output_path(base, "./assets/a.png").unwrap(),
            Path::new("/tmp/out/assets/a.png")
        );
        assert!(validate_output_path(base, "../etc/passwd").is_err());
        assert!(validate_output_path(base, "safe/../../../x").is_err());
        assert!(validate_output_path(base, "/etc/passwd").is_err());
        assert!(validate_output_path(base, "a\0b").is_err());
        assert!(validate_output_path(base, ".").is_err());
    }

    #[test]
    fn writes_files_and_cleans_stale_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dist");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("old.js"), "stale").unwrap();

        let mut artifacts = BuildArtifacts::default();
        artifacts.insert("main.js".to_string(), b"main".to_vec());
        artifacts.insert("img/logo.png".to_string(), b"png".to_vec());

        let written = write_artifacts(&artifacts, &out, true).unwrap();
        assert_eq!(written, [out.join("main.js"), out.join("img/logo.png")]);
        assert_eq!(fs::read(out.join("img/logo.png")).unwrap(), b"png");
        assert!(!out.join("old.js").exists());
        assert!(!out.join("main.js.tmp").exists());
    }

    #[test]
    fn keeps_existing_files_without_clean() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), "x").unwrap();
        write_artifacts(&BuildArtifacts::default(), dir.path(), false).unwrap();
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn temp_names_keep_the_extension() {
        assert_eq!(temp_path(Path::new("/o/a.js")), Path::new("/o/a.js.tmp"));
        assert_ne!(temp_path(Path::new("/o/a.js")), temp_path(Path::new("/o/a.css")));
    }
}
