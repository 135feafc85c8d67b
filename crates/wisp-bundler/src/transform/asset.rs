//! The `asset` stage.
//!
//! Content strictly smaller than the rule's `limit` is inlined as a base64
//! `data:` URI. Anything larger is emitted as its own output file named from
//! the rule's template, and the module exports the file's public URL.

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use wisp_config::StageOptions;
use wisp_graph::EmittedAsset;

pub(crate) fn run(
    path: &Path,
    content: &[u8],
    options: &StageOptions,
    public_path: &str,
) -> (String, Vec<EmittedAsset>) {
    if (content.len() as u64) < options.limit {
        let uri = format!("data:{};base64,{}", mime_type(path), STANDARD.encode(content));
        return (export(&uri), Vec::new());
    }

    let name = file_name(path, content, &options.name);
    // Query strings and fragments belong to the URL, not the file on disk.
    let disk_name = name
        .split(['?', '#'])
        .next()
        .unwrap_or(name.as_str())
        .to_string();
    let url = format!("{public_path}{name}");
    (
        export(&url),
        vec![EmittedAsset {
            file_name: disk_name,
            content: Arc::from(content),
        }],
    )
}

fn export(value: &str) -> String {
    format!(
        "module.exports = {};\n",
        serde_json::Value::String(value.to_string())
    )
}

/// Hex-encoded SHA-256 of the content, first 8 characters.
pub(crate) fn hash_content(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let hex = format!("{:x}", hasher.finalize());
    hex[..8].to_string()
}

fn file_name(path: &Path, content: &[u8], template: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "asset".to_string());
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut name = template.replace("[name]", &stem).replace("[ext]", &ext);
    if name.contains("[hash]") {
        name = name.replace("[hash]", &hash_content(content));
    }
    // A template like `[name].[ext]` on an extension-less file.
    name.trim_end_matches('.').to_string()
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "avif" => "image/avif",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "txt" => "text/plain",
        "json" => "application/json",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(limit: u64, name: &str) -> StageOptions {
        StageOptions {
            limit,
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn small_files_are_inlined() {
        let (code, emitted) = run(Path::new("/app/logo.png"), b"abc", &options(10, "[name].[ext]"), "/");
        assert_eq!(code, "module.exports = \"data:image/png;base64,YWJj\";\n");
        assert!(emitted.is_empty());
    }

    #[test]
    fn files_at_the_limit_are_emitted() {
        let content = vec![7u8; 10];
        let (code, emitted) = run(
            Path::new("/app/img/photo.JPG"),
            &content,
            &options(10, "img/[name]-[hash].[ext]"),
            "/static/",
        );
        let hash = hash_content(&content);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].file_name, format!("img/photo-{hash}.JPG"));
        assert_eq!(code, format!("module.exports = \"/static/img/photo-{hash}.JPG\";\n"));
    }

    #[test]
    fn query_suffix_stays_in_the_url_only() {
        let (code, emitted) = run(
            Path::new("/app/font.woff2"),
            b"0123456789",
            &options(1, "[name].[ext]?[hash]"),
            "/",
        );
        assert_eq!(emitted[0].file_name, "font.woff2");
        assert!(code.starts_with("module.exports = \"/font.woff2?"));
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(hash_content(b"hello"), "2cf24dba");
    }
}
