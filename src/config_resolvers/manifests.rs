//! Root manifests: Go module path, Dart package name, package fingerprint

use std::path::Path;

use crate::fingerprint::{Sha256Hash, compute_sha256};
use crate::fs_meta::FsMemo;

pub const GO_MOD: &str = "go.mod";
pub const PUBSPEC: &str = "pubspec.yaml";
pub const ROOT_PACKAGE_MANIFEST: &str = "package.json";

fn strip_line_comment<'a>(line: &'a str, marker: &str) -> &'a str {
    match line.find(marker) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// `module` directive of a go.mod file.
pub fn parse_go_module(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let line = strip_line_comment(line, "//").trim();
        let rest = line.strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let module = rest.trim().trim_matches('"').trim_matches('`');
        (!module.is_empty()).then(|| module.to_string())
    })
}

/// Top-level `name:` of a pubspec.yaml file.
pub fn parse_pubspec_name(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        if line.starts_with(char::is_whitespace) {
            return None;
        }
        let value = strip_line_comment(line, "#").strip_prefix("name:")?.trim();
        let value = value.trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

pub fn go_module_path(root: &Path, fs: &FsMemo) -> Option<String> {
    fs.read_to_string(&root.join(GO_MOD))
        .as_deref()
        .and_then(parse_go_module)
}

pub fn dart_package_name(root: &Path, fs: &FsMemo) -> Option<String> {
    fs.read_to_string(&root.join(PUBSPEC))
        .as_deref()
        .and_then(parse_pubspec_name)
}

/// Content hash of the root package.json; `None` when there is none.
///
/// A change here invalidates the whole persisted resolution cache.
pub fn package_fingerprint(root: &Path, fs: &FsMemo) -> Option<Sha256Hash> {
    fs.read_to_string(&root.join(ROOT_PACKAGE_MANIFEST))
        .map(|content| compute_sha256(&content))
}
