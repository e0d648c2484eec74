//! Path and specifier normalization
//!
//! Pure string utilities shared by every resolver. All repository paths are
//! handled as POSIX-style relative strings so lookups, cache keys and sort
//! keys are identical across platforms.

use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

/// How a normalized specifier relates to the importer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// `./x`, `../x`, `.x` (Python-style dotted relative)
    Relative,
    /// `/x` or `//label`
    Rooted,
    /// Bare package or module name
    NonRelative,
}

impl SpecifierKind {
    pub fn classify(spec: &str) -> Self {
        if spec.starts_with('.') {
            Self::Relative
        } else if spec.starts_with('/') {
            Self::Rooted
        } else {
            Self::NonRelative
        }
    }

    /// Relative and rooted specifiers are resolved against the file set.
    pub fn is_path_based(self) -> bool {
        matches!(self, Self::Relative | Self::Rooted)
    }
}

/// Convert backslashes to forward slashes.
pub fn to_posix(value: &str) -> String {
    value.replace('\\', "/")
}

/// POSIX-normalize a path string.
///
/// Collapses `.` segments and resolves `..` where a preceding segment
/// exists. A leading `/` is preserved; leading `..` segments of a relative
/// path are kept so callers can detect root escapes. Trailing slashes and a
/// leading `./` are removed.
pub fn normalize_rel_path(value: &str) -> String {
    let posix = to_posix(value.trim());
    if posix.is_empty() {
        return String::new();
    }
    let rooted = posix.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in posix.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Join a relative spec onto a directory and normalize.
pub fn join_rel(dir: &str, spec: &str) -> String {
    if dir.is_empty() || dir == "." {
        normalize_rel_path(spec)
    } else {
        normalize_rel_path(&format!("{dir}/{spec}"))
    }
}

/// True when a normalized relative path climbs above the repository root.
pub fn escapes_root(rel: &str) -> bool {
    rel == ".." || rel.starts_with("../")
}

/// Parent directory of a relative path; `""` for top-level files.
pub fn parent_dir(rel: &str) -> &str {
    match rel.rfind('/') {
        Some(idx) => &rel[..idx],
        None => "",
    }
}

/// Final path segment.
pub fn base_name(rel: &str) -> &str {
    match rel.rfind('/') {
        Some(idx) => &rel[idx + 1..],
        None => rel,
    }
}

/// Extension of the final segment including the dot, like `path.extname`.
///
/// Dotfiles such as `.eslintrc` have no extension.
pub fn extension(rel: &str) -> &str {
    let name = base_name(rel);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &name[idx..],
    }
}

pub fn has_extension(rel: &str) -> bool {
    !extension(rel).is_empty()
}

/// Path without the extension of its final segment.
pub fn strip_extension(rel: &str) -> &str {
    let ext = extension(rel);
    &rel[..rel.len() - ext.len()]
}

/// Normalize a raw import specifier.
///
/// Trims whitespace and surrounding quotes, converts backslashes, and strips
/// `?query` and `#hash` suffixes. A leading `#` (Node subpath imports) is
/// kept.
pub fn normalize_import_specifier(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let mut spec = to_posix(trimmed);
    if let Some(idx) = spec.find('?') {
        spec.truncate(idx);
    }
    if let Some((idx, _)) = spec.char_indices().skip(1).find(|(_, c)| *c == '#') {
        spec.truncate(idx);
    }
    spec.trim().to_string()
}

/// Package name of a bare specifier: `@scope/name/sub` -> `@scope/name`.
pub fn parse_package_name(spec: &str) -> Option<String> {
    let spec = spec.trim();
    if spec.is_empty() || spec.starts_with('.') || spec.starts_with('/') {
        return None;
    }
    let spec = spec.strip_prefix("npm:").unwrap_or(spec);
    let mut parts = spec.split('/');
    let first = parts.next()?;
    if first.starts_with('@') {
        let second = parts.next()?;
        if second.is_empty() {
            return None;
        }
        Some(format!("{first}/{second}"))
    } else if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}

/// Relative path of `abs` under `root`, or `None` if it lies outside.
pub fn resolve_within_root(root: &Path, abs: &Path) -> Option<String> {
    let rel = abs.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Absolute path for a repository-relative path.
pub fn to_abs(root: &Path, rel: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in rel.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}

/// Byte-wise string ordering used for every deterministic sort.
pub fn sort_strings(a: &str, b: &str) -> Ordering {
    a.as_bytes().cmp(b.as_bytes())
}
