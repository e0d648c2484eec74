//! package.json entry-point resolution for directory imports

use serde_json::Value;
use std::collections::HashMap;

use crate::fs_meta::FsMemo;
use crate::lookup::FileLookup;
use crate::paths::{join_rel, normalize_rel_path, sort_strings, to_abs};

pub const PACKAGE_MANIFEST: &str = "package.json";

/// Condition priority inside conditional `exports` objects
pub const EXPORT_CONDITIONS: &[&str] = &["import", "require", "default", "node", "module", "browser"];
const ENTRY_FIELDS: &[&str] = &["main", "module", "source"];
const DEV_ENTRY_BASES: &[&str] = &["src/index", "src/main", "lib/index", "source/index"];

fn push_export_targets(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(target) => out.push(target.clone()),
        Value::Array(items) => {
            for item in items {
                push_export_targets(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(root) = map.get(".") {
                push_export_targets(root, out);
                return;
            }
            if map.keys().any(|k| k.starts_with('.')) {
                return;
            }
            let mut matched = false;
            for condition in EXPORT_CONDITIONS {
                if let Some(target) = map.get(*condition) {
                    push_export_targets(target, out);
                    matched = true;
                }
            }
            if matched {
                return;
            }
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| sort_strings(a, b));
            for key in keys {
                push_export_targets(&map[key], out);
            }
        }
        _ => {}
    }
}

/// Ordered entry candidates declared by a manifest: `exports` targets, then
/// `main`, `module`, `source`.
pub fn manifest_entry_candidates(manifest: &Value) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(exports) = manifest.get("exports") {
        push_export_targets(exports, &mut out);
    }
    for field in ENTRY_FIELDS {
        if let Some(Value::String(entry)) = manifest.get(*field) {
            out.push(entry.clone());
        }
    }
    let mut seen = Vec::with_capacity(out.len());
    out.retain(|entry| {
        let keep = !entry.trim().is_empty() && !seen.contains(entry);
        if keep {
            seen.push(entry.clone());
        }
        keep
    });
    out
}

/// Directory-import resolver with a per-directory cache
#[derive(Debug, Default)]
pub struct PackageEntryResolver {
    cache: HashMap<String, Option<String>>,
}

impl PackageEntryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry file of the package rooted at `dir_rel`, if it has a manifest.
    ///
    /// Manifest entries win; otherwise the conventional development entry
    /// points are tried. Unparseable manifests count as absent.
    pub fn resolve_dir(&mut self, dir_rel: &str, lookup: &FileLookup, fs: &FsMemo) -> Option<String> {
        let dir = normalize_rel_path(dir_rel);
        if dir.starts_with('/') || dir.starts_with("..") {
            return None;
        }
        if let Some(cached) = self.cache.get(&dir) {
            return cached.clone();
        }
        let resolved = Self::resolve_uncached(&dir, lookup, fs);
        self.cache.insert(dir, resolved.clone());
        resolved
    }

    fn resolve_uncached(dir: &str, lookup: &FileLookup, fs: &FsMemo) -> Option<String> {
        let manifest_rel = join_rel(dir, PACKAGE_MANIFEST);
        let manifest_abs = to_abs(lookup.root(), &manifest_rel);
        if !lookup.contains(&manifest_rel) && !fs.is_file(&manifest_abs) {
            return None;
        }
        let manifest = match fs
            .read_to_string(&manifest_abs)
            .map(|content| serde_json::from_str::<Value>(&content))
        {
            Some(Ok(value)) => Some(value),
            Some(Err(err)) => {
                tracing::debug!("[imports] ignoring malformed {manifest_rel}: {err}");
                None
            }
            None => None,
        };

        if let Some(manifest) = &manifest {
            for entry in manifest_entry_candidates(manifest) {
                let candidate = join_rel(dir, &entry);
                if candidate.starts_with("..") {
                    continue;
                }
                if let Some(hit) = lookup.resolve_candidate(&candidate) {
                    return Some(hit);
                }
            }
        }
        DEV_ENTRY_BASES
            .iter()
            .find_map(|base| lookup.resolve_candidate(&join_rel(dir, base)))
    }
}
