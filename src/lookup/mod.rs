//! File lookup index
//!
//! Immutable per-run index over the repository's file set:
//! - exact membership
//! - case-insensitive fallback (smallest canonical path wins on collision)
//! - a path-prefix trie that prunes extension probing
//! - a directory index for listing package contents
//!
//! A lookup can be persisted as a [`LookupSnapshot`] and restored when the
//! root and file-set fingerprints still match.

mod trie;

pub use trie::PathTrie;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::fingerprint::{Sha256Hash, compute_sha256, fingerprint_parts};
use crate::paths::{
    escapes_root, has_extension, normalize_rel_path, parent_dir, resolve_within_root,
    sort_strings,
};

pub const LOOKUP_SCHEMA_VERSION: &str = "file-lookup-v1";

/// Extension priority for extensionless JS/TS-style candidates.
pub const DEFAULT_IMPORT_EXTS: &[&str] = &[
    ".ts", ".tsx", ".mts", ".cts", ".d.ts", ".js", ".jsx", ".mjs", ".cjs", ".json",
];

/// One indexed file handed to the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    pub abs: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
}

impl RepoEntry {
    pub fn new(abs: impl Into<PathBuf>) -> Self {
        Self {
            abs: abs.into(),
            rel: None,
        }
    }

    pub fn with_rel(abs: impl Into<PathBuf>, rel: impl Into<String>) -> Self {
        Self {
            abs: abs.into(),
            rel: Some(rel.into()),
        }
    }

    /// Normalized repository-relative path, if the entry lies under `root`.
    pub fn rel_path(&self, root: &Path) -> Option<String> {
        let rel = match &self.rel {
            Some(rel) => normalize_rel_path(rel),
            None => resolve_within_root(root, &self.abs)?,
        };
        if rel.is_empty() || rel.starts_with('/') || escapes_root(&rel) {
            None
        } else {
            Some(rel)
        }
    }
}

/// Collect the normalized file set of an entry list.
pub fn collect_file_set(root: &Path, entries: &[RepoEntry]) -> BTreeSet<String> {
    entries.iter().filter_map(|e| e.rel_path(root)).collect()
}

/// Fingerprint of a sorted file set.
pub fn file_set_fingerprint<'a>(files: impl IntoIterator<Item = &'a String>) -> Sha256Hash {
    fingerprint_parts(LOOKUP_SCHEMA_VERSION, files)
}

pub fn root_hash(root: &Path) -> Sha256Hash {
    compute_sha256(&root.to_string_lossy())
}

pub fn compatibility_fingerprint(root_hash: &Sha256Hash, file_set: &Sha256Hash) -> Sha256Hash {
    fingerprint_parts(LOOKUP_SCHEMA_VERSION, [root_hash.as_str(), file_set.as_str()])
}

/// Persistable form of a [`FileLookup`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupSnapshot {
    pub schema_version: String,
    pub root_hash: Sha256Hash,
    pub file_set_fingerprint: Sha256Hash,
    pub compatibility_fingerprint: Sha256Hash,
    pub files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FileLookup {
    root: PathBuf,
    files: BTreeSet<String>,
    lower_to_canonical: HashMap<String, String>,
    trie: PathTrie,
    dir_index: HashMap<String, Vec<String>>,
}

impl FileLookup {
    pub fn from_entries(root: &Path, entries: &[RepoEntry]) -> Self {
        Self::from_file_set(root, collect_file_set(root, entries))
    }

    pub fn from_paths<I, S>(root: &Path, rels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let files = rels
            .into_iter()
            .map(|rel| normalize_rel_path(rel.as_ref()))
            .filter(|rel| !rel.is_empty() && !rel.starts_with('/') && !escapes_root(rel))
            .collect();
        Self::from_file_set(root, files)
    }

    pub fn from_file_set(root: &Path, files: BTreeSet<String>) -> Self {
        let mut lower_to_canonical: HashMap<String, String> = HashMap::new();
        let mut trie = PathTrie::new();
        let mut dir_index: HashMap<String, Vec<String>> = HashMap::new();

        // BTreeSet iteration is sorted, so the first canonical path seen for a
        // lowercase key is the lexicographically smallest.
        for rel in &files {
            lower_to_canonical
                .entry(rel.to_lowercase())
                .or_insert_with(|| rel.clone());
            trie.insert(rel);
            dir_index
                .entry(parent_dir(rel).to_string())
                .or_default()
                .push(rel.clone());
        }

        Self {
            root: root.to_path_buf(),
            files,
            lower_to_canonical,
            trie,
            dir_index,
        }
    }

    /// Restore a lookup from a snapshot when it matches the current run.
    pub fn from_snapshot(root: &Path, snapshot: &LookupSnapshot, expected: &Sha256Hash) -> Option<Self> {
        if snapshot.schema_version != LOOKUP_SCHEMA_VERSION
            || &snapshot.compatibility_fingerprint != expected
            || snapshot.root_hash != root_hash(root)
        {
            return None;
        }
        Some(Self::from_file_set(
            root,
            snapshot.files.iter().cloned().collect(),
        ))
    }

    pub fn snapshot(&self, file_set_fingerprint: &Sha256Hash) -> LookupSnapshot {
        let root_hash = root_hash(&self.root);
        LookupSnapshot {
            schema_version: LOOKUP_SCHEMA_VERSION.to_string(),
            compatibility_fingerprint: compatibility_fingerprint(&root_hash, file_set_fingerprint),
            root_hash,
            file_set_fingerprint: file_set_fingerprint.clone(),
            files: self.files.iter().cloned().collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &BTreeSet<String> {
        &self.files
    }

    pub fn contains(&self, rel: &str) -> bool {
        self.files.contains(rel)
    }

    /// Exact or case-insensitive match, no extension probing.
    pub fn resolve_exact(&self, rel: &str) -> Option<String> {
        if self.files.contains(rel) {
            return Some(rel.to_string());
        }
        self.lower_to_canonical.get(&rel.to_lowercase()).cloned()
    }

    /// Resolve a relative candidate path against the file set.
    ///
    /// Paths with an extension must match exactly (or case-insensitively).
    /// Extensionless bases probe `base+ext` then `base/index+ext` in
    /// [`DEFAULT_IMPORT_EXTS`] order, after the trie confirms some indexed
    /// path starts with the base.
    pub fn resolve_candidate(&self, rel: &str) -> Option<String> {
        let rel = normalize_rel_path(rel);
        if rel.is_empty() || rel.starts_with('/') || escapes_root(&rel) {
            return None;
        }
        if has_extension(&rel) {
            return self.resolve_exact(&rel);
        }
        if !self.trie.has_prefix(&rel) {
            return None;
        }
        if let Some(hit) = self.resolve_exact(&rel) {
            return Some(hit);
        }
        DEFAULT_IMPORT_EXTS
            .iter()
            .map(|ext| format!("{rel}{ext}"))
            .chain(DEFAULT_IMPORT_EXTS.iter().map(|ext| format!("{rel}/index{ext}")))
            .find_map(|candidate| self.resolve_exact(&candidate))
    }

    /// Resolve the first indexed candidate of a list, skipping duplicates and
    /// rooted or escaping paths.
    pub fn resolve_first<I, S>(&self, candidates: I) -> Option<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = BTreeSet::new();
        for candidate in candidates {
            let rel = normalize_rel_path(candidate.as_ref());
            if rel.is_empty() || rel.starts_with('/') || escapes_root(&rel) {
                continue;
            }
            if !seen.insert(rel.clone()) {
                continue;
            }
            if let Some(hit) = self.resolve_exact(&rel) {
                return Some(hit);
            }
        }
        None
    }

    /// Files directly inside `dir`, optionally filtered by extension, sorted.
    ///
    /// For `.go` the `_test.go` files sort after regular sources.
    pub fn list_files_in_dir(&self, dir: &str, ext: Option<&str>) -> Vec<String> {
        let dir = normalize_rel_path(dir);
        let Some(files) = self.dir_index.get(&dir) else {
            return Vec::new();
        };
        let mut out: Vec<String> = files
            .iter()
            .filter(|rel| ext.is_none_or(|ext| rel.ends_with(ext)))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.ends_with("_test.go")
                .cmp(&b.ends_with("_test.go"))
                .then_with(|| sort_strings(a, b))
        });
        out
    }

    pub fn has_prefix(&self, rel: &str) -> bool {
        self.trie.has_prefix(rel)
    }
}
