use importgraph::{RepoEntry, ResolveOutcome, ResolveRequest, Settings, resolve_import_links};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Fixed clock so graphs compare byte for byte.
pub const NOW_MS: i64 = 1_700_000_000_000;

pub struct TestRepo {
    pub dir: TempDir,
    files: Vec<String>,
}

impl TestRepo {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
            files: Vec::new(),
        }
    }

    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let mut repo = Self::new();
        for (rel, content) in files {
            repo.add_file(rel, content);
        }
        repo
    }

    pub fn add_file(&mut self, rel: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&path, content).expect("Failed to write file");
        if !self.files.iter().any(|f| f == rel) {
            self.files.push(rel.to_string());
        }
        path
    }

    /// Writes a file on disk without adding it to the indexed file set.
    pub fn write_unindexed(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&path, content).expect("Failed to write file");
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn entries(&self) -> Vec<RepoEntry> {
        self.files
            .iter()
            .map(|rel| RepoEntry::with_rel(self.dir.path().join(rel), rel.as_str()))
            .collect()
    }

    /// Single pass with a fixed clock and no persisted cache.
    pub fn resolve(&self, imports: &BTreeMap<String, Vec<String>>, settings: &Settings) -> ResolveOutcome {
        let entries = self.entries();
        resolve_import_links(ResolveRequest::new(self.root(), &entries, imports, settings).at(NOW_MS))
    }
}

pub fn imports(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    pairs
        .iter()
        .map(|(importer, specs)| {
            (
                importer.to_string(),
                specs.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect()
}
