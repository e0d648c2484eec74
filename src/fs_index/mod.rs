//! Filesystem existence accelerator
//!
//! A Bloom filter plus exact verification map over every file under the
//! repository root, including files the indexer never sees. It answers
//! "does this path exist" without touching the disk.
//!
//! Negative answers are only trusted when the scan completed. A truncated or
//! partially failed scan turns misses into [`FsExistence::Unknown`], and so
//! does a Bloom hit when exact verification is disabled.

pub mod bloom;

use ignore::{WalkBuilder, WalkState};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::config::FsIndexConfig;
use crate::paths::{resolve_within_root, sort_strings};
use bloom::{BloomFilter, fnv1a32};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FsExistence {
    Present,
    Absent,
    Unknown,
}

/// Build-time summary of an existence index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FsIndexSummary {
    pub complete: bool,
    pub truncated: bool,
    pub indexed_count: usize,
    pub bloom_bits: usize,
    pub scan_errors: usize,
}

#[derive(Debug, Clone)]
pub struct FsExistsIndex {
    bloom: BloomFilter,
    exact: HashMap<u32, Vec<String>>,
    exact_verification: bool,
    summary: FsIndexSummary,
}

impl FsExistsIndex {
    /// Scan `root` with a bounded pool of directory workers.
    pub fn build(root: &Path, config: &FsIndexConfig) -> Self {
        let max_files = config.max_scan_files;
        let seen = AtomicUsize::new(0);
        let truncated = AtomicBool::new(false);
        let errors = AtomicUsize::new(0);
        let found = Mutex::new(Vec::new());
        let skip_dirs = config.skip_dirs.clone();

        WalkBuilder::new(root)
            .standard_filters(false)
            .hidden(false)
            .follow_links(false)
            .threads(config.concurrency.max(1))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                if !is_dir || entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                !skip_dirs.iter().any(|skip| skip.as_str() == name)
            })
            .build_parallel()
            .run(|| {
                Box::new(|result| {
                    let entry = match result {
                        Ok(entry) => entry,
                        Err(_) => {
                            errors.fetch_add(1, Ordering::Relaxed);
                            return WalkState::Continue;
                        }
                    };
                    if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                        return WalkState::Continue;
                    }
                    if seen.fetch_add(1, Ordering::Relaxed) >= max_files {
                        truncated.store(true, Ordering::Relaxed);
                        return WalkState::Quit;
                    }
                    if let Some(rel) = resolve_within_root(root, entry.path()) {
                        found.lock().push(rel);
                    }
                    WalkState::Continue
                })
            });

        let mut paths = found.into_inner();
        paths.sort_by(|a, b| sort_strings(a, b));
        let truncated = truncated.load(Ordering::Relaxed);
        let scan_errors = errors.load(Ordering::Relaxed);
        if truncated {
            tracing::debug!(
                "[imports] fs existence scan truncated at {max_files} files under {}",
                root.display()
            );
        }
        Self::from_paths(paths, !truncated && scan_errors == 0, config.exact_verification)
            .with_scan_state(truncated, scan_errors)
    }

    /// Build an index from already-known relative paths.
    pub fn from_paths<I, S>(paths: I, complete: bool, exact_verification: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths: Vec<String> = paths.into_iter().map(|p| p.as_ref().to_string()).collect();
        let mut bloom = BloomFilter::with_expected(paths.len());
        let mut exact: HashMap<u32, Vec<String>> = HashMap::with_capacity(paths.len());
        for rel in &paths {
            bloom.insert(rel);
            let bucket = exact.entry(fnv1a32(rel)).or_default();
            if !bucket.contains(rel) {
                bucket.push(rel.clone());
            }
        }
        let indexed_count = exact.values().map(Vec::len).sum();
        Self {
            summary: FsIndexSummary {
                complete,
                truncated: false,
                indexed_count,
                bloom_bits: bloom.bit_count(),
                scan_errors: 0,
            },
            bloom,
            exact,
            exact_verification,
        }
    }

    fn with_scan_state(mut self, truncated: bool, scan_errors: usize) -> Self {
        self.summary.truncated = truncated;
        self.summary.scan_errors = scan_errors;
        self
    }

    pub fn summary(&self) -> &FsIndexSummary {
        &self.summary
    }

    pub fn is_complete(&self) -> bool {
        self.summary.complete
    }

    pub fn lookup(&self, rel: &str) -> FsExistence {
        let miss = if self.summary.complete {
            FsExistence::Absent
        } else {
            FsExistence::Unknown
        };
        if !self.bloom.might_contain(rel) {
            return miss;
        }
        if !self.exact_verification {
            return FsExistence::Unknown;
        }
        let verified = self
            .exact
            .get(&fnv1a32(rel))
            .is_some_and(|bucket| bucket.iter().any(|p| p == rel));
        if verified { FsExistence::Present } else { miss }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config() -> FsIndexConfig {
        FsIndexConfig::default()
    }

    #[test]
    fn scan_finds_unindexed_files_and_skips_vendor_dirs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src/generated")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("src/a.ts"), "").unwrap();
        fs::write(root.join("src/generated/out.js"), "").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "").unwrap();

        let index = FsExistsIndex::build(root, &config());
        assert!(index.is_complete());
        assert_eq!(index.summary().indexed_count, 2);
        assert_eq!(index.lookup("src/generated/out.js"), FsExistence::Present);
        assert_eq!(index.lookup("src/missing.ts"), FsExistence::Absent);
        assert_eq!(index.lookup("node_modules/pkg/index.js"), FsExistence::Absent);
    }

    #[test]
    fn truncated_scan_never_reports_absent() {
        let temp = TempDir::new().unwrap();
        for i in 0..10 {
            fs::write(temp.path().join(format!("f{i}.txt")), "").unwrap();
        }
        let mut cfg = config();
        cfg.max_scan_files = 3;
        cfg.concurrency = 1;

        let index = FsExistsIndex::build(temp.path(), &cfg);
        assert!(!index.is_complete());
        assert!(index.summary().truncated);
        assert_eq!(index.summary().indexed_count, 3);
        assert_eq!(index.lookup("nope.txt"), FsExistence::Unknown);
    }

    #[test]
    fn bloom_hit_without_verification_is_unknown() {
        let index = FsExistsIndex::from_paths(["a/b.c"], true, false);
        assert_eq!(index.lookup("a/b.c"), FsExistence::Unknown);
        let verified = FsExistsIndex::from_paths(["a/b.c"], true, true);
        assert_eq!(verified.lookup("a/b.c"), FsExistence::Present);
        assert_eq!(verified.lookup("a/x.c"), FsExistence::Absent);
    }
}
