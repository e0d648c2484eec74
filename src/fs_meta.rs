//! Filesystem metadata prefetch and stat memo
//!
//! Phase A of a resolution run stats candidate manifest paths
//! (`package.json` and `tsconfig.json` in every importer ancestor, root
//! `go.mod` and `pubspec.yaml`) with a bounded worker pool draining a shared
//! queue. Workers only insert into a concurrent map, once per key.
//!
//! Errors never propagate: a missing path is cached as missing, permission
//! problems are cached as unknown, and transient errors (`EAGAIN`, `EMFILE`,
//! `ENFILE`) are not cached at all so the next access retries.

use crossbeam_channel::unbounded;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::paths::{parent_dir, to_abs};

const EAGAIN: i32 = 11;
const ENFILE: i32 = 23;
const EMFILE: i32 = 24;

pub const MANIFEST_NAMES: &[&str] = &["package.json", "tsconfig.json"];
pub const ROOT_MANIFEST_NAMES: &[&str] = &["go.mod", "pubspec.yaml", "package.json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsStat {
    File { size: u64, mtime_ms: u64 },
    Dir,
    Missing,
    /// Exists-or-not cannot be decided (permission denied, odd file types)
    Unknown,
}

impl FsStat {
    pub fn is_file(self) -> bool {
        matches!(self, FsStat::File { .. })
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(EAGAIN | EMFILE | ENFILE))
        || matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
        )
}

/// Stat a path; `None` means a transient failure that must not be cached.
fn stat_path(path: &Path) -> Option<FsStat> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => {
            let mtime_ms = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            Some(FsStat::File {
                size: meta.len(),
                mtime_ms,
            })
        }
        Ok(meta) if meta.is_dir() => Some(FsStat::Dir),
        Ok(_) => Some(FsStat::Unknown),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Some(FsStat::Missing),
        Err(err) if is_transient(&err) => None,
        Err(_) => Some(FsStat::Unknown),
    }
}

#[derive(Debug, Default)]
pub struct FsMemo {
    entries: DashMap<PathBuf, FsStat>,
    prefetched: usize,
}

impl FsMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stat every path with `concurrency` workers sharing one queue.
    pub fn prefetch(paths: Vec<PathBuf>, concurrency: usize) -> Self {
        let entries = DashMap::with_capacity(paths.len());
        let prefetched = paths.len();
        let (tx, rx) = unbounded::<PathBuf>();
        for path in paths {
            // The receiver is alive for the whole scope below.
            let _ = tx.send(path);
        }
        drop(tx);

        let workers = concurrency.clamp(1, 32);
        std::thread::scope(|scope| {
            for _ in 0..workers {
                let rx = rx.clone();
                let entries = &entries;
                scope.spawn(move || {
                    while let Ok(path) = rx.recv() {
                        if let Some(stat) = stat_path(&path) {
                            entries.entry(path).or_insert(stat);
                        }
                    }
                });
            }
        });

        tracing::debug!("[imports] prefetched metadata for {prefetched} candidate paths");
        Self {
            entries,
            prefetched,
        }
    }

    pub fn prefetched_count(&self) -> usize {
        self.prefetched
    }

    pub fn stat(&self, path: &Path) -> FsStat {
        if let Some(hit) = self.entries.get(path) {
            return *hit;
        }
        match stat_path(path) {
            Some(stat) => {
                self.entries.insert(path.to_path_buf(), stat);
                stat
            }
            None => FsStat::Unknown,
        }
    }

    pub fn is_file(&self, path: &Path) -> bool {
        self.stat(path).is_file()
    }

    /// Read a file's contents; failures read as absent.
    pub fn read_to_string(&self, path: &Path) -> Option<String> {
        if !self.is_file(path) {
            return None;
        }
        std::fs::read_to_string(path).ok()
    }
}

/// Manifest paths worth prefetching for a set of importers.
pub fn manifest_candidates<'a>(
    root: &Path,
    importers: impl IntoIterator<Item = &'a str>,
) -> Vec<PathBuf> {
    let mut dirs: BTreeSet<String> = BTreeSet::new();
    for importer in importers {
        let mut dir = parent_dir(importer);
        loop {
            if !dirs.insert(dir.to_string()) {
                break;
            }
            if dir.is_empty() {
                break;
            }
            dir = parent_dir(dir);
        }
    }
    let mut out: BTreeSet<PathBuf> = BTreeSet::new();
    for dir in &dirs {
        for name in MANIFEST_NAMES {
            out.insert(to_abs(root, &format!("{dir}/{name}")));
        }
    }
    for name in ROOT_MANIFEST_NAMES {
        out.insert(root.join(name));
    }
    out.into_iter().collect()
}
