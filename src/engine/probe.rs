//! Budgeted probing for relative candidates outside the indexed file set

use std::path::Path;

use crate::budget::BudgetState;
use crate::fs_index::{FsExistence, FsExistsIndex};
use crate::fs_meta::FsMemo;
use crate::language::{ImporterCaps, ImporterInfo};
use crate::lookup::{DEFAULT_IMPORT_EXTS, FileLookup};
use crate::paths::{has_extension, join_rel, normalize_rel_path, resolve_within_root, to_abs};

use super::stats::FsIndexStats;

const SYSTEM_ROOTS: &[&str] = &[
    "etc", "usr", "opt", "var", "bin", "sbin", "lib", "lib64", "dev", "proc", "sys", "run", "tmp",
    "home", "root",
];

/// `/usr/...`, `/etc/...` and other host directories.
pub fn is_system_path(spec: &str) -> bool {
    let Some(rest) = spec.strip_prefix('/') else {
        return false;
    };
    let first = rest.split('/').next().unwrap_or_default().to_ascii_lowercase();
    SYSTEM_ROOTS.contains(&first.as_str())
}

/// `//cdn.example.com/lib.js` style references.
pub fn is_scheme_relative_url(spec: &str) -> bool {
    let Some(rest) = spec.strip_prefix("//") else {
        return false;
    };
    let host = rest.split(['/', ':']).next().unwrap_or_default();
    if host.is_empty()
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return false;
    }
    match host.rsplit_once('.') {
        Some((name, tld)) => {
            !name.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

/// Absolute specifiers that name something outside the repository.
pub fn is_absolute_external(spec: &str, importer: &ImporterInfo, lookup: &FileLookup) -> bool {
    if is_scheme_relative_url(spec) {
        return true;
    }
    let Some(rooted) = spec.strip_prefix('/') else {
        return false;
    };
    if !importer.allows_absolute_external() {
        return false;
    }
    let target = normalize_rel_path(rooted);
    if !target.is_empty() && lookup.resolve_candidate(&target).is_some() {
        return false;
    }
    is_system_path(spec) || importer.is(ImporterCaps::SHELL)
}

/// Candidate file names for an extensionless base.
fn expand_candidates(base: &str) -> Vec<String> {
    if has_extension(base) {
        return vec![base.to_string()];
    }
    let mut out = Vec::with_capacity(DEFAULT_IMPORT_EXTS.len() * 2);
    out.extend(DEFAULT_IMPORT_EXTS.iter().map(|ext| format!("{base}{ext}")));
    out.extend(DEFAULT_IMPORT_EXTS.iter().map(|ext| format!("{base}/index{ext}")));
    out
}

/// Shared read-only state for fallback probes
#[derive(Clone, Copy)]
pub struct ProbeEnv<'a> {
    pub root: &'a Path,
    pub fs: &'a FsMemo,
    pub fs_index: Option<&'a FsExistsIndex>,
}

impl ProbeEnv<'_> {
    /// Existing on-disk file for a relative specifier that the file set
    /// does not contain. Stops as soon as any budget runs out.
    pub fn find_non_indexed(
        &self,
        spec: &str,
        importer: &ImporterInfo,
        budget: &mut BudgetState,
        stats: &mut FsIndexStats,
    ) -> Option<String> {
        if spec.is_empty() || spec == "." || spec == ".." {
            return None;
        }
        let mut bases: Vec<String> = Vec::with_capacity(2);
        if let Some(rooted) = spec.strip_prefix('/') {
            let target = normalize_rel_path(rooted);
            if target.is_empty() {
                return None;
            }
            if importer.extension == ".html" || importer.extension == ".htm" {
                bases.push(join_rel(&importer.importer_dir, &target));
            }
            bases.push(target);
        } else {
            let depth = spec.split('/').filter(|segment| *segment == "..").count();
            if !budget.allow_fallback_depth(depth) {
                return None;
            }
            bases.push(join_rel(&importer.importer_dir, spec));
        }
        bases.dedup();

        for base in bases.iter().filter(|b| !b.is_empty()) {
            for candidate in expand_candidates(base) {
                if !budget.consume_fallback_candidate() {
                    return None;
                }
                let abs = to_abs(self.root, &candidate);
                let Some(rel) = resolve_within_root(self.root, &abs) else {
                    continue;
                };
                if let Some(index) = self.fs_index {
                    match index.lookup(&rel) {
                        FsExistence::Present => {
                            stats.exact_hits += 1;
                            return Some(rel);
                        }
                        FsExistence::Absent => {
                            stats.negative_skips += 1;
                            continue;
                        }
                        FsExistence::Unknown => stats.unknown_fallbacks += 1,
                    }
                }
                if !budget.consume_filesystem_probe() {
                    return None;
                }
                if self.fs.is_file(&abs) {
                    return Some(rel);
                }
            }
        }
        None
    }

    /// An ephemeral hit is reusable while its file still exists on disk and
    /// has not since joined the file set.
    pub fn ephemeral_still_valid(&self, fallback_path: Option<&str>, lookup: &FileLookup) -> bool {
        let Some(path) = fallback_path.map(normalize_rel_path).filter(|p| !p.is_empty()) else {
            return false;
        };
        let abs = to_abs(self.root, &path);
        if resolve_within_root(self.root, &abs).is_none() {
            return false;
        }
        if lookup.resolve_candidate(&path).is_some() {
            return false;
        }
        self.fs.is_file(&abs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{BudgetKind, BudgetPolicy};
    use crate::config::BudgetConfig;
    use crate::language::classify_importer;
    use std::fs;
    use tempfile::TempDir;

    fn policy(candidates: usize, depth: usize) -> BudgetPolicy {
        BudgetPolicy::from_config(
            &BudgetConfig {
                max_fallback_candidates: Some(candidates),
                max_fallback_depth: Some(depth),
                adaptive: Some(false),
                ..BudgetConfig::default()
            },
            None,
        )
    }

    #[test]
    fn recognizes_external_absolute_forms() {
        assert!(is_scheme_relative_url("//cdn.example.com/lib.js"));
        assert!(is_scheme_relative_url("//fonts.googleapis.com"));
        assert!(!is_scheme_relative_url("//pkg:target"));
        assert!(!is_scheme_relative_url("//src/lib"));
        assert!(is_system_path("/usr/include/stdio.h"));
        assert!(!is_system_path("/src/app.ts"));

        let lookup = FileLookup::from_paths(Path::new("/repo"), ["etc/config.h"]);
        let c = classify_importer("src/main.c");
        assert!(is_absolute_external("/usr/include/stdio.h", &c, &lookup));
        assert!(!is_absolute_external("/etc/config.h", &c, &lookup));
        assert!(!is_absolute_external("/vendor/x.h", &c, &lookup));

        let shell = classify_importer("run.sh");
        assert!(is_absolute_external("/vendor/x.sh", &shell, &lookup));
        let ts = classify_importer("src/app.ts");
        assert!(!is_absolute_external("/usr/include/stdio.h", &ts, &lookup));
    }

    #[test]
    fn finds_files_missing_from_the_index() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/extra.js"), "").unwrap();

        let memo = FsMemo::new();
        let env = ProbeEnv {
            root: dir.path(),
            fs: &memo,
            fs_index: None,
        };
        let importer = classify_importer("src/app.ts");
        let mut stats = FsIndexStats::default();
        let mut budget = BudgetPolicy::default().new_state();
        let hit = env.find_non_indexed("./extra", &importer, &mut budget, &mut stats);
        assert_eq!(hit.as_deref(), Some("src/extra.js"));
        assert!(!budget.is_exhausted());

        let lookup = FileLookup::from_paths(dir.path(), ["src/app.ts"]);
        assert!(env.ephemeral_still_valid(Some("src/extra.js"), &lookup));
        assert!(!env.ephemeral_still_valid(Some("src/gone.js"), &lookup));
    }

    #[test]
    fn index_answers_before_stat() {
        let dir = TempDir::new().unwrap();
        let memo = FsMemo::new();
        let index = FsExistsIndex::from_paths(["src/present.ts"], true, true);
        let env = ProbeEnv {
            root: dir.path(),
            fs: &memo,
            fs_index: Some(&index),
        };
        let importer = classify_importer("src/app.ts");
        let mut stats = FsIndexStats::default();
        let mut budget = BudgetPolicy::default().new_state();
        let hit = env.find_non_indexed("./present", &importer, &mut budget, &mut stats);
        assert_eq!(hit.as_deref(), Some("src/present.ts"));
        assert_eq!(stats.exact_hits, 1);

        let mut stats = FsIndexStats::default();
        let mut budget = BudgetPolicy::default().new_state();
        assert!(env.find_non_indexed("./absent.ts", &importer, &mut budget, &mut stats).is_none());
        assert_eq!(stats.negative_skips, 1);
        assert_eq!(stats.unknown_fallbacks, 0);
    }

    #[test]
    fn budgets_bound_the_search() {
        let dir = TempDir::new().unwrap();
        let memo = FsMemo::new();
        let env = ProbeEnv {
            root: dir.path(),
            fs: &memo,
            fs_index: None,
        };
        let importer = classify_importer("a/b/c/app.ts");
        let mut stats = FsIndexStats::default();

        let mut budget = policy(3, 16).new_state();
        assert!(env.find_non_indexed("./missing", &importer, &mut budget, &mut stats).is_none());
        assert_eq!(budget.exhausted_types(), vec![BudgetKind::FallbackCandidates]);

        let mut budget = policy(48, 1).new_state();
        assert!(env.find_non_indexed("../../x", &importer, &mut budget, &mut stats).is_none());
        assert_eq!(budget.exhausted_types(), vec![BudgetKind::FallbackDepth]);
    }
}
