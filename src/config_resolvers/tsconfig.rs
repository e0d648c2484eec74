//! TypeScript tsconfig.json loading and `paths` resolution
//!
//! Handles JSONC parsing, extends chains (relative files and node-style
//! package configs), child-over-parent merging, and compilation of `paths`
//! patterns into regex rules. Profiles are cached per importer directory and
//! per config file `(path, mtime, size)`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::{ResolveError, ResolveResult};
use crate::fingerprint::{Sha256Hash, fingerprint_parts};
use crate::fs_meta::{FsMemo, FsStat};
use crate::lookup::FileLookup;
use crate::paths::{join_rel, normalize_rel_path, parent_dir, resolve_within_root, sort_strings, to_abs};

pub const TSCONFIG_FILE: &str = "tsconfig.json";
const TSCONFIG_PROFILE_VERSION: &str = "tsconfig-profile-v1";

/// `extends` accepts a single config or, since TS 5.0, a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Extends {
    One(String),
    Many(Vec<String>),
}

impl Extends {
    fn specs(&self) -> Vec<&str> {
        match self {
            Extends::One(spec) => vec![spec.as_str()],
            Extends::Many(specs) => specs.iter().map(String::as_str).collect(),
        }
    }
}

/// Compiler options subset used for module resolution and emit mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    pub base_url: Option<String>,
    #[serde(default)]
    pub paths: BTreeMap<String, Vec<String>>,
    pub out_dir: Option<String>,
    pub root_dir: Option<String>,
    pub declaration_dir: Option<String>,
}

/// Minimal tsconfig.json representation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsConfig {
    pub extends: Option<Extends>,
    #[serde(default)]
    pub compiler_options: CompilerOptions,
}

/// JSONC parsing using json5 for comment and trailing comma support
pub fn parse_jsonc_tsconfig(content: &str) -> Result<TsConfig, String> {
    json5::from_str(content).map_err(|e| e.to_string())
}

pub fn read_tsconfig(path: &Path, fs: &FsMemo) -> ResolveResult<TsConfig> {
    let content = fs
        .read_to_string(path)
        .ok_or_else(|| ResolveError::manifest_parse(path, "file is missing or unreadable"))?;
    parse_jsonc_tsconfig(&content).map_err(|reason| ResolveError::manifest_parse(path, reason))
}

/// Compiler options after the extends chain, with every path made absolute
/// against the config that declared it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedOptions {
    pub base_url: Option<PathBuf>,
    pub paths: BTreeMap<String, Vec<String>>,
    /// Directory `paths` targets are relative to when there is no baseUrl
    pub paths_base: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub root_dir: Option<PathBuf>,
    pub declaration_dir: Option<PathBuf>,
}

impl MergedOptions {
    fn from_config(config: &TsConfig, config_dir: &Path) -> Self {
        let opts = &config.compiler_options;
        let abs = |value: &Option<String>| value.as_ref().map(|v| lexical_join(config_dir, v));
        Self {
            base_url: abs(&opts.base_url),
            paths_base: (!opts.paths.is_empty()).then(|| config_dir.to_path_buf()),
            paths: opts.paths.clone(),
            out_dir: abs(&opts.out_dir),
            root_dir: abs(&opts.root_dir),
            declaration_dir: abs(&opts.declaration_dir),
        }
    }

    /// Child options override parent options key by key.
    fn merge(parent: Self, child: Self) -> Self {
        let (paths, paths_base) = if child.paths_base.is_some() {
            (child.paths, child.paths_base)
        } else {
            (parent.paths, parent.paths_base)
        };
        Self {
            base_url: child.base_url.or(parent.base_url),
            paths,
            paths_base,
            out_dir: child.out_dir.or(parent.out_dir),
            root_dir: child.root_dir.or(parent.root_dir),
            declaration_dir: child.declaration_dir.or(parent.declaration_dir),
        }
    }
}

/// Join and collapse `.`/`..` without touching the filesystem.
fn lexical_join(base: &Path, value: &str) -> PathBuf {
    let joined = base.join(value);
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Locate the config an `extends` entry points at.
///
/// Relative and absolute entries are files (`.json` appended when missing);
/// anything else is looked up in `node_modules` of every ancestor.
fn resolve_extends_target(config_dir: &Path, spec: &str, fs: &FsMemo) -> Option<PathBuf> {
    let with_json = |path: PathBuf| {
        if !path.to_string_lossy().ends_with(".json") {
            let mut name = path.into_os_string();
            name.push(".json");
            PathBuf::from(name)
        } else {
            path
        }
    };
    if spec.starts_with("./") || spec.starts_with("../") || Path::new(spec).is_absolute() {
        let direct = lexical_join(config_dir, spec);
        if fs.is_file(&direct) {
            return Some(direct);
        }
        let candidate = with_json(direct);
        return fs.is_file(&candidate).then_some(candidate);
    }

    let mut dir = Some(config_dir);
    while let Some(current) = dir {
        let package = lexical_join(&current.join("node_modules"), spec);
        let candidates = [
            package.clone(),
            with_json(package.clone()),
            package.join(TSCONFIG_FILE),
        ];
        if let Some(hit) = candidates.into_iter().find(|c| fs.is_file(c)) {
            return Some(hit);
        }
        dir = current.parent();
    }
    None
}

/// Resolve the extends chain rooted at `path` and merge child over parent.
///
/// A config already on the chain is skipped, so cycles terminate with the
/// options gathered so far.
pub fn resolve_extends_chain(
    path: &Path,
    fs: &FsMemo,
    visited: &mut HashSet<PathBuf>,
) -> ResolveResult<MergedOptions> {
    if !visited.insert(path.to_path_buf()) {
        tracing::debug!("[imports] tsconfig extends cycle at {}", path.display());
        return Ok(MergedOptions::default());
    }
    let config = read_tsconfig(path, fs)?;
    let config_dir = path.parent().unwrap_or(Path::new(""));

    let mut merged = MergedOptions::default();
    if let Some(extends) = &config.extends {
        for spec in extends.specs() {
            let Some(parent_path) = resolve_extends_target(config_dir, spec, fs) else {
                tracing::debug!("[imports] tsconfig extends target not found: {spec}");
                continue;
            };
            match resolve_extends_chain(&parent_path, fs, visited) {
                Ok(parent) => merged = MergedOptions::merge(merged, parent),
                Err(err) => tracing::debug!("[imports] skipping tsconfig parent: {err}"),
            }
        }
    }
    Ok(MergedOptions::merge(
        merged,
        MergedOptions::from_config(&config, config_dir),
    ))
}

/// Compiled `paths` pattern
#[derive(Debug, Clone)]
pub struct PathRule {
    /// Original pattern (e.g., "@components/*")
    pub pattern: String,
    /// Target paths (e.g., ["src/components/*"])
    pub targets: Vec<String>,
    regex: regex::Regex,
    /// Literal text before the wildcard; longer is more specific
    prefix_len: usize,
    wildcard: bool,
}

impl PathRule {
    pub fn new(pattern: String, targets: Vec<String>) -> Option<Self> {
        if targets.is_empty() || pattern.matches('*').count() > 1 {
            return None;
        }
        // "@components/*" becomes "^@components/(.*)$"
        let regex_pattern = format!("^{}$", regex::escape(&pattern).replace("\\*", "(.*)"));
        let regex = regex::Regex::new(&regex_pattern).ok()?;
        let wildcard = pattern.contains('*');
        let prefix_len = pattern.find('*').unwrap_or(pattern.len());
        Some(Self {
            pattern,
            targets,
            regex,
            prefix_len,
            wildcard,
        })
    }

    /// Substituted targets when `specifier` matches this rule.
    pub fn try_resolve(&self, specifier: &str) -> Option<Vec<String>> {
        let captures = self.regex.captures(specifier)?;
        let captured = captures.get(1).map(|m| m.as_str()).unwrap_or("");
        Some(
            self.targets
                .iter()
                .map(|target| target.replacen('*', captured, 1))
                .collect(),
        )
    }

    fn specificity(&self) -> (bool, usize) {
        (!self.wildcard, self.prefix_len)
    }
}

/// Resolved tsconfig for one directory subtree
#[derive(Debug, Clone)]
pub struct TsConfigProfile {
    /// Repository-relative path of the tsconfig.json
    pub tsconfig_rel: String,
    pub tsconfig_abs: PathBuf,
    /// Explicit baseUrl, repository-relative
    pub base_url: Option<String>,
    /// Directory `paths` targets are joined onto
    pub paths_base: String,
    pub rules: Vec<PathRule>,
    pub out_dir: Option<String>,
    pub root_dir: Option<String>,
    pub declaration_dir: Option<String>,
    pub fingerprint: Sha256Hash,
}

impl TsConfigProfile {
    pub fn from_merged(root: &Path, tsconfig_abs: &Path, merged: MergedOptions) -> Option<Self> {
        let tsconfig_rel = resolve_within_root(root, tsconfig_abs)?;
        let rel = |path: &Option<PathBuf>| {
            path.as_ref().map(|p| {
                if p.as_path() == root {
                    String::new()
                } else {
                    resolve_within_root(root, p).unwrap_or_else(|| p.to_string_lossy().into_owned())
                }
            })
        };
        let base_url = rel(&merged.base_url);
        let paths_base = base_url
            .clone()
            .or_else(|| rel(&merged.paths_base))
            .unwrap_or_else(|| parent_dir(&tsconfig_rel).to_string());
        let rules: Vec<PathRule> = merged
            .paths
            .iter()
            .filter_map(|(pattern, targets)| PathRule::new(pattern.clone(), targets.clone()))
            .collect();

        let mut parts = vec![
            format!("tsconfig:{tsconfig_rel}"),
            format!("baseUrl:{}", base_url.as_deref().unwrap_or("")),
            format!("pathsBase:{paths_base}"),
        ];
        for (pattern, targets) in &merged.paths {
            parts.push(format!("path:{pattern}=>{}", targets.join(",")));
        }
        let out_dir = rel(&merged.out_dir);
        let root_dir = rel(&merged.root_dir);
        let declaration_dir = rel(&merged.declaration_dir);
        parts.push(format!("outDir:{}", out_dir.as_deref().unwrap_or("")));
        parts.push(format!("rootDir:{}", root_dir.as_deref().unwrap_or("")));
        parts.push(format!(
            "declarationDir:{}",
            declaration_dir.as_deref().unwrap_or("")
        ));

        Some(Self {
            tsconfig_rel,
            tsconfig_abs: tsconfig_abs.to_path_buf(),
            base_url,
            paths_base,
            rules,
            out_dir,
            root_dir,
            declaration_dir,
            fingerprint: fingerprint_parts(TSCONFIG_PROFILE_VERSION, parts),
        })
    }

    pub fn has_paths(&self) -> bool {
        !self.rules.is_empty()
    }
}

/// A `paths` or baseUrl hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsPathHit {
    pub resolved_path: String,
    /// Matched pattern; `None` for a plain baseUrl hit
    pub pattern: Option<String>,
    pub tsconfig_rel: String,
}

/// Resolve a bare specifier through `paths`, then an explicit `baseUrl`.
///
/// Among all hits the most specific pattern wins (exact before wildcard,
/// then longer literal prefix), then the shortest path, then the
/// lexicographically smallest.
pub fn resolve_ts_paths(spec: &str, profile: &TsConfigProfile, lookup: &FileLookup) -> Option<TsPathHit> {
    let mut best: Option<((bool, usize), String, &str)> = None;
    for rule in &profile.rules {
        let Some(targets) = rule.try_resolve(spec) else {
            continue;
        };
        for target in targets {
            let candidate = join_rel(&profile.paths_base, &target);
            let Some(resolved) = lookup.resolve_candidate(&candidate) else {
                continue;
            };
            let specificity = rule.specificity();
            let better = match &best {
                None => true,
                Some((best_spec, best_path, _)) => specificity
                    .cmp(best_spec)
                    .reverse()
                    .then_with(|| resolved.len().cmp(&best_path.len()))
                    .then_with(|| sort_strings(&resolved, best_path))
                    == Ordering::Less,
            };
            if better {
                best = Some((specificity, resolved, rule.pattern.as_str()));
            }
        }
    }
    if let Some((_, resolved_path, pattern)) = best {
        return Some(TsPathHit {
            resolved_path,
            pattern: Some(pattern.to_string()),
            tsconfig_rel: profile.tsconfig_rel.clone(),
        });
    }

    let base_url = profile.base_url.as_ref()?;
    let resolved_path = lookup.resolve_candidate(&join_rel(base_url, spec))?;
    Some(TsPathHit {
        resolved_path,
        pattern: None,
        tsconfig_rel: profile.tsconfig_rel.clone(),
    })
}

/// Nearest-ancestor tsconfig lookup with per-directory and per-file caches
#[derive(Debug)]
pub struct TsConfigLoader {
    root: PathBuf,
    by_dir: HashMap<String, Option<Arc<TsConfigProfile>>>,
    by_file: HashMap<PathBuf, (FsStat, Option<Arc<TsConfigProfile>>)>,
}

impl TsConfigLoader {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            by_dir: HashMap::new(),
            by_file: HashMap::new(),
        }
    }

    /// Profile of the nearest `tsconfig.json` at or above `importer_rel`'s
    /// directory. Malformed configs read as no config.
    pub fn resolve_for_importer(&mut self, importer_rel: &str, fs: &FsMemo) -> Option<Arc<TsConfigProfile>> {
        self.resolve_for_dir(parent_dir(&normalize_rel_path(importer_rel)), fs)
    }

    fn resolve_for_dir(&mut self, dir: &str, fs: &FsMemo) -> Option<Arc<TsConfigProfile>> {
        if let Some(cached) = self.by_dir.get(dir) {
            return cached.clone();
        }
        let candidate = to_abs(&self.root, &join_rel(dir, TSCONFIG_FILE));
        let profile = if fs.is_file(&candidate) {
            self.load_file(&candidate, fs)
        } else if dir.is_empty() {
            None
        } else {
            let parent = parent_dir(dir).to_string();
            self.resolve_for_dir(&parent, fs)
        };
        self.by_dir.insert(dir.to_string(), profile.clone());
        profile
    }

    fn load_file(&mut self, path: &Path, fs: &FsMemo) -> Option<Arc<TsConfigProfile>> {
        let stat = fs.stat(path);
        if let Some((cached_stat, profile)) = self.by_file.get(path) {
            if *cached_stat == stat {
                return profile.clone();
            }
        }
        let mut visited = HashSet::new();
        let profile = match resolve_extends_chain(path, fs, &mut visited) {
            Ok(merged) => TsConfigProfile::from_merged(&self.root, path, merged).map(Arc::new),
            Err(err) => {
                tracing::debug!("[imports] ignoring tsconfig: {err}");
                None
            }
        };
        self.by_file.insert(path.to_path_buf(), (stat, profile.clone()));
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn parse_tsconfig_with_comments() {
        let content = r#"{
            // Base configuration
            "compilerOptions": {
                "baseUrl": "./src", // Source directory
                "paths": {
                    /* Path mappings */
                    "@utils/*": ["utils/*"],
                },
                "outDir": "dist",
            }
        }"#;
        let config = parse_jsonc_tsconfig(content).expect("Should parse JSONC with comments");
        assert_eq!(config.compiler_options.base_url.as_deref(), Some("./src"));
        assert_eq!(config.compiler_options.paths.len(), 1);
        assert_eq!(config.compiler_options.out_dir.as_deref(), Some("dist"));
    }

    #[test]
    fn extends_accepts_lists() {
        let config = parse_jsonc_tsconfig(r#"{ "extends": ["./a.json", "./b"] }"#).unwrap();
        assert_eq!(config.extends.unwrap().specs(), vec!["./a.json", "./b"]);
        assert!(parse_jsonc_tsconfig("{ invalid json }").is_err());
    }

    #[test]
    fn path_rule_substitutes_every_target() {
        let rule = PathRule::new(
            "@app/*".to_string(),
            vec!["src/app/*".to_string(), "generated/*".to_string()],
        )
        .unwrap();
        assert_eq!(
            rule.try_resolve("@app/models/user"),
            Some(vec!["src/app/models/user".to_string(), "generated/models/user".to_string()])
        );
        assert!(rule.try_resolve("@other/x").is_none());
        assert!(PathRule::new("a/*/b/*".to_string(), vec!["x".to_string()]).is_none());
    }

    #[test]
    fn extends_chain_merges_child_over_parent() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            "tsconfig.base.json",
            r#"{ "compilerOptions": { "baseUrl": ".", "paths": { "@lib/*": ["lib/*"] }, "outDir": "dist" } }"#,
        );
        write(
            root,
            "packages/web/tsconfig.json",
            r#"{ "extends": "../../tsconfig.base", "compilerOptions": { "outDir": "build" } }"#,
        );
        let memo = FsMemo::new();
        let merged = resolve_extends_chain(
            &root.join("packages/web/tsconfig.json"),
            &memo,
            &mut HashSet::new(),
        )
        .unwrap();
        assert_eq!(merged.base_url.as_deref(), Some(root));
        assert_eq!(merged.out_dir, Some(root.join("packages/web/build")));
        assert!(merged.paths.contains_key("@lib/*"));
        assert_eq!(merged.paths_base.as_deref(), Some(root));
    }

    #[test]
    fn extends_cycle_terminates() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "a.json", r#"{ "extends": "./b.json", "compilerOptions": { "baseUrl": "a" } }"#);
        write(root, "b.json", r#"{ "extends": "./a.json", "compilerOptions": { "outDir": "out" } }"#);
        let merged = resolve_extends_chain(&root.join("a.json"), &FsMemo::new(), &mut HashSet::new()).unwrap();
        assert_eq!(merged.base_url, Some(root.join("a")));
        assert_eq!(merged.out_dir, Some(root.join("out")));
    }

    #[test]
    fn extends_from_node_modules_package() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            "node_modules/@tsconfig/strict/tsconfig.json",
            r#"{ "compilerOptions": { "rootDir": "src" } }"#,
        );
        write(root, "tsconfig.json", r#"{ "extends": "@tsconfig/strict" }"#);
        let merged = resolve_extends_chain(&root.join("tsconfig.json"), &FsMemo::new(), &mut HashSet::new()).unwrap();
        assert_eq!(
            merged.root_dir,
            Some(root.join("node_modules/@tsconfig/strict/src"))
        );
    }

    #[test]
    fn paths_prefer_specific_patterns_then_short_paths() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            "tsconfig.json",
            r#"{ "compilerOptions": { "baseUrl": ".", "paths": {
                "@app/*": ["src/*", "legacy/app/*"],
                "@app/config": ["config/index.ts"]
            } } }"#,
        );
        let lookup = FileLookup::from_paths(
            root,
            ["src/util.ts", "legacy/app/util.ts", "config/index.ts", "src/config.ts", "shared/x.ts"],
        );
        let memo = FsMemo::new();
        let mut loader = TsConfigLoader::new(root);
        let profile = loader.resolve_for_importer("src/main.ts", &memo).unwrap();
        assert_eq!(profile.tsconfig_rel, "tsconfig.json");

        let hit = resolve_ts_paths("@app/util", &profile, &lookup).unwrap();
        assert_eq!(hit.resolved_path, "src/util.ts");
        assert_eq!(hit.pattern.as_deref(), Some("@app/*"));

        let exact = resolve_ts_paths("@app/config", &profile, &lookup).unwrap();
        assert_eq!(exact.resolved_path, "config/index.ts");

        let base = resolve_ts_paths("shared/x", &profile, &lookup).unwrap();
        assert_eq!(base.pattern, None);
        assert!(resolve_ts_paths("react", &profile, &lookup).is_none());
    }

    #[test]
    fn malformed_config_reads_as_none() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "pkg/tsconfig.json", "{ not json");
        let mut loader = TsConfigLoader::new(temp.path());
        assert!(loader.resolve_for_importer("pkg/a.ts", &FsMemo::new()).is_none());
    }

    #[test]
    fn fingerprint_tracks_options() {
        let root = Path::new("/repo");
        let abs = root.join("tsconfig.json");
        let a = TsConfigProfile::from_merged(root, &abs, MergedOptions::default()).unwrap();
        let b = TsConfigProfile::from_merged(
            root,
            &abs,
            MergedOptions {
                out_dir: Some(root.join("dist")),
                ..MergedOptions::default()
            },
        )
        .unwrap();
        assert_ne!(a.fingerprint, b.fingerprint);
        assert_eq!(b.out_dir.as_deref(), Some("dist"));
    }
}
