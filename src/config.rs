//! Configuration module for the import resolver.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.importgraph/settings.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `IG_` and use double underscores
//! to separate nested levels:
//! - `IG_BUDGETS__MAX_FILESYSTEM_PROBES=8` sets `budgets.max_filesystem_probes`
//! - `IG_FS_INDEX__CONCURRENCY=16` sets `fs_index.concurrency`
//! - `IG_LIMITS__MAX_WARNINGS=500` sets `limits.max_warnings`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ResolveError, ResolveResult};

pub const CONFIG_DIR: &str = ".importgraph";
pub const CONFIG_FILE: &str = "settings.toml";
pub const ENV_PREFIX: &str = "IG_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding the persisted resolution cache
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Workspace root directory (where .importgraph is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Per-specifier probe budgets
    #[serde(default)]
    pub budgets: BudgetConfig,

    /// Filesystem existence accelerator
    #[serde(default)]
    pub fs_index: FsIndexConfig,

    /// Output caps and cache TTLs
    #[serde(default)]
    pub limits: GraphLimits,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Resolution mode, part of the cache key
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Resolve bare specifiers through tsconfig `paths`
    #[serde(default = "default_true")]
    pub enable_ts_paths: bool,

    /// Resolve directory imports through package.json entries
    #[serde(default = "default_true")]
    pub enable_package_entries: bool,

    /// Run build-context classifiers on unresolved specifiers
    #[serde(default = "default_true")]
    pub enable_build_context: bool,

    /// Unresolved specifiers with these prefixes are parser noise
    #[serde(default = "default_noise_prefixes")]
    pub noise_prefixes: Vec<String>,

    /// Exact specifiers (lowercased) treated as parser noise
    #[serde(default)]
    pub noise_ignore: Vec<String>,

    /// Alias rules tried after tsconfig paths
    #[serde(default)]
    pub aliases: Vec<AliasRuleConfig>,

    /// Measure per-stage elapsed time (reported beside the stats, not in them)
    #[serde(default = "default_true")]
    pub stage_timings: bool,
}

/// Specifiers starting with `prefix` are rewritten onto `target`
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AliasRuleConfig {
    pub prefix: String,
    pub target: String,
}

/// Values left unset scale with the adaptive budget profile
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct BudgetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_filesystem_probes: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fallback_candidates: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fallback_depth: Option<usize>,

    /// Disable to pin budgets to their base values
    #[serde(default = "default_true_opt", skip_serializing_if = "Option::is_none")]
    pub adaptive: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FsIndexConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scan stops (and turns incomplete) after this many files
    #[serde(default = "default_max_scan_files")]
    pub max_scan_files: usize,

    /// Directory workers
    #[serde(default = "default_fs_concurrency")]
    pub concurrency: usize,

    /// Confirm Bloom hits against the exact map
    #[serde(default = "default_true")]
    pub exact_verification: bool,

    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GraphLimits {
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,

    #[serde(default = "default_max_edges")]
    pub max_edges: usize,

    #[serde(default = "default_max_warnings")]
    pub max_warnings: usize,

    /// In-memory resolution cache entries before FIFO eviction
    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: usize,

    /// Lifetime of unresolved in-memory cache entries
    #[serde(default = "default_negative_ttl_ms")]
    pub negative_ttl_ms: u64,

    /// Lifetime of on-disk-but-unindexed resolutions
    #[serde(default = "default_ephemeral_ttl_ms")]
    pub ephemeral_external_ttl_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GateConfig {
    /// Importer path segments excluded from release-gate counts
    #[serde(default = "default_gate_segments")]
    pub excluded_importer_segments: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IndexingConfig {
    /// Threads used to hash importer files
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Patterns to ignore when discovering files
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_cache_path() -> PathBuf {
    PathBuf::from(".importgraph/cache")
}
fn default_true() -> bool {
    true
}
fn default_true_opt() -> Option<bool> {
    Some(true)
}
fn default_false() -> bool {
    false
}
fn default_mode() -> String {
    "full".to_string()
}
fn default_noise_prefixes() -> Vec<String> {
    vec!["node:".into(), "@types/".into(), "internal/".into()]
}
fn default_max_scan_files() -> usize {
    200_000
}
fn default_fs_concurrency() -> usize {
    8
}
fn default_skip_dirs() -> Vec<String> {
    [
        ".git",
        ".hg",
        ".svn",
        "node_modules",
        "dist",
        "build",
        "out",
        "target",
        ".next",
        ".turbo",
        ".importgraph",
        "__pycache__",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_max_nodes() -> usize {
    200_000
}
fn default_max_edges() -> usize {
    500_000
}
fn default_max_warnings() -> usize {
    200
}
fn default_max_cache_entries() -> usize {
    50_000
}
fn default_negative_ttl_ms() -> u64 {
    60_000
}
fn default_ephemeral_ttl_ms() -> u64 {
    30_000
}
fn default_gate_segments() -> Vec<String> {
    [
        "/test/",
        "/tests/",
        "/__tests__/",
        "/fixtures/",
        "/__fixtures__/",
        "/spec/",
        "/specs/",
        "/testdata/",
        "/__mocks__/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_path: default_cache_path(),
            workspace_root: None,
            debug: false,
            resolver: ResolverConfig::default(),
            budgets: BudgetConfig::default(),
            fs_index: FsIndexConfig::default(),
            limits: GraphLimits::default(),
            gate: GateConfig::default(),
            indexing: IndexingConfig::default(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            enable_ts_paths: true,
            enable_package_entries: true,
            enable_build_context: true,
            noise_prefixes: default_noise_prefixes(),
            noise_ignore: Vec::new(),
            aliases: Vec::new(),
            stage_timings: true,
        }
    }
}

impl Default for FsIndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_scan_files: default_max_scan_files(),
            concurrency: default_fs_concurrency(),
            exact_verification: true,
            skip_dirs: default_skip_dirs(),
        }
    }
}

impl Default for GraphLimits {
    fn default() -> Self {
        Self {
            max_nodes: default_max_nodes(),
            max_edges: default_max_edges(),
            max_warnings: default_max_warnings(),
            max_cache_entries: default_max_cache_entries(),
            negative_ttl_ms: default_negative_ttl_ms(),
            ephemeral_external_ttl_ms: default_ephemeral_ttl_ms(),
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            excluded_importer_segments: default_gate_segments(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            ignore_patterns: Vec::new(),
        }
    }
}

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| {
        key.as_str()
            .to_lowercase()
            .replace("__", ".") // Double underscore becomes dot
            .into()
    })
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(env_provider())
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(env_provider())
            .extract()
            .map_err(Box::new)
    }

    /// Find `.importgraph/settings.toml` searching from the current
    /// directory up to the filesystem root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Get the workspace root directory (where .importgraph is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> ResolveResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ResolveError::cache_io(parent.to_path_buf(), e))?;
        }
        let toml_string = toml::to_string_pretty(self).map_err(|e| ResolveError::ConfigError {
            reason: e.to_string(),
        })?;
        std::fs::write(path, toml_string).map_err(|e| ResolveError::cache_io(path.to_path_buf(), e))
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(dir: &Path, force: bool) -> ResolveResult<PathBuf> {
        let config_path = dir.join(CONFIG_DIR).join(CONFIG_FILE);
        if !force && config_path.exists() {
            return Err(ResolveError::ConfigError {
                reason: "Configuration file already exists. Use --force to overwrite".to_string(),
            });
        }
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ResolveError::cache_io(parent.to_path_buf(), e))?;
        }

        let template = format!(
            r#"# importgraph configuration

version = 1

# Persisted resolution cache directory (relative to workspace root)
cache_path = ".importgraph/cache"

debug = false

[resolver]
mode = "full"
enable_ts_paths = true
enable_package_entries = true
enable_build_context = true
noise_prefixes = ["node:", "@types/", "internal/"]
stage_timings = true

# Alias rules tried after tsconfig paths
# [[resolver.aliases]]
# prefix = "@app/"
# target = "src/app"

[budgets]
# Leave unset to let the adaptive profile scale the defaults (32 / 48 / 16)
# max_filesystem_probes = 32
# max_fallback_candidates = 48
# max_fallback_depth = 16
adaptive = true

[fs_index]
enabled = true
max_scan_files = 200000
concurrency = 8
exact_verification = true

[limits]
max_nodes = 200000
max_edges = 500000
max_warnings = 200

[indexing]
# parallel_threads = {}
ignore_patterns = []
"#,
            default_parallel_threads()
        );
        std::fs::write(&config_path, template)
            .map_err(|e| ResolveError::cache_io(config_path.clone(), e))?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.fs_index.max_scan_files, 200_000);
        assert_eq!(settings.fs_index.concurrency, 8);
        assert_eq!(settings.limits.max_warnings, 200);
        assert!(settings.budgets.max_filesystem_probes.is_none());
        assert!(settings.resolver.noise_prefixes.contains(&"node:".to_string()));
        assert!(settings.gate.excluded_importer_segments.contains(&"/fixtures/".to_string()));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(
            &config_path,
            r#"
[budgets]
max_fallback_candidates = 4

[[resolver.aliases]]
prefix = "@app/"
target = "src/app"
"#,
        )
        .unwrap();

        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(&config_path))
            .extract()
            .unwrap();

        assert_eq!(settings.budgets.max_fallback_candidates, Some(4));
        assert_eq!(settings.budgets.max_filesystem_probes, None);
        assert_eq!(settings.budgets.adaptive, Some(true));
        assert_eq!(settings.resolver.aliases.len(), 1);
        assert_eq!(settings.limits.max_edges, 500_000);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/settings.toml");
        let mut settings = Settings::default();
        settings.limits.max_warnings = 17;
        settings.fs_index.enabled = false;
        settings.save(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.limits.max_warnings, 17);
        assert!(!loaded.fs_index.enabled);
    }

    #[test]
    fn test_init_config_file_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = Settings::init_config_file(temp_dir.path(), false).unwrap();
        assert!(path.exists());

        let parsed = Settings::load_from(&path).unwrap();
        assert_eq!(parsed.resolver.mode, "full");

        let err = Settings::init_config_file(temp_dir.path(), false).unwrap_err();
        assert_eq!(err.status_code(), "CONFIG_ERROR");
        assert!(Settings::init_config_file(temp_dir.path(), true).is_ok());
    }
}
