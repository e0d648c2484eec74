//! Import resolution orchestration
//!
//! [`resolve_import_links`] maps every raw specifier of every importer to an
//! in-repo file, an external reference, or an unresolved outcome with a
//! reason code. Importers are visited in sorted order and their specifiers
//! are deduplicated and sorted first, so cache population and graph output
//! do not depend on scan order.
//!
//! Each specifier is looked up in the persisted per-file cache, then the
//! in-memory cache, and only then resolved under a fresh budget:
//!
//! ```text
//! relative/rooted: language rules -> default extensions -> package entry
//!                  -> expected artifact (skip probe) -> filesystem fallback
//! bare:            tsconfig paths -> alias rules -> language rules -> external
//! ```

pub mod classify;
pub mod probe;
pub mod stats;

pub use classify::NoiseFilter;
pub use stats::{CacheStats, FsIndexStats, ImportStats};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use crate::alias::AliasRules;
use crate::budget::{BudgetKind, BudgetPolicy, BudgetState, RuntimeSignals};
use crate::build_context::{ArtifactMatch, BuildContext, Classification, ClassifyContext};
use crate::cache::{
    CacheClass, PersistedCache, PersistedFileEntry, RESOLUTION_CACHE_VERSION, ResolutionCache,
    ResolutionCacheEntry, cache_key,
};
use crate::config::Settings;
use crate::config_resolvers::{
    PackageEntryResolver, TsConfigLoader, TsConfigProfile, dart_package_name, go_module_path,
    package_fingerprint, resolve_ts_paths,
};
use crate::error::{ResolveError, ResolveResult};
use crate::fingerprint::{Sha256Hash, fingerprint_parts};
use crate::fs_index::FsExistsIndex;
use crate::fs_meta::FsMemo;
use crate::graph::{
    GraphBuilder, ImportEdge, ImportNode, ImportWarning, NodeType, WarningOutcome,
    external_node_id, file_node_id,
};
use crate::language::{ImporterInfo, classify_importer, resolve_non_relative, resolve_relative};
use crate::lookup::{
    FileLookup, RepoEntry, collect_file_set, compatibility_fingerprint, file_set_fingerprint,
    root_hash,
};
use crate::paths::{
    SpecifierKind, escapes_root, has_extension, join_rel, normalize_import_specifier,
    normalize_rel_path, parse_package_name, sort_strings,
};
use crate::stages::StageTracker;
use crate::taxonomy::{GateEligibility, ReasonCode, ResolvedType, ResolverStage, gate};

use classify::{ReasonInputs, escapes_repository, select_reason_code};
use probe::{ProbeEnv, is_absolute_external};
use stats::bump;

/// Path convention recorded in the cache key
const PATH_CONVENTION: &str = "posix";

/// Inputs of one resolution run
pub struct ResolveRequest<'a> {
    pub root: &'a Path,
    pub entries: &'a [RepoEntry],
    /// Raw specifiers per importer path
    pub imports_by_file: &'a BTreeMap<String, Vec<String>>,
    pub settings: &'a Settings,
    /// Content hash per importer; importers without one are never cached
    pub file_hashes: Option<&'a HashMap<String, String>>,
    /// Previous persisted cache; `None` disables cross-run caching
    pub cache: Option<PersistedCache>,
    pub fs_index: Option<&'a FsExistsIndex>,
    pub fs_meta: Option<FsMemo>,
    pub runtime_signals: Option<&'a RuntimeSignals>,
    /// Epoch milliseconds used for TTLs and `generatedAt`
    pub now_ms: i64,
}

impl<'a> ResolveRequest<'a> {
    pub fn new(
        root: &'a Path,
        entries: &'a [RepoEntry],
        imports_by_file: &'a BTreeMap<String, Vec<String>>,
        settings: &'a Settings,
    ) -> Self {
        Self {
            root,
            entries,
            imports_by_file,
            settings,
            file_hashes: None,
            cache: None,
            fs_index: None,
            fs_meta: None,
            runtime_signals: None,
            now_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn with_file_hashes(mut self, hashes: &'a HashMap<String, String>) -> Self {
        self.file_hashes = Some(hashes);
        self
    }

    /// Enable cross-run caching, seeded from `cache`.
    pub fn with_cache(mut self, cache: PersistedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_fs_index(mut self, index: &'a FsExistsIndex) -> Self {
        self.fs_index = Some(index);
        self
    }

    pub fn with_fs_meta(mut self, memo: FsMemo) -> Self {
        self.fs_meta = Some(memo);
        self
    }

    pub fn with_runtime_signals(mut self, signals: &'a RuntimeSignals) -> Self {
        self.runtime_signals = Some(signals);
        self
    }

    pub fn at(mut self, now_ms: i64) -> Self {
        self.now_ms = now_ms;
        self
    }
}

/// Resolved relations of one importer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRelations {
    /// Raw specifiers, deduplicated and sorted
    pub imports: Vec<String>,
    /// In-repo targets
    pub import_links: Vec<String>,
    /// Raw specifiers classified external
    pub external_imports: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportGraph {
    pub generated_at: String,
    pub stats: ImportStats,
    pub nodes: Vec<ImportNode>,
    pub edges: Vec<ImportEdge>,
    pub warnings: Vec<ImportWarning>,
}

#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub graph: ImportGraph,
    pub file_relations: BTreeMap<String, FileRelations>,
    /// Present when caching was enabled
    pub cache_stats: Option<CacheStats>,
    /// Cache to persist for the next run
    pub cache: Option<PersistedCache>,
    /// Elapsed time per stage, when stage timings are enabled
    pub stage_timings_ms: Option<BTreeMap<&'static str, f64>>,
}

/// Update relations of importers already present in `existing`.
///
/// Importers missing from `existing` are ignored. Recorded imports are kept
/// unless empty; links and external imports are replaced.
pub fn apply_file_relations(
    existing: &mut BTreeMap<String, FileRelations>,
    computed: &BTreeMap<String, FileRelations>,
) {
    for (importer, relations) in existing.iter_mut() {
        let Some(fresh) = computed.get(importer) else {
            continue;
        };
        if relations.imports.is_empty() {
            relations.imports = fresh.imports.clone();
        }
        relations.import_links = fresh.import_links.clone();
        relations.external_imports = fresh.external_imports.clone();
    }
}

/// Parse an `{"importer": ["spec", ...]}` document.
///
/// Importer keys must be repository-relative; absolute or escaping keys are
/// rejected rather than silently dropped.
pub fn parse_imports_json(content: &str) -> ResolveResult<BTreeMap<String, Vec<String>>> {
    let imports: BTreeMap<String, Vec<String>> =
        serde_json::from_str(content).map_err(|e| ResolveError::InvalidInput {
            reason: format!("imports document is not an importer -> specifiers map: {e}"),
        })?;
    if let Some(bad) = imports.keys().find(|importer| {
        let rel = normalize_rel_path(importer);
        rel.is_empty() || rel.starts_with('/') || escapes_root(&rel)
    }) {
        return Err(ResolveError::InvalidInput {
            reason: format!("importer '{bad}' is not a repository-relative path"),
        });
    }
    Ok(imports)
}

/// Fingerprint of everything that changes resolution results wholesale.
fn resolution_cache_key(
    repo_hash: &Sha256Hash,
    package: Option<&Sha256Hash>,
    settings: &Settings,
    aliases: &AliasRules,
    build_context: &BuildContext,
    policy: &BudgetPolicy,
    file_set: &Sha256Hash,
) -> Sha256Hash {
    let resolver = &settings.resolver;
    fingerprint_parts(
        RESOLUTION_CACHE_VERSION,
        [
            format!("repo:{repo_hash}"),
            format!("package:{}", package.map(Sha256Hash::as_str).unwrap_or("none")),
            format!("mode:{}", resolver.mode),
            format!("paths:{PATH_CONVENTION}"),
            format!("tsPaths:{}", resolver.enable_ts_paths),
            format!("packageEntries:{}", resolver.enable_package_entries),
            format!("buildContext:{}", build_context.fingerprint()),
            format!(
                "aliases:{}",
                aliases.fingerprint().map(Sha256Hash::as_str).unwrap_or("none")
            ),
            format!("budgets:{}", policy.fingerprint()),
            format!(
                "expectedArtifacts:{}",
                build_context.expected_artifacts().fingerprint()
            ),
            format!("fileSet:{file_set}"),
        ],
    )
}

/// Per-specifier inputs shared by the resolution steps
#[derive(Clone, Copy)]
struct SpecContext<'s> {
    importer: &'s ImporterInfo,
    raw: &'s str,
    spec: &'s str,
    tsconfig: Option<&'s TsConfigProfile>,
}

/// Build-context verdict, evaluated at most once per specifier
#[derive(Default)]
struct PluginVerdict {
    evaluated: bool,
    classification: Option<Classification>,
}

/// Accumulators for one importer
struct FileState {
    persisted: Option<PersistedFileEntry>,
    tsconfig_fingerprint: Option<Sha256Hash>,
    next_specs: Option<BTreeMap<String, ResolutionCacheEntry>>,
    import_links: BTreeSet<String>,
    external_imports: BTreeSet<String>,
}

#[derive(Default)]
struct Tallies {
    resolved: usize,
    external: usize,
    unresolved: usize,
    actionable: usize,
    by_reason: BTreeMap<String, usize>,
    by_cause: BTreeMap<String, usize>,
    by_disposition: BTreeMap<String, usize>,
    budget_exhausted: usize,
    budget_by_type: BTreeMap<String, usize>,
}

struct Resolver<'a> {
    root: &'a Path,
    settings: &'a Settings,
    now_ms: i64,
    lookup: FileLookup,
    fs: FsMemo,
    fs_index: Option<&'a FsExistsIndex>,
    tsconfigs: TsConfigLoader,
    package_entries: PackageEntryResolver,
    aliases: AliasRules,
    build_context: BuildContext,
    noise: NoiseFilter,
    policy: BudgetPolicy,
    go_module: Option<String>,
    dart_package: Option<String>,
    memory: ResolutionCache,
    stages: StageTracker,
    graph: GraphBuilder,
    fs_index_stats: FsIndexStats,
    cache_stats: Option<CacheStats>,
    tallies: Tallies,
}

/// Resolve every import of every importer in `request`.
pub fn resolve_import_links(request: ResolveRequest<'_>) -> ResolveOutcome {
    let ResolveRequest {
        root,
        entries,
        imports_by_file,
        settings,
        file_hashes,
        mut cache,
        fs_index,
        fs_meta,
        runtime_signals,
        now_ms,
    } = request;

    let fs = fs_meta.unwrap_or_default();
    let file_set = collect_file_set(root, entries);
    let file_set_fp = file_set_fingerprint(&file_set);
    let repo_hash = root_hash(root);
    let mut cache_stats = cache.as_ref().map(|_| CacheStats {
        prefetched_paths: fs.prefetched_count(),
        ..CacheStats::default()
    });

    let compat = compatibility_fingerprint(&repo_hash, &file_set_fp);
    let cached_lookup = cache.as_ref().and_then(|c| c.lookup.as_ref());
    let reused_lookup = cached_lookup
        .filter(|snapshot| snapshot.file_set_fingerprint == file_set_fp)
        .and_then(|snapshot| FileLookup::from_snapshot(root, snapshot, &compat));
    if let Some(stats) = cache_stats.as_mut() {
        stats.lookup_reused = reused_lookup.is_some();
        stats.lookup_invalidated = cached_lookup.is_some() && reused_lookup.is_none();
    }
    let lookup = reused_lookup.unwrap_or_else(|| FileLookup::from_file_set(root, file_set));

    let aliases = AliasRules::from_config(&settings.resolver.aliases);
    let build_context = BuildContext::new(lookup.files(), settings.resolver.enable_build_context);
    let policy = BudgetPolicy::from_config(&settings.budgets, runtime_signals);
    let fs_index = fs_index.filter(|_| settings.fs_index.enabled);

    if let Some(persisted) = cache.as_mut() {
        let package_fp = package_fingerprint(root, &fs);
        let key = resolution_cache_key(
            &repo_hash,
            package_fp.as_ref(),
            settings,
            &aliases,
            &build_context,
            &policy,
            &file_set_fp,
        );
        let stats = cache_stats.get_or_insert_with(CacheStats::default);
        invalidate_stale(persisted, stats, package_fp.as_ref(), &file_set_fp, &key);
        persisted.package_fingerprint = package_fp;
        persisted.file_set_fingerprint = Some(file_set_fp.clone());
        persisted.cache_key = Some(key);
        persisted.lookup = Some(lookup.snapshot(&file_set_fp));
    }

    let mut resolver = Resolver {
        root,
        settings,
        now_ms,
        go_module: go_module_path(root, &fs),
        dart_package: dart_package_name(root, &fs),
        tsconfigs: TsConfigLoader::new(root),
        package_entries: PackageEntryResolver::new(),
        noise: NoiseFilter::from_config(&settings.resolver),
        memory: ResolutionCache::new(settings.limits.max_cache_entries),
        stages: StageTracker::new(settings.resolver.stage_timings),
        graph: GraphBuilder::new(&settings.limits),
        fs_index_stats: FsIndexStats::from_index(fs_index),
        tallies: Tallies::default(),
        lookup,
        fs,
        fs_index,
        aliases,
        build_context,
        policy,
        cache_stats,
    };

    let mut importers: Vec<(String, &Vec<String>)> = imports_by_file
        .iter()
        .map(|(importer, specs)| (normalize_rel_path(importer), specs))
        .filter(|(importer, _)| !importer.is_empty())
        .collect();
    importers.sort_by(|a, b| sort_strings(&a.0, &b.0));

    let mut file_relations = BTreeMap::new();
    for (importer_rel, raw_imports) in importers {
        let hash = file_hashes.and_then(|hashes| hashes.get(&importer_rel));
        let relations = resolver.resolve_file(&importer_rel, raw_imports, hash, cache.as_mut());
        file_relations.insert(importer_rel, relations);
    }

    let files = imports_by_file.len();
    let (graph, cache_stats, stage_timings_ms) = resolver.finish(files);
    ResolveOutcome {
        graph,
        file_relations,
        cache_stats,
        cache,
        stage_timings_ms,
    }
}

/// Drop persisted entries invalidated by a changed manifest, file set or
/// cache key. Each trigger is logged once.
fn invalidate_stale(
    cache: &mut PersistedCache,
    stats: &mut CacheStats,
    package_fp: Option<&Sha256Hash>,
    file_set_fp: &Sha256Hash,
    key: &Sha256Hash,
) {
    if !cache.is_compatible() {
        tracing::info!(
            "[imports] cache version {} is incompatible; starting fresh",
            cache.version
        );
        *cache = PersistedCache::new();
        return;
    }
    if cache.package_fingerprint.is_some() && cache.package_fingerprint.as_ref() != package_fp {
        tracing::info!("[imports] package manifest changed; invalidating import resolution cache");
        stats.package_invalidated = true;
    }
    if cache
        .file_set_fingerprint
        .as_ref()
        .is_some_and(|previous| previous != file_set_fp)
    {
        tracing::info!("[imports] file set changed; invalidating import resolution cache");
        stats.file_set_invalidated = true;
    }
    if cache.cache_key.as_ref().is_some_and(|previous| previous != key) {
        tracing::info!("[imports] resolver configuration changed; invalidating import resolution cache");
        stats.cache_key_invalidated = true;
    }
    if stats.package_invalidated || stats.file_set_invalidated || stats.cache_key_invalidated {
        cache.files.clear();
        cache.lookup = None;
    }
}

impl Resolver<'_> {
    fn probe_env(&self) -> ProbeEnv<'_> {
        ProbeEnv {
            root: self.root,
            fs: &self.fs,
            fs_index: self.fs_index,
        }
    }

    fn resolve_file(
        &mut self,
        importer_rel: &str,
        raw_imports: &[String],
        hash: Option<&String>,
        cache: Option<&mut PersistedCache>,
    ) -> FileRelations {
        let importer = classify_importer(importer_rel);
        self.graph.add_node(&file_node_id(importer_rel), NodeType::File);

        let mut raw_specs: Vec<&str> = raw_imports
            .iter()
            .map(String::as_str)
            .filter(|raw| !raw.trim().is_empty())
            .collect();
        raw_specs.sort_by(|a, b| sort_strings(a, b));
        raw_specs.dedup();

        // tsconfig is only consulted by bare specifiers and by emit checks on
        // JS/TS importers
        let needs_tsconfig = importer.ecosystem == crate::language::ImporterEcosystem::JsTs
            || raw_specs.iter().any(|raw| {
                let spec = normalize_import_specifier(raw);
                !spec.is_empty() && !SpecifierKind::classify(&spec).is_path_based()
            });
        let tsconfig = if needs_tsconfig {
            self.tsconfigs.resolve_for_importer(importer_rel, &self.fs)
        } else {
            None
        };
        let tsconfig_fingerprint = tsconfig.as_ref().map(|profile| profile.fingerprint.clone());

        let caching = cache.is_some();
        let mut file = FileState {
            persisted: None,
            tsconfig_fingerprint,
            next_specs: None,
            import_links: BTreeSet::new(),
            external_imports: BTreeSet::new(),
        };
        if let (Some(cache), Some(stats)) = (cache.as_deref(), self.cache_stats.as_mut()) {
            stats.files += 1;
            if let Some(hash) = hash {
                stats.files_hashed += 1;
                match cache.file_entry(importer_rel, hash, file.tsconfig_fingerprint.as_ref()) {
                    Some(entry) => {
                        stats.files_reused += 1;
                        file.persisted = Some(entry.clone());
                    }
                    None if cache.files.contains_key(importer_rel) => stats.files_invalidated += 1,
                    None => {}
                }
            }
        }
        if caching && hash.is_some() {
            file.next_specs = Some(BTreeMap::new());
        }

        for raw in raw_specs.iter().copied() {
            let spec = self
                .stages
                .with_stage(ResolverStage::Normalize, || normalize_import_specifier(raw));
            if spec.is_empty() {
                self.stages.mark_miss(ResolverStage::Normalize);
                continue;
            }
            self.stages.mark_hit(ResolverStage::Normalize);
            let ctx = SpecContext {
                importer: &importer,
                raw,
                spec: &spec,
                tsconfig: tsconfig.as_deref(),
            };
            self.resolve_spec(&ctx, &mut file);
        }

        if let (Some(cache), Some(hash), Some(specs)) = (cache, hash, file.next_specs) {
            cache.files.insert(
                importer_rel.to_string(),
                PersistedFileEntry {
                    hash: hash.clone(),
                    tsconfig_fingerprint: file.tsconfig_fingerprint,
                    specs,
                },
            );
        }

        FileRelations {
            imports: raw_specs.iter().map(|raw| raw.to_string()).collect(),
            import_links: file.import_links.into_iter().collect(),
            external_imports: file.external_imports.into_iter().collect(),
        }
    }

    fn persisted_entry_valid(&self, entry: &ResolutionCacheEntry) -> bool {
        if entry.resolved_type.is_in_repo() {
            return entry
                .resolved_path
                .as_deref()
                .is_some_and(|path| self.lookup.contains(path));
        }
        if entry.is_ephemeral() {
            return !entry.is_expired(self.now_ms)
                && self
                    .probe_env()
                    .ephemeral_still_valid(entry.fallback_path.as_deref(), &self.lookup);
        }
        true
    }

    fn resolve_spec(&mut self, ctx: &SpecContext<'_>, file: &mut FileState) {
        let importer_rel = ctx.importer.importer_rel.as_str();
        let mut budget = self.policy.new_state();
        let mut verdict = PluginVerdict::default();

        let persisted = file
            .persisted
            .as_ref()
            .and_then(|entry| entry.specs.get(ctx.spec))
            .filter(|entry| self.persisted_entry_valid(entry))
            .cloned();

        let (mut entry, memory_key) = match persisted {
            Some(entry) => {
                if let Some(stats) = self.cache_stats.as_mut() {
                    stats.specs += 1;
                    stats.specs_reused += 1;
                }
                (entry, None)
            }
            None => {
                if let Some(stats) = self.cache_stats.as_mut() {
                    stats.specs += 1;
                    stats.specs_computed += 1;
                }
                let key = cache_key(
                    importer_rel,
                    ctx.spec,
                    file.tsconfig_fingerprint.as_ref().map(Sha256Hash::as_str),
                );
                let cached = self.memory.get(&key, self.now_ms);
                let cached = match cached {
                    Some(entry) if entry.is_ephemeral() => {
                        let valid = self
                            .probe_env()
                            .ephemeral_still_valid(entry.fallback_path.as_deref(), &self.lookup);
                        if !valid {
                            self.memory.remove(&key);
                        }
                        valid.then_some(entry)
                    }
                    other => other,
                };
                let entry = match cached {
                    Some(entry) => entry,
                    None => {
                        let mut entry = self.compute(ctx, &mut budget, &mut verdict);
                        entry.expires_at = match entry.resolved_type {
                            ResolvedType::Unresolved => {
                                Some(self.now_ms + self.settings.limits.negative_ttl_ms as i64)
                            }
                            _ if entry.is_ephemeral() => Some(
                                self.now_ms + self.settings.limits.ephemeral_external_ttl_ms as i64,
                            ),
                            _ => None,
                        };
                        self.memory.insert(key.clone(), entry.clone());
                        entry
                    }
                };
                (entry, Some(key))
            }
        };

        let mut edge = ImportEdge::new(file_node_id(importer_rel), ctx.raw, entry.resolved_type);
        edge.resolved_path = entry.resolved_path.clone();
        edge.fallback_path = entry.fallback_path.clone();
        edge.package_name = entry.package_name.clone();
        edge.tsconfig_path = entry.tsconfig_path.clone();
        edge.ts_path_pattern = entry.ts_path_pattern.clone();

        let mut include_edge = true;
        match (entry.resolved_type, entry.resolved_path.clone()) {
            (resolved_type, Some(path)) if resolved_type.is_in_repo() => {
                self.tallies.resolved += 1;
                let target = file_node_id(&path);
                self.graph.add_node(&target, NodeType::File);
                edge.to = Some(target);
                file.import_links.insert(path);
            }
            (ResolvedType::External, _) => {
                self.tallies.external += 1;
                let target = external_node_id(ctx.spec);
                self.graph.add_node(&target, NodeType::External);
                edge.to = Some(target);
                file.external_imports.insert(ctx.raw.to_string());
            }
            _ => {
                if entry.resolved_type != ResolvedType::Unresolved {
                    // in-repo type without a path reads as unresolved
                    entry = ResolutionCacheEntry::new(ResolvedType::Unresolved);
                    edge = ImportEdge::new(file_node_id(importer_rel), ctx.raw, ResolvedType::Unresolved);
                }
                include_edge =
                    self.record_unresolved(ctx, &mut entry, &budget, &mut verdict, memory_key.as_deref());
                if let Some(code) = entry.unresolved_reason_code {
                    edge = edge.with_decision(&code.decision());
                }
            }
        }

        if include_edge {
            self.graph.add_edge(edge);
        }
        if let Some(next) = file.next_specs.as_mut() {
            next.insert(ctx.spec.to_string(), entry);
        }
    }

    /// Full resolution under `budget`.
    fn compute(
        &mut self,
        ctx: &SpecContext<'_>,
        budget: &mut BudgetState,
        verdict: &mut PluginVerdict,
    ) -> ResolutionCacheEntry {
        if SpecifierKind::classify(ctx.spec).is_path_based() {
            self.compute_relative(ctx, budget, verdict)
        } else {
            self.compute_bare(ctx)
        }
    }

    fn compute_relative(
        &mut self,
        ctx: &SpecContext<'_>,
        budget: &mut BudgetState,
        verdict: &mut PluginVerdict,
    ) -> ResolutionCacheEntry {
        let base = match ctx.spec.strip_prefix('/') {
            Some(rooted) => normalize_rel_path(rooted),
            None => join_rel(&ctx.importer.importer_dir, ctx.spec),
        };

        let lookup = &self.lookup;
        let language = self.stages.with_stage(ResolverStage::LanguageResolver, || {
            resolve_relative(lookup, ctx.spec, &base, ctx.importer)
        });
        self.stages
            .mark(ResolverStage::LanguageResolver, language.is_some());

        let found = language
            .or_else(|| self.lookup.resolve_candidate(&base))
            .or_else(|| {
                if has_extension(&base) || !self.settings.resolver.enable_package_entries {
                    return None;
                }
                self.package_entries.resolve_dir(&base, &self.lookup, &self.fs)
            });
        if let Some(path) = found {
            return ResolutionCacheEntry::resolved(ResolvedType::Relative, path);
        }

        if self
            .generated_match(ctx, verdict)
            .is_some_and(|m| m.is_index_match())
        {
            return ResolutionCacheEntry::new(ResolvedType::Unresolved);
        }

        let env = ProbeEnv {
            root: self.root,
            fs: &self.fs,
            fs_index: self.fs_index,
        };
        let lookup = &self.lookup;
        let index_stats = &mut self.fs_index_stats;
        let (entry, hit) = self.stages.with_stage(ResolverStage::FilesystemProbe, || {
            if is_absolute_external(ctx.spec, ctx.importer, lookup) {
                return (ResolutionCacheEntry::new(ResolvedType::External), false);
            }
            match env.find_non_indexed(ctx.spec, ctx.importer, budget, index_stats) {
                Some(path) => {
                    let mut entry = ResolutionCacheEntry::new(ResolvedType::External);
                    entry.fallback_path = Some(path);
                    entry.cache_class = Some(CacheClass::EphemeralExternal);
                    (entry, true)
                }
                None => (ResolutionCacheEntry::new(ResolvedType::Unresolved), false),
            }
        });
        self.stages.mark(ResolverStage::FilesystemProbe, hit);
        if budget.is_exhausted() {
            self.stages
                .mark_budget_exhausted(ResolverStage::FilesystemProbe);
        }
        entry
    }

    fn compute_bare(&mut self, ctx: &SpecContext<'_>) -> ResolutionCacheEntry {
        if self.settings.resolver.enable_ts_paths {
            if let Some(hit) = ctx
                .tsconfig
                .and_then(|profile| resolve_ts_paths(ctx.spec, profile, &self.lookup))
            {
                let mut entry = ResolutionCacheEntry::resolved(ResolvedType::TsPath, hit.resolved_path);
                entry.ts_path_pattern = hit.pattern;
                entry.tsconfig_path = Some(hit.tsconfig_rel);
                return entry;
            }
        }

        let lookup = &self.lookup;
        let fs = &self.fs;
        let package_entries = &mut self.package_entries;
        let entries_enabled = self.settings.resolver.enable_package_entries;
        let aliased = self.aliases.resolve(ctx.spec, |candidate| {
            lookup.resolve_candidate(candidate).or_else(|| {
                if entries_enabled && !has_extension(candidate) {
                    package_entries.resolve_dir(candidate, lookup, fs)
                } else {
                    None
                }
            })
        });
        if let Some(path) = aliased {
            return ResolutionCacheEntry::resolved(ResolvedType::PluginAlias, path);
        }

        let go_module = self.go_module.as_deref();
        let dart_package = self.dart_package.as_deref();
        let language = self.stages.with_stage(ResolverStage::LanguageResolver, || {
            resolve_non_relative(lookup, ctx.spec, ctx.importer, go_module, dart_package)
        });
        self.stages
            .mark(ResolverStage::LanguageResolver, language.is_some());
        if let Some(hit) = language {
            return ResolutionCacheEntry::resolved(hit.resolved_type, hit.resolved_path);
        }

        let mut entry = ResolutionCacheEntry::new(ResolvedType::External);
        entry.package_name = parse_package_name(ctx.spec);
        entry
    }

    fn classify_plugins<'v>(
        &mut self,
        ctx: &SpecContext<'_>,
        verdict: &'v mut PluginVerdict,
    ) -> Option<&'v Classification> {
        if !verdict.evaluated {
            verdict.evaluated = true;
            if self.build_context.is_enabled() {
                let classify_ctx = ClassifyContext {
                    importer: ctx.importer,
                    spec: ctx.spec,
                    raw_spec: ctx.raw,
                    tsconfig: ctx.tsconfig,
                    lookup: &self.lookup,
                };
                let build_context = &self.build_context;
                let hit = self
                    .stages
                    .with_stage(ResolverStage::BuildSystemResolver, || {
                        build_context.classify_unresolved(&classify_ctx)
                    });
                self.stages
                    .mark(ResolverStage::BuildSystemResolver, hit.is_some());
                verdict.classification = hit;
            }
        }
        verdict.classification.as_ref()
    }

    /// Plugin match first, then the expected-artifacts index.
    fn generated_match(
        &mut self,
        ctx: &SpecContext<'_>,
        verdict: &mut PluginVerdict,
    ) -> Option<ArtifactMatch> {
        if let Some(found) = self
            .classify_plugins(ctx, verdict)
            .and_then(|c| c.generated_match.clone())
        {
            return Some(found);
        }
        if !self.build_context.is_enabled() {
            return None;
        }
        let found = self
            .build_context
            .expected_artifacts()
            .match_specifier(&ctx.importer.importer_rel, ctx.spec);
        found.matched.then_some(found)
    }

    /// Assign the reason code and warning. Returns whether the edge is kept.
    fn record_unresolved(
        &mut self,
        ctx: &SpecContext<'_>,
        entry: &mut ResolutionCacheEntry,
        budget: &BudgetState,
        verdict: &mut PluginVerdict,
        memory_key: Option<&str>,
    ) -> bool {
        let noise = self.noise.is_noise(ctx.spec, ctx.raw, ctx.importer);
        let code = match entry.unresolved_reason_code {
            Some(code) if !noise => code,
            _ => {
                let plugin = if noise || escapes_repository(ctx.spec, ctx.importer) {
                    None
                } else {
                    self.classify_plugins(ctx, verdict).map(|c| c.reason_code)
                };
                select_reason_code(ReasonInputs {
                    spec: ctx.spec,
                    importer: ctx.importer,
                    noise,
                    plugin,
                    budget_exhausted: budget.is_exhausted(),
                })
            }
        };
        let decision = self
            .stages
            .with_stage(ResolverStage::Classify, || code.decision());
        self.stages.mark_hit(ResolverStage::Classify);

        let mut exhausted: Vec<BudgetKind> = Vec::new();
        if code == ReasonCode::ResolverBudgetExhausted {
            self.tallies.budget_exhausted += 1;
            exhausted = if budget.is_exhausted() {
                budget.exhausted_types()
            } else {
                entry.unresolved_budget_exhausted_types.clone()
            };
            for kind in &exhausted {
                bump(&mut self.tallies.budget_by_type, kind.as_str());
            }
        }

        self.tallies.unresolved += 1;
        if decision.disposition.is_actionable() {
            self.tallies.actionable += 1;
        }
        bump(&mut self.tallies.by_reason, code.as_str());
        bump(&mut self.tallies.by_cause, decision.failure_cause.as_str());
        bump(&mut self.tallies.by_disposition, decision.disposition.as_str());

        if let Some(key) = memory_key {
            self.memory.record_unresolved(key, code, &exhausted);
        }
        entry.unresolved_reason_code = Some(code);
        entry.unresolved_budget_exhausted_types = exhausted;

        if noise {
            self.graph.suppress_warning();
            return false;
        }
        let warning = ImportWarning::unresolved(&ctx.importer.importer_rel, ctx.raw, &decision);
        !matches!(
            self.graph.add_warning(ctx.spec, warning),
            WarningOutcome::Duplicate
        )
    }

    fn finish(
        self,
        files: usize,
    ) -> (ImportGraph, Option<CacheStats>, Option<BTreeMap<&'static str, f64>>) {
        let limits = &self.settings.limits;
        let parts = self.graph.finish();
        let gate = GateEligibility::new(&self.settings.gate).aggregate(
            parts
                .warnings
                .iter()
                .map(|w| (w.importer.as_str(), w.disposition)),
        );
        let counters = parts.counters;
        let tallies = self.tallies;

        if counters.warning_suppressed > 0 {
            tracing::info!(
                "[imports] suppressed {} import resolution warnings",
                counters.warning_suppressed
            );
        }
        tracing::debug!(
            "[imports] {} files: {} resolved, {} external, {} unresolved",
            files,
            tallies.resolved,
            tallies.external,
            tallies.unresolved
        );

        let stats = ImportStats {
            files,
            nodes: parts.nodes.len(),
            edges: counters.edge_total,
            resolved: tallies.resolved,
            external: tallies.external,
            unresolved: tallies.unresolved,
            unresolved_actionable: tallies.actionable,
            unresolved_suppressed: counters.warning_suppressed,
            unresolved_actionable_rate: gate::rate(tallies.actionable, tallies.unresolved),
            unresolved_by_reason_code: tallies.by_reason,
            unresolved_by_failure_cause: tallies.by_cause,
            unresolved_by_disposition: tallies.by_disposition,
            unresolved_budget_exhausted: tallies.budget_exhausted,
            unresolved_budget_exhausted_by_type: tallies.budget_by_type,
            gate,
            truncated_edges: counters.truncated_edges,
            truncated_nodes: counters.truncated_nodes,
            max_edges: limits.max_edges,
            max_nodes: limits.max_nodes,
            warning_suppressed: counters.warning_suppressed,
            resolver_fs_exists_index: self.fs_index_stats,
            resolver_budget_policy: self.policy,
            resolver_pipeline_stages: self.stages.snapshot(),
        };
        let generated_at = DateTime::<Utc>::from_timestamp_millis(self.now_ms)
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let graph = ImportGraph {
            generated_at,
            stats,
            nodes: parts.nodes,
            edges: parts.edges,
            warnings: parts.warnings,
        };
        (graph, self.cache_stats, self.stages.timings_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        entries: Vec<RepoEntry>,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            let mut entries = Vec::new();
            for (rel, content) in files {
                let path = dir.path().join(rel);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, content).unwrap();
                entries.push(RepoEntry::with_rel(path, *rel));
            }
            Self { dir, entries }
        }

        fn run(&self, imports: &BTreeMap<String, Vec<String>>, settings: &Settings) -> ResolveOutcome {
            resolve_import_links(
                ResolveRequest::new(self.dir.path(), &self.entries, imports, settings).at(1_700_000_000_000),
            )
        }
    }

    fn imports(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
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

    #[test]
    fn resolves_relative_external_and_unresolved() {
        let fixture = Fixture::new(&[("src/app.ts", ""), ("src/lib.ts", "")]);
        let imports = imports(&[("src/app.ts", &["./lib", "react", "./missing", "./a^b", "./lib"])]);
        let outcome = fixture.run(&imports, &Settings::default());
        let stats = &outcome.graph.stats;

        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.external, 1);
        assert_eq!(stats.unresolved, 2);
        assert_eq!(stats.unresolved_by_reason_code["IMP_U_MISSING_FILE_RELATIVE"], 1);
        assert_eq!(stats.unresolved_by_reason_code["IMP_U_PARSER_NOISE_SUPPRESSED"], 1);
        assert_eq!(stats.unresolved_actionable, 1);
        assert_eq!(stats.warning_suppressed, 1);
        assert_eq!(stats.edges, 3);
        assert_eq!(outcome.graph.warnings.len(), 1);
        assert_eq!(outcome.graph.warnings[0].specifier, "./missing");

        let relations = &outcome.file_relations["src/app.ts"];
        assert_eq!(relations.import_links, vec!["src/lib.ts"]);
        assert_eq!(relations.external_imports, vec!["react"]);
        assert_eq!(relations.imports.len(), 4);

        let ids: Vec<&str> = outcome.graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["ext:react", "file:src/app.ts", "file:src/lib.ts"]);
        assert!(outcome.cache.is_none());
        assert!(outcome.cache_stats.is_none());
    }

    #[test]
    fn on_disk_files_outside_the_index_are_ephemeral_externals() {
        let fixture = Fixture::new(&[("src/app.ts", "")]);
        fs::write(fixture.dir.path().join("src/extra.js"), "").unwrap();
        let imports = imports(&[("src/app.ts", &["./extra"])]);
        let outcome = fixture.run(&imports, &Settings::default());
        let edge = &outcome.graph.edges[0];
        assert_eq!(edge.resolved_type, ResolvedType::External);
        assert_eq!(edge.resolved_path, None);
        assert_eq!(edge.fallback_path.as_deref(), Some("src/extra.js"));
        assert_eq!(outcome.graph.stats.resolver_pipeline_stages["filesystem_probe"].hits, 1);
    }

    #[test]
    fn escaping_specifiers_are_path_normalization() {
        let fixture = Fixture::new(&[("a.ts", "")]);
        let imports = imports(&[("a.ts", &["../outside"])]);
        let outcome = fixture.run(&imports, &Settings::default());
        let warning = &outcome.graph.warnings[0];
        assert_eq!(warning.reason_code, ReasonCode::PathNormalization);
        assert_eq!(outcome.graph.stats.unresolved_actionable, 0);
    }

    #[test]
    fn persisted_cache_is_reused_when_nothing_changed() {
        let fixture = Fixture::new(&[("src/app.ts", ""), ("src/lib.ts", "")]);
        let imports = imports(&[("src/app.ts", &["./lib", "./gone"])]);
        let settings = Settings::default();
        let hashes: HashMap<String, String> =
            [("src/app.ts".to_string(), "h1".to_string())].into_iter().collect();

        let first = resolve_import_links(
            ResolveRequest::new(fixture.dir.path(), &fixture.entries, &imports, &settings)
                .with_file_hashes(&hashes)
                .with_cache(PersistedCache::new())
                .at(1),
        );
        let cache = first.cache.clone().unwrap();
        assert_eq!(cache.spec_count(), 2);

        let second = resolve_import_links(
            ResolveRequest::new(fixture.dir.path(), &fixture.entries, &imports, &settings)
                .with_file_hashes(&hashes)
                .with_cache(cache)
                .at(1),
        );
        let stats = second.cache_stats.unwrap();
        assert_eq!(stats.files_reused, 1);
        assert_eq!(stats.specs_reused, stats.specs);
        assert!(stats.lookup_reused);
        assert!(!stats.file_set_invalidated);
        assert_eq!(first.graph.edges, second.graph.edges);
        assert_eq!(first.graph.warnings, second.graph.warnings);
        assert_eq!(
            second.graph.stats.resolver_pipeline_stages["language_resolver"].attempts,
            0
        );
    }

    #[test]
    fn imports_document_must_use_relative_importers() {
        let parsed = parse_imports_json(r#"{"src/a.ts": ["./b"], "c.py": []}"#).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["src/a.ts"], vec!["./b"]);

        for bad in [r#"{"../x.ts": []}"#, r#"{"/abs/x.ts": []}"#, r#"["./b"]"#] {
            assert!(matches!(
                parse_imports_json(bad),
                Err(ResolveError::InvalidInput { .. })
            ));
        }
    }

    #[test]
    fn apply_relations_touches_only_known_importers() {
        let mut existing = BTreeMap::new();
        existing.insert("a.ts".to_string(), FileRelations::default());
        let mut computed = BTreeMap::new();
        computed.insert(
            "a.ts".to_string(),
            FileRelations {
                imports: vec!["./b".into()],
                import_links: vec!["b.ts".into()],
                external_imports: Vec::new(),
            },
        );
        computed.insert("z.ts".to_string(), FileRelations::default());

        apply_file_relations(&mut existing, &computed);
        assert_eq!(existing.len(), 1);
        assert_eq!(existing["a.ts"].imports, vec!["./b"]);
        assert_eq!(existing["a.ts"].import_links, vec!["b.ts"]);
    }
}
