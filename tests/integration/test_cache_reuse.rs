use crate::common::{NOW_MS, TestRepo, imports};
use importgraph::fingerprint::compute_file_sha;
use importgraph::{
    CachePersistence, FsExistsIndex, PersistedCache, ResolveOutcome, ResolveRequest, Settings,
    resolve_import_links,
};
use std::collections::{BTreeMap, HashMap};
use tempfile::TempDir;

fn hashes(repo: &TestRepo, importers: &BTreeMap<String, Vec<String>>) -> HashMap<String, String> {
    importers
        .keys()
        .map(|rel| {
            let hash = compute_file_sha(&repo.root().join(rel)).unwrap();
            (rel.clone(), hash.0)
        })
        .collect()
}

fn run_cached(
    repo: &TestRepo,
    imports: &BTreeMap<String, Vec<String>>,
    cache: PersistedCache,
) -> ResolveOutcome {
    let settings = Settings::default();
    let entries = repo.entries();
    let hashes = hashes(repo, imports);
    resolve_import_links(
        ResolveRequest::new(repo.root(), &entries, imports, &settings)
            .with_file_hashes(&hashes)
            .with_cache(cache)
            .at(NOW_MS),
    )
}

fn sample_repo() -> (TestRepo, BTreeMap<String, Vec<String>>) {
    let repo = TestRepo::with_files(&[
        ("package.json", r#"{"name":"app"}"#),
        ("src/app.ts", "import './lib'; import 'react';"),
        ("src/lib.ts", "export {}"),
        ("src/util/index.ts", "export {}"),
    ]);
    let imports = imports(&[
        ("src/app.ts", &["./lib", "react", "./util", "./missing"]),
        ("src/lib.ts", &["./util/index"]),
    ]);
    (repo, imports)
}

#[test]
fn test_identical_inputs_produce_identical_json() {
    let (repo, imports) = sample_repo();
    let settings = Settings::default();
    let first = serde_json::to_string(&repo.resolve(&imports, &settings).graph).unwrap();
    let second = serde_json::to_string(&repo.resolve(&imports, &settings).graph).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unchanged_repository_reuses_every_specifier() {
    let (repo, imports) = sample_repo();
    let cache_dir = TempDir::new().unwrap();
    let persistence = CachePersistence::new(cache_dir.path());

    let first = run_cached(&repo, &imports, PersistedCache::new());
    persistence.save(first.cache.as_ref().unwrap()).unwrap();
    let stats = first.cache_stats.as_ref().unwrap();
    assert_eq!(stats.specs_reused, 0);
    assert_eq!(stats.specs_computed, 5);

    let loaded = persistence.load_or_discard().expect("cache should load");
    let second = run_cached(&repo, &imports, loaded);
    let stats = second.cache_stats.as_ref().unwrap();
    assert_eq!(stats.files_reused, 2);
    assert_eq!(stats.specs_reused, 5);
    assert_eq!(stats.specs_computed, 0);
    assert!(stats.lookup_reused);
    assert!(!stats.package_invalidated);
    assert_eq!(first.graph.edges, second.graph.edges);
    assert_eq!(first.graph.warnings, second.graph.warnings);
}

#[test]
fn test_changed_importer_content_recomputes_only_that_file() {
    let (mut repo, imports) = sample_repo();
    let first = run_cached(&repo, &imports, PersistedCache::new());

    repo.add_file("src/lib.ts", "export const changed = true;");
    let second = run_cached(&repo, &imports, first.cache.unwrap());
    let stats = second.cache_stats.unwrap();
    assert_eq!(stats.files_reused, 1);
    assert_eq!(stats.files_invalidated, 1);
    assert_eq!(stats.specs_computed, 1);
    assert_eq!(stats.specs_reused, 4);
}

#[test]
fn test_package_manifest_change_invalidates_cache() {
    let (mut repo, imports) = sample_repo();
    let first = run_cached(&repo, &imports, PersistedCache::new());

    repo.add_file("package.json", r#"{"name":"app","dependencies":{"react":"18"}}"#);
    let second = run_cached(&repo, &imports, first.cache.unwrap());
    let stats = second.cache_stats.unwrap();
    assert!(stats.package_invalidated);
    assert!(!stats.file_set_invalidated);
    assert_eq!(stats.specs_reused, 0);
    assert_eq!(first.graph.edges, second.graph.edges);
}

#[test]
fn test_new_file_invalidates_and_resolves_previous_miss() {
    let (mut repo, imports) = sample_repo();
    let first = run_cached(&repo, &imports, PersistedCache::new());
    assert_eq!(first.graph.stats.unresolved, 1);

    repo.add_file("src/missing.ts", "");
    let second = run_cached(&repo, &imports, first.cache.unwrap());
    let stats = second.cache_stats.as_ref().unwrap();
    assert!(stats.file_set_invalidated);
    assert!(stats.lookup_invalidated);
    assert_eq!(second.graph.stats.unresolved, 0);
    assert!(
        second.file_relations["src/app.ts"]
            .import_links
            .contains(&"src/missing.ts".to_string())
    );
}

#[test]
fn test_incompatible_cache_file_is_discarded() {
    let cache_dir = TempDir::new().unwrap();
    let persistence = CachePersistence::new(cache_dir.path());
    std::fs::write(persistence.cache_file(), "{ not json").unwrap();
    assert!(persistence.load_or_discard().is_none());

    persistence.save(&PersistedCache::new()).unwrap();
    assert!(persistence.load_or_discard().is_some());
    persistence.clear().unwrap();
    assert!(persistence.load_or_discard().is_none());
}

#[test]
fn test_fs_index_answers_probes_for_unindexed_files() {
    let (repo, _) = sample_repo();
    repo.write_unindexed("src/generated.js", "");
    let imports = imports(&[("src/app.ts", &["./generated"])]);
    let settings = Settings::default();
    let index = FsExistsIndex::build(repo.root(), &settings.fs_index);
    let entries = repo.entries();

    let outcome = resolve_import_links(
        ResolveRequest::new(repo.root(), &entries, &imports, &settings)
            .with_fs_index(&index)
            .at(NOW_MS),
    );
    let fs_stats = &outcome.graph.stats.resolver_fs_exists_index;
    assert!(fs_stats.enabled);
    assert!(fs_stats.complete);
    assert_eq!(fs_stats.exact_hits, 1);
    assert_eq!(outcome.graph.stats.external, 1);
    let edge = &outcome.graph.edges[0];
    assert_eq!(edge.resolved_path, None);
    assert_eq!(edge.fallback_path.as_deref(), Some("src/generated.js"));
}

#[test]
fn test_unindexed_files_are_reused_until_they_disappear() {
    let repo = TestRepo::with_files(&[("src/app.ts", ""), ("src/lib.ts", "")]);
    repo.write_unindexed("src/extra.js", "");
    let imports = imports(&[("src/app.ts", &["./lib", "./extra"])]);

    let first = run_cached(&repo, &imports, PersistedCache::new());
    let cache = first.cache.clone().unwrap();
    assert_eq!(cache.spec_count(), 2);
    assert_eq!(first.graph.stats.external, 1);

    let second = run_cached(&repo, &imports, cache);
    let stats = second.cache_stats.as_ref().unwrap();
    assert_eq!(stats.specs, 2);
    assert_eq!(stats.specs_reused, 2);
    assert_eq!(stats.specs_computed, 0);
    assert_eq!(first.graph.edges, second.graph.edges);

    std::fs::remove_file(repo.root().join("src/extra.js")).unwrap();
    let third = run_cached(&repo, &imports, second.cache.clone().unwrap());
    let stats = third.cache_stats.as_ref().unwrap();
    assert_eq!(stats.specs_reused, 1);
    assert_eq!(stats.specs_computed, 1);
    assert_eq!(third.graph.stats.external, 0);
    assert_eq!(third.graph.stats.unresolved, 1);
}
