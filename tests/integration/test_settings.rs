use crate::common::{TestRepo, imports};
use importgraph::{RepoWalker, ResolveError, Settings};
use tempfile::TempDir;

#[test]
fn test_init_config_file_round_trips_defaults() {
    let dir = TempDir::new().unwrap();
    let path = Settings::init_config_file(dir.path(), false).unwrap();
    assert!(path.ends_with(".importgraph/settings.toml"));

    let loaded = Settings::load_from(&path).unwrap();
    let defaults = Settings::default();
    assert_eq!(loaded.resolver.mode, defaults.resolver.mode);
    assert_eq!(loaded.limits.max_edges, defaults.limits.max_edges);
    assert_eq!(loaded.fs_index.skip_dirs, defaults.fs_index.skip_dirs);

    let again = Settings::init_config_file(dir.path(), false);
    assert!(matches!(again, Err(ResolveError::ConfigError { .. })));
    assert!(Settings::init_config_file(dir.path(), true).is_ok());
}

#[test]
fn test_toml_overrides_flow_into_resolution() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(
        &path,
        r#"
[resolver]
noise_ignore = ["./legacy-shim"]

[[resolver.aliases]]
prefix = "@/"
target = "src/"

[limits]
max_edges = 10
"#,
    )
    .unwrap();
    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.limits.max_edges, 10);

    let repo = TestRepo::with_files(&[("src/app.ts", ""), ("src/util.ts", "")]);
    let outcome = repo.resolve(
        &imports(&[("src/app.ts", &["@/util", "./legacy-shim"])]),
        &settings,
    );
    assert_eq!(
        outcome.file_relations["src/app.ts"].import_links,
        vec!["src/util.ts"]
    );
    assert_eq!(
        outcome.graph.stats.unresolved_by_reason_code["IMP_U_PARSER_NOISE_SUPPRESSED"],
        1
    );
    assert!(outcome.graph.warnings.is_empty());
}

#[test]
fn test_walker_output_feeds_the_resolver() {
    let mut repo = TestRepo::new();
    repo.add_file("src/app.ts", "");
    repo.add_file("src/lib.ts", "");
    repo.add_file("node_modules/react/index.js", "");
    let settings = Settings::default();

    let walked = RepoWalker::new(&settings).walk(repo.root()).unwrap();
    let rels: Vec<&str> = walked.iter().filter_map(|e| e.rel.as_deref()).collect();
    assert_eq!(rels, vec!["src/app.ts", "src/lib.ts"]);
}
