use crate::common::{TestRepo, imports};
use importgraph::taxonomy::{Disposition, FailureCause, ResolutionState};
use importgraph::{ReasonCode, ResolvedType, Settings};

#[test]
fn test_typescript_relative_import_resolves_with_extension() {
    let repo = TestRepo::with_files(&[
        ("src/app.ts", "import { x } from './lib';"),
        ("src/lib.ts", "export const x = 1;"),
    ]);
    let outcome = repo.resolve(&imports(&[("src/app.ts", &["./lib"])]), &Settings::default());

    let edge = &outcome.graph.edges[0];
    assert_eq!(edge.from, "file:src/app.ts");
    assert_eq!(edge.to.as_deref(), Some("file:src/lib.ts"));
    assert_eq!(edge.resolution_state, ResolutionState::Resolved);
    assert_eq!(edge.resolved_type, ResolvedType::Relative);
    assert_eq!(edge.resolved_path.as_deref(), Some("src/lib.ts"));
    assert!(edge.reason_code.is_none());
    assert!(outcome.graph.warnings.is_empty());
}

#[test]
fn test_python_dotted_relative_import() {
    let repo = TestRepo::with_files(&[("pkg/main.py", ""), ("pkg/sibling.py", "")]);
    let outcome = repo.resolve(&imports(&[("pkg/main.py", &[".sibling"])]), &Settings::default());

    assert_eq!(outcome.graph.stats.resolved, 1);
    assert_eq!(
        outcome.file_relations["pkg/main.py"].import_links,
        vec!["pkg/sibling.py"]
    );
}

#[test]
fn test_missing_generated_output_is_not_actionable() {
    let repo = TestRepo::with_files(&[("api/schema.proto", ""), ("api/client.ts", "")]);
    let outcome = repo.resolve(
        &imports(&[("api/client.ts", &["./generated/schema.pb.ts"])]),
        &Settings::default(),
    );

    let warning = &outcome.graph.warnings[0];
    assert_eq!(warning.reason_code, ReasonCode::GeneratedExpectedMissing);
    assert_eq!(warning.failure_cause, FailureCause::GeneratedExpectedMissing);
    assert_eq!(warning.disposition, Disposition::SuppressGate);
    assert_eq!(outcome.graph.stats.unresolved_actionable, 0);
    assert_eq!(
        outcome.graph.stats.unresolved_by_reason_code["IMP_U_GENERATED_EXPECTED_MISSING"],
        1
    );
}

#[test]
fn test_build_context_disabled_falls_back_to_missing_file() {
    let repo = TestRepo::with_files(&[("api/schema.proto", ""), ("api/client.ts", "")]);
    let mut settings = Settings::default();
    settings.resolver.enable_build_context = false;
    let outcome = repo.resolve(
        &imports(&[("api/client.ts", &["./generated/schema.pb.ts"])]),
        &settings,
    );
    assert_eq!(
        outcome.graph.warnings[0].reason_code,
        ReasonCode::MissingFileRelative
    );
}

#[test]
fn test_bare_specifiers_become_external_nodes() {
    let repo = TestRepo::with_files(&[("web/index.js", "")]);
    let outcome = repo.resolve(
        &imports(&[("web/index.js", &["lodash/fp", "@scope/pkg/sub"])]),
        &Settings::default(),
    );

    assert_eq!(outcome.graph.stats.external, 2);
    let externals = &outcome.file_relations["web/index.js"].external_imports;
    assert!(externals.contains(&"lodash/fp".to_string()));
    assert!(externals.contains(&"@scope/pkg/sub".to_string()));
    assert!(
        outcome
            .graph
            .edges
            .iter()
            .all(|e| e.resolved_type == ResolvedType::External)
    );
}

#[test]
fn test_budget_exhaustion_terminates_probing() {
    let repo = TestRepo::with_files(&[("src/app.ts", "")]);
    let mut settings = Settings::default();
    settings.budgets.max_fallback_candidates = Some(2);
    settings.budgets.adaptive = Some(false);
    let outcome = repo.resolve(&imports(&[("src/app.ts", &["./nowhere"])]), &settings);

    let stats = &outcome.graph.stats;
    assert_eq!(stats.unresolved, 1);
    assert_eq!(stats.unresolved_budget_exhausted, 1);
    assert_eq!(
        stats.unresolved_by_reason_code["IMP_U_RESOLVER_BUDGET_EXHAUSTED"],
        1
    );
    assert_eq!(
        stats.unresolved_budget_exhausted_by_type["fallback_candidates"],
        1
    );
    assert_eq!(stats.unresolved_actionable, 0);
}

#[test]
fn test_every_unresolved_edge_carries_full_taxonomy() {
    let repo = TestRepo::with_files(&[
        ("src/app.ts", ""),
        ("tests/fixtures/case.ts", ""),
    ]);
    let outcome = repo.resolve(
        &imports(&[
            ("src/app.ts", &["./missing", "../../../escape", "./lib"]),
            ("tests/fixtures/case.ts", &["./absent"]),
        ]),
        &Settings::default(),
    );

    let unresolved: Vec<_> = outcome
        .graph
        .edges
        .iter()
        .filter(|e| e.resolution_state == ResolutionState::Unresolved)
        .collect();
    assert_eq!(unresolved.len(), outcome.graph.stats.unresolved);
    for edge in unresolved {
        let code = edge.reason_code.expect("unresolved edge without reason code");
        let decision = code.decision();
        assert_eq!(edge.failure_cause, Some(decision.failure_cause));
        assert_eq!(edge.disposition, Some(decision.disposition));
        assert_eq!(edge.resolver_stage, Some(decision.resolver_stage));
        assert!(ReasonCode::ALL.contains(&code));
    }

    let by_code: usize = outcome.graph.stats.unresolved_by_reason_code.values().sum();
    let by_cause: usize = outcome.graph.stats.unresolved_by_failure_cause.values().sum();
    let by_disposition: usize = outcome.graph.stats.unresolved_by_disposition.values().sum();
    assert_eq!(by_code, outcome.graph.stats.unresolved);
    assert_eq!(by_cause, outcome.graph.stats.unresolved);
    assert_eq!(by_disposition, outcome.graph.stats.unresolved);
    assert_eq!(
        outcome.graph.stats.unresolved_by_reason_code["IMP_U_FIXTURE_REFERENCE"],
        1
    );
    assert_eq!(
        outcome.graph.stats.unresolved_by_reason_code["IMP_U_PATH_NORMALIZATION"],
        1
    );
}

#[test]
fn test_noise_is_counted_but_never_warned() {
    let repo = TestRepo::with_files(&[("src/app.ts", "")]);
    let outcome = repo.resolve(
        &imports(&[("src/app.ts", &["./a b", "./x|y", "."])]),
        &Settings::default(),
    );

    let stats = &outcome.graph.stats;
    assert_eq!(stats.unresolved, 3);
    assert_eq!(stats.unresolved_suppressed, 3);
    assert_eq!(stats.unresolved_by_reason_code["IMP_U_PARSER_NOISE_SUPPRESSED"], 3);
    assert!(outcome.graph.warnings.is_empty());
    assert!(outcome.graph.edges.is_empty());
}

#[test]
fn test_edge_cap_truncates_but_counts_everything() {
    let mut repo = TestRepo::new();
    let specs: Vec<String> = (0..6).map(|i| format!("./m{i}")).collect();
    for i in 0..6 {
        repo.add_file(&format!("src/m{i}.ts"), "");
    }
    repo.add_file("src/app.ts", "");
    let spec_refs: Vec<&str> = specs.iter().map(String::as_str).collect();

    let mut settings = Settings::default();
    settings.limits.max_edges = 4;
    let outcome = repo.resolve(&imports(&[("src/app.ts", &spec_refs)]), &settings);

    let stats = &outcome.graph.stats;
    assert_eq!(outcome.graph.edges.len(), 4);
    assert_eq!(stats.edges, 6);
    assert_eq!(stats.truncated_edges, 2);
    assert_eq!(stats.max_edges, 4);
    assert_eq!(stats.resolved, 6);
    assert_eq!(outcome.file_relations["src/app.ts"].import_links.len(), 6);
}

#[test]
fn test_stats_serialize_in_camel_case() {
    let repo = TestRepo::with_files(&[("a.ts", "")]);
    let outcome = repo.resolve(&imports(&[("a.ts", &["./gone"])]), &Settings::default());
    let json = serde_json::to_value(&outcome.graph).unwrap();

    assert!(json["generatedAt"].as_str().unwrap().starts_with("2023-11-14T"));
    assert_eq!(json["stats"]["unresolvedActionable"], 1);
    assert!(json["stats"]["resolverBudgetPolicy"].is_object());
    assert!(json["stats"]["resolverPipelineStages"]["filesystem_probe"].is_object());
    assert_eq!(json["warnings"][0]["reasonCode"], "IMP_U_MISSING_FILE_RELATIVE");
}
