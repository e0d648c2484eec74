//! Index of generated artifacts the repository expects but does not contain
//!
//! Source stems (`.proto`, `.graphql`/`.gql`, `.dart`, OpenAPI/Swagger
//! documents) are expanded into the output paths their generators write, in
//! place and under `generated/`, `__generated__/` and `gen/`. A missing
//! relative import is matched against those paths first, then against the
//! source file it would have been generated from, and finally against
//! naming heuristics.

use serde::Serialize;
use std::collections::HashSet;

use crate::fingerprint::{Sha256Hash, fingerprint_parts};
use crate::paths::{
    base_name, extension, join_rel, normalize_import_specifier, normalize_rel_path, parent_dir,
    sort_strings, strip_extension,
};

pub const EXPECTED_ARTIFACTS_VERSION: &str = "expected-artifacts-v1";

const GENERATED_SUBDIRS: &[&str] = &["generated", "__generated__", "gen"];
const GENERATED_DIR_HINTS: &[&str] = &["/generated/", "/gen/", "/__generated__/"];
const GENERATED_TOKEN_HINTS: &[&str] = &[
    ".generated.",
    ".gen.",
    "_generated",
    ".pb.",
    ".g.dart",
    ".designer.",
];

const PROTO_GENERATED_SUFFIXES: &[&str] = &[
    ".pb.ts",
    ".pb.js",
    ".pb.go",
    ".pb.swift",
    ".pb.java",
    ".pb.cc",
    ".pb.h",
    "_pb2.py",
    "_pb2.pyi",
    "_pb2_grpc.py",
    ".grpc.pb.ts",
    ".grpc.pb.go",
];
const GRAPHQL_GENERATED_SUFFIXES: &[&str] = &[
    ".generated.ts",
    ".generated.js",
    ".generated.tsx",
    ".generated.jsx",
    ".generated.d.ts",
];
const OPENAPI_GENERATED_SUFFIXES: &[&str] = &[
    ".gen.ts",
    ".generated.ts",
    ".client.ts",
    ".client.js",
    ".types.ts",
    ".schemas.ts",
    ".api.ts",
];
const OPENAPI_SOURCE_SUFFIXES: &[&str] = &[
    ".openapi.yaml",
    ".openapi.yml",
    ".openapi.json",
    ".swagger.yaml",
    ".swagger.yml",
    ".swagger.json",
];
const OPENAPI_DOC_EXTS: &[&str] = &[".yaml", ".yml", ".json"];
const OPENAPI_BASENAMES: &[&str] = &["openapi", "swagger"];
const OPENAPI_CLIENT_FILES: &[&str] = &["client.ts", "types.ts", "schemas.ts", "api.ts"];

const GENERATOR_TAGS: &[&str] = &["generated", "gen"];
const CLIENT_TAGS: &[&str] = &["client", "types", "type", "schemas", "schema", "api"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Index,
    Heuristic,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExpectedOutputPath,
    SourceCounterpart,
    TokenHint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMatch {
    pub matched: bool,
    pub source: MatchSource,
    pub match_type: Option<MatchType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

impl ArtifactMatch {
    pub fn none() -> Self {
        Self {
            matched: false,
            source: MatchSource::None,
            match_type: None,
            candidate: None,
            source_path: None,
        }
    }

    /// Matches backed by the file set rather than naming heuristics.
    pub fn is_index_match(&self) -> bool {
        self.matched && self.source == MatchSource::Index
    }
}

#[derive(Debug, Clone)]
pub struct ExpectedArtifactsIndex {
    indexed: HashSet<String>,
    expected: HashSet<String>,
    fingerprint: Sha256Hash,
}

impl ExpectedArtifactsIndex {
    pub fn build<'a, I>(files: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut indexed = HashSet::new();
        let mut stems = Stems::default();
        for file in files {
            let rel = normalize_rel_path(file);
            if rel.is_empty() {
                continue;
            }
            stems.record(&rel);
            indexed.insert(rel);
        }
        let expected = stems.expected_paths();

        let mut expected_sorted: Vec<&String> = expected.iter().collect();
        expected_sorted.sort_by(|a, b| sort_strings(a, b));
        let mut indexed_sorted: Vec<&String> = indexed.iter().collect();
        indexed_sorted.sort_by(|a, b| sort_strings(a, b));
        let fingerprint = fingerprint_parts(
            EXPECTED_ARTIFACTS_VERSION,
            expected_sorted
                .into_iter()
                .map(String::as_str)
                .chain(std::iter::once("--indexed--"))
                .chain(indexed_sorted.into_iter().map(String::as_str)),
        );

        Self {
            indexed,
            expected,
            fingerprint,
        }
    }

    pub fn fingerprint(&self) -> &Sha256Hash {
        &self.fingerprint
    }

    pub fn indexed_count(&self) -> usize {
        self.indexed.len()
    }

    pub fn expected_count(&self) -> usize {
        self.expected.len()
    }

    pub fn is_expected(&self, rel: &str) -> bool {
        self.expected.contains(rel)
    }

    /// Match a missing import against expected outputs and their sources.
    pub fn match_specifier(&self, importer: &str, specifier: &str) -> ArtifactMatch {
        for candidate in specifier_candidates(importer, specifier) {
            if self.expected.contains(&candidate) {
                return ArtifactMatch {
                    matched: true,
                    source: MatchSource::Index,
                    match_type: Some(MatchType::ExpectedOutputPath),
                    candidate: Some(candidate),
                    source_path: None,
                };
            }
            let mut counterparts = Vec::new();
            add_counterparts(&candidate, &mut counterparts);
            if let Some(source) = counterparts.into_iter().find(|c| self.indexed.contains(c)) {
                return ArtifactMatch {
                    matched: true,
                    source: MatchSource::Index,
                    match_type: Some(MatchType::SourceCounterpart),
                    candidate: Some(candidate),
                    source_path: Some(source),
                };
            }
        }
        if has_generated_hints(importer, specifier) {
            return ArtifactMatch {
                matched: true,
                source: MatchSource::Heuristic,
                match_type: Some(MatchType::TokenHint),
                candidate: None,
                source_path: None,
            };
        }
        ArtifactMatch::none()
    }
}

#[derive(Debug, Default)]
struct Stems {
    proto: Vec<String>,
    graphql: Vec<String>,
    dart: Vec<String>,
    openapi: Vec<String>,
}

impl Stems {
    fn record(&mut self, rel: &str) {
        let ext = extension(rel).to_ascii_lowercase();
        let stem = strip_extension(rel);
        if ext.is_empty() || stem.is_empty() {
            return;
        }
        match ext.as_str() {
            ".proto" => self.proto.push(stem.to_string()),
            ".graphql" | ".gql" => self.graphql.push(stem.to_string()),
            ".dart" => self.dart.push(stem.to_string()),
            ".yaml" | ".yml" | ".json" if looks_like_openapi_base(stem) => {
                self.openapi.push(stem.to_string())
            }
            _ => {}
        }
    }

    fn expected_paths(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        for stem in &self.proto {
            let (dir, base) = (parent_dir(stem), base_name(stem));
            for suffix in PROTO_GENERATED_SUFFIXES {
                out.insert(format!("{stem}{suffix}"));
                for subdir in GENERATED_SUBDIRS {
                    out.insert(join_rel(dir, &format!("{subdir}/{base}{suffix}")));
                }
            }
        }
        for stem in &self.graphql {
            let (dir, base) = (parent_dir(stem), base_name(stem));
            for suffix in GRAPHQL_GENERATED_SUFFIXES {
                out.insert(format!("{stem}{suffix}"));
            }
            for subdir in GENERATED_SUBDIRS {
                out.insert(join_rel(dir, &format!("{subdir}/{base}.ts")));
                out.insert(join_rel(dir, &format!("{subdir}/{base}.js")));
            }
        }
        for stem in &self.dart {
            out.insert(format!("{stem}.g.dart"));
        }
        for stem in &self.openapi {
            let (dir, base) = (parent_dir(stem), base_name(stem));
            let doc_name = OPENAPI_BASENAMES.contains(&base.to_ascii_lowercase().as_str());
            for suffix in OPENAPI_GENERATED_SUFFIXES {
                out.insert(format!("{stem}{suffix}"));
            }
            let short = strip_ci_suffix(base, ".openapi")
                .or_else(|| strip_ci_suffix(base, ".swagger"))
                .filter(|s| !s.is_empty());
            if let Some(short) = short {
                for suffix in OPENAPI_GENERATED_SUFFIXES {
                    out.insert(join_rel(dir, &format!("{short}{suffix}")));
                }
                out.insert(join_rel(dir, &format!("{short}-client.ts")));
                out.insert(join_rel(dir, &format!("{short}-types.ts")));
            }
            if doc_name {
                for file in OPENAPI_CLIENT_FILES {
                    out.insert(join_rel(dir, file));
                }
            }
            for subdir in GENERATED_SUBDIRS {
                for suffix in OPENAPI_GENERATED_SUFFIXES {
                    out.insert(join_rel(dir, &format!("{subdir}/{base}{suffix}")));
                }
                if doc_name {
                    for file in OPENAPI_CLIENT_FILES {
                        out.insert(join_rel(dir, &format!("{subdir}/{file}")));
                    }
                }
            }
        }
        out.remove("");
        out
    }
}

/// Repository paths a relative or rooted specifier points at.
fn specifier_candidates(importer: &str, specifier: &str) -> Vec<String> {
    let spec = normalize_import_specifier(specifier);
    if !(spec.starts_with('.') || spec.starts_with('/')) {
        return Vec::new();
    }
    let importer = normalize_rel_path(importer);
    let candidate = if let Some(rooted) = spec.strip_prefix('/') {
        normalize_rel_path(rooted)
    } else if !importer.is_empty() {
        join_rel(parent_dir(&importer), &spec)
    } else {
        normalize_rel_path(&spec)
    };
    if candidate.is_empty() {
        Vec::new()
    } else {
        vec![candidate]
    }
}

fn push_unique(out: &mut Vec<String>, value: String) {
    if !value.is_empty() && !out.contains(&value) {
        out.push(value);
    }
}

/// Case-insensitive ASCII suffix strip.
fn strip_ci_suffix<'a>(value: &'a str, suffix: &str) -> Option<&'a str> {
    let split = value.len().checked_sub(suffix.len())?;
    let tail = value.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &value[..split])
}

/// Strip a trailing `-tag`, `_tag` or `.tag`.
fn strip_tag<'a>(value: &'a str, tags: &[&str]) -> &'a str {
    for tag in tags {
        for sep in ['-', '_', '.'] {
            if let Some(stripped) = strip_ci_suffix(value, &format!("{sep}{tag}")) {
                return stripped;
            }
        }
    }
    value
}

/// Index of `needle` in the final segment whose remainder is a non-empty
/// `.ext` chain; returns the byte offset within `path`.
fn find_output_marker(path: &str, needle: &str, max_ext_parts: Option<usize>) -> Option<usize> {
    let name_start = path.len() - base_name(path).len();
    let lower = path[name_start..].to_ascii_lowercase();
    for (idx, _) in lower.match_indices(needle) {
        let rest = &lower[idx + needle.len()..];
        let Some(exts) = rest.strip_prefix('.') else {
            continue;
        };
        let parts: Vec<&str> = exts.split('.').collect();
        let valid = match max_ext_parts {
            Some(max) => parts.len() <= max && parts.iter().all(|p| !p.is_empty()),
            None => !exts.is_empty(),
        };
        if valid {
            return Some(name_start + idx);
        }
    }
    None
}

fn looks_like_openapi_base(base_rel: &str) -> bool {
    let base = base_name(base_rel).to_ascii_lowercase();
    OPENAPI_BASENAMES.contains(&base.as_str())
        || base.ends_with(".openapi")
        || base.ends_with(".swagger")
}

/// Source files a generated path could have come from, most specific first.
fn add_counterparts(candidate: &str, out: &mut Vec<String>) {
    let normalized = normalize_rel_path(candidate);
    if normalized.is_empty() {
        return;
    }

    for suffix in ["_pb2_grpc.py", "_pb2_grpc.pyi", "_pb2.py", "_pb2.pyi"] {
        if let Some(base) = strip_ci_suffix(&normalized, suffix) {
            push_unique(out, format!("{base}.proto"));
            break;
        }
    }
    if let Some(idx) = find_output_marker(&normalized, ".grpc.pb", None) {
        push_unique(out, format!("{}.proto", &normalized[..idx]));
    }
    if let Some(idx) = find_output_marker(&normalized, ".pb", None) {
        push_unique(out, format!("{}.proto", &normalized[..idx]));
    }
    if let Some(base) = strip_ci_suffix(&normalized, ".g.dart") {
        push_unique(out, format!("{base}.dart"));
    }
    if let Some(idx) = find_output_marker(&normalized, ".generated", Some(2)) {
        let stem = &normalized[..idx];
        if !stem.is_empty() {
            push_unique(out, format!("{stem}.graphql"));
            push_unique(out, format!("{stem}.gql"));
        }
    }

    let lower = normalized.to_ascii_lowercase();
    let segment = ["/__generated__/", "/generated/", "/gen/"]
        .into_iter()
        .filter_map(|hint| lower.find(hint).map(|idx| (idx, hint.len())))
        .min();
    if let Some((idx, len)) = segment {
        let collapsed = format!("{}/{}", &normalized[..idx], &normalized[idx + len..]);
        push_unique(out, collapsed.clone());
        add_counterparts(&collapsed, out);
    }

    let base = strip_extension(&normalized);
    let without_generator = strip_tag(base, GENERATOR_TAGS);
    let bases = [
        base,
        without_generator,
        strip_tag(base, CLIENT_TAGS),
        strip_tag(without_generator, CLIENT_TAGS),
    ];
    let mut seen: Vec<&str> = Vec::new();
    for openapi_base in bases {
        if openapi_base.is_empty() || seen.contains(&openapi_base) {
            continue;
        }
        seen.push(openapi_base);
        for suffix in OPENAPI_SOURCE_SUFFIXES {
            push_unique(out, format!("{openapi_base}{suffix}"));
        }
        if looks_like_openapi_base(openapi_base) {
            for ext in OPENAPI_DOC_EXTS {
                push_unique(out, format!("{openapi_base}{ext}"));
            }
        }
    }

    let dir = parent_dir(&normalized);
    if !dir.is_empty() {
        for name in OPENAPI_BASENAMES {
            for ext in OPENAPI_DOC_EXTS {
                push_unique(out, join_rel(dir, &format!("{name}{ext}")));
            }
        }
    }
}

fn has_generated_hints(importer: &str, specifier: &str) -> bool {
    let importer = normalize_rel_path(importer).to_ascii_lowercase();
    let specifier = normalize_rel_path(specifier).to_ascii_lowercase();
    if importer.is_empty() && specifier.is_empty() {
        return false;
    }
    GENERATED_DIR_HINTS
        .iter()
        .any(|hint| importer.contains(hint) || specifier.contains(hint))
        || GENERATED_TOKEN_HINTS.iter().any(|hint| specifier.contains(hint))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(files: &[&str]) -> ExpectedArtifactsIndex {
        let files: Vec<String> = files.iter().map(|f| f.to_string()).collect();
        ExpectedArtifactsIndex::build(&files)
    }

    #[test]
    fn proto_outputs_are_expected_in_generated_dirs() {
        let idx = index(&["api/schema.proto"]);
        assert!(idx.is_expected("api/schema.pb.ts"));
        assert!(idx.is_expected("api/generated/schema.pb.ts"));
        assert!(idx.is_expected("api/gen/schema_pb2.py"));

        let hit = idx.match_specifier("api/client.ts", "./generated/schema.pb.ts");
        assert!(hit.is_index_match());
        assert_eq!(hit.match_type, Some(MatchType::ExpectedOutputPath));
        assert_eq!(hit.candidate.as_deref(), Some("api/generated/schema.pb.ts"));
    }

    #[test]
    fn counterpart_sources_match_unlisted_outputs() {
        let idx = index(&["proto/user.proto", "lib/model.dart", "gql/query.graphql"]);

        let grpc = idx.match_specifier("src/a.ts", "/proto/user.grpc.pb.web.ts");
        assert_eq!(grpc.match_type, Some(MatchType::SourceCounterpart));
        assert_eq!(grpc.source_path.as_deref(), Some("proto/user.proto"));

        let dart = idx.match_specifier("lib/main.dart", "./model.g.dart");
        assert!(dart.is_index_match());

        let gql = idx.match_specifier("gql/use.ts", "./query.generated.d.ts");
        assert!(gql.is_index_match());
    }

    #[test]
    fn openapi_documents_expand_client_files() {
        let idx = index(&["svc/openapi.yaml", "billing/billing.openapi.json"]);
        assert!(idx.is_expected("svc/client.ts"));
        assert!(idx.is_expected("svc/gen/types.ts"));
        assert!(idx.is_expected("billing/billing.client.ts"));
        assert!(idx.is_expected("billing/billing-types.ts"));

        let hit = idx.match_specifier("svc/app.ts", "./api-client.ts");
        assert_eq!(hit.match_type, Some(MatchType::SourceCounterpart));
        assert_eq!(hit.source_path.as_deref(), Some("svc/openapi.yaml"));
    }

    #[test]
    fn heuristics_apply_without_index_support() {
        let idx = index(&["src/app.ts"]);
        let hit = idx.match_specifier("src/app.ts", "./thing.pb.js");
        assert_eq!(hit.source, MatchSource::Heuristic);
        assert!(!hit.is_index_match());

        let plain = idx.match_specifier("src/app.ts", "./missing");
        assert!(!plain.matched);
        assert_eq!(idx.match_specifier("src/app.ts", "lodash").source, MatchSource::None);
    }

    #[test]
    fn fingerprint_tracks_file_set() {
        let a = index(&["a.proto", "b.ts"]);
        let b = index(&["b.ts", "a.proto"]);
        let c = index(&["a.proto"]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.indexed_count(), 2);
    }
}
