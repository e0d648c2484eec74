//! Candidate generation shared by the language resolvers

use super::{ImporterCaps, ImporterInfo};
use crate::lookup::FileLookup;
use crate::paths::{base_name, extension, has_extension, join_rel, normalize_rel_path, to_posix};

pub const PYTHON_MODULE_EXTS: &[&str] = &[".py", ".pyi"];
pub const PYTHON_PACKAGE_SUFFIXES: &[&str] = &["__init__.py", "__init__.pyi"];
pub const RUBY_EXTS: &[&str] = &[".rb", ".rake", ".ru", ".gemspec"];
pub const RUBY_INDEX_SUFFIXES: &[&str] = &["index.rb", "index.rake", "index.ru"];
pub const CLIKE_INCLUDE_ROOTS: &[&str] = &[
    "include",
    "src",
    "lib",
    "headers",
    "vendor",
    "third_party",
    "third-party",
];
pub const CLIKE_HEADER_EXTS: &[&str] = &[
    ".h", ".hpp", ".hh", ".hxx", ".inc", ".inl", ".ipp", ".tpp", ".ixx", ".cppm", ".modulemap",
];

/// Specifier extensions that mark a bare specifier as a path
const PATH_LIKE_SPEC_EXTS: &[&str] = &[
    ".c", ".cc", ".cpp", ".cxx", ".cppm", ".h", ".hh", ".hpp", ".hxx", ".ixx", ".ipp", ".inl",
    ".modulemap", ".tpp", ".inc", ".cmake", ".mk", ".nix", ".proto", ".graphql", ".gql", ".hbs",
    ".mustache", ".jinja", ".jinja2", ".j2", ".bzl", ".json", ".yaml", ".yml", ".toml", ".ini",
    ".cfg", ".conf", ".xml", ".md", ".txt", ".css", ".scss", ".js", ".ts", ".rb", ".py", ".php",
    ".pm", ".lua", ".sh",
];

/// `a.b.c` style identifiers: a letter or `_`, then word characters and dots
pub fn is_dotted_identifier(spec: &str) -> bool {
    let mut chars = spec.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// First indexed candidate, see [`FileLookup::resolve_first`].
pub fn resolve_from_candidates<I, S>(lookup: &FileLookup, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lookup.resolve_first(candidates)
}

/// Probe `base`, `base+ext` for each extension, then `base/suffix`.
pub fn resolve_with_extensions(
    lookup: &FileLookup,
    base: &str,
    extensions: &[&str],
    suffixes: &[&str],
) -> Option<String> {
    let base = normalize_rel_path(base);
    if base.is_empty() || base.starts_with('/') {
        return None;
    }
    let candidates = std::iter::once(base.clone())
        .chain(extensions.iter().map(|ext| format!("{base}{ext}")))
        .chain(suffixes.iter().map(|suffix| format!("{base}/{suffix}")));
    resolve_from_candidates(lookup, candidates)
}

pub fn resolve_with_extensions_from_bases(
    lookup: &FileLookup,
    bases: &[String],
    extensions: &[&str],
    suffixes: &[&str],
) -> Option<String> {
    bases
        .iter()
        .find_map(|base| resolve_with_extensions(lookup, base, extensions, suffixes))
}

/// Ruby `require` load path: the spec itself, then under `lib/`.
pub fn resolve_ruby_load_path(lookup: &FileLookup, spec: &str) -> Option<String> {
    let spec = normalize_rel_path(spec);
    if spec.is_empty() || spec.starts_with('/') {
        return None;
    }
    resolve_with_extensions(lookup, &spec, RUBY_EXTS, RUBY_INDEX_SUFFIXES).or_else(|| {
        resolve_with_extensions(lookup, &format!("lib/{spec}"), RUBY_EXTS, RUBY_INDEX_SUFFIXES)
    })
}

/// Heuristic for "this bare specifier is really a path".
pub fn looks_like_path_specifier(spec: &str) -> bool {
    if spec.is_empty() {
        return false;
    }
    if spec.starts_with("./") || spec.starts_with("../") || spec.starts_with('/') || spec.starts_with(':') {
        return true;
    }
    if spec.contains('/') || spec.contains('\\') {
        return true;
    }
    let ext = extension(spec).to_lowercase();
    PATH_LIKE_SPEC_EXTS.contains(&ext.as_str())
}

/// Parsed Bazel label: `@repo//pkg:target`, `//pkg:target`, `//pkg`, `:target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BazelLabel {
    pub repo: Option<String>,
    pub package: String,
    pub target: String,
}

pub fn parse_bazel_label(spec: &str, importer_dir: &str) -> Option<BazelLabel> {
    let spec = spec.trim();
    let (repo, rest) = if let Some(stripped) = spec.strip_prefix('@') {
        let idx = stripped.find("//")?;
        (Some(stripped[..idx].to_string()), &stripped[idx..])
    } else {
        (None, spec)
    };

    if let Some(label) = rest.strip_prefix("//") {
        if label.starts_with('/') {
            return None;
        }
        let (package, target) = match label.split_once(':') {
            Some((package, target)) => (package.to_string(), target.to_string()),
            None => (label.to_string(), base_name(label).to_string()),
        };
        if package.is_empty() && target.is_empty() {
            return None;
        }
        return Some(BazelLabel {
            repo,
            package,
            target,
        });
    }
    if repo.is_none() {
        if let Some(target) = rest.strip_prefix(':') {
            if target.is_empty() {
                return None;
            }
            return Some(BazelLabel {
                repo: None,
                package: importer_dir.to_string(),
                target: target.to_string(),
            });
        }
    }
    None
}

/// Ordered, deduplicated candidate list that also knows which importer
/// kinds expand directory imports to conventional entry files.
struct PathCandidates<'a> {
    importer: &'a ImporterInfo,
    out: Vec<String>,
}

impl<'a> PathCandidates<'a> {
    fn new(importer: &'a ImporterInfo) -> Self {
        Self {
            importer,
            out: Vec::new(),
        }
    }

    fn push_raw(&mut self, candidate: &str) {
        let normalized = normalize_rel_path(candidate);
        if !normalized.is_empty() && !self.out.contains(&normalized) {
            self.out.push(normalized);
        }
    }

    fn push(&mut self, candidate: &str) {
        let normalized = normalize_rel_path(candidate);
        self.push_raw(&normalized);
        if has_extension(&normalized) {
            return;
        }
        let entry = |name: &str| {
            if normalized.is_empty() {
                name.to_string()
            } else {
                format!("{normalized}/{name}")
            }
        };
        if self.importer.is(ImporterCaps::CMAKE) {
            self.push_raw(&entry("CMakeLists.txt"));
        }
        if self.importer.is(ImporterCaps::NIX) {
            self.push_raw(&entry("default.nix"));
            self.push_raw(&entry("flake.nix"));
        }
        if self.importer.is(ImporterCaps::TOML) {
            self.push_raw(&entry("Cargo.toml"));
            self.push_raw(&entry("pyproject.toml"));
            self.push_raw(&entry("Project.toml"));
        }
    }

    fn resolve(self, lookup: &FileLookup) -> Option<String> {
        resolve_from_candidates(lookup, self.out)
    }
}

/// Project root above a `unittests/` directory, for `../` includes that are
/// written relative to the project rather than the test file.
fn unittests_root_candidate(spec: &str, importer: &ImporterInfo) -> Option<String> {
    if !spec.starts_with("../") {
        return None;
    }
    let parts: Vec<&str> = importer.importer_rel.split('/').collect();
    let idx = parts.iter().position(|p| *p == "unittests")?;
    if idx == 0 {
        return None;
    }
    let mut stripped = spec;
    while let Some(rest) = stripped.strip_prefix("../") {
        stripped = rest;
    }
    let stripped = normalize_rel_path(stripped);
    if stripped.is_empty() || stripped.starts_with('/') {
        return None;
    }
    Some(normalize_rel_path(&format!("{}/{stripped}", parts[..idx].join("/"))))
}

/// Resolve path-like specifiers: `./x`, `../x`, `/x`, `//pkg:target`,
/// `:target` and bare paths tried against the importer directory and root.
pub fn resolve_path_like(lookup: &FileLookup, spec: &str, importer: &ImporterInfo) -> Option<String> {
    let raw = to_posix(spec.trim());
    if raw.is_empty() {
        return None;
    }
    let bazel_source = importer.is(ImporterCaps::BAZEL_SOURCE);
    let mut candidates = PathCandidates::new(importer);

    if let Some(label) = parse_bazel_label(&raw, &importer.importer_dir) {
        if label.repo.is_some() {
            return None;
        }
        let package = normalize_rel_path(&label.package);
        let target = normalize_rel_path(&label.target);
        let in_package = |name: &str| {
            if package.is_empty() {
                name.to_string()
            } else {
                format!("{package}/{name}")
            }
        };
        if !target.is_empty() {
            candidates.push(&in_package(&target));
            if bazel_source && !has_extension(&target) {
                candidates.push(&in_package(&format!("{target}.bzl")));
            }
        }
        if !package.is_empty() {
            candidates.push(&package);
            let package_base = base_name(&package).to_string();
            candidates.push(&format!("{package}/{package_base}"));
            if bazel_source {
                candidates.push(&format!("{package}/{package_base}.bzl"));
                candidates.push(&format!("{package}.bzl"));
            }
        }
        return candidates.resolve(lookup);
    }

    if let Some(absolute) = raw.strip_prefix('/') {
        let target = normalize_rel_path(absolute);
        if target.is_empty() {
            return None;
        }
        if importer.is(ImporterCaps::HTML) {
            candidates.push(&join_rel(&importer.importer_dir, &target));
        }
        candidates.push(&target);
        return candidates.resolve(lookup);
    }

    if raw.starts_with("./") || raw.starts_with("../") {
        candidates.push(&join_rel(&importer.importer_dir, &raw));
        if let Some(project_rooted) = unittests_root_candidate(&raw, importer) {
            candidates.push(&project_rooted);
        }
        return candidates.resolve(lookup);
    }

    let normalized = normalize_rel_path(&raw);
    if normalized.is_empty() {
        return None;
    }
    candidates.push(&join_rel(&importer.importer_dir, &normalized));
    candidates.push(&normalized);
    candidates.resolve(lookup)
}

/// Python `.mod`, `..pkg.mod`: one dot is the importer's package, each
/// further dot climbs one directory.
pub fn resolve_python_relative_dotted(
    lookup: &FileLookup,
    spec: &str,
    importer: &ImporterInfo,
) -> Option<String> {
    let dots = spec.chars().take_while(|c| *c == '.').count();
    if dots == 0 {
        return None;
    }
    let remainder = &spec[dots..];
    let mut anchor = importer.importer_dir.as_str();
    for _ in 1..dots {
        anchor = crate::paths::parent_dir(anchor);
    }
    let module = normalize_rel_path(&remainder.replace('.', "/"));
    let base = if module.is_empty() {
        anchor.to_string()
    } else {
        join_rel(anchor, &module)
    };
    if base.is_empty() {
        return resolve_from_candidates(lookup, PYTHON_PACKAGE_SUFFIXES.iter().copied());
    }
    resolve_with_extensions(lookup, &base, PYTHON_MODULE_EXTS, PYTHON_PACKAGE_SUFFIXES)
}

/// Map `a.b.C` to `<prefix>/a/b/C<ext>`, dropping trailing segments until a
/// file matches so symbol imports land on their module.
pub fn resolve_dotted_import(
    lookup: &FileLookup,
    spec: &str,
    extensions: &[&str],
    prefixes: &[&str],
) -> Option<String> {
    if spec.is_empty() || spec.ends_with(".*") {
        return None;
    }
    let spec = spec.replace('\\', ".");
    if !is_dotted_identifier(&spec) {
        return None;
    }
    let parts: Vec<&str> = spec.split('.').filter(|p| !p.is_empty()).collect();
    let mut candidates = Vec::new();
    for keep in (1..=parts.len()).rev() {
        let stem = parts[..keep].join("/");
        for prefix in prefixes {
            let base = if prefix.is_empty() {
                stem.clone()
            } else {
                format!("{prefix}/{stem}")
            };
            for ext in extensions {
                candidates.push(format!("{base}{ext}"));
            }
        }
    }
    resolve_from_candidates(lookup, candidates)
}

/// Strip wildcard and trailing-colon forms (`a.b._`, `a.b.*`, `a.b::`).
pub fn normalize_dotted_specifier(spec: &str) -> Option<String> {
    let mut value = spec.trim();
    value = value.strip_suffix(".*").unwrap_or(value);
    value = value.strip_suffix("._").unwrap_or(value);
    let value = value.trim_end_matches(':');
    if value.is_empty() || !is_dotted_identifier(value) {
        None
    } else {
        Some(value.to_string())
    }
}

/// `#include` resolution: path-like first, then conventional include roots.
pub fn resolve_clike_include(
    lookup: &FileLookup,
    spec: &str,
    importer: &ImporterInfo,
) -> Option<String> {
    if let Some(hit) = resolve_path_like(lookup, spec, importer) {
        return Some(hit);
    }
    let normalized = normalize_rel_path(spec);
    if normalized.is_empty()
        || normalized.starts_with('/')
        || normalized.starts_with('.')
        || normalized.starts_with(':')
    {
        return None;
    }
    let bases: Vec<String> = CLIKE_INCLUDE_ROOTS
        .iter()
        .map(|root| format!("{root}/{normalized}"))
        .collect();
    if let Some(hit) = resolve_from_candidates(lookup, &bases) {
        return Some(hit);
    }
    if has_extension(&normalized) {
        return None;
    }
    resolve_with_extensions_from_bases(lookup, &bases, CLIKE_HEADER_EXTS, &[])
}

fn resolve_dart_package(lookup: &FileLookup, spec: &str, package_name: Option<&str>) -> Option<String> {
    let payload = spec.strip_prefix("package:")?;
    let (name, path) = payload.split_once('/')?;
    let name = name.trim();
    let path = normalize_rel_path(path);
    if name.is_empty() || path.is_empty() {
        return None;
    }
    let mut candidates = Vec::new();
    if package_name.is_none_or(|own| own == name) {
        candidates.push(format!("lib/{path}"));
        candidates.push(path.clone());
        candidates.push(format!("src/{path}"));
    }
    candidates.push(format!("packages/{name}/{path}"));
    candidates.push(format!("third_party/dart/{name}/{path}"));
    resolve_from_candidates(lookup, candidates)
}

/// Dart `package:` URIs, then path-like specifiers with a `.dart` fallback.
pub fn resolve_dart_import(
    lookup: &FileLookup,
    spec: &str,
    importer: &ImporterInfo,
    package_name: Option<&str>,
) -> Option<String> {
    if spec.starts_with("dart:") {
        return None;
    }
    if let Some(hit) = resolve_dart_package(lookup, spec, package_name) {
        return Some(hit);
    }
    if !looks_like_path_specifier(spec) {
        return None;
    }
    if let Some(hit) = resolve_path_like(lookup, spec, importer) {
        return Some(hit);
    }
    let normalized = normalize_rel_path(spec);
    if normalized.is_empty() || normalized.starts_with('/') {
        return None;
    }
    let bases = vec![
        join_rel(&importer.importer_dir, &normalized),
        normalized.clone(),
        format!("lib/{normalized}"),
        format!("src/{normalized}"),
    ];
    resolve_with_extensions_from_bases(lookup, &bases, &[".dart"], &[])
}
