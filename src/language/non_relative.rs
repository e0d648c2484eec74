//! Bare specifiers with local module conventions
//!
//! Go module paths, Python packages, JVM source sets, Rust `crate::` paths,
//! Dart `package:` URIs and friends. Anything without a rule falls through
//! to external classification upstream.

use serde::Serialize;

use super::common::{
    is_dotted_identifier, looks_like_path_specifier, normalize_dotted_specifier,
    resolve_clike_include, resolve_dart_import, resolve_dotted_import, resolve_from_candidates,
    resolve_path_like, resolve_ruby_load_path,
};
use super::{ImporterEcosystem, ImporterInfo};
use crate::lookup::FileLookup;
use crate::taxonomy::ResolvedType;
use crate::paths::{join_rel, normalize_rel_path, parent_dir};

/// A language-specific hit with its `resolvedType` label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageResolution {
    pub resolved_type: ResolvedType,
    pub resolved_path: String,
}

fn hit(resolved_type: ResolvedType, path: Option<String>) -> Option<LanguageResolution> {
    path.map(|resolved_path| LanguageResolution {
        resolved_type,
        resolved_path,
    })
}

const JVM_JAVA_PREFIXES: &[&str] = &[
    "",
    "src",
    "app",
    "lib",
    "src/main/java",
    "src/test/java",
    "src/main/kotlin",
    "src/test/kotlin",
];
const JVM_KOTLIN_PREFIXES: &[&str] = &[
    "",
    "src",
    "app",
    "lib",
    "src/main/kotlin",
    "src/test/kotlin",
    "src/main/java",
    "src/test/java",
];

fn jvm_prefixes(lang: &str) -> Vec<String> {
    let mut prefixes = vec![String::new()];
    for lang in [lang, "java", "kotlin"] {
        prefixes.push(format!("src/main/{lang}"));
        prefixes.push(format!("src/test/{lang}"));
    }
    prefixes.extend(["app", "lib", "src"].map(String::from));
    prefixes
}

fn resolve_python(lookup: &FileLookup, spec: &str, importer: &ImporterInfo) -> Option<String> {
    if !is_dotted_identifier(spec) {
        return None;
    }
    let module = spec.replace('.', "/");
    let roots = ["", importer.importer_dir.as_str(), "src", "lib"];
    let mut candidates = Vec::new();
    for root in roots {
        let base = join_rel(root, &module);
        candidates.push(format!("{base}.py"));
        candidates.push(format!("{base}.pyi"));
        candidates.push(format!("{base}/__init__.py"));
        candidates.push(format!("{base}/__init__.pyi"));
    }
    resolve_from_candidates(lookup, candidates)
}

fn resolve_go(lookup: &FileLookup, spec: &str, module_path: Option<&str>) -> Option<String> {
    let package = match module_path {
        Some(module) if spec.len() > module.len() + 1 && spec.starts_with(module) && spec[module.len()..].starts_with('/') => {
            normalize_rel_path(&spec[module.len() + 1..])
        }
        _ if ["internal/", "pkg/", "cmd/", "src/"]
            .iter()
            .any(|prefix| spec.starts_with(prefix)) =>
        {
            normalize_rel_path(spec)
        }
        _ => return None,
    };
    if package.is_empty() {
        return None;
    }
    resolve_from_candidates(lookup, [format!("{package}.go"), format!("src/{package}.go")])
        .or_else(|| lookup.list_files_in_dir(&package, Some(".go")).into_iter().next())
        .or_else(|| {
            lookup
                .list_files_in_dir(&format!("src/{package}"), Some(".go"))
                .into_iter()
                .next()
        })
}

fn resolve_swift(lookup: &FileLookup, spec: &str) -> Option<String> {
    if !is_dotted_identifier(spec) {
        return None;
    }
    let module = spec.split('.').next()?;
    resolve_from_candidates(
        lookup,
        [
            format!("Sources/{module}/{module}.swift"),
            format!("{module}.swift"),
            format!("src/{module}.swift"),
        ],
    )
    .or_else(|| {
        lookup
            .list_files_in_dir(&format!("Sources/{module}"), Some(".swift"))
            .into_iter()
            .next()
    })
}

fn resolve_julia(lookup: &FileLookup, spec: &str) -> Option<String> {
    let module = spec.split(':').next()?.trim();
    if !is_dotted_identifier(module) {
        return None;
    }
    let parts: Vec<&str> = module.split('.').filter(|p| !p.is_empty()).collect();
    let leaf = parts.last()?;
    let path = parts.join("/");
    resolve_from_candidates(
        lookup,
        [
            format!("src/{path}.jl"),
            format!("src/{path}/{leaf}.jl"),
            format!("{path}.jl"),
            format!("{path}/{leaf}.jl"),
            format!("{path}/src/{leaf}.jl"),
            format!("test/{path}.jl"),
        ],
    )
}

/// `crate::a::b`, `self::x`, `super::y`; trailing segments are dropped one
/// at a time so item imports land on their module file.
fn resolve_rust(lookup: &FileLookup, spec: &str, importer: &ImporterInfo) -> Option<String> {
    if !spec.contains("::") {
        return None;
    }
    let parts: Vec<&str> = spec.split("::").filter(|p| !p.is_empty()).collect();
    let (base_dir, tail) = match parts.split_first()? {
        (&"crate", tail) => ("src".to_string(), tail),
        (&"self", tail) => (importer.importer_dir.clone(), tail),
        (&"super", tail) => (parent_dir(&importer.importer_dir).to_string(), tail),
        _ => return None,
    };
    let tail: Vec<&str> = tail
        .iter()
        .map(|segment| segment.trim_matches(|c: char| c == '{' || c == '}' || c.is_whitespace()))
        .take_while(|segment| !segment.is_empty() && *segment != "*")
        .collect();
    let mut candidates = Vec::new();
    for keep in (1..=tail.len()).rev() {
        let stem = join_rel(&base_dir, &tail[..keep].join("/"));
        candidates.push(format!("{stem}.rs"));
        candidates.push(format!("{stem}/mod.rs"));
    }
    resolve_from_candidates(lookup, candidates)
}

/// Resolve a bare specifier through the importer's ecosystem rules.
pub fn resolve_non_relative(
    lookup: &FileLookup,
    spec: &str,
    importer: &ImporterInfo,
    go_module_path: Option<&str>,
    dart_package_name: Option<&str>,
) -> Option<LanguageResolution> {
    use ImporterEcosystem::*;
    match importer.ecosystem {
        Ruby => hit(ResolvedType::RubyLoadPath, resolve_ruby_load_path(lookup, spec)),
        Python => hit(ResolvedType::PythonModule, resolve_python(lookup, spec, importer)),
        Perl if spec.contains("::") => {
            let package = spec.replace("::", "/");
            hit(
                ResolvedType::PerlPackage,
                resolve_from_candidates(lookup, [format!("{package}.pm"), format!("lib/{package}.pm")]),
            )
        }
        Lua if is_dotted_identifier(spec) => {
            let module = spec.replace('.', "/");
            hit(
                ResolvedType::LuaModule,
                resolve_from_candidates(
                    lookup,
                    [
                        format!("{module}.lua"),
                        format!("{module}/init.lua"),
                        format!("lua/{module}.lua"),
                        format!("lua/{module}/init.lua"),
                        format!("src/{module}.lua"),
                        format!("src/{module}/init.lua"),
                    ],
                ),
            )
        }
        Php if spec.contains('\\') => {
            let namespace = spec.replace('\\', "/");
            hit(
                ResolvedType::PhpNamespace,
                resolve_from_candidates(
                    lookup,
                    ["", "src/", "app/", "lib/"].map(|root| format!("{root}{namespace}.php")),
                ),
            )
        }
        Shell if looks_like_path_specifier(spec) => {
            hit(ResolvedType::ShellPath, resolve_path_like(lookup, spec, importer))
        }
        Go => hit(ResolvedType::GoModule, resolve_go(lookup, spec, go_module_path)),
        Java => hit(
            ResolvedType::JavaPackage,
            resolve_dotted_import(lookup, spec, &[".java", ".kt"], JVM_JAVA_PREFIXES),
        ),
        Kotlin => hit(
            ResolvedType::KotlinPackage,
            resolve_dotted_import(lookup, spec, &[".kt", ".kts", ".java"], JVM_KOTLIN_PREFIXES),
        ),
        CSharp => hit(
            ResolvedType::CsharpNamespace,
            resolve_dotted_import(lookup, spec, &[".cs"], &["", "src", "app", "lib"]),
        ),
        Swift => hit(ResolvedType::SwiftModule, resolve_swift(lookup, spec)),
        Dart => hit(
            ResolvedType::DartModule,
            resolve_dart_import(lookup, spec, importer, dart_package_name),
        ),
        Scala | Groovy => {
            let (label, lang, exts): (ResolvedType, &str, &[&str]) = if importer.ecosystem == Scala {
                (ResolvedType::ScalaPackage, "scala", &[".scala", ".java", ".kt"][..])
            } else {
                (ResolvedType::GroovyPackage, "groovy", &[".groovy", ".java", ".kt"][..])
            };
            let spec = normalize_dotted_specifier(spec)?;
            let prefixes = jvm_prefixes(lang);
            let prefixes: Vec<&str> = prefixes.iter().map(String::as_str).collect();
            hit(label, resolve_dotted_import(lookup, &spec, exts, &prefixes))
        }
        Julia => hit(ResolvedType::JuliaModule, resolve_julia(lookup, spec)),
        CLike if looks_like_path_specifier(spec) => {
            hit(ResolvedType::ClikeInclude, resolve_clike_include(lookup, spec, importer))
        }
        Rust => hit(ResolvedType::RustModule, resolve_rust(lookup, spec, importer)),
        Bazel | Nix | CMake | Toml | PathLike if looks_like_path_specifier(spec) => {
            hit(ResolvedType::PathLike, resolve_path_like(lookup, spec, importer))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::classify_importer;
    use std::path::Path;

    fn resolve(files: &[&str], importer: &str, spec: &str) -> Option<LanguageResolution> {
        let lookup = FileLookup::from_paths(Path::new("/repo"), files.iter().copied());
        resolve_non_relative(
            &lookup,
            spec,
            &classify_importer(importer),
            Some("example.com/app"),
            Some("app"),
        )
    }

    #[test]
    fn go_module_prefix_and_conventional_roots() {
        let files = ["internal/store/b.go", "internal/store/a.go", "pkg/api/api.go"];
        let hit = resolve(&files, "cmd/main.go", "example.com/app/internal/store").unwrap();
        assert_eq!(hit.resolved_type, ResolvedType::GoModule);
        assert_eq!(hit.resolved_path, "internal/store/a.go");
        assert_eq!(
            resolve(&files, "cmd/main.go", "pkg/api").unwrap().resolved_path,
            "pkg/api/api.go"
        );
        assert!(resolve(&files, "cmd/main.go", "github.com/x/y").is_none());
    }

    #[test]
    fn python_modules_under_src() {
        let files = ["src/pkg/core.py", "tools/local.py"];
        let hit = resolve(&files, "tests/test_core.py", "pkg.core").unwrap();
        assert_eq!(hit.resolved_type, ResolvedType::PythonModule);
        assert_eq!(hit.resolved_path, "src/pkg/core.py");
        assert_eq!(
            resolve(&files, "tools/run.py", "local").unwrap().resolved_path,
            "tools/local.py"
        );
        assert!(resolve(&files, "a.py", "numpy").is_none());
    }

    #[test]
    fn rust_paths_drop_item_segments() {
        let files = ["src/config/mod.rs", "src/paths.rs", "src/engine/cache.rs"];
        assert_eq!(
            resolve(&files, "src/lib.rs", "crate::paths::normalize").unwrap().resolved_path,
            "src/paths.rs"
        );
        assert_eq!(
            resolve(&files, "src/lib.rs", "crate::config::Settings").unwrap().resolved_path,
            "src/config/mod.rs"
        );
        assert_eq!(
            resolve(&files, "src/engine/mod.rs", "self::cache::Entry").unwrap().resolved_path,
            "src/engine/cache.rs"
        );
        assert!(resolve(&files, "src/lib.rs", "std::fmt").is_none());
    }

    #[test]
    fn jvm_and_scripting_ecosystems() {
        let files = [
            "src/main/scala/com/acme/Util.scala",
            "lib/Acme/Tool.pm",
            "src/App/Http/Kernel.php",
            "Sources/Net/Client.swift",
        ];
        assert_eq!(
            resolve(&files, "src/main/scala/Main.scala", "com.acme.Util._").unwrap().resolved_type,
            ResolvedType::ScalaPackage
        );
        assert_eq!(
            resolve(&files, "bin/run.pl", "Acme::Tool").unwrap().resolved_path,
            "lib/Acme/Tool.pm"
        );
        assert_eq!(
            resolve(&files, "index.php", "App\\Http\\Kernel").unwrap().resolved_path,
            "src/App/Http/Kernel.php"
        );
        assert_eq!(
            resolve(&files, "Sources/App/main.swift", "Net").unwrap().resolved_path,
            "Sources/Net/Client.swift"
        );
    }

    #[test]
    fn js_bare_specifiers_fall_through() {
        assert!(resolve(&["node_modules/react/index.js"], "src/a.ts", "react").is_none());
    }
}
