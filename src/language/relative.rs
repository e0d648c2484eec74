//! Relative specifiers with ecosystem-specific extensions

use super::common::{
    PYTHON_MODULE_EXTS, PYTHON_PACKAGE_SUFFIXES, RUBY_EXTS, RUBY_INDEX_SUFFIXES,
    resolve_dart_import, resolve_path_like, resolve_python_relative_dotted,
    resolve_with_extensions,
};
use super::{ImporterEcosystem, ImporterInfo};
use crate::lookup::FileLookup;

/// Resolve a relative or rooted specifier for importers whose ecosystem has
/// its own extension rules.
///
/// `base` is the specifier joined onto the importer directory (or stripped
/// of its leading `/`). JS/TS and unclassified importers return `None`;
/// the engine handles them with the default extension list.
pub fn resolve_relative(
    lookup: &FileLookup,
    spec: &str,
    base: &str,
    importer: &ImporterInfo,
) -> Option<String> {
    use ImporterEcosystem::*;
    let with = |exts: &[&str], suffixes: &[&str]| resolve_with_extensions(lookup, base, exts, suffixes);

    match importer.ecosystem {
        Python => {
            let dotted = spec.starts_with('.') && !spec.starts_with("./") && !spec.starts_with("../");
            if dotted {
                resolve_python_relative_dotted(lookup, spec, importer)
            } else {
                with(PYTHON_MODULE_EXTS, PYTHON_PACKAGE_SUFFIXES)
            }
        }
        Ruby => with(RUBY_EXTS, RUBY_INDEX_SUFFIXES),
        Lua => with(&[".lua"], &["init.lua"]),
        Php => with(&[".php"], &["index.php"]),
        Perl => with(&[".pm", ".pl"], &[]),
        Rust => with(&[".rs"], &["mod.rs"]),
        Go => with(&[".go"], &[]).or_else(|| lookup.list_files_in_dir(base, Some(".go")).into_iter().next()),
        Java => with(&[".java", ".kt"], &[]),
        Kotlin => with(&[".kt", ".kts", ".java"], &[]),
        Scala => with(&[".scala", ".sc"], &[]),
        Groovy => with(&[".groovy", ".gradle"], &[]),
        CSharp => with(&[".cs"], &[]),
        Swift => with(&[".swift"], &[]),
        Julia => with(&[".jl"], &[]),
        Shell => with(&[".sh", ".bash"], &[]),
        Dart => resolve_dart_import(lookup, spec, importer, None),
        CLike | Bazel | Nix | CMake | Toml | PathLike => resolve_path_like(lookup, spec, importer),
        JsTs | Other => None,
    }
}
