//! Language resolver dispatch
//!
//! Each importer is classified once into an [`ImporterInfo`]: a closed
//! [`ImporterEcosystem`] plus a few capability flags that cut across
//! ecosystems (C-like includes, path-like specifiers, shell absolute paths).
//! The relative and non-relative resolvers then match on the ecosystem.
//!
//! Every resolver returns `None` when it has no rule for the specifier so
//! the engine can fall through to generic lookup or external classification.

pub mod common;
mod non_relative;
mod relative;

pub use non_relative::{LanguageResolution, resolve_non_relative};
pub use relative::resolve_relative;

use bitflags::bitflags;

use crate::paths::{base_name, extension, parent_dir};

/// Importer extensions whose includes follow C-style search roots
pub const CLIKE_EXTS: &[&str] = &[
    ".c", ".cc", ".cpp", ".cxx", ".cppm", ".h", ".hh", ".hpp", ".hxx", ".def", ".ixx", ".ipp",
    ".inl", ".modulemap", ".inc", ".tpp", ".m", ".mm",
];

/// Importer extensions whose specifiers are plain paths or labels
pub const PATH_LIKE_EXTS: &[&str] = &[
    ".c", ".cc", ".cpp", ".cxx", ".cppm", ".h", ".hh", ".hpp", ".hxx", ".def", ".ixx", ".ipp",
    ".inl", ".modulemap", ".inc", ".tpp", ".m", ".mm", ".cmake", ".mk", ".mak", ".nix",
    ".proto", ".graphql", ".gql", ".hbs", ".mustache", ".jinja", ".jinja2", ".j2", ".bzl",
    ".star", ".dart", ".toml", ".bazel", ".html", ".htm",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImporterEcosystem {
    JsTs,
    Python,
    Ruby,
    Go,
    Rust,
    Java,
    Kotlin,
    Scala,
    Groovy,
    CSharp,
    Swift,
    Dart,
    Php,
    Lua,
    Perl,
    Shell,
    Julia,
    CLike,
    Bazel,
    Nix,
    CMake,
    Toml,
    /// Templates, schemas, markup and other path-addressed sources
    PathLike,
    Other,
}

bitflags! {
    /// Cross-ecosystem capabilities of an importer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImporterCaps: u16 {
        const CLIKE        = 0b0000_0001;
        const PATH_LIKE    = 0b0000_0010;
        const SHELL        = 0b0000_0100;
        const HTML         = 0b0000_1000;
        const BAZEL_SOURCE = 0b0001_0000;
        const CMAKE        = 0b0010_0000;
        const NIX          = 0b0100_0000;
        const TOML         = 0b1000_0000;
    }
}

/// Classification of one importer file, computed once per file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImporterInfo {
    pub importer_rel: String,
    pub importer_dir: String,
    /// Lowercased extension including the dot
    pub extension: String,
    /// Lowercased file name
    pub base_name: String,
    pub ecosystem: ImporterEcosystem,
    pub caps: ImporterCaps,
}

impl ImporterInfo {
    pub fn is(&self, caps: ImporterCaps) -> bool {
        self.caps.contains(caps)
    }

    /// Importers whose absolute specifiers may name system paths.
    pub fn allows_absolute_external(&self) -> bool {
        self.caps
            .intersects(ImporterCaps::SHELL | ImporterCaps::PATH_LIKE | ImporterCaps::CLIKE)
    }
}

fn ecosystem_for(ext: &str, base: &str) -> ImporterEcosystem {
    use ImporterEcosystem::*;
    match base {
        "cmakelists.txt" => return CMake,
        "build" | "build.bazel" | "workspace" | "workspace.bazel" | "module.bazel" => {
            return Bazel;
        }
        "gemfile" | "rakefile" => return Ruby,
        "pipfile" => return Toml,
        _ => {}
    }
    match ext {
        ".js" | ".jsx" | ".ts" | ".tsx" | ".mjs" | ".cjs" | ".mts" | ".cts" | ".vue"
        | ".svelte" | ".astro" => JsTs,
        ".py" | ".pyi" => Python,
        ".rb" | ".rake" | ".ru" | ".gemspec" => Ruby,
        ".go" => Go,
        ".rs" => Rust,
        ".java" => Java,
        ".kt" | ".kts" => Kotlin,
        ".scala" | ".sc" => Scala,
        ".groovy" | ".gradle" => Groovy,
        ".cs" => CSharp,
        ".swift" => Swift,
        ".dart" => Dart,
        ".php" => Php,
        ".lua" => Lua,
        ".pl" | ".pm" => Perl,
        ".sh" | ".bash" | ".zsh" | ".ksh" => Shell,
        ".jl" => Julia,
        ".bzl" | ".star" | ".bazel" => Bazel,
        ".nix" => Nix,
        ".cmake" => CMake,
        ".toml" => Toml,
        _ if CLIKE_EXTS.contains(&ext) => CLike,
        _ if PATH_LIKE_EXTS.contains(&ext) => PathLike,
        _ => Other,
    }
}

/// Classify an importer by extension and file name.
pub fn classify_importer(importer_rel: &str) -> ImporterInfo {
    let ext = extension(importer_rel).to_lowercase();
    let base = base_name(importer_rel).to_lowercase();
    let ecosystem = ecosystem_for(&ext, &base);

    let mut caps = ImporterCaps::empty();
    if CLIKE_EXTS.contains(&ext.as_str()) {
        caps |= ImporterCaps::CLIKE;
    }
    if PATH_LIKE_EXTS.contains(&ext.as_str())
        || matches!(
            ecosystem,
            ImporterEcosystem::Bazel | ImporterEcosystem::CMake | ImporterEcosystem::Toml
        )
    {
        caps |= ImporterCaps::PATH_LIKE;
    }
    if ecosystem == ImporterEcosystem::Shell {
        caps |= ImporterCaps::SHELL;
    }
    if ext == ".html" || ext == ".htm" {
        caps |= ImporterCaps::HTML;
    }
    if matches!(ext.as_str(), ".bzl" | ".star" | ".bazel") {
        caps |= ImporterCaps::BAZEL_SOURCE;
    }
    if ecosystem == ImporterEcosystem::CMake {
        caps |= ImporterCaps::CMAKE;
    }
    if ecosystem == ImporterEcosystem::Nix {
        caps |= ImporterCaps::NIX;
    }
    if ecosystem == ImporterEcosystem::Toml {
        caps |= ImporterCaps::TOML;
    }

    ImporterInfo {
        importer_rel: importer_rel.to_string(),
        importer_dir: parent_dir(importer_rel).to_string(),
        extension: ext,
        base_name: base,
        ecosystem,
        caps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(classify_importer("src/app.tsx").ecosystem, ImporterEcosystem::JsTs);
        assert_eq!(classify_importer("pkg/mod.py").ecosystem, ImporterEcosystem::Python);
        assert_eq!(classify_importer("lib/a.rs").ecosystem, ImporterEcosystem::Rust);
        assert_eq!(classify_importer("README").ecosystem, ImporterEcosystem::Other);
    }

    #[test]
    fn classifies_by_file_name() {
        let cmake = classify_importer("sub/CMakeLists.txt");
        assert_eq!(cmake.ecosystem, ImporterEcosystem::CMake);
        assert!(cmake.is(ImporterCaps::CMAKE | ImporterCaps::PATH_LIKE));

        let build = classify_importer("pkg/BUILD");
        assert_eq!(build.ecosystem, ImporterEcosystem::Bazel);
        assert!(!build.is(ImporterCaps::BAZEL_SOURCE));
    }

    #[test]
    fn caps_cross_ecosystems() {
        let header = classify_importer("include/a.H");
        assert_eq!(header.extension, ".h");
        assert_eq!(header.ecosystem, ImporterEcosystem::CLike);
        assert!(header.is(ImporterCaps::CLIKE | ImporterCaps::PATH_LIKE));
        assert!(header.allows_absolute_external());

        let dart = classify_importer("lib/main.dart");
        assert_eq!(dart.ecosystem, ImporterEcosystem::Dart);
        assert!(dart.is(ImporterCaps::PATH_LIKE));

        let script = classify_importer("bin/run.sh");
        assert!(script.is(ImporterCaps::SHELL));
        assert_eq!(script.importer_dir, "bin");
        assert!(!classify_importer("src/a.ts").allows_absolute_external());
    }
}
