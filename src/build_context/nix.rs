//! Nix flake references

use super::{Classification, Classifier, ClassifyContext};
use crate::language::ImporterEcosystem;
use crate::taxonomy::ReasonCode;

const FLAKE_REF_PREFIXES: &[&str] = &[
    "github:",
    "gitlab:",
    "sourcehut:",
    "flake:",
    "path:",
    "git+",
    "hg+",
    "tarball+",
    "file+",
    "https://",
    "http://",
];

/// Flake inputs and registry names referenced from `.nix` files
#[derive(Debug, Clone, Copy, Default)]
pub struct NixFlakeClassifier;

pub fn is_flake_reference(spec: &str) -> bool {
    let lower = spec.to_ascii_lowercase();
    FLAKE_REF_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
        || lower == "nixpkgs"
        || lower.starts_with("nixpkgs/")
        || lower.starts_with("nixpkgs#")
}

impl Classifier for NixFlakeClassifier {
    fn id(&self) -> &'static str {
        "nix-flake"
    }

    fn priority(&self) -> u32 {
        15
    }

    fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<Classification> {
        if ctx.importer.ecosystem != ImporterEcosystem::Nix {
            return None;
        }
        (is_flake_reference(ctx.spec) || is_flake_reference(ctx.raw_spec.trim()))
            .then(|| Classification::new(ReasonCode::ResolverGap, self.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::classify_importer;
    use crate::lookup::FileLookup;
    use std::path::Path;

    #[test]
    fn flake_refs_only_from_nix_files() {
        let lookup = FileLookup::from_paths(Path::new("/repo"), Vec::<String>::new());
        let nix = classify_importer("flake.nix");
        let ts = classify_importer("src/app.ts");
        let ctx = |importer, spec| ClassifyContext {
            importer,
            spec,
            raw_spec: spec,
            tsconfig: None,
            lookup: &lookup,
        };

        assert!(NixFlakeClassifier.classify(&ctx(&nix, "github:NixOS/nixpkgs")).is_some());
        assert!(NixFlakeClassifier.classify(&ctx(&nix, "nixpkgs")).is_some());
        assert!(NixFlakeClassifier.classify(&ctx(&nix, "./overlay.nix")).is_none());
        assert!(NixFlakeClassifier.classify(&ctx(&ts, "github:NixOS/nixpkgs")).is_none());
    }
}
