//! TypeScript compiler output references
//!
//! An import of `dist/util.js` that is missing from the file set is an
//! expected build output when the governing tsconfig emits `outDir: dist`
//! from `rootDir: src` and `src/util.ts` exists.

use super::{ArtifactMatch, Classification, Classifier, ClassifyContext, MatchSource, MatchType};
use crate::language::ImporterEcosystem;
use crate::lookup::FileLookup;
use crate::paths::{join_rel, normalize_rel_path, parent_dir};
use crate::taxonomy::ReasonCode;

/// Emitted suffix and the source suffixes that produce it, longest first.
const EMIT_SOURCES: &[(&str, &[&str])] = &[
    (".d.mts", &[".mts"]),
    (".d.cts", &[".cts"]),
    (".d.ts", &[".ts", ".tsx"]),
    (".mjs", &[".mts", ".mjs"]),
    (".cjs", &[".cts", ".cjs"]),
    (".jsx", &[".tsx", ".jsx"]),
    (".js", &[".ts", ".tsx", ".js", ".jsx"]),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct TsEmitClassifier;

fn strip_dir<'a>(path: &'a str, dir: &str) -> Option<&'a str> {
    if dir.is_empty() {
        return Some(path);
    }
    path.strip_prefix(dir)?.strip_prefix('/')
}

/// Source file under `root_dir` that compiles to `emitted`.
pub fn source_for_output(lookup: &FileLookup, root_dir: &str, emitted: &str) -> Option<String> {
    let lower = emitted.to_ascii_lowercase();
    for (suffix, sources) in EMIT_SOURCES {
        if !lower.ends_with(suffix) {
            continue;
        }
        let stem = &emitted[..emitted.len() - suffix.len()];
        if stem.is_empty() {
            return None;
        }
        return sources
            .iter()
            .find_map(|ext| lookup.resolve_exact(&join_rel(root_dir, &format!("{stem}{ext}"))));
    }
    if crate::paths::has_extension(emitted) {
        return None;
    }
    lookup.resolve_candidate(&join_rel(root_dir, emitted))
}

impl Classifier for TsEmitClassifier {
    fn id(&self) -> &'static str {
        "typescript-emit"
    }

    fn priority(&self) -> u32 {
        18
    }

    fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<Classification> {
        if ctx.importer.ecosystem != ImporterEcosystem::JsTs {
            return None;
        }
        let profile = ctx.tsconfig?;
        let target = if let Some(rooted) = ctx.spec.strip_prefix('/') {
            normalize_rel_path(rooted)
        } else if ctx.spec.starts_with('.') {
            join_rel(&ctx.importer.importer_dir, ctx.spec)
        } else {
            return None;
        };
        if target.is_empty() || target.starts_with("..") {
            return None;
        }
        let root_dir = profile
            .root_dir
            .clone()
            .unwrap_or_else(|| parent_dir(&profile.tsconfig_rel).to_string());

        let emit_dirs = [profile.out_dir.as_deref(), profile.declaration_dir.as_deref()];
        for out_dir in emit_dirs.into_iter().flatten() {
            if out_dir.starts_with('/') || out_dir == root_dir {
                continue;
            }
            let Some(emitted) = strip_dir(&target, out_dir) else {
                continue;
            };
            if let Some(source) = source_for_output(ctx.lookup, &root_dir, emitted) {
                return Some(Classification {
                    reason_code: ReasonCode::GeneratedExpectedMissing,
                    plugin_id: self.id(),
                    generated_match: Some(ArtifactMatch {
                        matched: true,
                        source: MatchSource::Index,
                        match_type: Some(MatchType::SourceCounterpart),
                        candidate: Some(target),
                        source_path: Some(source),
                    }),
                });
            }
        }
        None
    }
}
