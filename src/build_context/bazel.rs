//! Bazel labels that the file lookup cannot map to a file

use super::{Classification, Classifier, ClassifyContext};
use crate::language::ImporterCaps;
use crate::language::common::parse_bazel_label;
use crate::taxonomy::ReasonCode;

/// `//pkg:target`, `@repo//pkg:target`, and `:target` from Bazel sources.
///
/// Targets are build outputs or rules, not files, so a miss is a resolver
/// gap rather than a missing file.
#[derive(Debug, Clone, Copy, Default)]
pub struct BazelLabelClassifier;

impl Classifier for BazelLabelClassifier {
    fn id(&self) -> &'static str {
        "bazel-label"
    }

    fn priority(&self) -> u32 {
        10
    }

    fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<Classification> {
        let spec = ctx.spec;
        let bazel_source = ctx.importer.is(ImporterCaps::BAZEL_SOURCE);
        let label_form = spec.starts_with("//") || (spec.starts_with('@') && spec.contains("//"));
        if !label_form && !(bazel_source && spec.starts_with(':')) {
            return None;
        }
        let label = parse_bazel_label(spec, &ctx.importer.importer_dir)?;
        // `//dir/file.h` without a target is a rooted path, not a label
        if !bazel_source && label.repo.is_none() && !spec.contains(':') {
            return None;
        }
        Some(Classification::new(ReasonCode::ResolverGap, self.id()))
    }
}
