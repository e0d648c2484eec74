//! Missing generated artifacts (protobuf, GraphQL, Dart, OpenAPI codegen)

use std::sync::Arc;

use super::{Classification, Classifier, ClassifyContext, ExpectedArtifactsIndex};
use crate::taxonomy::ReasonCode;

pub struct GeneratedArtifactClassifier {
    index: Arc<ExpectedArtifactsIndex>,
}

impl GeneratedArtifactClassifier {
    pub fn new(index: Arc<ExpectedArtifactsIndex>) -> Self {
        Self { index }
    }
}

impl Classifier for GeneratedArtifactClassifier {
    fn id(&self) -> &'static str {
        "generated-artifacts"
    }

    fn priority(&self) -> u32 {
        20
    }

    fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<Classification> {
        let spec = if ctx.spec.is_empty() { ctx.raw_spec } else { ctx.spec };
        let hit = self
            .index
            .match_specifier(&ctx.importer.importer_rel, spec);
        if !hit.matched {
            return None;
        }
        Some(Classification {
            reason_code: ReasonCode::GeneratedExpectedMissing,
            plugin_id: self.id(),
            generated_match: Some(hit),
        })
    }
}
