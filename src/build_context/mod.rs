//! Build-context classification of unresolved imports
//!
//! Runs only for specifiers that fell through every resolver. Classifiers
//! are tried in ascending priority and the first hit decides the reason
//! code:
//!
//! | priority | classifier | reason |
//! |---|---|---|
//! | 10 | [`BazelLabelClassifier`] | `RESOLVER_GAP` |
//! | 15 | [`NixFlakeClassifier`] | `RESOLVER_GAP` |
//! | 18 | [`TsEmitClassifier`] | `GENERATED_EXPECTED_MISSING` |
//! | 20 | [`GeneratedArtifactClassifier`] | `GENERATED_EXPECTED_MISSING` |

pub mod bazel;
pub mod expected_artifacts;
pub mod generated;
pub mod nix;
pub mod ts_emit;

pub use bazel::BazelLabelClassifier;
pub use expected_artifacts::{ArtifactMatch, ExpectedArtifactsIndex, MatchSource, MatchType};
pub use generated::GeneratedArtifactClassifier;
pub use nix::NixFlakeClassifier;
pub use ts_emit::TsEmitClassifier;

use std::sync::Arc;

use crate::config_resolvers::TsConfigProfile;
use crate::fingerprint::{Sha256Hash, fingerprint_parts};
use crate::language::ImporterInfo;
use crate::lookup::FileLookup;
use crate::taxonomy::ReasonCode;

pub const BUILD_CONTEXT_VERSION: &str = "build-context-v1";

/// What a classifier sees of one unresolved specifier
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    pub importer: &'a ImporterInfo,
    /// Normalized specifier
    pub spec: &'a str,
    pub raw_spec: &'a str,
    pub tsconfig: Option<&'a TsConfigProfile>,
    pub lookup: &'a FileLookup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub reason_code: ReasonCode,
    pub plugin_id: &'static str,
    pub generated_match: Option<ArtifactMatch>,
}

impl Classification {
    pub fn new(reason_code: ReasonCode, plugin_id: &'static str) -> Self {
        Self {
            reason_code,
            plugin_id,
            generated_match: None,
        }
    }
}

/// Trait implemented by build-system aware classifiers
pub trait Classifier: Send + Sync {
    /// Stable identifier, part of the build-context fingerprint
    fn id(&self) -> &'static str;

    /// Lower runs first
    fn priority(&self) -> u32;

    fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<Classification>;
}

pub struct BuildContext {
    classifiers: Vec<Box<dyn Classifier>>,
    artifacts: Arc<ExpectedArtifactsIndex>,
    fingerprint: Sha256Hash,
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("classifiers", &self.classifier_ids())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl BuildContext {
    /// Default classifiers over the given file set; none when disabled.
    pub fn new<'a, I>(files: I, enabled: bool) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let artifacts = Arc::new(ExpectedArtifactsIndex::build(files));
        let classifiers: Vec<Box<dyn Classifier>> = if enabled {
            vec![
                Box::new(BazelLabelClassifier),
                Box::new(NixFlakeClassifier),
                Box::new(TsEmitClassifier),
                Box::new(GeneratedArtifactClassifier::new(Arc::clone(&artifacts))),
            ]
        } else {
            Vec::new()
        };
        Self::with_classifiers(artifacts, classifiers)
    }

    pub fn with_classifiers(
        artifacts: Arc<ExpectedArtifactsIndex>,
        mut classifiers: Vec<Box<dyn Classifier>>,
    ) -> Self {
        classifiers.sort_by(|a, b| a.priority().cmp(&b.priority()).then_with(|| a.id().cmp(b.id())));
        let fingerprint = fingerprint_parts(
            BUILD_CONTEXT_VERSION,
            classifiers
                .iter()
                .map(|c| format!("{}:{}", c.id(), c.priority())),
        );
        Self {
            classifiers,
            artifacts,
            fingerprint,
        }
    }

    pub fn fingerprint(&self) -> &Sha256Hash {
        &self.fingerprint
    }

    pub fn expected_artifacts(&self) -> &ExpectedArtifactsIndex {
        &self.artifacts
    }

    pub fn is_enabled(&self) -> bool {
        !self.classifiers.is_empty()
    }

    pub fn classifier_ids(&self) -> Vec<&'static str> {
        self.classifiers.iter().map(|c| c.id()).collect()
    }

    /// First classification in priority order.
    pub fn classify_unresolved(&self, ctx: &ClassifyContext<'_>) -> Option<Classification> {
        self.classifiers.iter().find_map(|classifier| {
            let hit = classifier.classify(ctx);
            if let Some(hit) = &hit {
                tracing::debug!(
                    "[imports] {} classified {} -> {} as {}",
                    hit.plugin_id,
                    ctx.importer.importer_rel,
                    ctx.spec,
                    hit.reason_code
                );
            }
            hit
        })
    }
}
