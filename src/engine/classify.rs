//! Reason-code selection for unresolved specifiers
//!
//! Precedence: parser noise, root escape, build-context plugins, fixture
//! importers, exhausted budgets, then the missing-file fallbacks.

use std::collections::HashSet;

use crate::config::ResolverConfig;
use crate::language::{ImporterCaps, ImporterInfo};
use crate::paths::{SpecifierKind, escapes_root, join_rel};
use crate::taxonomy::ReasonCode;

use super::probe::is_system_path;

const NOISE_CHARS: &[char] = &['<', '>', '|', '^'];
const EXPECTED_OUTPUT_SEGMENT: &str = "/tests/expected_output/";
const FIXTURE_SEGMENTS: &[&str] = &["/fixtures/", "/__fixtures__/", "/testdata/"];

/// Recognizes specifiers that are parser artifacts rather than imports
#[derive(Debug, Clone, Default)]
pub struct NoiseFilter {
    prefixes: Vec<String>,
    ignore: HashSet<String>,
}

impl NoiseFilter {
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            prefixes: config
                .noise_prefixes
                .iter()
                .map(|p| p.trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            ignore: config
                .noise_ignore
                .iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_noise(&self, spec: &str, raw_spec: &str, importer: &ImporterInfo) -> bool {
        let trimmed = spec.trim();
        if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
            return true;
        }
        let lower = trimmed.to_ascii_lowercase();
        if self.prefixes.iter().any(|prefix| lower.starts_with(prefix.as_str())) {
            return true;
        }
        if anchored(&importer.importer_rel).contains(EXPECTED_OUTPUT_SEGMENT) {
            return true;
        }
        if trimmed.contains(NOISE_CHARS) || trimmed.chars().any(char::is_whitespace) {
            return true;
        }
        if is_system_path(trimmed)
            && importer.caps.intersects(ImporterCaps::SHELL | ImporterCaps::PATH_LIKE)
        {
            return true;
        }
        self.ignore.contains(&lower) || self.ignore.contains(&raw_spec.trim().to_ascii_lowercase())
    }
}

/// Lowercased importer path with a leading slash for segment matching.
fn anchored(importer_rel: &str) -> String {
    format!("/{}", importer_rel.to_ascii_lowercase())
}

pub fn is_fixture_importer(importer_rel: &str) -> bool {
    let anchored = anchored(importer_rel);
    FIXTURE_SEGMENTS.iter().any(|segment| anchored.contains(segment))
}

/// A relative specifier that climbs above the repository root.
pub fn escapes_repository(spec: &str, importer: &ImporterInfo) -> bool {
    SpecifierKind::classify(spec) == SpecifierKind::Relative
        && escapes_root(&join_rel(&importer.importer_dir, spec))
}

/// Inputs to the precedence chain besides the specifier itself
#[derive(Debug, Clone, Copy)]
pub struct ReasonInputs<'a> {
    pub spec: &'a str,
    pub importer: &'a ImporterInfo,
    pub noise: bool,
    pub plugin: Option<ReasonCode>,
    pub budget_exhausted: bool,
}

pub fn select_reason_code(inputs: ReasonInputs<'_>) -> ReasonCode {
    if inputs.noise {
        return ReasonCode::ParserNoiseSuppressed;
    }
    if escapes_repository(inputs.spec, inputs.importer) {
        return ReasonCode::PathNormalization;
    }
    if let Some(code) = inputs.plugin {
        return code;
    }
    if is_fixture_importer(&inputs.importer.importer_rel) {
        return ReasonCode::FixtureReference;
    }
    if inputs.budget_exhausted {
        return ReasonCode::ResolverBudgetExhausted;
    }
    if SpecifierKind::classify(inputs.spec).is_path_based() {
        ReasonCode::MissingFileRelative
    } else {
        ReasonCode::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::classify_importer;

    fn filter() -> NoiseFilter {
        let mut config = ResolverConfig::default();
        config.noise_ignore = vec!["Legacy-Shim".to_string()];
        NoiseFilter::from_config(&config)
    }

    fn reason(spec: &str, importer: &str, plugin: Option<ReasonCode>, exhausted: bool) -> ReasonCode {
        let info = classify_importer(importer);
        select_reason_code(ReasonInputs {
            spec,
            importer: &info,
            noise: filter().is_noise(spec, spec, &info),
            plugin,
            budget_exhausted: exhausted,
        })
    }

    #[test]
    fn noise_patterns_are_recognized() {
        let noise = filter();
        let ts = classify_importer("src/app.ts");
        assert!(noise.is_noise("node:fs", "node:fs", &ts));
        assert!(noise.is_noise("@types/node", "@types/node", &ts));
        assert!(noise.is_noise("..", "..", &ts));
        assert!(noise.is_noise("a<b>", "a<b>", &ts));
        assert!(noise.is_noise("./has space", "./has space", &ts));
        assert!(noise.is_noise("legacy-shim", "legacy-shim", &ts));
        assert!(!noise.is_noise("./lib", "./lib", &ts));

        let expected = classify_importer("pkg/tests/expected_output/out.ts");
        assert!(noise.is_noise("./lib", "./lib", &expected));

        let shell = classify_importer("scripts/setup.sh");
        assert!(noise.is_noise("/usr/bin/env", "/usr/bin/env", &shell));
        assert!(!noise.is_noise("/usr/bin/env", "/usr/bin/env", &ts));
    }

    #[test]
    fn precedence_follows_the_chain() {
        assert_eq!(reason("node:fs", "src/a.ts", None, true), ReasonCode::ParserNoiseSuppressed);
        assert_eq!(reason("../../up", "src/a.ts", None, false), ReasonCode::PathNormalization);
        assert_eq!(
            reason("./gen", "test/fixtures/a.ts", Some(ReasonCode::GeneratedExpectedMissing), false),
            ReasonCode::GeneratedExpectedMissing
        );
        assert_eq!(reason("./gen", "test/fixtures/a.ts", None, true), ReasonCode::FixtureReference);
        assert_eq!(reason("./gen", "src/a.ts", None, true), ReasonCode::ResolverBudgetExhausted);
        assert_eq!(reason("./gen", "src/a.ts", None, false), ReasonCode::MissingFileRelative);
        assert_eq!(reason("/abs", "src/a.ts", None, false), ReasonCode::MissingFileRelative);
        assert_eq!(reason("pkg", "src/a.ts", None, false), ReasonCode::Unknown);
    }

    #[test]
    fn fixture_segments_match_anywhere() {
        assert!(is_fixture_importer("fixtures/a.ts"));
        assert!(is_fixture_importer("pkg/__fixtures__/a.ts"));
        assert!(is_fixture_importer("go/testdata/x.go"));
        assert!(!is_fixture_importer("src/fixturesque.ts"));
    }
}
