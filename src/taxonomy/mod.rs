//! Unresolved-import reason codes and their fixed decision table
//!
//! Every unresolved specifier carries a [`ReasonCode`] which maps to exactly
//! one `(failure cause, disposition, resolver stage)` triple. Resolved
//! specifiers carry none of the four.

pub mod gate;

pub use gate::{GateAggregates, GateEligibility};

use serde::{Deserialize, Serialize};
use std::fmt;

pub const REASON_CODE_PREFIX: &str = "IMP_U_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionState {
    Resolved,
    Unresolved,
}

/// `resolvedType` of an edge: how a specifier was resolved, or that it was
/// classified external or left unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolvedType {
    Relative,
    TsPath,
    PluginAlias,
    RubyLoadPath,
    PythonModule,
    PerlPackage,
    LuaModule,
    PhpNamespace,
    ShellPath,
    GoModule,
    JavaPackage,
    KotlinPackage,
    CsharpNamespace,
    SwiftModule,
    DartModule,
    ScalaPackage,
    GroovyPackage,
    JuliaModule,
    ClikeInclude,
    RustModule,
    PathLike,
    External,
    Unresolved,
}

impl ResolvedType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolvedType::Relative => "relative",
            ResolvedType::TsPath => "ts-path",
            ResolvedType::PluginAlias => "plugin-alias",
            ResolvedType::RubyLoadPath => "ruby-load-path",
            ResolvedType::PythonModule => "python-module",
            ResolvedType::PerlPackage => "perl-package",
            ResolvedType::LuaModule => "lua-module",
            ResolvedType::PhpNamespace => "php-namespace",
            ResolvedType::ShellPath => "shell-path",
            ResolvedType::GoModule => "go-module",
            ResolvedType::JavaPackage => "java-package",
            ResolvedType::KotlinPackage => "kotlin-package",
            ResolvedType::CsharpNamespace => "csharp-namespace",
            ResolvedType::SwiftModule => "swift-module",
            ResolvedType::DartModule => "dart-module",
            ResolvedType::ScalaPackage => "scala-package",
            ResolvedType::GroovyPackage => "groovy-package",
            ResolvedType::JuliaModule => "julia-module",
            ResolvedType::ClikeInclude => "clike-include",
            ResolvedType::RustModule => "rust-module",
            ResolvedType::PathLike => "path-like",
            ResolvedType::External => "external",
            ResolvedType::Unresolved => "unresolved",
        }
    }

    /// In-repo hit: anything but external and unresolved.
    pub fn is_in_repo(self) -> bool {
        !matches!(self, ResolvedType::External | ResolvedType::Unresolved)
    }

    pub fn state(self) -> ResolutionState {
        if self == ResolvedType::Unresolved {
            ResolutionState::Unresolved
        } else {
            ResolutionState::Resolved
        }
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    #[serde(rename = "IMP_U_MISSING_FILE_RELATIVE")]
    MissingFileRelative,
    #[serde(rename = "IMP_U_MISSING_DEPENDENCY_PACKAGE")]
    MissingDependencyPackage,
    #[serde(rename = "IMP_U_GENERATED_EXPECTED_MISSING")]
    GeneratedExpectedMissing,
    #[serde(rename = "IMP_U_RESOLVER_BUDGET_EXHAUSTED")]
    ResolverBudgetExhausted,
    #[serde(rename = "IMP_U_PARSER_NOISE_SUPPRESSED")]
    ParserNoiseSuppressed,
    #[serde(rename = "IMP_U_FIXTURE_REFERENCE")]
    FixtureReference,
    #[serde(rename = "IMP_U_OPTIONAL_DEPENDENCY")]
    OptionalDependency,
    #[serde(rename = "IMP_U_PATH_NORMALIZATION")]
    PathNormalization,
    #[serde(rename = "IMP_U_TYPO")]
    Typo,
    #[serde(rename = "IMP_U_PARSE_ERROR")]
    ParseError,
    #[serde(rename = "IMP_U_RESOLVER_GAP")]
    ResolverGap,
    #[serde(rename = "IMP_U_UNKNOWN")]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    MissingFile,
    MissingDependency,
    GeneratedExpectedMissing,
    ParserArtifact,
    ResolverGap,
    ParseError,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Actionable,
    SuppressLive,
    SuppressGate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverStage {
    Collector,
    Normalize,
    LanguageResolver,
    BuildSystemResolver,
    FilesystemProbe,
    Classify,
}

impl ReasonCode {
    pub const ALL: [ReasonCode; 12] = [
        ReasonCode::MissingFileRelative,
        ReasonCode::MissingDependencyPackage,
        ReasonCode::GeneratedExpectedMissing,
        ReasonCode::ResolverBudgetExhausted,
        ReasonCode::ParserNoiseSuppressed,
        ReasonCode::FixtureReference,
        ReasonCode::OptionalDependency,
        ReasonCode::PathNormalization,
        ReasonCode::Typo,
        ReasonCode::ParseError,
        ReasonCode::ResolverGap,
        ReasonCode::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::MissingFileRelative => "IMP_U_MISSING_FILE_RELATIVE",
            ReasonCode::MissingDependencyPackage => "IMP_U_MISSING_DEPENDENCY_PACKAGE",
            ReasonCode::GeneratedExpectedMissing => "IMP_U_GENERATED_EXPECTED_MISSING",
            ReasonCode::ResolverBudgetExhausted => "IMP_U_RESOLVER_BUDGET_EXHAUSTED",
            ReasonCode::ParserNoiseSuppressed => "IMP_U_PARSER_NOISE_SUPPRESSED",
            ReasonCode::FixtureReference => "IMP_U_FIXTURE_REFERENCE",
            ReasonCode::OptionalDependency => "IMP_U_OPTIONAL_DEPENDENCY",
            ReasonCode::PathNormalization => "IMP_U_PATH_NORMALIZATION",
            ReasonCode::Typo => "IMP_U_TYPO",
            ReasonCode::ParseError => "IMP_U_PARSE_ERROR",
            ReasonCode::ResolverGap => "IMP_U_RESOLVER_GAP",
            ReasonCode::Unknown => "IMP_U_UNKNOWN",
        }
    }

    /// Parse a code with or without the `IMP_U_` prefix.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let bare = value.strip_prefix(REASON_CODE_PREFIX).unwrap_or(value);
        Self::ALL
            .into_iter()
            .find(|code| &code.as_str()[REASON_CODE_PREFIX.len()..] == bare)
    }

    /// The fixed decision table.
    pub fn decision(self) -> UnresolvedDecision {
        use Disposition::*;
        use FailureCause as C;
        use ResolverStage as S;
        let (failure_cause, disposition, resolver_stage) = match self {
            ReasonCode::MissingFileRelative => (C::MissingFile, Actionable, S::FilesystemProbe),
            ReasonCode::MissingDependencyPackage => {
                (C::MissingDependency, Actionable, S::LanguageResolver)
            }
            ReasonCode::GeneratedExpectedMissing => (
                C::GeneratedExpectedMissing,
                SuppressGate,
                S::BuildSystemResolver,
            ),
            ReasonCode::ResolverBudgetExhausted => {
                (C::ResolverGap, SuppressGate, S::FilesystemProbe)
            }
            ReasonCode::ParserNoiseSuppressed => (C::ParserArtifact, SuppressLive, S::Classify),
            ReasonCode::FixtureReference => (C::ParserArtifact, SuppressLive, S::Classify),
            ReasonCode::OptionalDependency => (C::MissingDependency, SuppressLive, S::Classify),
            ReasonCode::PathNormalization => (C::ResolverGap, SuppressGate, S::Normalize),
            ReasonCode::Typo => (C::Unknown, Actionable, S::Classify),
            ReasonCode::ParseError => (C::ParseError, Actionable, S::Collector),
            ReasonCode::ResolverGap => (C::ResolverGap, SuppressGate, S::LanguageResolver),
            ReasonCode::Unknown => (C::Unknown, Actionable, S::Classify),
        };
        UnresolvedDecision {
            reason_code: self,
            failure_cause,
            disposition,
            resolver_stage,
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FailureCause {
    pub const ALL: [FailureCause; 7] = [
        FailureCause::MissingFile,
        FailureCause::MissingDependency,
        FailureCause::GeneratedExpectedMissing,
        FailureCause::ParserArtifact,
        FailureCause::ResolverGap,
        FailureCause::ParseError,
        FailureCause::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FailureCause::MissingFile => "missing_file",
            FailureCause::MissingDependency => "missing_dependency",
            FailureCause::GeneratedExpectedMissing => "generated_expected_missing",
            FailureCause::ParserArtifact => "parser_artifact",
            FailureCause::ResolverGap => "resolver_gap",
            FailureCause::ParseError => "parse_error",
            FailureCause::Unknown => "unknown",
        }
    }

    /// Causes that can never be actionable
    pub fn forbids_actionable(self) -> bool {
        matches!(
            self,
            FailureCause::ParserArtifact
                | FailureCause::ResolverGap
                | FailureCause::GeneratedExpectedMissing
        )
    }
}

impl Disposition {
    pub const ALL: [Disposition; 3] = [
        Disposition::Actionable,
        Disposition::SuppressLive,
        Disposition::SuppressGate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Actionable => "actionable",
            Disposition::SuppressLive => "suppress_live",
            Disposition::SuppressGate => "suppress_gate",
        }
    }

    pub fn is_actionable(self) -> bool {
        self == Disposition::Actionable
    }
}

impl ResolverStage {
    pub const ALL: [ResolverStage; 6] = [
        ResolverStage::Collector,
        ResolverStage::Normalize,
        ResolverStage::LanguageResolver,
        ResolverStage::BuildSystemResolver,
        ResolverStage::FilesystemProbe,
        ResolverStage::Classify,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResolverStage::Collector => "collector",
            ResolverStage::Normalize => "normalize",
            ResolverStage::LanguageResolver => "language_resolver",
            ResolverStage::BuildSystemResolver => "build_system_resolver",
            ResolverStage::FilesystemProbe => "filesystem_probe",
            ResolverStage::Classify => "classify",
        }
    }
}

/// Taxonomy attached to one unresolved specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedDecision {
    pub reason_code: ReasonCode,
    pub failure_cause: FailureCause,
    pub disposition: Disposition,
    pub resolver_stage: ResolverStage,
}

impl UnresolvedDecision {
    /// Decision for a raw reason-code string; unknown codes degrade to
    /// `UNKNOWN` at `stage`.
    pub fn from_code_str(code: &str, stage: ResolverStage) -> Self {
        match ReasonCode::parse(code) {
            Some(code) => code.decision(),
            None => UnresolvedDecision {
                reason_code: ReasonCode::Unknown,
                failure_cause: FailureCause::Unknown,
                disposition: Disposition::Actionable,
                resolver_stage: stage,
            },
        }
    }
}

/// Loosely typed decision fields as they appear on serialized edges and
/// warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionFields<'a> {
    pub state: Option<&'a str>,
    pub reason_code: Option<&'a str>,
    pub failure_cause: Option<&'a str>,
    pub disposition: Option<&'a str>,
    pub resolver_stage: Option<&'a str>,
}

fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Check decision fields against the taxonomy rules, returning every
/// violation found.
pub fn validate_decision(fields: &DecisionFields<'_>) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    let named = [
        ("reasonCode", fields.reason_code),
        ("failureCause", fields.failure_cause),
        ("disposition", fields.disposition),
        ("resolverStage", fields.resolver_stage),
    ];

    match fields.state {
        Some("resolved") => {
            for (name, value) in named {
                if has_text(value) {
                    errors.push(format!("resolved decision must not include {name}"));
                }
            }
        }
        Some("unresolved") => {
            for (name, value) in named {
                if !has_text(value) {
                    errors.push(format!("unresolved decision requires {name}"));
                }
            }
            if let Some(code) = fields.reason_code.filter(|v| has_text(Some(v))) {
                if !ReasonCode::ALL.iter().any(|c| c.as_str() == code) {
                    errors.push(format!("unresolved decision has unknown reasonCode={code}"));
                }
            }
            let cause = fields
                .failure_cause
                .and_then(|v| FailureCause::ALL.into_iter().find(|c| c.as_str() == v));
            if let Some(value) = fields.failure_cause.filter(|v| has_text(Some(v))) {
                if cause.is_none() {
                    errors.push(format!("unresolved decision has unknown failureCause={value}"));
                }
            }
            if let Some(value) = fields.disposition.filter(|v| has_text(Some(v))) {
                if !Disposition::ALL.iter().any(|d| d.as_str() == value) {
                    errors.push(format!("unresolved decision has unknown disposition={value}"));
                }
            }
            if let Some(value) = fields.resolver_stage.filter(|v| has_text(Some(v))) {
                if !ResolverStage::ALL.iter().any(|s| s.as_str() == value) {
                    errors.push(format!("unresolved decision has unknown resolverStage={value}"));
                }
            }
            if fields.disposition == Some(Disposition::Actionable.as_str())
                && cause.is_some_and(FailureCause::forbids_actionable)
            {
                errors.push(format!(
                    "disposition=actionable not allowed for failureCause={}",
                    fields.failure_cause.unwrap_or_default()
                ));
            }
        }
        other => errors.push(format!("invalid resolutionState: {}", other.unwrap_or("null"))),
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_has_a_valid_decision() {
        for code in ReasonCode::ALL {
            let decision = code.decision();
            let fields = DecisionFields {
                state: Some("unresolved"),
                reason_code: Some(decision.reason_code.as_str()),
                failure_cause: Some(decision.failure_cause.as_str()),
                disposition: Some(decision.disposition.as_str()),
                resolver_stage: Some(decision.resolver_stage.as_str()),
            };
            assert_eq!(validate_decision(&fields), Ok(()), "{code}");
        }
    }

    #[test]
    fn unknown_codes_degrade() {
        let decision = UnresolvedDecision::from_code_str("IMP_U_NOT_A_CODE", ResolverStage::Normalize);
        assert_eq!(decision.reason_code, ReasonCode::Unknown);
        assert_eq!(decision.disposition, Disposition::Actionable);
        assert_eq!(decision.resolver_stage, ResolverStage::Normalize);

        let known = UnresolvedDecision::from_code_str("RESOLVER_GAP", ResolverStage::Classify);
        assert_eq!(known.reason_code, ReasonCode::ResolverGap);
        assert_eq!(known.disposition, Disposition::SuppressGate);
    }

    #[test]
    fn serialized_codes_carry_prefix() {
        let json = serde_json::to_string(&ReasonCode::GeneratedExpectedMissing).unwrap();
        assert_eq!(json, "\"IMP_U_GENERATED_EXPECTED_MISSING\"");
        let decision = serde_json::to_value(ReasonCode::Typo.decision()).unwrap();
        assert_eq!(decision["failureCause"], "unknown");
        assert_eq!(decision["resolverStage"], "classify");
    }

    #[test]
    fn validation_rejects_inconsistent_fields() {
        let resolved = DecisionFields {
            state: Some("resolved"),
            reason_code: Some("IMP_U_TYPO"),
            ..Default::default()
        };
        assert!(validate_decision(&resolved).is_err());

        let actionable_gap = DecisionFields {
            state: Some("unresolved"),
            reason_code: Some("IMP_U_RESOLVER_GAP"),
            failure_cause: Some("resolver_gap"),
            disposition: Some("actionable"),
            resolver_stage: Some("language_resolver"),
        };
        let errors = validate_decision(&actionable_gap).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("actionable not allowed"));

        let missing = DecisionFields {
            state: Some("unresolved"),
            reason_code: Some("IMP_U_UNKNOWN"),
            ..Default::default()
        };
        assert_eq!(validate_decision(&missing).unwrap_err().len(), 3);
        assert!(validate_decision(&DecisionFields::default()).is_err());
    }
}
