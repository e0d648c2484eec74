//! Configured specifier aliases (`resolver.aliases`)
//!
//! A rule maps a specifier prefix to a repository directory. `@ui/*` ->
//! `src/ui/*` and `@ui/` -> `src/ui/` rewrite any specifier starting with
//! the prefix; a plain `@ui` -> `src/ui` rule matches `@ui` exactly and
//! `@ui/<rest>`. Rules are tried longest prefix first.

use crate::config::AliasRuleConfig;
use crate::fingerprint::{Sha256Hash, fingerprint_parts};
use crate::paths::{normalize_rel_path, sort_strings, to_posix};

pub const ALIAS_RULES_VERSION: &str = "alias-rules-v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRule {
    pub prefix: String,
    pub target: String,
    prefix_mode: bool,
    match_prefix: String,
    replace_prefix: String,
}

impl AliasRule {
    /// Compile one rule; wildcard on only one side or empty sides are rejected.
    pub fn new(prefix: &str, target: &str) -> Option<Self> {
        let prefix = to_posix(prefix.trim());
        let target = to_posix(target.trim());
        if prefix.is_empty() || target.is_empty() {
            return None;
        }
        let match_wildcard = prefix.ends_with("/*");
        if match_wildcard != target.ends_with("/*") {
            return None;
        }
        let prefix_mode = match_wildcard || prefix.ends_with('/');
        let strip = |value: &str| {
            if match_wildcard {
                value[..value.len() - 1].to_string()
            } else {
                value.to_string()
            }
        };
        let match_prefix = strip(&prefix);
        let replace_prefix = strip(&target);
        if match_prefix.is_empty() || replace_prefix.is_empty() {
            return None;
        }
        Some(Self {
            prefix,
            target,
            prefix_mode,
            match_prefix,
            replace_prefix,
        })
    }

    /// Rewritten specifier when this rule applies.
    pub fn apply(&self, spec: &str) -> Option<String> {
        if self.prefix_mode {
            let suffix = spec.strip_prefix(self.match_prefix.as_str())?;
            return Some(format!("{}{suffix}", self.replace_prefix));
        }
        if spec == self.prefix {
            return Some(self.target.clone());
        }
        let suffix = spec.strip_prefix(self.prefix.as_str())?.strip_prefix('/')?;
        Some(format!("{}/{suffix}", self.target.trim_end_matches('/')))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AliasRules {
    rules: Vec<AliasRule>,
    fingerprint: Option<Sha256Hash>,
}

impl AliasRules {
    pub fn from_config(configs: &[AliasRuleConfig]) -> Self {
        let mut rules: Vec<AliasRule> = configs
            .iter()
            .filter_map(|rule| {
                let compiled = AliasRule::new(&rule.prefix, &rule.target);
                if compiled.is_none() {
                    tracing::debug!(
                        "[imports] ignoring alias rule {} -> {}",
                        rule.prefix,
                        rule.target
                    );
                }
                compiled
            })
            .collect();
        rules.sort_by(|a, b| {
            b.match_prefix
                .len()
                .cmp(&a.match_prefix.len())
                .then_with(|| sort_strings(&a.prefix, &b.prefix))
        });
        rules.dedup_by(|a, b| a.prefix == b.prefix && a.target == b.target);

        let fingerprint = if rules.is_empty() {
            None
        } else {
            let mut parts: Vec<String> = rules
                .iter()
                .map(|rule| format!("{}->{}", rule.prefix, rule.target))
                .collect();
            parts.sort_by(|a, b| sort_strings(a, b));
            Some(fingerprint_parts(ALIAS_RULES_VERSION, parts))
        };
        Self { rules, fingerprint }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[AliasRule] {
        &self.rules
    }

    /// `None` when no rules are configured, so the cache key is unchanged.
    pub fn fingerprint(&self) -> Option<&Sha256Hash> {
        self.fingerprint.as_ref()
    }

    /// Rewritten, normalized in-repo candidates in rule order.
    pub fn candidates(&self, spec: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for rule in &self.rules {
            let Some(rewritten) = rule.apply(spec) else {
                continue;
            };
            let normalized = normalize_rel_path(&rewritten);
            if normalized.is_empty()
                || normalized.starts_with('/')
                || normalized.starts_with("..")
                || out.contains(&normalized)
            {
                continue;
            }
            out.push(normalized);
        }
        out
    }

    /// First candidate the resolver accepts.
    pub fn resolve<F>(&self, spec: &str, mut resolve_candidate: F) -> Option<String>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if spec.is_empty() || self.rules.is_empty() {
            return None;
        }
        self.candidates(spec)
            .iter()
            .find_map(|candidate| resolve_candidate(candidate))
    }
}
