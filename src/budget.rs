//! Per-specifier resolution budgets
//!
//! [`BudgetPolicy`] is derived once per run from settings and optional runtime
//! signals. Every specifier gets a fresh [`BudgetState`]; resolvers that probe
//! the filesystem must consume from it before each probe and stop as soon as
//! a consume call returns `false`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::BudgetConfig;

pub const BUDGET_POLICY_VERSION: &str = "import-resolution-budgets-v2";
pub const DEFAULT_MAX_FILESYSTEM_PROBES: usize = 32;
pub const DEFAULT_MAX_FALLBACK_CANDIDATES: usize = 48;
pub const DEFAULT_MAX_FALLBACK_DEPTH: usize = 16;
pub const MAX_BUDGET_VALUE: usize = 4096;

const MIN_ADAPTIVE_SCALE: f64 = 0.5;
const MAX_ADAPTIVE_SCALE: f64 = 2.0;

/// Budget kinds reported when a specifier runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetKind {
    FallbackCandidates,
    FallbackDepth,
    FilesystemProbe,
}

impl BudgetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BudgetKind::FallbackCandidates => "fallback_candidates",
            BudgetKind::FallbackDepth => "fallback_depth",
            BudgetKind::FilesystemProbe => "filesystem_probe",
        }
    }
}

/// Scheduler and host signals the adaptive profile reacts to.
///
/// Ratios are clamped to `[0, 1]`; `None` means the signal is unavailable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeSignals {
    pub utilization: Option<f64>,
    pub memory_pressure: Option<f64>,
    pub fd_pressure: Option<f64>,
    pub pending: usize,
    pub running: usize,
    pub cpu_concurrency: usize,
    pub io_concurrency: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptiveProfile {
    Normal,
    Disabled,
    PressureCritical,
    PressureHigh,
    QueueBacklogUnderutilized,
    QueueBacklog,
    CapacityHeadroom,
}

fn clamp_ratio(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite()).map(|v| v.clamp(0.0, 1.0))
}

fn clamp_budget(value: usize) -> usize {
    value.min(MAX_BUDGET_VALUE)
}

impl RuntimeSignals {
    fn profile(&self) -> (AdaptiveProfile, f64) {
        let utilization = clamp_ratio(self.utilization);
        let pressures = [clamp_ratio(self.memory_pressure), clamp_ratio(self.fd_pressure)];
        let pressure_at = |threshold: f64| pressures.iter().flatten().any(|p| *p >= threshold);
        let utilization_below = |threshold: f64| utilization.is_some_and(|u| u < threshold);
        let demand = self.pending + self.running;

        let (profile, multiplier) = if pressure_at(0.9) {
            (AdaptiveProfile::PressureCritical, 0.5)
        } else if pressure_at(0.8) {
            (AdaptiveProfile::PressureHigh, 0.7)
        } else if utilization_below(0.35) && self.pending >= 96 {
            (AdaptiveProfile::QueueBacklogUnderutilized, 0.65)
        } else if utilization_below(0.6) && self.pending >= 48 {
            (AdaptiveProfile::QueueBacklog, 0.8)
        } else if utilization.is_some_and(|u| u >= 0.85) && demand <= 16 {
            (AdaptiveProfile::CapacityHeadroom, 1.25)
        } else {
            (AdaptiveProfile::Normal, 1.0)
        };

        let host = self.cpu_concurrency.max(self.io_concurrency);
        let host_multiplier = if host > 0 {
            (host as f64 / 8.0).clamp(0.75, 1.5)
        } else {
            1.0
        };
        let scale = (multiplier * host_multiplier).clamp(MIN_ADAPTIVE_SCALE, MAX_ADAPTIVE_SCALE);
        (profile, scale)
    }
}

fn apply_scale(base: usize, scale: f64, depth_weighted: bool) -> usize {
    if base == 0 {
        return 0;
    }
    let effective = if depth_weighted {
        1.0 + (scale - 1.0) * 0.5
    } else {
        scale
    };
    let scaled = (base as f64 * effective).round();
    if scaled.is_finite() && scaled >= 0.0 {
        clamp_budget(scaled as usize)
    } else {
        base
    }
}

/// Process-wide budget limits
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetPolicy {
    #[serde(rename = "maxFilesystemProbesPerSpecifier")]
    pub max_filesystem_probes: usize,
    #[serde(rename = "maxFallbackCandidatesPerSpecifier")]
    pub max_fallback_candidates: usize,
    pub max_fallback_depth: usize,
    pub adaptive_enabled: bool,
    pub adaptive_profile: AdaptiveProfile,
    pub adaptive_scale: f64,
    #[serde(skip)]
    fingerprint: String,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self::from_config(&BudgetConfig::default(), None)
    }
}

impl BudgetPolicy {
    /// Derive the policy. Values set explicitly in `config` are used as-is;
    /// the rest scale with the adaptive profile.
    pub fn from_config(config: &BudgetConfig, signals: Option<&RuntimeSignals>) -> Self {
        let adaptive_enabled = config.adaptive != Some(false);
        let (adaptive_profile, scale) = if adaptive_enabled {
            signals
                .map(RuntimeSignals::profile)
                .unwrap_or((AdaptiveProfile::Normal, 1.0))
        } else {
            (AdaptiveProfile::Disabled, 1.0)
        };

        let resolve = |explicit: Option<usize>, default: usize, depth_weighted: bool| match explicit {
            Some(value) => clamp_budget(value),
            None if adaptive_enabled => apply_scale(default, scale, depth_weighted),
            None => default,
        };

        let mut policy = Self {
            max_filesystem_probes: resolve(
                config.max_filesystem_probes,
                DEFAULT_MAX_FILESYSTEM_PROBES,
                false,
            ),
            max_fallback_candidates: resolve(
                config.max_fallback_candidates,
                DEFAULT_MAX_FALLBACK_CANDIDATES,
                false,
            ),
            max_fallback_depth: resolve(
                config.max_fallback_depth,
                DEFAULT_MAX_FALLBACK_DEPTH,
                true,
            ),
            adaptive_enabled,
            adaptive_profile,
            adaptive_scale: (scale * 1000.0).round() / 1000.0,
            fingerprint: String::new(),
        };
        policy.fingerprint = format!(
            "{BUDGET_POLICY_VERSION}|maxFallbackCandidatesPerSpecifier:{}|maxFallbackDepth:{}|maxFilesystemProbesPerSpecifier:{}",
            policy.max_fallback_candidates, policy.max_fallback_depth, policy.max_filesystem_probes
        );
        policy
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn new_state(&self) -> BudgetState {
        BudgetState {
            filesystem_probes_remaining: self.max_filesystem_probes,
            fallback_candidates_remaining: self.max_fallback_candidates,
            max_fallback_depth: self.max_fallback_depth,
            exhausted: BTreeSet::new(),
        }
    }
}

/// Mutable counters for one specifier
#[derive(Debug, Clone)]
pub struct BudgetState {
    filesystem_probes_remaining: usize,
    fallback_candidates_remaining: usize,
    max_fallback_depth: usize,
    exhausted: BTreeSet<BudgetKind>,
}

impl BudgetState {
    pub fn consume_filesystem_probe(&mut self) -> bool {
        if self.filesystem_probes_remaining == 0 {
            self.exhausted.insert(BudgetKind::FilesystemProbe);
            return false;
        }
        self.filesystem_probes_remaining -= 1;
        true
    }

    pub fn consume_fallback_candidate(&mut self) -> bool {
        if self.fallback_candidates_remaining == 0 {
            self.exhausted.insert(BudgetKind::FallbackCandidates);
            return false;
        }
        self.fallback_candidates_remaining -= 1;
        true
    }

    pub fn allow_fallback_depth(&mut self, depth: usize) -> bool {
        if depth <= self.max_fallback_depth {
            return true;
        }
        self.exhausted.insert(BudgetKind::FallbackDepth);
        false
    }

    pub fn is_exhausted(&self) -> bool {
        !self.exhausted.is_empty()
    }

    /// Exhausted budget kinds in name order.
    pub fn exhausted_types(&self) -> Vec<BudgetKind> {
        let mut kinds: Vec<BudgetKind> = self.exhausted.iter().copied().collect();
        kinds.sort_by_key(|kind| kind.as_str());
        kinds
    }
}
