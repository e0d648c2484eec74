//! Run statistics attached to the import graph

use serde::Serialize;
use std::collections::BTreeMap;

use crate::budget::BudgetPolicy;
use crate::fs_index::FsExistsIndex;
use crate::stages::StageCounters;
use crate::taxonomy::GateAggregates;

/// Existence accelerator usage during one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FsIndexStats {
    pub enabled: bool,
    pub complete: bool,
    pub truncated: bool,
    pub indexed_count: usize,
    pub bloom_bits: usize,
    pub exact_hits: usize,
    pub negative_skips: usize,
    pub unknown_fallbacks: usize,
}

impl FsIndexStats {
    pub fn from_index(index: Option<&FsExistsIndex>) -> Self {
        match index {
            Some(index) => {
                let summary = index.summary();
                Self {
                    enabled: true,
                    complete: summary.complete,
                    truncated: summary.truncated,
                    indexed_count: summary.indexed_count,
                    bloom_bits: summary.bloom_bits,
                    ..Self::default()
                }
            }
            None => Self::default(),
        }
    }
}

/// Persisted cache usage during one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub files: usize,
    pub files_hashed: usize,
    pub files_reused: usize,
    pub files_invalidated: usize,
    pub specs: usize,
    pub specs_reused: usize,
    pub specs_computed: usize,
    pub package_invalidated: bool,
    pub file_set_invalidated: bool,
    pub cache_key_invalidated: bool,
    pub lookup_reused: bool,
    pub lookup_invalidated: bool,
    pub prefetched_paths: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub files: usize,
    pub nodes: usize,
    pub edges: usize,
    pub resolved: usize,
    pub external: usize,
    pub unresolved: usize,
    pub unresolved_actionable: usize,
    pub unresolved_suppressed: usize,
    pub unresolved_actionable_rate: f64,
    pub unresolved_by_reason_code: BTreeMap<String, usize>,
    pub unresolved_by_failure_cause: BTreeMap<String, usize>,
    pub unresolved_by_disposition: BTreeMap<String, usize>,
    pub unresolved_budget_exhausted: usize,
    pub unresolved_budget_exhausted_by_type: BTreeMap<String, usize>,
    #[serde(flatten)]
    pub gate: GateAggregates,
    pub truncated_edges: usize,
    pub truncated_nodes: usize,
    pub max_edges: usize,
    pub max_nodes: usize,
    pub warning_suppressed: usize,
    pub resolver_fs_exists_index: FsIndexStats,
    pub resolver_budget_policy: BudgetPolicy,
    pub resolver_pipeline_stages: BTreeMap<&'static str, StageCounters>,
}

/// Increment a named counter.
pub(crate) fn bump(counts: &mut BTreeMap<String, usize>, key: &str) {
    *counts.entry(key.to_string()).or_default() += 1;
}
