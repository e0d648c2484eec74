//! Per-stage resolver metrics
//!
//! Counters are deterministic and go into graph stats. Elapsed time is
//! reported separately so identical inputs still give identical stats.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::taxonomy::ResolverStage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCounters {
    pub attempts: u64,
    pub hits: u64,
    pub misses: u64,
    pub budget_exhausted: u64,
}

#[derive(Debug, Clone)]
pub struct StageTracker {
    counters: [StageCounters; ResolverStage::ALL.len()],
    elapsed: [Duration; ResolverStage::ALL.len()],
    timings: bool,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new(false)
    }
}

fn slot(stage: ResolverStage) -> usize {
    stage as usize
}

impl StageTracker {
    pub fn new(timings: bool) -> Self {
        Self {
            counters: [StageCounters::default(); ResolverStage::ALL.len()],
            elapsed: [Duration::ZERO; ResolverStage::ALL.len()],
            timings,
        }
    }

    /// Run `f` as one attempt of `stage`.
    pub fn with_stage<T>(&mut self, stage: ResolverStage, f: impl FnOnce() -> T) -> T {
        self.counters[slot(stage)].attempts += 1;
        if !self.timings {
            return f();
        }
        let started = Instant::now();
        let out = f();
        self.elapsed[slot(stage)] += started.elapsed();
        out
    }

    pub fn mark_hit(&mut self, stage: ResolverStage) {
        self.counters[slot(stage)].hits += 1;
    }

    pub fn mark_miss(&mut self, stage: ResolverStage) {
        self.counters[slot(stage)].misses += 1;
    }

    pub fn mark(&mut self, stage: ResolverStage, hit: bool) {
        if hit {
            self.mark_hit(stage);
        } else {
            self.mark_miss(stage);
        }
    }

    pub fn mark_budget_exhausted(&mut self, stage: ResolverStage) {
        self.counters[slot(stage)].budget_exhausted += 1;
    }

    pub fn counters(&self, stage: ResolverStage) -> StageCounters {
        self.counters[slot(stage)]
    }

    /// Counters for every stage, keyed by stage name.
    pub fn snapshot(&self) -> BTreeMap<&'static str, StageCounters> {
        ResolverStage::ALL
            .into_iter()
            .map(|stage| (stage.as_str(), self.counters(stage)))
            .collect()
    }

    /// Elapsed milliseconds per stage; `None` when timing is off.
    pub fn timings_ms(&self) -> Option<BTreeMap<&'static str, f64>> {
        if !self.timings {
            return None;
        }
        Some(
            ResolverStage::ALL
                .into_iter()
                .map(|stage| {
                    let ms = self.elapsed[slot(stage)].as_secs_f64() * 1000.0;
                    (stage.as_str(), (ms * 1000.0).round() / 1000.0)
                })
                .collect(),
        )
    }
}
