//! Live and release-gate eligibility of unresolved warnings
//!
//! Dispositions decide whether a warning counts for live reporting
//! (`suppress_live` never does) and whether it counts as actionable.
//! Gate eligibility additionally drops importers under test and fixture
//! path segments, whatever their reason code.

use serde::Serialize;

use super::Disposition;
use crate::config::GateConfig;

#[derive(Debug, Clone)]
pub struct GateEligibility {
    excluded_segments: Vec<String>,
}

impl Default for GateEligibility {
    fn default() -> Self {
        Self::new(&GateConfig::default())
    }
}

impl GateEligibility {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            excluded_segments: config
                .excluded_importer_segments
                .iter()
                .map(|s| s.to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// True when the importer lives under an excluded segment.
    ///
    /// The path is matched with a leading `/` so top-level directories such
    /// as `tests/` are caught too.
    pub fn is_excluded_importer(&self, importer: &str) -> bool {
        let lowered = format!("/{}", importer.trim_start_matches('/').to_lowercase());
        self.excluded_segments
            .iter()
            .any(|segment| lowered.contains(segment.as_str()))
    }

    pub fn is_live_eligible(&self, disposition: Disposition) -> bool {
        disposition != Disposition::SuppressLive
    }

    pub fn is_gate_eligible(&self, importer: &str, disposition: Disposition) -> bool {
        self.is_live_eligible(disposition) && !self.is_excluded_importer(importer)
    }

    pub fn aggregate<'a, I>(&self, warnings: I) -> GateAggregates
    where
        I: IntoIterator<Item = (&'a str, Disposition)>,
    {
        let mut out = GateAggregates::default();
        for (importer, disposition) in warnings {
            if self.is_live_eligible(disposition) {
                out.unresolved_live_eligible += 1;
            }
            if self.is_gate_eligible(importer, disposition) {
                out.unresolved_gate_eligible += 1;
                if disposition.is_actionable() {
                    out.unresolved_actionable_gate_eligible += 1;
                }
            }
        }
        out.unresolved_gate_eligible_actionable_rate = rate(
            out.unresolved_actionable_gate_eligible,
            out.unresolved_gate_eligible,
        );
        out
    }
}

/// Ratio rounded to four decimals; zero when there is no denominator.
pub fn rate(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let value = numerator as f64 / denominator as f64;
    (value * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateAggregates {
    pub unresolved_live_eligible: usize,
    pub unresolved_gate_eligible: usize,
    pub unresolved_actionable_gate_eligible: usize,
    pub unresolved_gate_eligible_actionable_rate: f64,
}
