//! Capped, deterministically ordered import graph
//!
//! Nodes, edges and warnings are collected under hard caps; anything past
//! a cap is counted, never silently dropped. [`GraphBuilder::finish`] sorts
//! every list by a composite string key so identical inputs serialize
//! identically.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::config::GraphLimits;
use crate::paths::sort_strings;
use crate::taxonomy::{
    Disposition, FailureCause, ReasonCode, ResolutionState, ResolvedType, ResolverStage,
    UnresolvedDecision,
};

pub const FILE_NODE_PREFIX: &str = "file:";
pub const EXTERNAL_NODE_PREFIX: &str = "ext:";
pub const EDGE_KIND_IMPORT: &str = "import";
pub const WARNING_REASON_UNRESOLVED: &str = "unresolved";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
}

pub fn file_node_id(rel: &str) -> String {
    format!("{FILE_NODE_PREFIX}{rel}")
}

pub fn external_node_id(spec: &str) -> String {
    format!("{EXTERNAL_NODE_PREFIX}{spec}")
}

/// One import edge. The four taxonomy fields are `null` unless the edge is
/// unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEdge {
    pub from: String,
    /// Target node id; `None` for unresolved edges
    pub to: Option<String>,
    pub raw_specifier: String,
    pub kind: String,
    pub resolution_state: ResolutionState,
    pub resolved_type: ResolvedType,
    pub resolved_path: Option<String>,
    /// On-disk file outside the indexed set, for ephemeral externals
    pub fallback_path: Option<String>,
    pub package_name: Option<String>,
    pub tsconfig_path: Option<String>,
    pub ts_path_pattern: Option<String>,
    pub reason_code: Option<ReasonCode>,
    pub failure_cause: Option<FailureCause>,
    pub disposition: Option<Disposition>,
    pub resolver_stage: Option<ResolverStage>,
}

impl ImportEdge {
    pub fn new(from: String, raw_specifier: &str, resolved_type: ResolvedType) -> Self {
        Self {
            from,
            to: None,
            raw_specifier: raw_specifier.to_string(),
            kind: EDGE_KIND_IMPORT.to_string(),
            resolution_state: resolved_type.state(),
            resolved_type,
            resolved_path: None,
            fallback_path: None,
            package_name: None,
            tsconfig_path: None,
            ts_path_pattern: None,
            reason_code: None,
            failure_cause: None,
            disposition: None,
            resolver_stage: None,
        }
    }

    pub fn with_decision(mut self, decision: &UnresolvedDecision) -> Self {
        self.resolution_state = ResolutionState::Unresolved;
        self.reason_code = Some(decision.reason_code);
        self.failure_cause = Some(decision.failure_cause);
        self.disposition = Some(decision.disposition);
        self.resolver_stage = Some(decision.resolver_stage);
        self
    }

    pub fn sort_key(&self) -> String {
        [
            self.from.as_str(),
            self.to.as_deref().unwrap_or(""),
            self.raw_specifier.as_str(),
            self.resolved_type.as_str(),
            self.resolved_path.as_deref().unwrap_or(""),
        ]
        .join("\u{0}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportWarning {
    pub importer: String,
    pub specifier: String,
    pub reason: String,
    pub resolution_state: ResolutionState,
    pub reason_code: ReasonCode,
    pub failure_cause: FailureCause,
    pub disposition: Disposition,
    pub resolver_stage: ResolverStage,
}

impl ImportWarning {
    pub fn unresolved(importer: &str, specifier: &str, decision: &UnresolvedDecision) -> Self {
        Self {
            importer: importer.to_string(),
            specifier: specifier.to_string(),
            reason: WARNING_REASON_UNRESOLVED.to_string(),
            resolution_state: ResolutionState::Unresolved,
            reason_code: decision.reason_code,
            failure_cause: decision.failure_cause,
            disposition: decision.disposition,
            resolver_stage: decision.resolver_stage,
        }
    }

    pub fn sort_key(&self) -> String {
        [
            self.importer.as_str(),
            self.specifier.as_str(),
            self.reason_code.as_str(),
        ]
        .join("\u{0}")
    }
}

/// What happened to a warning handed to the builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningOutcome {
    Recorded,
    /// Same `(importer, specifier)` already warned about
    Duplicate,
    /// Past the warning cap
    Overflow,
}

/// Cap and suppression counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphCounters {
    pub edge_total: usize,
    pub truncated_nodes: usize,
    pub truncated_edges: usize,
    pub warning_suppressed: usize,
}

#[derive(Debug)]
pub struct GraphBuilder {
    max_nodes: usize,
    max_edges: usize,
    max_warnings: usize,
    nodes: BTreeMap<String, NodeType>,
    edges: Vec<ImportEdge>,
    warnings: Vec<ImportWarning>,
    warning_keys: HashSet<(String, String)>,
    counters: GraphCounters,
}

impl GraphBuilder {
    pub fn new(limits: &GraphLimits) -> Self {
        Self {
            max_nodes: limits.max_nodes,
            max_edges: limits.max_edges,
            max_warnings: limits.max_warnings,
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            warnings: Vec::new(),
            warning_keys: HashSet::new(),
            counters: GraphCounters::default(),
        }
    }

    /// Idempotent; false when the node was dropped by the cap.
    pub fn add_node(&mut self, id: &str, node_type: NodeType) -> bool {
        if self.nodes.contains_key(id) {
            return true;
        }
        if self.nodes.len() >= self.max_nodes {
            self.counters.truncated_nodes += 1;
            return false;
        }
        self.nodes.insert(id.to_string(), node_type);
        true
    }

    /// Counts the edge toward the total; false when the cap dropped it.
    pub fn add_edge(&mut self, edge: ImportEdge) -> bool {
        self.counters.edge_total += 1;
        if self.edges.len() >= self.max_edges {
            self.counters.truncated_edges += 1;
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Record a warning deduplicated by `(importer, spec)`, where `spec` is
    /// the normalized specifier.
    pub fn add_warning(&mut self, spec: &str, warning: ImportWarning) -> WarningOutcome {
        let key = (warning.importer.clone(), spec.to_string());
        if !self.warning_keys.insert(key) {
            self.counters.warning_suppressed += 1;
            return WarningOutcome::Duplicate;
        }
        if self.warnings.len() >= self.max_warnings {
            self.counters.warning_suppressed += 1;
            return WarningOutcome::Overflow;
        }
        self.warnings.push(warning);
        WarningOutcome::Recorded
    }

    /// Count a warning suppressed before it reached the list.
    pub fn suppress_warning(&mut self) {
        self.counters.warning_suppressed += 1;
    }

    pub fn warnings(&self) -> &[ImportWarning] {
        &self.warnings
    }

    pub fn counters(&self) -> GraphCounters {
        self.counters
    }

    pub fn finish(self) -> GraphParts {
        let nodes = self
            .nodes
            .into_iter()
            .map(|(id, node_type)| ImportNode { id, node_type })
            .collect();
        let mut edges: Vec<(String, ImportEdge)> =
            self.edges.into_iter().map(|e| (e.sort_key(), e)).collect();
        edges.sort_by(|a, b| sort_strings(&a.0, &b.0));
        let mut warnings: Vec<(String, ImportWarning)> =
            self.warnings.into_iter().map(|w| (w.sort_key(), w)).collect();
        warnings.sort_by(|a, b| sort_strings(&a.0, &b.0));
        GraphParts {
            nodes,
            edges: edges.into_iter().map(|(_, e)| e).collect(),
            warnings: warnings.into_iter().map(|(_, w)| w).collect(),
            counters: self.counters,
        }
    }
}

/// Sorted lists produced by [`GraphBuilder::finish`]
#[derive(Debug, Clone, Default)]
pub struct GraphParts {
    pub nodes: Vec<ImportNode>,
    pub edges: Vec<ImportEdge>,
    pub warnings: Vec<ImportWarning>,
    pub counters: GraphCounters,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(nodes: usize, edges: usize, warnings: usize) -> GraphLimits {
        GraphLimits {
            max_nodes: nodes,
            max_edges: edges,
            max_warnings: warnings,
            ..GraphLimits::default()
        }
    }

    fn edge(from: &str, spec: &str) -> ImportEdge {
        let mut edge = ImportEdge::new(file_node_id(from), spec, ResolvedType::External);
        edge.to = Some(external_node_id(spec));
        edge
    }

    #[test]
    fn nodes_are_idempotent_and_capped() {
        let mut builder = GraphBuilder::new(&limits(2, 10, 10));
        assert!(builder.add_node("file:a.ts", NodeType::File));
        assert!(builder.add_node("file:a.ts", NodeType::File));
        assert!(builder.add_node("ext:react", NodeType::External));
        assert!(!builder.add_node("ext:vue", NodeType::External));
        assert_eq!(builder.counters().truncated_nodes, 1);
        let ids: Vec<String> = builder.finish().nodes.into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["ext:react", "file:a.ts"]);
    }

    #[test]
    fn edges_past_cap_are_counted() {
        let mut builder = GraphBuilder::new(&limits(100, 2, 10));
        for spec in ["c", "a", "b", "d"] {
            builder.add_edge(edge("x.ts", spec));
        }
        let parts = builder.finish();
        assert_eq!(parts.edges.len(), 2);
        assert_eq!(parts.counters.edge_total, 4);
        assert_eq!(parts.counters.truncated_edges, 2);
        assert_eq!(parts.edges[0].raw_specifier, "a");
        assert_eq!(parts.edges[1].raw_specifier, "c");
    }

    #[test]
    fn warnings_dedupe_and_cap() {
        let decision = ReasonCode::MissingFileRelative.decision();
        let mut builder = GraphBuilder::new(&limits(100, 100, 2));
        let w = |importer: &str, spec: &str| ImportWarning::unresolved(importer, spec, &decision);

        assert_eq!(builder.add_warning("./b", w("a.ts", "./b")), WarningOutcome::Recorded);
        assert_eq!(builder.add_warning("./b", w("a.ts", "./b")), WarningOutcome::Duplicate);
        assert_eq!(builder.add_warning("./a", w("a.ts", "./a")), WarningOutcome::Recorded);
        assert_eq!(builder.add_warning("./c", w("a.ts", "./c")), WarningOutcome::Overflow);

        let parts = builder.finish();
        assert_eq!(parts.counters.warning_suppressed, 2);
        let specs: Vec<&str> = parts.warnings.iter().map(|w| w.specifier.as_str()).collect();
        assert_eq!(specs, vec!["./a", "./b"]);
    }

    #[test]
    fn resolved_edges_serialize_null_taxonomy() {
        let json = serde_json::to_value(edge("a.ts", "react")).unwrap();
        assert_eq!(json["kind"], "import");
        assert_eq!(json["resolutionState"], "resolved");
        assert!(json["reasonCode"].is_null());
        assert!(json["resolverStage"].is_null());
        assert_eq!(json["to"], "ext:react");
    }
}
