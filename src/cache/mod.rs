//! Resolution caches
//!
//! - [`ResolutionCache`]: process-local, keyed by importer, specifier and
//!   tsconfig fingerprint. Negative and ephemeral entries carry an expiry;
//!   positive entries live for the run. Oldest entries are evicted first
//!   once the cap is reached.
//! - [`persist::PersistedCache`]: cross-run, per importer file, valid only
//!   while the file hash and tsconfig fingerprint match.

pub mod persist;

pub use persist::{CachePersistence, PersistedCache, PersistedFileEntry, RESOLUTION_CACHE_VERSION};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::budget::BudgetKind;
use crate::taxonomy::{ReasonCode, ResolvedType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheClass {
    /// On-disk file outside the indexed set; rechecked after a short TTL
    EphemeralExternal,
}

/// Outcome of resolving one specifier, as cached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionCacheEntry {
    pub resolved_type: ResolvedType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts_path_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tsconfig_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved_reason_code: Option<ReasonCode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_budget_exhausted_types: Vec<BudgetKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_class: Option<CacheClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_path: Option<String>,
    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl ResolutionCacheEntry {
    pub fn new(resolved_type: ResolvedType) -> Self {
        Self {
            resolved_type,
            resolved_path: None,
            ts_path_pattern: None,
            tsconfig_path: None,
            package_name: None,
            unresolved_reason_code: None,
            unresolved_budget_exhausted_types: Vec::new(),
            cache_class: None,
            fallback_path: None,
            expires_at: None,
        }
    }

    pub fn resolved(resolved_type: ResolvedType, path: impl Into<String>) -> Self {
        Self {
            resolved_path: Some(path.into()),
            ..Self::new(resolved_type)
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|expires| expires < now_ms)
    }

    pub fn is_ephemeral(&self) -> bool {
        self.cache_class == Some(CacheClass::EphemeralExternal)
    }
}

/// Key of the in-memory cache
pub fn cache_key(importer: &str, spec: &str, tsconfig_fingerprint: Option<&str>) -> String {
    format!(
        "{importer}\u{0}{spec}\u{0}{}",
        tsconfig_fingerprint.unwrap_or("none")
    )
}

#[derive(Debug)]
pub struct ResolutionCache {
    entries: HashMap<String, ResolutionCacheEntry>,
    order: VecDeque<String>,
    max_entries: usize,
}

impl ResolutionCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live entry for `key`; expired entries are dropped on access.
    pub fn get(&mut self, key: &str, now_ms: i64) -> Option<ResolutionCacheEntry> {
        let expired = self.entries.get(key)?.is_expired(now_ms);
        if expired {
            self.remove(key);
            return None;
        }
        self.entries.get(key).cloned()
    }

    pub fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    pub fn insert(&mut self, key: String, entry: ResolutionCacheEntry) {
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = entry;
            return;
        }
        while self.entries.len() >= self.max_entries {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, entry);
    }

    /// Record the final classification of a cached unresolved entry.
    pub fn record_unresolved(&mut self, key: &str, code: ReasonCode, exhausted: &[BudgetKind]) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.unresolved_reason_code = Some(code);
            entry.unresolved_budget_exhausted_types = exhausted.to_vec();
        }
    }
}
