//! Cross-run resolution cache persistence
//!
//! Stored at `<cache_path>/import_resolution.json`. The whole file is
//! either reused or rebuilt: a version mismatch or parse failure reads as
//! "no cache", never as a partial cache.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::ResolutionCacheEntry;
use crate::error::{ResolveError, ResolveResult};
use crate::fingerprint::Sha256Hash;
use crate::lookup::LookupSnapshot;

/// Version of the persisted cache schema
pub const RESOLUTION_CACHE_VERSION: &str = "import-resolution-cache-v3";
pub const CACHE_FILE_NAME: &str = "import_resolution.json";

/// Per-importer cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedFileEntry {
    /// Content hash of the importer when the specs were resolved
    pub hash: String,
    #[serde(default)]
    pub tsconfig_fingerprint: Option<Sha256Hash>,
    #[serde(default)]
    pub specs: BTreeMap<String, ResolutionCacheEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCache {
    /// Schema version for forward compatibility
    pub version: String,
    #[serde(default)]
    pub package_fingerprint: Option<Sha256Hash>,
    #[serde(default)]
    pub file_set_fingerprint: Option<Sha256Hash>,
    #[serde(default)]
    pub cache_key: Option<Sha256Hash>,
    #[serde(default)]
    pub files: BTreeMap<String, PersistedFileEntry>,
    #[serde(default)]
    pub lookup: Option<LookupSnapshot>,
}

impl Default for PersistedCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistedCache {
    pub fn new() -> Self {
        Self {
            version: RESOLUTION_CACHE_VERSION.to_string(),
            package_fingerprint: None,
            file_set_fingerprint: None,
            cache_key: None,
            files: BTreeMap::new(),
            lookup: None,
        }
    }

    pub fn is_compatible(&self) -> bool {
        self.version == RESOLUTION_CACHE_VERSION
    }

    /// Reusable entry for an importer whose hash and tsconfig still match.
    pub fn file_entry(
        &self,
        importer: &str,
        hash: &str,
        tsconfig_fingerprint: Option<&Sha256Hash>,
    ) -> Option<&PersistedFileEntry> {
        self.files
            .get(importer)
            .filter(|entry| entry.hash == hash && entry.tsconfig_fingerprint.as_ref() == tsconfig_fingerprint)
    }

    pub fn spec_count(&self) -> usize {
        self.files.values().map(|entry| entry.specs.len()).sum()
    }
}

/// Persistence manager for the resolution cache
pub struct CachePersistence {
    base_dir: PathBuf,
}

impl CachePersistence {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            base_dir: cache_dir.to_path_buf(),
        }
    }

    pub fn cache_file(&self) -> PathBuf {
        self.base_dir.join(CACHE_FILE_NAME)
    }

    /// Load the cache; `Ok(None)` when there is no cache file yet.
    pub fn load(&self) -> ResolveResult<Option<PersistedCache>> {
        let path = self.cache_file();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| ResolveError::cache_io(path.clone(), e))?;
        let cache: PersistedCache = serde_json::from_str(&content)
            .map_err(|e| ResolveError::invalid_cache(format!("Failed to parse resolution cache: {e}")))?;
        if !cache.is_compatible() {
            return Err(ResolveError::invalid_cache(format!(
                "Incompatible cache version: expected {RESOLUTION_CACHE_VERSION}, got {}",
                cache.version
            )));
        }
        Ok(Some(cache))
    }

    /// Load, treating unreadable or incompatible caches as absent.
    pub fn load_or_discard(&self) -> Option<PersistedCache> {
        match self.load() {
            Ok(cache) => cache,
            Err(err) => {
                tracing::warn!("[imports] discarding persisted cache: {err}");
                None
            }
        }
    }

    pub fn save(&self, cache: &PersistedCache) -> ResolveResult<()> {
        fs::create_dir_all(&self.base_dir).map_err(|e| ResolveError::cache_io(self.base_dir.clone(), e))?;
        let path = self.cache_file();
        let content = serde_json::to_string(cache)
            .map_err(|e| ResolveError::invalid_cache(format!("Failed to serialize resolution cache: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| ResolveError::cache_io(tmp.clone(), e))?;
        fs::rename(&tmp, &path).map_err(|e| ResolveError::cache_io(path, e))?;
        Ok(())
    }

    pub fn clear(&self) -> ResolveResult<()> {
        let path = self.cache_file();
        if path.exists() {
            fs::remove_file(&path).map_err(|e| ResolveError::cache_io(path, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::ResolvedType;
    use tempfile::TempDir;

    fn sample() -> PersistedCache {
        let mut cache = PersistedCache::new();
        let mut specs = BTreeMap::new();
        specs.insert(
            "./lib".to_string(),
            ResolutionCacheEntry::resolved(ResolvedType::Relative, "src/lib.ts"),
        );
        cache.files.insert(
            "src/app.ts".to_string(),
            PersistedFileEntry {
                hash: "abc".to_string(),
                tsconfig_fingerprint: None,
                specs,
            },
        );
        cache
    }

    #[test]
    fn save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let persistence = CachePersistence::new(&temp.path().join("cache"));
        assert!(persistence.load().unwrap().is_none());

        let cache = sample();
        persistence.save(&cache).unwrap();
        let loaded = persistence.load().unwrap().unwrap();
        assert_eq!(loaded, cache);
        assert_eq!(loaded.spec_count(), 1);

        persistence.clear().unwrap();
        assert!(persistence.load().unwrap().is_none());
    }

    #[test]
    fn file_entry_requires_matching_hash_and_tsconfig() {
        let cache = sample();
        assert!(cache.file_entry("src/app.ts", "abc", None).is_some());
        assert!(cache.file_entry("src/app.ts", "changed", None).is_none());
        let fp = Sha256Hash("fp".to_string());
        assert!(cache.file_entry("src/app.ts", "abc", Some(&fp)).is_none());
    }

    #[test]
    fn incompatible_version_is_rejected() {
        let temp = TempDir::new().unwrap();
        let persistence = CachePersistence::new(temp.path());
        let mut cache = sample();
        cache.version = "import-resolution-cache-v2".to_string();
        fs::write(persistence.cache_file(), serde_json::to_string(&cache).unwrap()).unwrap();

        let err = persistence.load().unwrap_err();
        assert_eq!(err.status_code(), "RESOLUTION_INVALID_CACHE");
        assert!(persistence.load_or_discard().is_none());
    }
}
