//! SHA-256 fingerprints for cache keys and content hashes

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

use crate::error::{ResolveError, ResolveResult};

/// Lower-hex SHA-256 digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sha256Hash(pub String);

impl Sha256Hash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute SHA-256 hash of string content
///
/// Returns a hex-encoded SHA-256 hash (64 characters)
pub fn compute_sha256(content: &str) -> Sha256Hash {
    compute_bytes_sha256(content.as_bytes())
}

pub fn compute_bytes_sha256(content: &[u8]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    Sha256Hash(format!("{result:x}"))
}

/// Compute SHA-256 hash of a file's contents
pub fn compute_file_sha(path: &Path) -> ResolveResult<Sha256Hash> {
    let content = std::fs::read(path).map_err(|e| ResolveError::file_read(path, e))?;
    Ok(compute_bytes_sha256(&content))
}

/// Hash a versioned, `|`-joined list of parts.
///
/// The caller is responsible for ordering `parts` deterministically.
pub fn fingerprint_parts<I, S>(version: &str, parts: I) -> Sha256Hash
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    hasher.update(version.as_bytes());
    for part in parts {
        hasher.update(b"|");
        hasher.update(part.as_ref().as_bytes());
    }
    Sha256Hash(format!("{:x}", hasher.finalize()))
}
