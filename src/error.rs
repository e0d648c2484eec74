//! Error types for the import resolution engine
//!
//! Resolution of a single specifier never fails: every outcome is resolved,
//! external, or unresolved with a reason code. These errors cover the edges
//! around the engine: persisted cache files, configuration, manifests and
//! caller-supplied inputs.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for resolver infrastructure
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Error reading/writing cache files on disk
    #[error("cache io error at '{path}': {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cache format is invalid or incompatible
    #[error("invalid cache: {details}")]
    InvalidCache { details: String },

    /// A tsconfig.json, package.json or similar manifest could not be parsed
    #[error("Failed to parse manifest '{path}': {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },

    /// Caller-supplied input that cannot be interpreted
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },
}

impl ResolveError {
    pub fn cache_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::CacheIo { path, source }
    }

    pub fn invalid_cache(details: impl Into<String>) -> Self {
        Self::InvalidCache {
            details: details.into(),
        }
    }

    pub fn manifest_parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ManifestParse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::CacheIo { .. } => "RESOLUTION_CACHE_IO",
            Self::InvalidCache { .. } => "RESOLUTION_INVALID_CACHE",
            Self::ManifestParse { .. } => "MANIFEST_PARSE_ERROR",
            Self::FileRead { .. } => "FILE_READ_ERROR",
            Self::ConfigError { .. } => "CONFIG_ERROR",
            Self::InvalidInput { .. } => "INVALID_INPUT",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::CacheIo { .. } => vec![
                "Ensure the cache directory exists and is writable",
                "Check disk space and permissions",
                "Delete the on-disk cache to force a rebuild",
            ],
            Self::InvalidCache { .. } => vec![
                "Delete the on-disk cache to force a rebuild",
                "Verify importgraph version compatibility with cache format",
            ],
            Self::ManifestParse { .. } => vec![
                "Check JSON syntax, comments, and trailing commas",
                "Resolution continues without this manifest for the affected subtree",
            ],
            Self::FileRead { .. } => vec![
                "Check that the file exists and is readable",
                "Verify the repository root passed to the resolver",
            ],
            Self::ConfigError { .. } => vec![
                "Check .importgraph/settings.toml for syntax errors",
                "Run 'importgraph init --force' to regenerate the configuration",
            ],
            Self::InvalidInput { .. } => vec![
                "The imports file must be a JSON object mapping relative paths to arrays of specifiers",
            ],
        }
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        let err = ResolveError::invalid_cache("version mismatch");
        assert_eq!(err.status_code(), "RESOLUTION_INVALID_CACHE");
        assert!(err.to_string().contains("version mismatch"));

        let err = ResolveError::manifest_parse("pkg/package.json", "unexpected token");
        assert_eq!(err.status_code(), "MANIFEST_PARSE_ERROR");
        assert!(!err.recovery_suggestions().is_empty());
    }

    #[test]
    fn cache_io_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ResolveError::cache_io(PathBuf::from("/tmp/cache.json"), io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("/tmp/cache.json"));
    }
}
