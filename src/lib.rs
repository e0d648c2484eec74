/// Deterministic import resolution across source ecosystems
pub mod alias;
pub mod budget;
pub mod build_context;
pub mod cache;
pub mod config;
pub mod config_resolvers;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod fs_index;
pub mod fs_meta;
pub mod graph;
pub mod language;
pub mod lookup;
pub mod paths;
pub mod stages;
pub mod taxonomy;
pub mod walker;

// Explicit exports for better API clarity
pub use cache::{CachePersistence, PersistedCache};
pub use config::Settings;
pub use engine::{
    CacheStats, FileRelations, ImportGraph, ImportStats, ResolveOutcome, ResolveRequest,
    apply_file_relations, parse_imports_json, resolve_import_links,
};
pub use error::{ResolveError, ResolveResult};
pub use fs_index::FsExistsIndex;
pub use lookup::{FileLookup, RepoEntry};
pub use taxonomy::{ReasonCode, ResolvedType};
pub use walker::RepoWalker;
