//! Project configuration consulted during resolution
//!
//! - tsconfig.json: extends chains, `baseUrl`/`paths`, emit directories
//! - package.json: directory entry points
//! - go.mod, pubspec.yaml and the root manifest fingerprint
//!
//! Malformed files never fail a run; they read as "no config".

pub mod manifests;
pub mod package_entry;
pub mod tsconfig;

pub use manifests::{dart_package_name, go_module_path, package_fingerprint};
pub use package_entry::PackageEntryResolver;
pub use tsconfig::{TsConfigLoader, TsConfigProfile, TsPathHit, resolve_ts_paths};
