//! Repository walker producing the file set handed to the resolver
//!
//! Honors `.gitignore`, `.importgraphignore` and the configured
//! `indexing.ignore_patterns`. Hidden files and the accelerator's skipped
//! directories (`node_modules`, build output, ...) are left out.

use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use std::path::Path;

use crate::Settings;
use crate::error::{ResolveError, ResolveResult};
use crate::lookup::RepoEntry;
use crate::paths::sort_strings;

pub const IGNORE_FILE_NAME: &str = ".importgraphignore";

fn rel_of(entry: &RepoEntry) -> &str {
    entry.rel.as_deref().unwrap_or_default()
}

#[derive(Debug)]
pub struct RepoWalker<'a> {
    settings: &'a Settings,
}

impl<'a> RepoWalker<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    fn overrides(&self, root: &Path) -> ResolveResult<Override> {
        let mut builder = OverrideBuilder::new(root);
        for pattern in &self.settings.indexing.ignore_patterns {
            builder
                .add(&format!("!{pattern}"))
                .map_err(|e| ResolveError::ConfigError {
                    reason: format!("invalid ignore pattern '{pattern}': {e}"),
                })?;
        }
        builder.build().map_err(|e| ResolveError::ConfigError {
            reason: format!("invalid ignore patterns: {e}"),
        })
    }

    /// Every visible file under `root` as a sorted entry list.
    pub fn walk(&self, root: &Path) -> ResolveResult<Vec<RepoEntry>> {
        let skip_dirs = self.settings.fs_index.skip_dirs.clone();
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false)
            .require_git(false)
            .overrides(self.overrides(root)?)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !(is_dir && skip_dirs.iter().any(|d| entry.file_name() == d.as_str()))
            });
        builder.add_custom_ignore_filename(IGNORE_FILE_NAME);

        let mut entries: Vec<RepoEntry> = builder
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter_map(|entry| {
                let rel = entry.path().strip_prefix(root).ok()?;
                let rel = crate::paths::to_posix(&rel.to_string_lossy());
                Some(RepoEntry::with_rel(entry.into_path(), rel))
            })
            .collect();
        entries.sort_by(|a, b| sort_strings(rel_of(a), rel_of(b)));
        tracing::debug!("[imports] walked {} files under {}", entries.len(), root.display());
        Ok(entries)
    }
}
