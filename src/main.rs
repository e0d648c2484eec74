//! CLI entry point for the import resolver.
//!
//! Commands: `init`, `config`, `resolve` and `fs-index`. Resolution walks the
//! repository, hashes importer files in parallel, reuses the persisted cache
//! and writes the import graph as JSON.

use anyhow::Context;
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use importgraph::fingerprint::compute_file_sha;
use importgraph::fs_meta::{FsMemo, manifest_candidates};
use importgraph::paths::{normalize_rel_path, to_abs};
use importgraph::{
    CachePersistence, FsExistsIndex, PersistedCache, RepoWalker, ResolveRequest, Settings,
    parse_imports_json, resolve_import_links,
};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(
    name = "importgraph",
    version = env!("CARGO_PKG_VERSION"),
    about = "Deterministic import resolution",
    long_about = "Resolve import specifiers to in-repo files, external packages or explained unresolved outcomes.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .importgraph directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings from .importgraph/settings.toml")]
    Config,

    /// Resolve imports of a repository
    #[command(
        about = "Resolve import specifiers and build the import graph",
        after_help = "The imports file maps importer paths to raw specifiers:\n  {\"src/app.ts\": [\"./lib\", \"react\"]}"
    )]
    Resolve {
        /// Repository root
        root: PathBuf,

        /// JSON file with raw specifiers per importer
        #[arg(short, long)]
        imports: PathBuf,

        /// Write the graph JSON here instead of printing a summary
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Skip the persisted resolution cache
        #[arg(long)]
        no_cache: bool,

        /// Delete the persisted cache before resolving
        #[arg(long, conflicts_with = "no_cache")]
        rebuild: bool,

        /// Skip the filesystem existence index
        #[arg(long)]
        no_fs_index: bool,

        /// Threads used to hash importer files (overrides config)
        #[arg(short, long)]
        threads: Option<usize>,
    },

    /// Build the filesystem existence index and print its summary
    #[command(name = "fs-index")]
    FsIndex {
        /// Repository root
        root: PathBuf,
    },
}

fn init_tracing(debug: bool, quiet: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else if quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn load_settings(cli: &Cli) -> Settings {
    match &cli.config {
        Some(path) => Settings::load_from(path).unwrap_or_else(|e| {
            eprintln!(
                "Configuration error loading from {}: {}",
                path.display(),
                e
            );
            std::process::exit(1);
        }),
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            eprintln!("Using default configuration for now.");
            Settings::default()
        }),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli);
    init_tracing(cli.debug || settings.debug, cli.quiet);

    match &cli.command {
        Commands::Init { force } => {
            let dir = std::env::current_dir().context("Cannot determine current directory")?;
            let path = Settings::init_config_file(&dir, *force)?;
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
        }

        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            println!("{}", toml::to_string_pretty(&settings)?);
        }

        Commands::Resolve {
            root,
            imports,
            out,
            no_cache,
            rebuild,
            no_fs_index,
            threads,
        } => {
            let options = ResolveOptions {
                out: out.as_deref(),
                use_cache: !no_cache,
                rebuild: *rebuild,
                use_fs_index: !no_fs_index,
                threads: threads.unwrap_or(settings.indexing.parallel_threads),
            };
            run_resolve(&settings, root, imports, options)?;
        }

        Commands::FsIndex { root } => {
            let start = Instant::now();
            let index = FsExistsIndex::build(root, &settings.fs_index);
            println!("{}", serde_json::to_string_pretty(index.summary())?);
            eprintln!("Scanned in {:.2}s", start.elapsed().as_secs_f64());
        }
    }
    Ok(())
}

struct ResolveOptions<'a> {
    out: Option<&'a Path>,
    use_cache: bool,
    rebuild: bool,
    use_fs_index: bool,
    threads: usize,
}

/// Content hash per importer, computed on a dedicated pool.
fn hash_importers(
    root: &Path,
    importers: &[String],
    threads: usize,
) -> anyhow::Result<HashMap<String, String>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .context("Failed to build hashing thread pool")?;
    Ok(pool.install(|| {
        importers
            .par_iter()
            .filter_map(|rel| {
                let hash = compute_file_sha(&to_abs(root, rel)).ok()?;
                Some((rel.clone(), hash.0))
            })
            .collect()
    }))
}

fn cache_dir(settings: &Settings, root: &Path) -> PathBuf {
    if settings.cache_path.is_absolute() {
        settings.cache_path.clone()
    } else {
        root.join(&settings.cache_path)
    }
}

fn run_resolve(
    settings: &Settings,
    root: &Path,
    imports_path: &Path,
    options: ResolveOptions<'_>,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let root = root
        .canonicalize()
        .with_context(|| format!("Repository root {} not found", root.display()))?;

    let content = std::fs::read_to_string(imports_path)
        .with_context(|| format!("Failed to read {}", imports_path.display()))?;
    let imports = parse_imports_json(&content)?;

    let entries = RepoWalker::new(settings).walk(&root)?;
    let importers: Vec<String> = imports.keys().map(|k| normalize_rel_path(k)).collect();
    let hashes = hash_importers(&root, &importers, options.threads)?;

    let fs_meta = FsMemo::prefetch(
        manifest_candidates(&root, importers.iter().map(String::as_str)),
        settings.fs_index.concurrency,
    );
    let fs_index = (options.use_fs_index && settings.fs_index.enabled)
        .then(|| FsExistsIndex::build(&root, &settings.fs_index));

    let persistence = CachePersistence::new(&cache_dir(settings, &root));
    if options.rebuild {
        persistence.clear()?;
    }

    let mut request = ResolveRequest::new(&root, &entries, &imports, settings)
        .with_file_hashes(&hashes)
        .with_fs_meta(fs_meta);
    if options.use_cache {
        request = request.with_cache(persistence.load_or_discard().unwrap_or_else(PersistedCache::new));
    }
    if let Some(index) = fs_index.as_ref() {
        request = request.with_fs_index(index);
    }
    let outcome = resolve_import_links(request);

    if let Some(cache) = outcome.cache.as_ref() {
        if let Err(e) = persistence.save(cache) {
            tracing::warn!("[imports] failed to save resolution cache: {e}");
            for suggestion in e.recovery_suggestions() {
                tracing::warn!("[imports]   {suggestion}");
            }
        }
    }

    let stats = &outcome.graph.stats;
    match options.out {
        Some(path) => {
            let json = serde_json::to_string_pretty(&outcome.graph)?;
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote import graph to {}", path.display());
        }
        None => {
            println!("Files:        {}", stats.files);
            println!("Edges:        {}", stats.edges);
            println!("Resolved:     {}", stats.resolved);
            println!("External:     {}", stats.external);
            println!(
                "Unresolved:   {} ({} actionable)",
                stats.unresolved, stats.unresolved_actionable
            );
            for (code, count) in &stats.unresolved_by_reason_code {
                println!("  {code:<40} {count}");
            }
            if let Some(cache) = outcome.cache_stats.as_ref() {
                println!(
                    "Cache:        {}/{} specifiers reused",
                    cache.specs_reused, cache.specs
                );
            }
        }
    }
    if let Some(timings) = outcome.stage_timings_ms.as_ref() {
        for (stage, ms) in timings {
            tracing::debug!("[imports] stage {stage}: {ms:.3}ms");
        }
    }
    eprintln!("Resolved in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}
