//! Command-line interface for codescribe.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{self, SyncConfig, CONFIG_FILE_NAMES};
use crate::docs::Granularity;
use crate::error::SyncError;
use crate::report;
use crate::sync::{analyze_file, fingerprint, FsArtifactStore, FsSourceTree, JsonStateFile, SyncEngine};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Keep generated codebase documentation in sync with the source tree.
///
/// Codescribe scans a directory, extracts code entities, dependencies and
/// patterns from each file, and writes one markdown artifact per file (or
/// per entity). Later runs only regenerate what changed.
#[derive(Parser)]
#[command(name = "codescribe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize artifacts with a source tree
    Sync(SyncArgs),
    /// Analyze a single file and print what would be generated
    Inspect(InspectArgs),
    /// Create a codescribe config from a template
    Init(InitArgs),
}

/// Arguments for the sync command.
#[derive(Parser)]
pub struct SyncArgs {
    /// Root directory to synchronize
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover in the root)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Artifact store directory (default: .codescribe/artifacts)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Sync state file (default: .codescribe/state.json)
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Number of extraction workers
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Re-analyze every file, enabling cross-file patterns
    #[arg(long)]
    pub full: bool,

    /// Skip the tree-wide overview, architecture and summary documents
    #[arg(long)]
    pub no_tree_docs: bool,

    /// Artifact granularity
    #[arg(short, long, value_enum)]
    pub granularity: Option<Granularity>,

    /// Report planned operations without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the inspect command.
#[derive(Parser)]
pub struct InspectArgs {
    /// File to analyze
    pub file: PathBuf,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Artifact granularity
    #[arg(short, long, value_enum)]
    pub granularity: Option<Granularity>,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "codescribe.yaml")]
    pub output: PathBuf,

    /// Template to use
    #[arg(short, long, default_value = "default")]
    pub template: String,

    /// List available templates
    #[arg(short, long)]
    pub list: bool,
}

/// Available config templates.
struct Template {
    name: &'static str,
    description: &'static str,
    content: &'static str,
}

/// All available templates.
static TEMPLATES: &[Template] = &[
    Template {
        name: "default",
        description: "One artifact per file with standard ignores and thresholds",
        content: include_str!("templates/default.yaml"),
    },
    Template {
        name: "strict",
        description: "Tighter pattern thresholds and a smaller file size limit",
        content: include_str!("templates/strict.yaml"),
    },
    Template {
        name: "per-entity",
        description: "One artifact per top-level class and function plus a file overview",
        content: include_str!("templates/per-entity.yaml"),
    },
];

fn check_format(format: &str) -> bool {
    if format != "pretty" && format != "json" {
        eprintln!("Error: invalid format {:?}, must be 'pretty' or 'json'", format);
        return false;
    }
    true
}

/// Run the sync command.
pub fn run_sync(args: &SyncArgs) -> anyhow::Result<i32> {
    if !check_format(&args.format) {
        return Ok(EXIT_ERROR);
    }

    // Resolve root
    let root = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };
    if !root.is_dir() {
        eprintln!("Error: {} is not a directory", root.display());
        return Ok(EXIT_ERROR);
    }

    // Load config, explicit or discovered
    let loaded = match &args.config {
        Some(path) => SyncConfig::parse_file(path).map(|c| (c, Some(path.clone()))),
        None => SyncConfig::load_or_default(&root),
    };
    let (mut config, config_path) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error parsing config: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    // Command-line overrides
    if let Some(jobs) = args.jobs {
        config.concurrency = jobs;
    }
    if args.full {
        config.full_analysis = true;
    }
    if args.no_tree_docs {
        config.tree_documents = false;
    }
    if let Some(granularity) = args.granularity {
        config.granularity = granularity;
    }
    if let Some(store) = &args.store {
        config.store = Some(store.clone());
    }
    if let Some(state) = &args.state {
        config.state = Some(state.clone());
    }

    if let Err(e) = config::validate(&config) {
        eprintln!("Error: invalid config: {}", e);
        return Ok(EXIT_ERROR);
    }

    let ignore = match config.ignore_set() {
        Ok(set) => set,
        Err(e) => {
            eprintln!("Error: invalid ignore pattern: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    // Absolute paths replace the root when joined.
    let store_dir = config.store_dir(&root);
    let state_path = config.state_file(&root);
    tracing::debug!(
        root = %root.display(),
        store = %store_dir.display(),
        state = %state_path.display(),
        "resolved sync paths"
    );

    let source = FsSourceTree::new(&root, ignore)
        .exclude(&store_dir)
        .exclude(&state_path);
    let mut store = FsArtifactStore::new(&store_dir);
    let mut state = JsonStateFile::new(&state_path);

    let engine = match SyncEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let outcome = if args.dry_run {
        engine.dry_run(&source, &store, &state)
    } else {
        engine.run(&source, &mut store, &mut state)
    };
    let report = match outcome {
        Ok(report) => report,
        Err(e @ SyncError::Config(_)) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
        Err(e) => {
            eprintln!("Error: sync failed: {}", e);
            if e.is_before_writes() {
                eprintln!("Nothing was written; the previous sync state is unchanged");
            } else {
                eprintln!("Sync state was not saved; the next run will retry");
            }
            return Ok(EXIT_FAILED);
        }
    };

    // Output results
    let config_path_str = config_path.map(|p| p.to_string_lossy().to_string());
    match args.format.as_str() {
        "json" => report::write_json(&report, config_path_str.as_deref())?,
        _ => report::write_pretty(&report, config_path_str.as_deref()),
    }

    Ok(EXIT_SUCCESS)
}

/// Run the inspect command.
pub fn run_inspect(args: &InspectArgs) -> anyhow::Result<i32> {
    if !check_format(&args.format) {
        return Ok(EXIT_ERROR);
    }

    let content = match std::fs::read(&args.file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", args.file.display(), e);
            return Ok(EXIT_ERROR);
        }
    };

    let mut config = SyncConfig::default();
    if let Some(granularity) = args.granularity {
        config.granularity = granularity;
    }

    let path = args
        .file
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .filter(|c| c != ".")
        .collect::<Vec<_>>()
        .join("/");
    let analysis = analyze_file(&path, &content, fingerprint(&content), &config)?;

    match args.format.as_str() {
        "json" => report::write_inspect_json(&analysis)?,
        _ => report::write_inspect_pretty(&analysis),
    }

    Ok(EXIT_SUCCESS)
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // List mode
    if args.list {
        return list_templates();
    }

    // Find template
    let template = match TEMPLATES.iter().find(|t| t.name == args.template) {
        Some(t) => t,
        None => {
            eprintln!("Error: unknown template {:?}", args.template);
            eprintln!("Run 'codescribe init --list' to see available templates");
            return Ok(EXIT_ERROR);
        }
    };

    // Check if output already exists
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    // Write config file
    if let Err(e) = std::fs::write(&args.output, template.content) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    // Success message
    println!("Created {} from template '{}'", args.output.display(), template.name);
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize for your project", args.output.display());
    if CONFIG_FILE_NAMES.iter().any(|n| args.output.ends_with(n)) {
        println!("  2. Run: codescribe sync");
    } else {
        println!("  2. Run: codescribe sync . --config {}", args.output.display());
    }

    Ok(EXIT_SUCCESS)
}

/// List available templates.
fn list_templates() -> anyhow::Result<i32> {
    println!("Available templates:");
    println!();

    for template in TEMPLATES {
        let name = if template.name == "default" {
            format!("{} (default)", template.name)
        } else {
            template.name.to_string()
        };
        println!("  {:<20} {}", name, template.description);
    }

    println!();
    println!("Usage:");
    println!("  codescribe init --template <name>");

    Ok(EXIT_SUCCESS)
}
