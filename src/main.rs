//! # Knowledge Sync CLI (`ksync`)
//!
//! ## Usage
//!
//! ```bash
//! ksync --config ./config/ksync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ksync init` | Write a starter config and create the vector store |
//! | `ksync index [PATH]` | Index one file, or sweep a directory (default: the managed root) |
//! | `ksync note --title T --text S` | Author a note and index it |
//! | `ksync query "<text>"` | Retrieve ranked context blocks |
//! | `ksync list` | List indexed documents |
//! | `ksync delete --title T [--path P]` | Delete a document's vectors (and file, if managed) |
//! | `ksync diagnose` | Report drift between disk, manifest, and store |
//! | `ksync debug <PATH>` | Explain the state of one path |
//! | `ksync completions <SHELL>` | Print shell completions |
//!
//! Logs go to stderr (`RUST_LOG`, or `-v` / `-vv`); results go to stdout.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use knowledge_sync::config::{self, Config};
use knowledge_sync::diagnostics;
use knowledge_sync::indexer::IndexOutcome;
use knowledge_sync::progress::ProgressMode;
use knowledge_sync::query::{print_blocks, print_documents};
use knowledge_sync::KnowledgeEngine;

/// Knowledge Sync CLI: keeps a knowledge directory in step with a vector
/// index and serves context-windowed retrieval.
#[derive(Parser)]
#[command(
    name = "ksync",
    about = "Incremental document indexing and context-window retrieval",
    version,
    long_about = "Knowledge Sync keeps a directory of text, markdown, PDF and note documents \
    synchronized with a vector index. Re-indexing only touches chunks whose content changed, \
    and queries return each hit with its neighboring chunks, ranked by document kind."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ksync.toml")]
    config: PathBuf,

    /// Raise log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config (if missing) and create the vector store.
    ///
    /// Idempotent: an existing config is loaded, never overwritten.
    Init {
        /// Managed root for a newly written config.
        #[arg(long, default_value = "./knowledgebase")]
        root: PathBuf,
    },

    /// Index one file, or sweep a directory.
    ///
    /// Unchanged files cost one hash comparison and produce no store writes.
    Index {
        /// File or directory; defaults to the managed root.
        path: Option<PathBuf>,

        /// Progress on stderr: `off`, `human`, or `json`. Defaults to
        /// `human` on a terminal, `off` otherwise.
        #[arg(long)]
        progress: Option<ProgressMode>,
    },

    /// Author a note under the notes directory and index it.
    #[command(group(ArgGroup::new("body").required(true).args(["text", "file"])))]
    Note {
        #[arg(long)]
        title: String,

        /// Note body.
        #[arg(long)]
        text: Option<String>,

        /// Read the note body from a file.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Retrieve context blocks for a query.
    Query {
        text: String,

        /// Number of blocks (default: `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// List indexed documents, files first, then notes.
    List {
        /// Maximum vector records to scan.
        #[arg(long, default_value_t = 1000)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Delete a document's vectors by title (and path).
    ///
    /// With `--path`, the manifest entry goes too, and the file is removed
    /// when it lies under the managed root.
    Delete {
        #[arg(long)]
        title: String,

        #[arg(long)]
        path: Option<String>,
    },

    /// Compare disk, manifest, and vector store; report drift.
    Diagnose {
        /// Maximum files to check (default: `[diagnostics].limit_files`).
        #[arg(long)]
        limit_files: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Explain the indexing state of one path.
    Debug {
        path: String,

        #[arg(long)]
        json: bool,
    },

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(env) => EnvFilter::new(env),
        Err(_) => match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            _ => EnvFilter::new("debug"),
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "ksync", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Init { root } => {
            let cfg = init_config(&cli.config, root)?;
            let engine = KnowledgeEngine::open(&cfg).await?;
            std::fs::create_dir_all(engine.config().notes_path())?;
            println!(
                "Initialized {} ({} records).",
                engine.config().root().display(),
                engine.store().count().await?
            );
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;
    let engine = KnowledgeEngine::open(&cfg).await?;

    match cli.command {
        Commands::Index { path, progress } => {
            let target = path.unwrap_or_else(|| engine.config().root().to_path_buf());
            if target.is_file() {
                let outcome = engine.index_path(&target).await?;
                println!("{}: {}", target.display(), describe(&outcome));
            } else {
                let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
                let reporter = mode.reporter();
                let report = engine
                    .index_directory_with_progress(Some(&target), reporter.as_ref())
                    .await?;
                println!(
                    "scanned {}  indexed {}  unchanged {}  skipped {}  failed {}  (+{} / -{} chunks)",
                    report.scanned,
                    report.indexed,
                    report.unchanged,
                    report.skipped,
                    report.failed,
                    report.upserted,
                    report.deleted
                );
            }
        }
        Commands::Note { title, text, file } => {
            let body = match (text, file) {
                (Some(text), _) => text,
                (None, Some(file)) => std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?,
                (None, None) => bail!("--text or --file is required"),
            };
            let note = engine.add_note(&title, &body).await?;
            println!("{}: {}", note.path.display(), describe(&note.outcome));
        }
        Commands::Query { text, top_k, json } => {
            let blocks = engine.query(&text, top_k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&blocks)?);
            } else {
                print_blocks(&blocks);
            }
        }
        Commands::List { limit, json } => {
            let documents = engine.list_documents(limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&documents)?);
            } else {
                print_documents(&documents);
            }
        }
        Commands::Delete { title, path } => {
            let outcome = engine.delete_document(&title, path.as_deref()).await?;
            println!(
                "Deleted {} vector(s){}{}",
                outcome.vectors_deleted,
                if outcome.manifest_entry_removed { ", manifest entry" } else { "" },
                if outcome.file_removed { ", file" } else { "" }
            );
        }
        Commands::Diagnose { limit_files, json } => {
            let report = engine.run_diagnostics(limit_files).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                diagnostics::print_report(&report);
            }
        }
        Commands::Debug { path, json } => {
            let debug = engine.debug_document(&path).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&debug)?);
            } else {
                diagnostics::print_document(&debug);
            }
        }
        Commands::Init { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Load `path`, or write a starter config there pointing at `root`.
fn init_config(path: &Path, root: &Path) -> Result<Config> {
    if path.exists() {
        return config::load_config(path);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::create_dir_all(root)
        .with_context(|| format!("Failed to create {}", root.display()))?;
    let contents = format!(
        "[knowledge]\nroot = {root}\n\n[chunking]\nmax_chars = 800\noverlap_chars = 120\n\n\
         [retrieval]\ntop_k = 4\n\n[store]\nbackend = \"sqlite\"\n\n\
         [embedding]\nprovider = \"hashing\"\n",
        root = toml_string(&root.to_string_lossy()),
    );
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    println!("Wrote {}", path.display());
    config::load_config(path)
}

fn toml_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn describe(outcome: &IndexOutcome) -> String {
    match outcome {
        IndexOutcome::Indexed { stats } => format!(
            "indexed {} chunk(s), +{} upserted, -{} deleted, {} relabeled",
            stats.chunks, stats.upserted, stats.deleted, stats.relabeled
        ),
        IndexOutcome::Unchanged => "unchanged".to_string(),
        IndexOutcome::Skipped { reason } => format!("skipped ({})", reason),
    }
}
