//! `litcache` command line
//!
//! ```bash
//! litcache load paper.pdf --print-text
//! litcache load paper.pdf --export-images ./figures
//! litcache rebuild paper.pdf
//! litcache search paper.pdf "attention"
//! litcache fingerprint paper.pdf
//! litcache locate paper.pdf
//! ```

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use litcache::cache::{CacheStore, image_file_name};
use litcache::fingerprint::fingerprint_with_chunk_size;
use litcache::paths::{resolve_cache_root, resolve_log_path};
use litcache::settings::{Settings, default_settings_path};
use litcache::{ExtractionOrchestrator, LoadOutcome, PdfExtractor};

/// Extract text and images from PDFs, caching results by content
#[derive(Parser)]
#[command(name = "litcache", version)]
struct Cli {
    /// Cache root (overrides `cache_dir` from config.yaml)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Log at debug level regardless of config
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a document, extracting it unless its content is already cached
    Load {
        file: PathBuf,

        /// Print the extracted text to stdout
        #[arg(long)]
        print_text: bool,

        /// Write the extracted images into this directory
        #[arg(long, value_name = "DIR")]
        export_images: Option<PathBuf>,
    },
    /// Re-extract a document and replace its cache entry.
    /// A document that was not cached yet is extracted twice.
    Rebuild { file: PathBuf },
    /// Print lines containing QUERY (case-insensitive)
    Search { file: PathBuf, query: String },
    /// Print the content fingerprint of a file
    Fingerprint { file: PathBuf },
    /// Print where the cache entry for a file lives
    Locate { file: PathBuf },
}

fn main() -> Result<()> {
    better_panic::install();
    let cli = Cli::parse();

    let settings = match default_settings_path() {
        Some(path) => Settings::load_or_create(&path),
        None => Settings::default(),
    };

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        settings.log_level.to_filter()
    };
    let log_path = resolve_log_path()?;
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {log_path:?}"))?,
    )?;
    info!("Starting litcache");

    let root = resolve_cache_root(&settings, cli.cache_dir.as_deref())?;

    match cli.command {
        Command::Fingerprint { file } => {
            let fp = fingerprint_with_chunk_size(&file, settings.read_chunk_size)?;
            println!("{fp}");
        }
        Command::Locate { file } => {
            let store = CacheStore::new(&root)?;
            let fp = fingerprint_with_chunk_size(&file, settings.read_chunk_size)?;
            let dir = store.entry_dir(&fp);
            let state = if store.exists(&fp) { "cached" } else { "not cached" };
            println!("{} ({state})", dir.display());
        }
        command => {
            let store = Arc::new(CacheStore::new(&root)?);
            run_document_command(store, &settings, command)?;
        }
    }

    info!("Shutting down litcache");
    Ok(())
}

#[cfg(feature = "pdf")]
fn run_document_command(store: Arc<CacheStore>, settings: &Settings, command: Command) -> Result<()> {
    let extractor = litcache::pdf::MupdfExtractor::with_image_scale(settings.image_scale);
    let orchestrator =
        ExtractionOrchestrator::new(store, extractor).with_chunk_size(settings.read_chunk_size);
    run_with(orchestrator, command)
}

#[cfg(not(feature = "pdf"))]
fn run_document_command(_store: Arc<CacheStore>, _settings: &Settings, _command: Command) -> Result<()> {
    anyhow::bail!("this build has no PDF backend; rebuild with `--features pdf`")
}

#[cfg_attr(not(feature = "pdf"), allow(dead_code))]
fn run_with<E: PdfExtractor>(
    mut orchestrator: ExtractionOrchestrator<E>,
    command: Command,
) -> Result<()> {
    let events = orchestrator.subscribe();

    match command {
        Command::Load {
            file,
            print_text,
            export_images,
        } => {
            let outcome = orchestrator
                .get_or_extract(&file)
                .with_context(|| format!("Failed to load {file:?}"))?;
            print_summary(&file, &outcome);
            if let Some(dir) = export_images {
                export_images_to(&dir, &outcome.bundle.images)?;
            }
            if print_text {
                println!("{}", outcome.bundle.raw_text);
            }
        }
        Command::Rebuild { file } => {
            // Rebuilding needs an active session; on a cold cache this load
            // already extracts once before the rebuild extracts again.
            orchestrator
                .get_or_extract(&file)
                .with_context(|| format!("Failed to load {file:?}"))?;
            let outcome = orchestrator
                .rebuild_cache()
                .with_context(|| format!("Failed to rebuild cache for {file:?}"))?;
            print_summary(&file, &outcome);
        }
        Command::Search { file, query } => {
            orchestrator
                .get_or_extract(&file)
                .with_context(|| format!("Failed to load {file:?}"))?;
            for hit in orchestrator.search(&query)? {
                println!("{:>5}: {}", hit.page, hit.text);
            }
        }
        Command::Fingerprint { .. } | Command::Locate { .. } => {}
    }

    orchestrator.close();
    for event in events.try_iter() {
        debug!("Event: {event:?}");
    }
    Ok(())
}

#[cfg_attr(not(feature = "pdf"), allow(dead_code))]
fn print_summary(file: &Path, outcome: &LoadOutcome) {
    let source = if outcome.was_cached { "cache" } else { "extraction" };
    println!("{} [{}]", file.display(), outcome.fingerprint);
    println!(
        "  {} pages, {} images ({} bytes), {} text bytes (from {source})",
        outcome.total_pages,
        outcome.bundle.images.len(),
        outcome.bundle.image_bytes(),
        outcome.bundle.raw_text.len()
    );
    for (key, value) in &outcome.metadata {
        println!("  {key}: {value}");
    }
}

#[cfg_attr(not(feature = "pdf"), allow(dead_code))]
fn export_images_to(dir: &Path, images: &[Vec<u8>]) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {dir:?}"))?;
    for (ordinal, image) in images.iter().enumerate() {
        let path = dir.join(image_file_name(ordinal));
        fs::write(&path, image).with_context(|| format!("Failed to write {path:?}"))?;
    }
    println!("  exported {} images to {}", images.len(), dir.display());
    Ok(())
}
