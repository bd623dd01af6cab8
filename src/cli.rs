//! CLI parser and command implementations.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use docpipe::{
    DocumentState, FsByteStore, KeywordClassifier, OcrEngine, Pipeline, PipelineConfig,
    ProcessingRecord, TesseractEngine,
};

#[derive(Parser)]
#[command(name = "docpipe")]
#[command(about = "Document processing pipeline: OCR, classification, and field extraction")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides DOCPIPE_CONFIG and auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Process document files through the pipeline
    Process {
        /// Files to process
        files: Vec<PathBuf>,

        /// Print full processing records as JSON
        #[arg(long)]
        json: bool,

        /// Directory for stored document content (default: user data dir)
        #[arg(long)]
        store_dir: Option<PathBuf>,
    },

    /// Show the configured taxonomy
    Taxonomy,

    /// Check OCR engine availability
    Engine,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Process {
            files,
            json,
            store_dir,
        } => process(config, files, json, store_dir).await,
        Commands::Taxonomy => {
            show_taxonomy(&config);
            Ok(())
        }
        Commands::Engine => {
            show_engine(&config);
            Ok(())
        }
    }
}

fn build_pipeline(config: PipelineConfig, store_dir: PathBuf) -> Pipeline {
    let engine = Arc::new(TesseractEngine::new(config.tesseract.clone()));
    let classifier = Arc::new(KeywordClassifier::new());
    let store = Arc::new(FsByteStore::new(store_dir));
    Pipeline::new(config, engine, classifier, store)
}

async fn process(
    config: PipelineConfig,
    files: Vec<PathBuf>,
    json: bool,
    store_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if files.is_empty() {
        anyhow::bail!("no files to process");
    }

    let store_dir = match store_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine a data directory"))?
            .join("docpipe")
            .join("documents"),
    };

    let pipeline = build_pipeline(config, store_dir);

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .expect("valid progress template"),
    );

    let mut records: Vec<(PathBuf, ProcessingRecord)> = Vec::with_capacity(files.len());

    for file in files {
        bar.set_message(file.display().to_string());
        let payload = tokio::fs::read(&file).await?;
        let record = pipeline.process(&payload).await?;
        records.push((file, record));
        bar.inc(1);
    }
    bar.finish_and_clear();

    if json {
        let output: Vec<&ProcessingRecord> = records.iter().map(|(_, r)| r).collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for (file, record) in &records {
        print_summary(file, record);
    }

    Ok(())
}

fn print_summary(file: &PathBuf, record: &ProcessingRecord) {
    match record.state {
        DocumentState::Extracted => {
            let label = record
                .classification
                .as_ref()
                .map(|c| c.label.as_str())
                .unwrap_or("?");
            let populated = record
                .extraction
                .as_ref()
                .map(|e| e.fields.iter().filter(|f| f.is_populated()).count())
                .unwrap_or(0);
            println!(
                "  {} {} [{}] {} ({} fields)",
                style("✓").green(),
                record.document.id,
                label,
                file.display(),
                populated
            );
        }
        DocumentState::Failed => {
            let detail = record
                .failure
                .as_ref()
                .map(|f| {
                    format!(
                        "{} in {} ({})",
                        f.kind.as_str(),
                        f.stage,
                        if f.retryable { "retryable" } else { "terminal" }
                    )
                })
                .unwrap_or_else(|| "unknown failure".to_string());
            println!(
                "  {} {} {} — {}",
                style("✗").red(),
                record.document.id,
                file.display(),
                detail
            );
        }
        state => {
            println!(
                "  {} {} {} — {}",
                style("…").yellow(),
                record.document.id,
                file.display(),
                state
            );
        }
    }
}

fn show_taxonomy(config: &PipelineConfig) {
    let taxonomy = &config.taxonomy;
    println!(
        "Taxonomy version {} ({} labels)",
        style(&taxonomy.version).cyan(),
        taxonomy.labels.len()
    );

    for label in &taxonomy.labels {
        println!("\n  {}", style(&label.name).bold());
        if !label.keywords.is_empty() {
            println!("    keywords: {}", label.keywords.join(", "));
        }
        for field in &label.required_fields {
            println!("    field: {}", field.name);
        }
    }

    println!("\n  {} (fallback)", style("unknown").bold());
    for field in &taxonomy.fallback_fields {
        println!("    field: {}", field.name);
    }
}

fn show_engine(config: &PipelineConfig) {
    let engine = TesseractEngine::new(config.tesseract.clone());

    let status = if engine.is_available() {
        style("available").green()
    } else {
        style("unavailable").red()
    };
    println!("  {} — {}", engine.name(), status);
    println!("  {}", engine.availability_hint());
}
