//! Concord CLI: relationship classification and concept deduplication
//! over JSON document files.
//!
//! Usage:
//!   concord detect <document.json> [--min-strength 0.5] [--output out.json]
//!   concord classify <document.json> [--output out.json]
//!   concord duplicates <document.json> [--threshold 0.95]
//!   concord preview <document.json> --primary <id> --duplicate <id>
//!   concord merge <document.json> --primary <id> --duplicate <id> [--output out.json]
//!   concord undo <document.json> --duplicate <id> [--output out.json]

use clap::{Parser, Subcommand};
use concord::llm_orc::HttpClient;
use concord::{
    ClassificationReport, ConceptId, ConcordEngine, DocumentGraph, DocumentId, DocumentRecord,
    EngineConfig, ExternalValidator, LlmOrcValidator, StubValidator,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "concord",
    version,
    about = "Concept relationship classification and deduplication"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Base URL of an llm-orc server; without it a deterministic stub validator is used
    #[arg(long, global = true)]
    llm_orc_url: Option<String>,
    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect new relationships between concepts
    Detect {
        document: PathBuf,
        /// Minimum candidate confidence (defaults to config)
        #[arg(long)]
        min_strength: Option<f32>,
        /// Write the updated document here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Re-classify existing relationships
    Classify {
        document: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List likely duplicate concepts
    Duplicates {
        document: PathBuf,
        /// Minimum similarity (defaults to config)
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Show what a merge would change
    Preview {
        document: PathBuf,
        #[arg(long)]
        primary: Uuid,
        #[arg(long)]
        duplicate: Uuid,
    },
    /// Merge a duplicate concept into a primary
    Merge {
        document: PathBuf,
        #[arg(long)]
        primary: Uuid,
        #[arg(long)]
        duplicate: Uuid,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Undo the merge of a duplicate concept
    Undo {
        document: PathBuf,
        #[arg(long)]
        duplicate: Uuid,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "concord=debug" } else { "concord=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_validator(config: &EngineConfig, llm_orc_url: Option<String>) -> Arc<dyn ExternalValidator> {
    match llm_orc_url {
        Some(url) => {
            let client = HttpClient::new(url).with_timeout(config.validator.timeout());
            Arc::new(LlmOrcValidator::new(
                Arc::new(client),
                config.validator.ensemble.clone(),
            ))
        }
        None => Arc::new(StubValidator::echo()),
    }
}

fn load_document(path: &Path) -> Result<DocumentGraph, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    let record: DocumentRecord = serde_json::from_str(&text)
        .map_err(|e| format!("cannot parse '{}': {}", path.display(), e))?;
    DocumentGraph::from_records(record).map_err(|e| format!("invalid document '{}': {}", path.display(), e))
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> i32 {
    let json = match serde_json::to_string_pretty(value) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match output {
        Some(path) => match std::fs::write(path, json) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: cannot write '{}': {}", path.display(), e);
                1
            }
        },
        None => {
            println!("{}", json);
            0
        }
    }
}

async fn emit_document(engine: &ConcordEngine, id: &DocumentId, output: Option<&Path>) -> i32 {
    match engine.document(id).await {
        Ok(graph) => emit(&graph.to_record(), output),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn print_report(report: &ClassificationReport) {
    eprintln!(
        "{} relationships ({} validated, {} degraded); {} pairs considered, {} pruned, {} below threshold, {} dropped",
        report.relationships.len(),
        report.validated,
        report.degraded,
        report.pairs_considered,
        report.pairs_pruned,
        report.below_threshold,
        report.dropped
    );
}

async fn cmd_detect(
    engine: &ConcordEngine,
    id: &DocumentId,
    min_strength: Option<f32>,
    output: Option<&Path>,
) -> i32 {
    match engine.detect(id, min_strength).await {
        Ok(report) => {
            print_report(&report);
            emit_document(engine, id, output).await
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_classify(engine: &ConcordEngine, id: &DocumentId, output: Option<&Path>) -> i32 {
    match engine.classify(id).await {
        Ok(report) => {
            print_report(&report);
            emit_document(engine, id, output).await
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_duplicates(engine: &ConcordEngine, id: &DocumentId, threshold: Option<f32>) -> i32 {
    match engine.find_duplicates(id, threshold).await {
        Ok(found) => {
            if found.is_empty() {
                eprintln!("No duplicates found.");
            }
            emit(&found, None)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_preview(engine: &ConcordEngine, id: &DocumentId, primary: Uuid, duplicate: Uuid) -> i32 {
    match engine
        .preview_merge(id, ConceptId::from_uuid(primary), ConceptId::from_uuid(duplicate))
        .await
    {
        Ok(preview) => emit(&preview, None),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_merge(
    engine: &ConcordEngine,
    id: &DocumentId,
    primary: Uuid,
    duplicate: Uuid,
    output: Option<&Path>,
) -> i32 {
    match engine
        .merge(id, ConceptId::from_uuid(primary), ConceptId::from_uuid(duplicate))
        .await
    {
        Ok(merged) => {
            eprintln!("Merged {} into '{}' ({})", duplicate, merged.term, merged.id);
            emit_document(engine, id, output).await
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_undo(engine: &ConcordEngine, id: &DocumentId, duplicate: Uuid, output: Option<&Path>) -> i32 {
    match engine.undo_merge(id, ConceptId::from_uuid(duplicate)).await {
        Ok(restored) => {
            eprintln!("Restored '{}' ({})", restored.term, restored.id);
            emit_document(engine, id, output).await
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match EngineConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    let validator = build_validator(&config, cli.llm_orc_url);
    let engine = ConcordEngine::new(validator, config);

    let document = match &cli.command {
        Commands::Detect { document, .. }
        | Commands::Classify { document, .. }
        | Commands::Duplicates { document, .. }
        | Commands::Preview { document, .. }
        | Commands::Merge { document, .. }
        | Commands::Undo { document, .. } => document.clone(),
    };
    let id = match load_document(&document) {
        Ok(graph) => engine.insert_document(graph),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Detect { min_strength, output, .. } => {
            cmd_detect(&engine, &id, min_strength, output.as_deref()).await
        }
        Commands::Classify { output, .. } => cmd_classify(&engine, &id, output.as_deref()).await,
        Commands::Duplicates { threshold, .. } => cmd_duplicates(&engine, &id, threshold).await,
        Commands::Preview { primary, duplicate, .. } => cmd_preview(&engine, &id, primary, duplicate).await,
        Commands::Merge { primary, duplicate, output, .. } => {
            cmd_merge(&engine, &id, primary, duplicate, output.as_deref()).await
        }
        Commands::Undo { duplicate, output, .. } => {
            cmd_undo(&engine, &id, duplicate, output.as_deref()).await
        }
    };
    std::process::exit(code);
}
