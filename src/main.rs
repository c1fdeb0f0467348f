use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use graphlink::errors::{LinkError, Result};
use graphlink::graphlink::{GraphBatch, GraphLink};
use graphlink::types::*;
use tracing_subscriber::EnvFilter;

/// Cross-file relationship resolution for code graphs.
#[derive(Parser)]
#[command(name = "graphlink", about = "Cross-file relationship resolution for code graphs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new graphlink project
    Init {
        /// Project path (default: current directory)
        path: Option<String>,
    },
    /// Load parser output (JSON with `components` and `relationships`)
    Import {
        /// JSON file to import
        file: PathBuf,
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
        /// Resolve immediately after importing
        #[arg(short, long)]
        resolve: bool,
    },
    /// Run a resolution pass now
    Resolve {
        /// Project path (default: current directory)
        path: Option<String>,
        /// Output the pass summary as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Show how many relationships are still unresolved
    Status {
        /// Project path (default: current directory)
        path: Option<String>,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("graphlink=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { path } => {
            let project_path = resolve_path(path);
            GraphLink::init(&project_path).await?;
            println!("Initialized graphlink at {}", project_path.display());
        }
        Commands::Import {
            file,
            path,
            resolve,
        } => {
            let project_path = resolve_path(path);
            let link = GraphLink::open(&project_path).await?;
            let contents = std::fs::read_to_string(&file).map_err(|e| LinkError::File {
                message: e.to_string(),
                path: file.display().to_string(),
            })?;
            let batch: GraphBatch = serde_json::from_str(&contents)?;
            link.store_batch(&batch).await?;
            println!(
                "Imported {} components and {} relationships",
                batch.components.len(),
                batch.relationships.len()
            );
            if resolve {
                let summary = run_pass(&link).await?;
                print_summary(&summary);
            }
        }
        Commands::Resolve { path, json } => {
            let project_path = resolve_path(path);
            let link = GraphLink::open(&project_path).await?;
            let summary = run_pass(&link).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Commands::Status { path, json } => {
            let project_path = resolve_path(path);
            let link = GraphLink::open(&project_path).await?;
            let counts = link.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&counts)?);
            } else {
                println!("graphlink status");
                println!("  Relationships:       {}", counts.relationships);
                println!("  Unresolved targets:  {}", counts.unresolved_targets);
                println!("  Unresolved sources:  {}", counts.unresolved_sources);
            }
        }
    }
    Ok(())
}

async fn run_pass(link: &GraphLink) -> Result<PassSummary> {
    link.resolve_now().await.ok_or_else(|| LinkError::Pass {
        message: "see log output".to_string(),
    })
}

fn print_summary(summary: &PassSummary) {
    let t = &summary.targets;
    let s = &summary.sources;
    println!("Resolution pass finished in {}ms", summary.duration_ms);
    println!(
        "  Targets: {} resolved, {} external, {} stdlib, {} ignored, {} junk, {} unresolved",
        t.resolved, t.skipped_external, t.skipped_stdlib, t.skipped_ignored, t.skipped_junk, t.unresolved
    );
    println!(
        "  Sources: {} resolved, {} external, {} unresolved",
        s.resolved, s.skipped_external, s.unresolved
    );
    println!(
        "  Patched: {} ({} flushes, {} failed)",
        summary.patched(),
        summary.metrics.flushes,
        summary.metrics.flush_failures
    );
}

/// Resolves an optional path argument to a `PathBuf`.
///
/// Defaults to the current working directory if no path is provided.
fn resolve_path(path: Option<String>) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
