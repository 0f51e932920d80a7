mod check;
mod replay;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stackflow_core::config::AppConfig;
use stackflow_core::event::EventBus;
use stackflow_core::store::{InMemorySessionStore, InMemoryWorkflowStore};
use stackflow_core::traits::WorkflowStore;
use stackflow_core::types::{RunEvent, WorkflowRecord};

use stackflow_engine::graph::{schedule, schedule_tiers, validate_structure};
use stackflow_engine::{load_graph, validate_definition, with_retries, Engine, StackService};

use replay::ReplayCapabilities;

#[derive(Parser)]
#[command(name = "stackflow", version, about = "Run query / knowledge base / LLM / output stacks")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "stackflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a workflow definition without running it
    Validate {
        /// Workflow definition (JSON)
        file: PathBuf,
    },
    /// Print the execution order of a workflow
    Plan {
        /// Workflow definition (JSON)
        file: PathBuf,
    },
    /// Execute a workflow against replayed capabilities
    Run {
        /// Workflow definition (JSON)
        file: PathBuf,
        /// The user query
        #[arg(short, long)]
        query: String,
        /// Capability fixture file (JSON)
        #[arg(short, long)]
        fixtures: PathBuf,
        /// Print the full run result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stackflow=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "stackflow", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Validate { file } => {
            let definition = read_definition(&file)?;
            let validation = validate_definition(&definition);
            let graph = load_graph(&definition).ok();
            println!("Validating {}", file.display());
            if !check::run_checks(&validation, graph.as_ref(), &config) {
                std::process::exit(1);
            }
        }
        Commands::Plan { file } => {
            let definition = read_definition(&file)?;
            let graph = load_graph(&definition).map_err(|errors| {
                let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                anyhow::anyhow!("cannot load {}: {}", file.display(), lines.join("; "))
            })?;
            validate_structure(&graph)?;

            let order = schedule(&graph)?;
            println!("Execution order: {}", order.join(" -> "));
            for (i, tier) in schedule_tiers(&graph)?.iter().enumerate() {
                let members: Vec<String> = tier
                    .iter()
                    .filter_map(|id| graph.node(id))
                    .map(|n| format!("{} ({})", n.id, n.kind()))
                    .collect();
                println!("  tier {}: {}", i + 1, members.join(", "));
            }
        }
        Commands::Run {
            file,
            query,
            fixtures,
            json,
        } => {
            let succeeded = run_workflow(&config, &file, &query, &fixtures, json).await?;
            if !succeeded {
                std::process::exit(1);
            }
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

async fn run_workflow(
    config: &AppConfig,
    file: &Path,
    query: &str,
    fixtures: &Path,
    json: bool,
) -> anyhow::Result<bool> {
    let definition = read_definition(file)?;
    let capabilities = ReplayCapabilities::load(fixtures)?.into_capabilities();
    let generator = with_retries(capabilities.generator.clone(), &config.retry);
    let capabilities = capabilities.with_generator(generator);

    let events = Arc::new(EventBus::new(config.engine.event_capacity));
    let engine = Engine::new(config.engine.clone()).with_event_bus(events.clone());

    let workflows = Arc::new(InMemoryWorkflowStore::new());
    let name = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workflow".into());
    workflows
        .put(WorkflowRecord {
            id: 1,
            name,
            description: None,
            definition,
            is_active: true,
        })
        .await?;
    let service = StackService::new(
        workflows,
        Arc::new(InMemorySessionStore::new()),
        engine,
        capabilities,
    );

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        warn!("Interrupted, cancelling run...");
        cancel_clone.cancel();
    });

    if !json {
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => print_progress(&event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Progress display lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    let run = service
        .execute_workflow_with_cancel(1, query, None, &cancel)
        .await?;
    info!(session = %run.session_id, succeeded = run.result.succeeded(), "Run complete");

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        match run.result.output_text() {
            Some(text) => println!("{}", text),
            None => eprintln!("No output produced."),
        }
        for failure in &run.result.failures {
            eprintln!("  [!!] {}", failure);
        }
    }

    Ok(run.result.succeeded())
}

fn print_progress(event: &RunEvent) {
    match event {
        RunEvent::NodeStarted { node_id, .. } => eprintln!("  > {}", node_id),
        RunEvent::NodeCompleted {
            node_id,
            elapsed_ms,
            ..
        } => eprintln!("  ok {} ({} ms)", node_id, elapsed_ms),
        RunEvent::NodeFailed {
            node_id, reason, ..
        } => eprintln!("  failed {}: {}", node_id, reason),
        RunEvent::NodeSkipped { node_id, .. } => eprintln!("  skipped {}", node_id),
        _ => {}
    }
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        Ok(AppConfig::load(path)?)
    } else {
        info!(path = %path.display(), "No config file found, using defaults");
        Ok(AppConfig::default())
    }
}

fn read_definition(path: &Path) -> anyhow::Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading workflow from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing workflow in {}", path.display()))
}
