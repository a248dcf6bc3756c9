//! `palisade` — compile and run workflow graphs from the command line.
//!
//! The CLI hosts an in-process engine over the builtin component registry
//! and the in-memory store; it exists for local development and for driving
//! graphs end-to-end without the platform around it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use palisade_component::builtin::builtin_registry;
use palisade_core::WorkflowId;
use palisade_engine::{Engine, RunRequest, WorkerSettings, WorkflowRepository};
use palisade_eventbus::EventReader;
use palisade_execution::TraceEventType;
use palisade_runtime::{MemoryArtifacts, ReqwestHttp, StaticSecrets};
use palisade_store::{ExecutionStore, MemoryStore};
use palisade_workflow::{Compiler, GraphSpec};
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Parser)]
#[command(name = "palisade", about = "Workflow automation core", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a graph document and print the canonical definition.
    Compile {
        /// Path to the graph JSON document.
        graph: PathBuf,
    },
    /// Compile and execute a graph, streaming trace events.
    Run {
        /// Path to the graph JSON document.
        graph: PathBuf,
        /// Path to a JSON object with trigger inputs.
        #[arg(long)]
        inputs: Option<PathBuf>,
        /// Print events as JSON lines instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
    /// List the registered components.
    Components,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compile { graph } => compile(&graph),
        Command::Run {
            graph,
            inputs,
            json,
        } => run(&graph, inputs.as_deref(), json).await,
        Command::Components => components(),
    }
}

fn load_graph(path: &std::path::Path) -> Result<GraphSpec> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading graph document {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn compile(path: &std::path::Path) -> Result<()> {
    let graph = load_graph(path)?;
    let registry = builtin_registry();
    let definition = Compiler::new(&registry)
        .compile(&graph)
        .context("graph failed to compile")?;
    println!("{}", serde_json::to_string_pretty(&definition)?);
    Ok(())
}

fn components() -> Result<()> {
    let registry = builtin_registry();
    let mut definitions = registry.definitions();
    definitions.sort_by(|a, b| a.id.cmp(&b.id));
    for definition in definitions {
        println!(
            "{:<30} {:<12} {}",
            definition.id, definition.category, definition.label
        );
    }
    Ok(())
}

async fn run(path: &std::path::Path, inputs: Option<&std::path::Path>, json: bool) -> Result<()> {
    let graph = load_graph(path)?;
    let trigger_inputs: Map<String, Value> = match inputs {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading inputs {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => Map::new(),
    };

    let registry = Arc::new(builtin_registry());
    let definition = Compiler::new(&registry)
        .compile(&graph)
        .context("graph failed to compile")?;

    let repository = Arc::new(WorkflowRepository::new());
    let workflow_id = WorkflowId::v4();
    repository.publish(workflow_id, definition);

    let store = Arc::new(MemoryStore::new());
    let engine = Engine::builder(
        registry,
        repository,
        Arc::clone(&store) as Arc<dyn ExecutionStore>,
        WorkerSettings::from_env(),
    )
    .with_http(Arc::new(ReqwestHttp::new()))
    .with_secrets(Arc::new(StaticSecrets::new()))
    .with_artifacts(Arc::new(MemoryArtifacts::new()))
    .build();

    let handle = engine
        .submit(RunRequest::latest(workflow_id).with_inputs(trigger_inputs))
        .await
        .context("dispatching run")?;
    let run_id = handle.run_id();
    debug!(%run_id, "run dispatched");

    // Stream events while the run executes; the reader ends when the run's
    // channel closes after the terminal status.
    let mut reader = EventReader::attach(engine.bus(), run_id, 0);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancel_sent = false;
    loop {
        tokio::select! {
            event = reader.next() => {
                match event? {
                    Some(event) if json => println!("{}", serde_json::to_string(&event)?),
                    Some(event) => {
                        let label = match event.event_type {
                            TraceEventType::Started => "started",
                            TraceEventType::Progress => "progress",
                            TraceEventType::Completed => "completed",
                            TraceEventType::Failed => "failed",
                        };
                        let detail = event
                            .message
                            .as_deref()
                            .unwrap_or_default();
                        println!("[{:>4}] {:<10} {:<24} {}", event.id, label, event.node_ref, detail);
                    }
                    None => break,
                }
            }
            _ = &mut ctrl_c, if !cancel_sent => {
                cancel_sent = true;
                eprintln!("cancelling run {run_id}");
                handle.cancel();
            }
        }
    }

    let completion = handle.join().await.context("awaiting run completion")?;
    let run = &completion.run;
    eprintln!(
        "run {} finished: {} ({}/{} actions)",
        run.run_id, run.status, run.progress.completed_actions, run.progress.total_actions
    );
    if let Some(failure) = &run.failure {
        eprintln!(
            "failure: {} ({})",
            failure.reason,
            failure.kind.map(|k| k.to_string()).unwrap_or_default()
        );
    }
    println!("{}", serde_json::to_string_pretty(&completion.outputs)?);

    if run.status.is_success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
