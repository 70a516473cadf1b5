use anyhow::{Context, Result};
use autoflow_core::{ExecutionEvent, Graph, GraphIndex, NodeEvent, NodeStatus, RunStatus, Value};
use autoflow_runtime::{ActionRegistry, FlowRuntime, RuntimeConfig};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "autoflow")]
#[command(about = "AutoFlow workflow runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow graph file
    Run {
        /// Path to graph JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Input handed to every root node, as JSON
        #[arg(short, long)]
        input: Option<String>,

        /// Dispatch timeout for nodes without their own `timeoutMs`
        #[arg(long, env = "AUTOFLOW_NODE_TIMEOUT_MS", default_value_t = 30_000)]
        timeout_ms: u64,

        /// Maximum number of nodes running at once (unbounded when unset)
        #[arg(long, env = "AUTOFLOW_MAX_PARALLEL")]
        max_parallel: Option<usize>,

        /// Simulated latency of the built-in integrations
        #[arg(long, env = "AUTOFLOW_SIMULATED_LATENCY_MS", default_value_t = 1000)]
        latency_ms: u64,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a graph file without running it
    Validate {
        /// Path to graph JSON file
        file: PathBuf,
    },

    /// List available action types
    Actions,

    /// Write the starter workflow to a file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

fn load_graph(file: &Path) -> Result<Graph> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let graph: Graph =
        serde_json::from_str(&json).with_context(|| format!("parsing {}", file.display()))?;
    tracing::debug!("Loaded {} nodes and {} edges from {}", graph.nodes.len(), graph.edges.len(), file.display());
    Ok(graph)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            timeout_ms,
            max_parallel,
            latency_ms,
            verbose,
        } => {
            init_tracing(verbose);
            let config = RuntimeConfig {
                max_parallel_nodes: max_parallel,
                node_timeout_ms: timeout_ms,
                ..RuntimeConfig::default()
            };
            run_workflow(file, input, config, Duration::from_millis(latency_ms)).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Actions => {
            list_actions();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

async fn run_workflow(
    file: PathBuf,
    input: Option<String>,
    config: RuntimeConfig,
    latency: Duration,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let graph = load_graph(&file)?;
    println!("   Nodes: {}", graph.nodes.len());
    println!("   Edges: {}", graph.edges.len());
    println!();

    let input: Option<Value> = input
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .context("--input must be valid JSON")?;

    let mut registry = ActionRegistry::new();
    autoflow_actions::register_all_with_latency(&mut registry, latency);
    let runtime = FlowRuntime::with_registry(Arc::new(registry), config);

    let events = runtime.subscribe_events();
    let console = tokio::spawn(run_console(events, |line| println!("{}", line)));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("🛑 Ctrl-C received, letting running nodes finish...");
                cancel.cancel();
            }
        }
    });

    let result = runtime.execute_with_cancel(&graph, input, cancel).await;
    let _ = console.await;
    let report = result?;

    println!();
    println!("📊 Execution Summary:");
    println!("   Run ID: {}", report.run_id);
    for status in [
        NodeStatus::Success,
        NodeStatus::Error,
        NodeStatus::Skipped,
    ] {
        println!("   {}: {}/{}", status, report.count(status), report.results.len());
    }

    let outputs: Vec<_> = report
        .results
        .values()
        .filter_map(|r| r.output.as_ref().map(|o| (&r.node_id, o)))
        .collect();
    if !outputs.is_empty() {
        println!();
        println!("📤 Outputs:");
        for (node_id, output) in outputs {
            println!("   {}: {}", node_id, output);
        }
    }

    match report.status {
        RunStatus::Success => Ok(()),
        status => Err(anyhow::anyhow!("workflow finished with status {}", status)),
    }
}

/// Print run progress until the run ends or the bus closes.
///
/// A lagging receiver reports how many events it missed and keeps going.
async fn run_console(
    mut events: broadcast::Receiver<ExecutionEvent>,
    mut print: impl FnMut(String),
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                print(format!("     ⚠️  console fell behind, {} events not shown", missed));
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match event {
            ExecutionEvent::RunStarted { node_count, .. } => {
                print(format!("▶️  Run started ({} nodes)", node_count));
            }
            ExecutionEvent::RunRejected { error, .. } => {
                print(format!("⛔ Run rejected: {}", error));
                break;
            }
            ExecutionEvent::NodeLog { node_id, line, .. } => {
                print(format!("> [{}] {}", node_id, line));
            }
            ExecutionEvent::NodeEvent { node_id, event, .. } => print(match event {
                NodeEvent::Info { message } => format!("     ℹ️  [{}] {}", node_id, message),
                NodeEvent::Warning { message } => format!("     ⚠️  [{}] {}", node_id, message),
                NodeEvent::Progress { percent, message } => match message {
                    Some(msg) => format!("     📊 [{}] {}% - {}", node_id, percent, msg),
                    None => format!("     📊 [{}] {}%", node_id, percent),
                },
            }),
            ExecutionEvent::NodeStatusChanged { .. } => {}
            ExecutionEvent::RunCompleted { status, duration_ms, .. } => {
                print(format!("🏁 Run finished ({}) in {}ms", status, duration_ms));
                break;
            }
        }
    }
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let graph = load_graph(&file)?;
    graph.validate()?;
    let index = GraphIndex::build(&graph);
    let order = index.topological_order()?;

    let mut registry = ActionRegistry::new();
    autoflow_actions::register_all(&mut registry);

    println!("✅ Workflow is valid:");
    println!("   Nodes: {}", graph.nodes.len());
    println!("   Edges: {}", graph.edges.len());
    println!(
        "   Roots: {}",
        index.roots().into_iter().collect::<Vec<_>>().join(", ")
    );
    println!("   Order: {}", order.join(" → "));

    for node in &graph.nodes {
        if !registry.is_registered(&node.action_type) {
            println!(
                "   ⚠️  {} ({}) has no handler and will complete as a no-op",
                node.id, node.action_type
            );
        }
    }

    Ok(())
}

fn list_actions() {
    println!("📦 Available Action Types:");
    println!();

    let mut registry = ActionRegistry::new();
    autoflow_actions::register_all(&mut registry);

    for action_type in registry.list_action_types() {
        if let Some(metadata) = registry.get_metadata(&action_type) {
            println!("  • {} ({})", action_type, metadata.category);
            println!("    {}", metadata.description);
        } else {
            println!("  • {}", action_type);
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let graph = autoflow_actions::demo_graph();

    let json = serde_json::to_string_pretty(&graph)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  autoflow run --file {}", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoflow_core::{EventBus, RunId};

    #[tokio::test]
    async fn console_keeps_printing_after_falling_behind() {
        let bus = EventBus::new(2);
        let events = bus.subscribe();
        let emitter = bus.create_emitter(RunId::nil(), "a".into());
        for i in 1..=5 {
            emitter.info(format!("step {}", i));
        }
        drop(emitter);
        drop(bus);

        let mut lines = Vec::new();
        run_console(events, |line| lines.push(line)).await;

        assert!(lines[0].contains("console fell behind"));
        assert_eq!(lines.last().unwrap(), "     ℹ️  [a] step 5");
        assert!(lines.len() > 1);
    }
}
