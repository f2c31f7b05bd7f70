use clap::Parser;
use flowgraph::prelude::*;
use log::LevelFilter;
use std::fs;
use std::time::Instant;

/// Loads a block catalog and a flow graph, rewrites it and reports diagnostics
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the block catalog JSON file
    catalog_path: String,
    /// Path to the flow-graph document JSON file
    graph_path: String,

    /// Print the rewritten graph as a JSON document instead of a report
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let total_start = Instant::now();

    // --- 1. Catalog ---
    let catalog_json = fs::read_to_string(&cli.catalog_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read catalog file '{}': {}",
            &cli.catalog_path, e
        ))
    });
    let mut platform = Platform::new("flowgraph-cli");
    let count = platform
        .load_json(&catalog_json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load catalog: {}", e)));

    // --- 2. Graph ---
    let document = FlowGraphDocument::from_file(&cli.graph_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to load flow graph from '{}': {}",
            &cli.graph_path, e
        ))
    });
    let mut graph = document
        .instantiate(&platform)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to build flow graph: {}", e)));

    // --- 3. Rewrite ---
    if let Err(e) = graph.rewrite() {
        eprintln!("Rewrite incomplete: {}", e);
    }
    let diagnostics: Vec<Diagnostic> = graph.validate().collect();

    if cli.json {
        let rewritten = FlowGraphDocument::from_graph(&graph);
        let json = serde_json::to_string_pretty(&rewritten)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialize flow graph: {}", e)));
        println!("{}", json);
    } else {
        print_report(&graph, count);
        println!("\n--- Diagnostics ---");
        println!("{}", DiagnosticFormatter::format_report(&diagnostics));
        println!("\nFinished in {:?}", total_start.elapsed());
    }

    if !diagnostics.is_empty() {
        std::process::exit(1);
    }
}

fn print_report(graph: &FlowGraph, definitions: usize) {
    println!(
        "Loaded {} block definitions, {} blocks, {} connections",
        definitions,
        graph.blocks().len(),
        graph.connections().len()
    );

    println!("\n--- Namespace ---");
    for (key, value) in graph.namespace_values() {
        println!("{:<32} = {}", key, value);
    }

    println!("\n--- Blocks ---");
    for block in graph.blocks() {
        let state = if block.enabled() { "" } else { " (disabled)" };
        println!("{} [{}]{}", block.id(), block.class_key, state);
        for direction in [Direction::Sink, Direction::Source] {
            for port in block.visible_ports(direction) {
                println!(
                    "  {:<6} {:<12} {:<8} {}",
                    direction.to_string(),
                    port.key,
                    port.kind.to_string(),
                    port.dtype.as_deref().unwrap_or("-")
                );
            }
        }
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
