use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cns_core::loader::load_documents;
use cns_core::persist::{index_exists, IndexPaths};
use cns_core::{IndexStats, SearchEngine, SearchResult};
use std::io::{self, BufRead, Write};
use tracing_subscriber::{fmt, EnvFilter};

const SNIPPET_PREVIEW: usize = 200;

#[derive(Parser)]
#[command(name = "cns-indexer")]
#[command(about = "Build and query the boolean search index over CNS resolutions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from CSV/JSON/JSONL files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
    },
    /// Run a single query
    Search {
        #[arg(long, default_value = "./index")]
        index: String,
        /// Source data used to build the index when none exists yet
        #[arg(long)]
        input: Option<String>,
        /// Query, e.g. 'saúde AND (mental OR psicológica)'
        #[arg(short, long)]
        query: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        num_results: usize,
        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show index statistics
    Stats {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Read queries from stdin until `quit`
    Interactive {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        input: Option<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output } => {
            build_index(&input, &output)?;
            Ok(())
        }
        Commands::Search { index, input, query, num_results, json } => {
            let engine = open_or_build(&index, input.as_deref())?;
            let results = engine.search(&query, num_results);
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&results, &query);
            }
            Ok(())
        }
        Commands::Stats { index, json } => {
            let engine = SearchEngine::open(&IndexPaths::new(&index))?;
            let stats = engine.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
            Ok(())
        }
        Commands::Interactive { index, input } => {
            let engine = open_or_build(&index, input.as_deref())?;
            interactive(&engine)
        }
    }
}

fn build_index(input: &str, output: &str) -> Result<SearchEngine> {
    let docs = load_documents(input).with_context(|| format!("loading documents from {input}"))?;
    let engine = SearchEngine::build(docs);
    engine.save(&IndexPaths::new(output))?;
    tracing::info!(output, "index build complete");
    Ok(engine)
}

fn open_or_build(index: &str, input: Option<&str>) -> Result<SearchEngine> {
    let paths = IndexPaths::new(index);
    match input {
        Some(input) if !index_exists(&paths) => {
            tracing::info!(index, input, "no index found, building");
            build_index(input, index)
        }
        _ => SearchEngine::open(&paths).with_context(|| {
            format!("opening index at {index} (run `build` or pass --input)")
        }),
    }
}

fn print_results(results: &[SearchResult], query: &str) {
    if results.is_empty() {
        println!("\nNo results for: '{query}'");
        println!("\nTips:");
        println!("- Try different terms");
        println!("- Use operators: AND, OR, NOT");
        println!("- Quote exact phrases: \"exact phrase\"");
        return;
    }

    println!("\nResults for: '{query}'");
    println!("Found: {} document(s)", results.len());
    println!("{}", "=".repeat(80));
    for (i, result) in results.iter().enumerate() {
        println!("\n{}. {}", i + 1, result.title);
        println!("   Date: {}", result.publication_date);
        println!("   Score: {:.2}", result.score);
        println!("   Link: {}", result.link);
        let snippet: String = result.snippet.chars().take(SNIPPET_PREVIEW).collect();
        let more = if result.snippet.chars().count() > SNIPPET_PREVIEW { "..." } else { "" };
        println!("   Excerpt: {snippet}{more}");
        println!("{}", "-".repeat(80));
    }
}

fn print_stats(stats: &IndexStats) {
    println!("\nIndex statistics:");
    println!("   Documents: {}", stats.total_documents);
    println!("   Unique terms: {}", stats.total_unique_terms);
    println!("   Index size: {:.2} MB", stats.index_size_mb);
}

fn print_help() {
    println!("\nOperators:");
    println!("   AND    both terms must appear: 'saúde AND mental'");
    println!("   OR     either term: 'medicamento OR remédio'");
    println!("   NOT    exclude a term: 'hospital NOT privado'");
    println!("   \"...\"  exact phrase: '\"saúde pública\"'");
    println!("   ()     grouping: '(saúde OR medicina) AND mental'");
    println!("\nAccents and case are ignored; words shorter than 3 letters are skipped.");
    println!("Commands: stats, help, quit");
}

fn interactive(engine: &SearchEngine) -> Result<()> {
    print_help();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nquery> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let query = line?;
        let query = query.trim();
        match query {
            "" => continue,
            "quit" | "exit" | "q" => break,
            "stats" => print_stats(&engine.stats()),
            "help" | "h" | "?" => print_help(),
            _ => print_results(&engine.search(query, 20), query),
        }
    }
    Ok(())
}
