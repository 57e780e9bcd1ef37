//! Command-line driver for the request dispatcher.
//!
//! Submits a burst of identical GET or POST requests through one
//! [`Dispatcher`], waits for every result and prints a summary.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use futures_util::future::join_all;

use request_dispatcher::config::{load_config, DispatcherConfig};
use request_dispatcher::lifecycle::signals;
use request_dispatcher::observability::{logging, metrics};
use request_dispatcher::{DispatchResult, Dispatcher, Headers};

#[derive(Parser)]
#[command(name = "request-dispatcher")]
#[command(about = "Fire HTTP requests through the asynchronous dispatcher", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Per-request timeout in seconds (0 forces immediate timeouts).
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Number of requests to submit.
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// Extra header, as `name:value`. Repeatable.
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send GET requests
    Get { url: String },
    /// Send POST requests with a JSON body
    Post {
        url: String,
        #[arg(short, long, default_value = "{}")]
        data: String,
    },
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    raw.split_once(':')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .ok_or_else(|| format!("expected name:value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DispatcherConfig::from_env(),
    };
    if let Some(timeout) = cli.timeout {
        config.timeouts.request_secs = timeout;
    }

    logging::init_logging(&config.observability);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let headers: Headers = cli.headers.into_iter().collect();
    let dispatcher = Dispatcher::from_config(config)?;
    let started = Instant::now();

    let mut handles = Vec::with_capacity(cli.count);
    match &cli.command {
        Commands::Get { url } => {
            for _ in 0..cli.count {
                handles.push(dispatcher.get(url, Some(&headers)).await);
            }
        }
        Commands::Post { url, data } => {
            let body: serde_json::Value = serde_json::from_str(data)?;
            for _ in 0..cli.count {
                handles.push(dispatcher.post(url, Some(&headers), &body).await);
            }
        }
    }

    let collect = join_all(handles.into_iter().map(|h| dispatcher.get_result(h)));
    let results = tokio::select! {
        results = collect => results,
        _ = signals::ctrl_c() => {
            dispatcher.close();
            dispatcher.closed().await;
            return Ok(());
        }
    };

    print_summary(&results, started);

    dispatcher.close();
    dispatcher.closed().await;
    Ok(())
}

fn print_summary(results: &[DispatchResult], started: Instant) {
    if let [single] = results {
        match single {
            Ok(response) => {
                println!("{}", response.status);
                println!("{}", response.text());
            }
            Err(e) => eprintln!("Error: {e}"),
        }
        return;
    }

    let mut outcomes: BTreeMap<String, usize> = BTreeMap::new();
    for result in results {
        let key = match result {
            Ok(response) => response.status.as_u16().to_string(),
            Err(e) => e.kind().to_string(),
        };
        *outcomes.entry(key).or_default() += 1;
    }

    let elapsed = started.elapsed();
    println!("\n--- Dispatch Results ---");
    println!("Total Requests: {}", results.len());
    println!("Total Duration: {:?}", elapsed);
    println!(
        "Requests/sec:   {:.2}",
        results.len() as f64 / elapsed.as_secs_f64()
    );
    for (outcome, count) in &outcomes {
        println!("{:<15} {}", format!("{outcome}:"), count);
    }
    println!("------------------------\n");
}
