use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "edge-ctl")]
#[command(version, about = "Control CLI for the edge-gateway diagnostics listener", long_about = None)]
struct Cli {
    /// Base URL of the diagnostics listener.
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, shutdown phase, connections, hosts and procedures
    Status,
    /// Show or change the active log filter
    LogLevel {
        /// New filter directive, e.g. `debug` or `edge_gateway=trace`
        directive: Option<String>,
    },
    /// Dump Prometheus metrics
    Metrics,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("edge-ctl: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{base}/status")).send().await?;
            let res = check(res).await?;
            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Commands::LogLevel { directive: None } => {
            let res = client.get(format!("{base}/log-level")).send().await?;
            print!("{}", check(res).await?.text().await?);
        }
        Commands::LogLevel {
            directive: Some(directive),
        } => {
            let res = client
                .put(format!("{base}/log-level"))
                .body(directive)
                .send()
                .await?;
            print!("{}", check(res).await?.text().await?);
        }
        Commands::Metrics => {
            let res = client.get(format!("{base}/metrics")).send().await?;
            print!("{}", check(res).await?.text().await?);
        }
    }

    Ok(())
}

async fn check(res: reqwest::Response) -> Result<reqwest::Response, Box<dyn std::error::Error>> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().await.unwrap_or_default();
    Err(format!("diagnostics returned {status}: {}", text.trim()).into())
}
