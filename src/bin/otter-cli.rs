use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "otter-cli")]
#[command(about = "Management CLI for the Otter proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080", env = "OTTER_URL")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Health of a backend node, through the proxy
    Health,
    /// Cluster state of a backend node, through the proxy
    State,
    /// Run a DQL query
    Query {
        /// Query text
        text: String,
    },
    /// Check a DQL document (or schema) without touching the cluster
    Validate {
        file: PathBuf,
        /// Validate as a schema instead of a query or mutation
        #[arg(long)]
        schema: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
        Commands::State => client.get(format!("{}/state", base)).send().await?,
        Commands::Query { text } => {
            client
                .post(format!("{}/query", base))
                .json(&json!({ "query": text }))
                .send()
                .await?
        }
        Commands::Validate { file, schema } => {
            let body = std::fs::read_to_string(&file)?;
            let route = if schema { "schema" } else { "dql" };
            client
                .post(format!("{}/validate/{}", base, route))
                .header(CONTENT_TYPE, "application/dql")
                .body(body)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{}", rendered);
    } else {
        eprintln!("Error: proxy returned status {}", status);
        eprintln!("{}", rendered);
        std::process::exit(1);
    }
    Ok(())
}
