use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, HOST};

use dynamic_namespaces::namespace::DirectoryStatus;

#[derive(Parser)]
#[command(name = "nsp-cli")]
#[command(about = "Inspect a running channel server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Bearer token, when the status endpoint requires one.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List live channels
    Status {
        /// Query as this host instead of the URL's (limits the view to its channels)
        #[arg(long)]
        host: Option<String>,

        /// Print the raw JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    match cli.command {
        Commands::Status { host, json } => {
            if let Some(host) = &host {
                headers.insert(HOST, HeaderValue::from_str(host)?);
            }
            let res = client.get(format!("{}/status", cli.url)).headers(headers).send().await?;
            let status = res.status();
            if !status.is_success() {
                eprintln!("Error: status endpoint returned {}", status);
                if let Ok(text) = res.text().await {
                    eprintln!("Response: {}", text);
                }
                std::process::exit(1);
            }

            let view: DirectoryStatus = res.json().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_table(&view);
            }
        }
    }

    Ok(())
}

fn print_table(view: &DirectoryStatus) {
    println!("scope: {}", view.scope);
    if let Some(ms) = view.next_sweep_in_ms {
        println!("next sweep in {}ms", ms);
    }
    println!("{:<40} {:<12} {:>6} {:>12}", "CHANNEL", "SETUP", "CONNS", "EXPIRES_MS");
    for channel in &view.channels {
        let expires = channel
            .expires_in_ms
            .map(|ms| ms.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<40} {:<12} {:>6} {:>12}",
            channel.name,
            format!("{:?}", channel.setup),
            channel.connections.len(),
            expires
        );
    }
}
