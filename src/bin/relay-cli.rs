use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Command-line client for the REST relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000")]
    server: String,

    /// Identity sent as x-user-uid; history is only kept when set.
    #[arg(short, long)]
    uid: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay a request through the server
    Send {
        method: String,
        url: String,
        /// Request header as "name: value"; repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Request body; parsed as JSON when possible
        #[arg(short, long)]
        data: Option<String>,
    },
    /// List recent history
    History,
    /// Delete all history
    ClearHistory,
    /// List collections
    Collections,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let server = cli.server.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(uid) = &cli.uid {
        headers.insert("x-user-uid", HeaderValue::from_str(uid)?);
    }

    let res = match cli.command {
        Commands::Send { method, url, headers: raw_headers, data } => {
            let body = json!({
                "link": url,
                "method": method,
                "headers": parse_headers(&raw_headers)?,
                "body": data.map(|d| serde_json::from_str(&d).unwrap_or(Value::String(d))),
            });
            client
                .post(format!("{}/proxy", server))
                .headers(headers)
                .json(&body)
                .send()
                .await?
        }
        Commands::History => {
            client.get(format!("{}/history", server)).headers(headers).send().await?
        }
        Commands::ClearHistory => {
            client.delete(format!("{}/history", server)).headers(headers).send().await?
        }
        Commands::Collections => {
            client.get(format!("{}/collections", server)).headers(headers).send().await?
        }
    };

    print_response(res).await
}

fn parse_headers(raw: &[String]) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
    let mut headers = Map::new();
    for line in raw {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| format!("header must look like \"name: value\", got {:?}", line))?;
        headers.insert(name.trim().to_string(), Value::String(value.trim().to_string()));
    }
    Ok(headers)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
