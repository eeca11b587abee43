use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the LLM gateway", long_about = None)]
struct Cli {
    #[arg(short, long, env = "GATEWAY_URL", default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "PROXY_API_KEY", default_value = "change-me")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backend health, loaded model and queue depth
    Health,
    /// Models served by the backend
    Models,
    /// Downloaded models and the current one
    Status,
    /// Progress of a download (latest if no model given)
    Progress { model_id: Option<String> },
    /// Download a model in the background (or print manual steps)
    Download {
        model_id: String,
        #[arg(long)]
        manual: bool,
    },
    /// Delete a downloaded model
    Delete { model_id: String },
    /// Switch the backend to a downloaded model
    Switch { model_id: String },
    /// Whether the backend is starting, loading or ready
    Loading,
    /// Schedule a gateway restart
    Restart,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, path, query): (Method, &str, Vec<(&str, String)>) = match &cli.command {
        Commands::Health => (Method::GET, "/api/healthz", vec![]),
        Commands::Models => (Method::GET, "/api/models", vec![]),
        Commands::Status => (Method::GET, "/api/model-status", vec![]),
        Commands::Progress { model_id } => (
            Method::GET,
            "/api/download-progress",
            model_id.iter().map(|id| ("model_id", id.clone())).collect(),
        ),
        Commands::Download { model_id, manual } => (
            Method::POST,
            "/api/download-model",
            vec![("model_id", model_id.clone()), ("auto", (!manual).to_string())],
        ),
        Commands::Delete { model_id } => (
            Method::DELETE,
            "/api/delete-model",
            vec![("model_id", model_id.clone())],
        ),
        Commands::Switch { model_id } => (
            Method::POST,
            "/api/switch-model",
            vec![("model_id", model_id.clone())],
        ),
        Commands::Loading => (Method::GET, "/api/model-loading-status", vec![]),
        Commands::Restart => (Method::POST, "/api/restart-api", vec![]),
    };

    let res = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .query(&query)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
