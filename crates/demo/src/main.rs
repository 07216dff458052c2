use clap::Parser;
use serde::Deserialize;
use serde_json::Value;

use workbridge_engine::{logging, Client, ClientConfig, WorkerConfig};

/// Registers a single echo worker and polls a workbridge server for work.
#[derive(Parser)]
#[command(name = "workbridge-demo", version)]
struct Cli {
    /// Client id issued by the orchestration server.
    #[arg(long, env = "WORKBRIDGE_CLIENT_ID")]
    client_id: String,

    /// Auth token issued alongside the client id.
    #[arg(long, env = "WORKBRIDGE_AUTH_TOKEN")]
    auth_token: String,

    /// Base URL of the orchestration server, without the port.
    #[arg(long, env = "WORKBRIDGE_BASE_URL", default_value_t = ClientConfig::DEFAULT_BASE_URL.to_string())]
    base_url: String,

    /// Port the orchestration server listens on.
    #[arg(long, env = "WORKBRIDGE_PORT", default_value_t = ClientConfig::DEFAULT_PORT)]
    port: u16,
}

#[derive(Deserialize)]
struct EchoInput {
    #[serde(default)]
    message: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let config = ClientConfig::new(cli.client_id, cli.auth_token)
        .base_url(cli.base_url)
        .port(cli.port);

    let client = Client::new("demo-org", config)?;
    client.register::<EchoInput, Value, _, _>(WorkerConfig::new("echo"), |input: EchoInput| async move {
        tracing::info!(message = %input.message, "echo worker running");
        Value::String(input.message)
    })?;

    let handle = client.handle();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        handle.stop();
    });

    println!("workbridge-demo started. Press Ctrl+C to stop...");
    client.start().await;
    println!("workbridge-demo stopped.");
    Ok(())
}
