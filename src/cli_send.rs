//! Sends one notification to a running receiver.
//!
//! ```text
//! cli-send --identity 3f2a... --source "Paige's Print Petitions" fileName=benchy.3mf notes="0.2mm PLA"
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{Map, Value};

use notification_receiver::config::DEFAULT_APP_ID;

#[derive(Parser, Debug)]
struct CliArgs {
    /// Base URL of the receiver.
    #[clap(long, default_value = "http://127.0.0.1:3001")]
    pub server: String,

    /// Identity whose collection receives the notification.
    #[clap(long)]
    pub identity: String,

    #[clap(long, default_value = DEFAULT_APP_ID)]
    pub app_id: String,

    /// Value of the `source` field.
    #[clap(long)]
    pub source: Option<String>,

    /// Store the notification without a timestamp.
    #[clap(long)]
    pub no_timestamp: bool,

    /// Payload fields as key=value. Values that parse as JSON are sent as JSON.
    #[clap(value_parser = parse_field)]
    pub fields: Vec<(String, Value)>,
}

fn parse_field(s: &str) -> Result<(String, Value)> {
    let Some((key, raw)) = s.split_once('=') else {
        bail!("Expected key=value, got {:?}", s);
    };
    if key.is_empty() {
        bail!("Empty field name in {:?}", s);
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn build_body(args: &CliArgs) -> Map<String, Value> {
    let mut body = Map::new();
    if let Some(source) = &args.source {
        body.insert("source".to_string(), Value::String(source.clone()));
    }
    for (key, value) in &args.fields {
        body.insert(key.clone(), value.clone());
    }
    body
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let url = format!(
        "{}/v1/artifacts/{}/users/{}/notifications",
        args.server.trim_end_matches('/'),
        args.app_id,
        args.identity
    );
    let response = reqwest::Client::new()
        .post(&url)
        .query(&[("server_timestamp", (!args.no_timestamp).to_string())])
        .json(&build_body(&args))
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        bail!("Receiver answered {}: {}", status, text);
    }
    println!("{}", text);
    Ok(())
}
