use anyhow::Context;
use clap::Subcommand;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::auth::{issue_token, Claims};
use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config;
use crate::resources::{Category, Product, Resource};

#[derive(Subcommand)]
pub enum FixtureCommands {
    #[command(about = "POST the sample category and product to a running server")]
    Seed {
        #[arg(long, env = "CATALOG_URL", help = "Server base URL (defaults to http://localhost:<PORT>)")]
        url: Option<String>,
        #[arg(long, help = "Bearer token; minted from JWT_SECRET when omitted and a secret is set")]
        token: Option<String>,
    },
}

/// What happened to one fixture document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedStatus {
    Created,
    Exists,
}

pub async fn handle(cmd: FixtureCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        FixtureCommands::Seed { url, token } => handle_seed(url, token, output_format).await,
    }
}

async fn handle_seed(url: Option<String>, token: Option<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    let settings = config::config();
    let base = url.unwrap_or_else(|| format!("http://localhost:{}", settings.server.port));
    let base = base.trim_end_matches('/').to_string();

    let token = match token {
        Some(token) => Some(token),
        None if !settings.security.jwt_secret.is_empty() => {
            let claims = Claims::new("fixture", "local", 1)?;
            Some(issue_token(&claims, &settings.security.jwt_secret)?)
        }
        None => None,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let mut results = Vec::new();
    let category = serde_json::to_value(Category::sample())?;
    results.push((Category::COLLECTION, seed_one(&client, &base, Category::COLLECTION, &category, token.as_deref()).await?));
    let product = serde_json::to_value(Product::sample())?;
    results.push((Product::COLLECTION, seed_one(&client, &base, Product::COLLECTION, &product, token.as_deref()).await?));

    let summary: Value = results
        .iter()
        .map(|(collection, status)| (collection.to_string(), json!(status)))
        .collect::<serde_json::Map<String, Value>>()
        .into();

    output_success(&output_format, &format!("Seeded sample catalog at {}", base), Some(json!({ "results": summary })))
}

async fn seed_one(
    client: &reqwest::Client,
    base: &str,
    collection: &str,
    document: &Value,
    token: Option<&str>,
) -> anyhow::Result<SeedStatus> {
    let url = format!("{}/api/{}", base, collection);
    let mut request = client.post(&url).json(document);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("cannot reach {}", url))?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if status.is_success() {
        tracing::debug!("seeded {}: {}", collection, body["data"]["_id"]);
        return Ok(SeedStatus::Created);
    }
    if body["error"] == "DuplicateError" {
        return Ok(SeedStatus::Exists);
    }

    let message = body["message"].as_str().unwrap_or("request failed").to_string();
    output_error(&OutputFormat::Text, &format!("{} {}: {}", status, collection, message), body["error"].as_str())?;
    anyhow::bail!("seeding {} failed with {}", collection, status)
}
