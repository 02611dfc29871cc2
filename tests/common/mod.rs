#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

pub const TEST_SECRET: &str = "integration-test-secret";

static SERVER: OnceLock<TestServer> = OnceLock::new();
static GATED_SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn(require_auth: bool) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Cargo builds the server binary before integration tests run
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_catalog-api"));
        cmd.env("PORT", port.to_string())
            .env_remove("CATALOG_PORT")
            .env_remove("DATABASE_URL")
            .env("APP_ENV", "development")
            .env("CATALOG_STORE", "memory")
            .env("SECURITY_REQUIRE_AUTH", require_auth.to_string())
            .env("JWT_SECRET", TEST_SECRET)
            .env("RUST_LOG", "catalog_api=warn")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline { break; }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Server with open writes.
pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn(false).expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Server that requires a bearer token for create and update.
pub async fn ensure_gated_server() -> Result<&'static TestServer> {
    let server = GATED_SERVER.get_or_init(|| TestServer::spawn(true).expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// SKU unique per call so tests sharing a server never collide.
pub fn unique_sku() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("T-{}", &suffix[..12])
}

pub fn product(sku: &str) -> Value {
    json!({
        "name": "Gaming Laptop",
        "price": 1299.99,
        "description": "High-performance gaming laptop",
        "category": "Laptops",
        "brand": "Dell",
        "stock": 50,
        "SKU": sku,
        "specifications": { "processor": "Intel i9", "ram": "32GB" },
        "warranty": "2 years"
    })
}

pub fn unique_name(prefix: &str) -> String {
    format!("{} {}", prefix, uuid::Uuid::new_v4().simple())
}
