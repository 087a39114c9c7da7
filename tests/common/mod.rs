#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;

pub const JWT_SECRET: &str = "integration-test-secret-value-0123456789";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let upload_dir = std::env::temp_dir().join(format!("lms-api-test-uploads-{}", port));

        // Cargo builds the server binary for integration tests and exposes its path
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_lms-api-rust"));
        cmd.env("LMS_API_PORT", port.to_string())
            .env("APP_ENV", "development")
            .env("JWT_SECRET", JWT_SECRET)
            .env("SECURITY_ALLOW_SELF_REGISTRATION", "true")
            .env("UPLOAD_DIR", upload_dir)
            .env("RUST_LOG", "warn")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // Without a MongoDB URI in the environment, point at a closed port so
        // database-backed calls fail fast and /health reports 503
        if std::env::var("MONGODB_URI").is_err() {
            cmd.env("MONGODB_URI", "mongodb://127.0.0.1:1/?directConnection=true")
                .env("MONGODB_SERVER_SELECTION_TIMEOUT_MS", "300");
        }

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
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

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(15)).await?;
    Ok(server)
}

/// Assert the failure envelope and return its body
pub async fn expect_error(res: reqwest::Response, status: StatusCode) -> Result<serde_json::Value> {
    assert_eq!(res.status(), status, "unexpected status");
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], false, "body: {body}");
    assert!(body["message"].is_string(), "body: {body}");
    assert!(body["error"].is_string(), "body: {body}");
    Ok(body)
}
