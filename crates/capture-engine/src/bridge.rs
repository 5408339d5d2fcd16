//! Subprocess bridge driver.
//!
//! Browser automation itself is an external collaborator. This driver
//! launches a helper process (by default `demoreel-browser-bridge`, any
//! executable speaking the same protocol works) and exchanges one JSON
//! object per line over stdin/stdout:
//!
//! ```text
//! -> {"id":3,"op":"click","selector":"#submit"}
//! <- {"id":3,"ok":true}
//! -> {"id":4,"op":"screenshot"}
//! <- {"id":4,"ok":true,"data":"<base64 jpeg>"}
//! ```
//!
//! Helper stderr is inherited so its own diagnostics reach the operator.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use demoreel_common::error::{DemoreelError, DemoreelResult};
use demoreel_timeline_model::event::BoundingBox;
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};

use crate::driver::{BrowserDriver, LaunchOptions};

/// How to start and talk to the automation helper.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Helper executable.
    pub command: String,

    /// Extra arguments passed to the helper.
    pub args: Vec<String>,

    /// Per-request timeout. Helper-side waits (selector visibility,
    /// navigation settle) must fit inside it.
    pub request_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: "demoreel-browser-bridge".to_string(),
            args: Vec::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Driver backed by an external automation helper subprocess.
pub struct BridgeDriver {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default, rename = "box")]
    bounding_box: Option<BoundingBox>,
}

impl BridgeDriver {
    /// Spawn the helper and launch a browser session with `options`.
    pub async fn launch(config: &BridgeConfig, options: &LaunchOptions) -> DemoreelResult<Self> {
        let mut child = tokio::process::Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                DemoreelError::driver(
                    "launch",
                    None,
                    None,
                    format!("failed to spawn '{}': {e}", config.command),
                )
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            DemoreelError::driver("launch", None, None, "helper stdin unavailable")
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            DemoreelError::driver("launch", None, None, "helper stdout unavailable")
        })?;

        let mut driver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 0,
            timeout: config.request_timeout,
        };

        driver
            .request(
                "launch",
                json!({
                    "viewport": {
                        "width": options.viewport.width,
                        "height": options.viewport.height,
                    },
                    "deviceScaleFactor": options.device_pixel_ratio,
                    "locale": options.locale,
                    "timezoneId": options.timezone,
                    "colorScheme": options.color_scheme,
                }),
            )
            .await?;

        tracing::info!(command = %config.command, "Browser bridge launched");
        Ok(driver)
    }

    async fn request(
        &mut self,
        op: &str,
        mut payload: serde_json::Value,
    ) -> DemoreelResult<BridgeResponse> {
        self.next_id += 1;
        let id = self.next_id;
        payload["id"] = json!(id);
        payload["op"] = json!(op);

        let mut line = serde_json::to_string(&payload)?;
        line.push('\n');

        let timeout = self.timeout;
        let exchange = async {
            self.stdin
                .write_all(line.as_bytes())
                .await
                .map_err(|e| bridge_err(op, format!("write failed: {e}")))?;
            self.stdin
                .flush()
                .await
                .map_err(|e| bridge_err(op, format!("flush failed: {e}")))?;

            // Skip any lines that are not responses to this request (helper
            // log noise or stale replies).
            loop {
                let mut response_line = String::new();
                let read = self
                    .stdout
                    .read_line(&mut response_line)
                    .await
                    .map_err(|e| bridge_err(op, format!("read failed: {e}")))?;
                if read == 0 {
                    return Err(bridge_err(op, "helper closed its stdout"));
                }
                let trimmed = response_line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<BridgeResponse>(trimmed) {
                    Ok(response) if response.id == id => return Ok(response),
                    Ok(_) => continue,
                    Err(_) => {
                        tracing::debug!(line = trimmed, "Ignoring non-protocol helper output");
                        continue;
                    }
                }
            }
        };

        let response = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| bridge_err(op, format!("helper did not respond within {timeout:?}")))??;

        if !response.ok {
            let message = response.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(bridge_err(op, message));
        }
        Ok(response)
    }
}

fn bridge_err(op: &str, message: impl Into<String>) -> DemoreelError {
    DemoreelError::driver(op, None, None, message)
}

#[async_trait]
impl BrowserDriver for BridgeDriver {
    async fn goto(&mut self, url: &str) -> DemoreelResult<()> {
        self.request("goto", json!({ "url": url })).await?;
        Ok(())
    }

    async fn screenshot(&mut self) -> DemoreelResult<Vec<u8>> {
        let response = self.request("screenshot", json!({})).await?;
        let data = response
            .data
            .ok_or_else(|| bridge_err("screenshot", "response carried no image data"))?;
        base64::engine::general_purpose::STANDARD
            .decode(data.as_bytes())
            .map_err(|e| bridge_err("screenshot", format!("invalid base64 payload: {e}")))
    }

    async fn click(&mut self, selector: &str) -> DemoreelResult<()> {
        self.request("click", json!({ "selector": selector })).await?;
        Ok(())
    }

    async fn dblclick(&mut self, selector: &str) -> DemoreelResult<()> {
        self.request("dblclick", json!({ "selector": selector }))
            .await?;
        Ok(())
    }

    async fn hover(&mut self, selector: &str) -> DemoreelResult<()> {
        self.request("hover", json!({ "selector": selector })).await?;
        Ok(())
    }

    async fn press(&mut self, selector: &str, key: &str) -> DemoreelResult<()> {
        self.request("press", json!({ "selector": selector, "key": key }))
            .await?;
        Ok(())
    }

    async fn type_char(&mut self, selector: &str, ch: char) -> DemoreelResult<()> {
        self.request(
            "typeChar",
            json!({ "selector": selector, "text": ch.to_string() }),
        )
        .await?;
        Ok(())
    }

    async fn bounding_box(&mut self, selector: &str) -> DemoreelResult<Option<BoundingBox>> {
        let response = self
            .request("boundingBox", json!({ "selector": selector }))
            .await?;
        Ok(response.bounding_box)
    }

    async fn inject_overlay(&mut self, html: &str, css: &str) -> DemoreelResult<()> {
        self.request("injectOverlay", json!({ "html": html, "css": css }))
            .await?;
        Ok(())
    }

    async fn remove_overlay(&mut self) -> DemoreelResult<()> {
        self.request("removeOverlay", json!({})).await?;
        Ok(())
    }

    async fn close(&mut self) -> DemoreelResult<()> {
        let _ = self.request("close", json!({})).await;
        if let Err(e) = self.child.kill().await {
            tracing::debug!(error = %e, "Bridge helper already exited");
        }
        Ok(())
    }
}
