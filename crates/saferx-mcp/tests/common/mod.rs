#![allow(dead_code)]

use anyhow::Context as _;
use serde_json::{Value, json};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

pub use saferx_test_support::{MockBackend, MockReply, RecordedRequest};

pub const TEST_API_KEY: &str = "integration-test-key";

/// Command for the adapter binary with a clean SafeRx environment.
pub fn adapter_command(api_key: Option<&str>, base_url: Option<&str>) -> Command {
    let bin = env!("CARGO_BIN_EXE_saferx-mcp");
    let mut cmd = Command::new(bin);
    cmd.env_remove("SAFERX_API_KEY")
        .env_remove("SAFERX_BASE_URL")
        .env("RUST_LOG", "warn")
        .kill_on_drop(true);
    if let Some(key) = api_key {
        cmd.env("SAFERX_API_KEY", key);
    }
    if let Some(url) = base_url {
        cmd.env("SAFERX_BASE_URL", url);
    }
    cmd
}

/// Minimal MCP client speaking line-delimited JSON-RPC to a spawned adapter.
pub struct StdioSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl StdioSession {
    /// Spawn the adapter against `base_url` and complete the MCP handshake.
    pub async fn connect(base_url: &str) -> anyhow::Result<Self> {
        let mut child = adapter_command(Some(TEST_API_KEY), Some(base_url))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("spawn adapter")?;

        let stdin = child.stdin.take().context("adapter stdin")?;
        let stdout = child.stdout.take().context("adapter stdout")?;
        let mut session = Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
        };

        let init = session
            .request(
                0,
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "saferx-mcp-integration-tests", "version": "0" }
                }),
                Duration::from_secs(10),
            )
            .await?;
        anyhow::ensure!(
            init.pointer("/result/serverInfo/name") == Some(&json!("saferx")),
            "unexpected initialize reply: {init}"
        );

        session
            .send(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await?;
        Ok(session)
    }

    pub async fn send(&mut self, msg: &Value) -> anyhow::Result<()> {
        let stdin = self.stdin.as_mut().context("stdin already closed")?;
        let mut line = serde_json::to_string(msg)?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await.context("write request")?;
        stdin.flush().await.context("flush request")?;
        Ok(())
    }

    /// Send a request and wait for the reply carrying the same id.
    pub async fn request(
        &mut self,
        id: u64,
        method: &str,
        params: Value,
        timeout_dur: Duration,
    ) -> anyhow::Result<Value> {
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))
        .await?;

        tokio::time::timeout(timeout_dur, async {
            loop {
                let line = self
                    .stdout
                    .next_line()
                    .await
                    .context("read adapter stdout")?
                    .context("adapter closed stdout")?;
                let msg: Value = serde_json::from_str(&line)
                    .with_context(|| format!("adapter wrote non-JSON line: {line}"))?;
                if msg.get("id") == Some(&json!(id)) {
                    return anyhow::Ok(msg);
                }
            }
        })
        .await
        .with_context(|| format!("timed out waiting for reply to {method}"))?
    }

    pub async fn call_tool(&mut self, id: u64, name: &str, arguments: Value) -> anyhow::Result<Value> {
        self.request(
            id,
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
            Duration::from_secs(10),
        )
        .await
    }

    /// Read the next stdout line, if any, within `timeout_dur`.
    pub async fn next_line(&mut self, timeout_dur: Duration) -> anyhow::Result<Option<String>> {
        tokio::time::timeout(timeout_dur, self.stdout.next_line())
            .await
            .context("timed out reading adapter stdout")?
            .context("read adapter stdout")
    }

    /// Wait for the process to exit on its own.
    pub async fn wait(&mut self, timeout_dur: Duration) -> anyhow::Result<ExitStatus> {
        tokio::time::timeout(timeout_dur, self.child.wait())
            .await
            .context("timed out waiting for adapter exit")?
            .context("wait for adapter")
    }

    /// Close stdin and wait for a clean exit.
    pub async fn finish(mut self) -> anyhow::Result<ExitStatus> {
        drop(self.stdin.take());
        self.wait(Duration::from_secs(10)).await
    }
}

/// `result.content[0].text` of a `tools/call` reply.
pub fn tool_call_text(msg: &Value) -> anyhow::Result<&str> {
    msg.pointer("/result/content/0/text")
        .and_then(Value::as_str)
        .with_context(|| format!("tools/call reply has no text content: {msg}"))
}

pub fn tool_call_is_error(msg: &Value) -> bool {
    msg.pointer("/result/isError") == Some(&json!(true))
}
