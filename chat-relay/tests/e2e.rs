use std::{path::Path, process::Stdio, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    time::{sleep, timeout},
};

const READ_TIMEOUT: Duration = Duration::from_secs(3);

#[tokio::test]
async fn cli_chat_end_to_end() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("chat_relay");

    let (mut relay_child, mut relay_stdout) = spawn_relay(&binary).await?;
    let addr = read_relay_addr(&mut relay_stdout).await?;

    // Keep draining relay logs so the pipe never fills.
    let relay_log_task = tokio::spawn(drain_stdout(relay_stdout));

    let mut alice = spawn_client(&binary, "alice", &addr).await?;
    // No acknowledgement follows the name, so give the relay a moment to register alice.
    sleep(Duration::from_millis(200)).await;
    let mut bob = spawn_client(&binary, "bob", &addr).await?;

    alice.expect("bob joined the chat.").await?;

    // Broadcasts are not echoed back to the sender.
    alice.send_line("Hello from Alice").await?;
    bob.expect("alice: Hello from Alice").await?;

    bob.send_line("/pm alice psst, over here").await?;
    alice.expect("bob (PM): psst, over here").await?;

    alice.send_line("/quit").await?;
    alice.expect("*** leaving chat").await?;
    bob.expect("alice left the chat.").await?;

    bob.send_line("/quit").await?;
    bob.expect("*** leaving chat").await?;

    alice.wait_success().await?;
    bob.wait_success().await?;

    // The relay outlives its clients; terminate it manually.
    let _ = relay_child.kill().await;
    let _ = relay_child.wait().await;
    let _ = relay_log_task.await;

    Ok(())
}

struct ClientProcess {
    nickname: String,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ClientProcess {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.stdin
            .write_all(format!("{line}\n").as_bytes())
            .await
            .with_context(|| format!("{} failed to send '{line}'", self.nickname))?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn expect(&mut self, expected: &str) -> Result<()> {
        let line = read_line(&mut self.stdout)
            .await
            .with_context(|| format!("{} waiting for '{expected}'", self.nickname))?
            .with_context(|| format!("{} closed stdout before '{expected}'", self.nickname))?;
        if line != expected {
            bail!("{} expected '{expected}', got '{line}'", self.nickname);
        }
        Ok(())
    }

    async fn wait_success(&mut self) -> Result<()> {
        let status = self
            .child
            .wait()
            .await
            .with_context(|| format!("failed to await client {}", self.nickname))?;
        if !status.success() {
            bail!("client {} exited with status {status}", self.nickname);
        }
        Ok(())
    }
}

async fn spawn_relay(binary: &Path) -> Result<(Child, BufReader<ChildStdout>)> {
    let mut cmd = Command::new(binary);
    cmd.arg("serve")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg("0")
        .env("NO_COLOR", "1")
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd.spawn().context("failed to spawn relay")?;
    let stdout = child
        .stdout
        .take()
        .context("relay stdout missing after spawn")?;

    Ok((child, BufReader::new(stdout)))
}

async fn read_relay_addr(reader: &mut BufReader<ChildStdout>) -> Result<String> {
    let line = read_line(reader)
        .await?
        .context("relay did not emit listening address")?;
    let trimmed = line.trim();
    let addr = trimmed
        .split_whitespace()
        .last()
        .context("unexpected relay banner format")?;
    if !addr.contains(':') {
        return Err(anyhow!("relay banner missing socket: {trimmed}"));
    }
    Ok(addr.to_string())
}

async fn spawn_client(binary: &Path, nickname: &str, addr: &str) -> Result<ClientProcess> {
    let mut cmd = Command::new(binary);
    cmd.arg("client")
        .arg("--nickname")
        .arg(nickname)
        .arg("--server")
        .arg(addr)
        .env("RUST_LOG", "warn")
        .env("NO_COLOR", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn client {nickname}"))?;

    let stdin = child
        .stdin
        .take()
        .context("client stdin missing after spawn")?;
    let stdout = child
        .stdout
        .take()
        .context("client stdout missing after spawn")?;

    let mut process = ClientProcess {
        nickname: nickname.to_string(),
        child,
        stdin,
        stdout: BufReader::new(stdout),
    };
    process.expect(&format!("*** connected as {nickname}")).await?;

    Ok(process)
}

async fn read_line(reader: &mut BufReader<ChildStdout>) -> Result<Option<String>> {
    let mut line = String::new();
    let read_future = reader.read_line(&mut line);
    let bytes_io = match timeout(READ_TIMEOUT, read_future).await {
        Ok(result) => result,
        Err(_) => return Err(anyhow!("timed out waiting for line")),
    };
    let byte_count = bytes_io?;
    if byte_count == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

async fn drain_stdout(mut reader: BufReader<ChildStdout>) {
    let mut buffer = String::new();
    while reader
        .read_line(&mut buffer)
        .await
        .map(|bytes| {
            let has_data = bytes > 0;
            if has_data {
                buffer.clear();
            }
            has_data
        })
        .unwrap_or(false)
    {}
}
