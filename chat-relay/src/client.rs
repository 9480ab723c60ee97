//! Terminal front end for the relay protocol.
//!
//! The relay prompts for a name in plain text; after that every line in
//! either direction goes through the codec. Relay lines come from a reader
//! task and typed lines from a stdin thread, so the select loop only ever
//! races channel receives and never loses half a line.

use anyhow::{Context, Result, bail};
use tokio::{
    io::{self, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
    select,
    sync::mpsc,
};
use tracing::{info, warn};

use crate::{
    cli::ClientArgs,
    codec::{LineCodec, ObfuscationCodec},
    message::{forward_lines, write_encoded, write_line},
};

type RelayLines = mpsc::UnboundedReceiver<io::Result<String>>;

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Stop,
}

pub async fn run(args: ClientArgs) -> Result<()> {
    let codec = ObfuscationCodec::new(args.key.clone());
    let stream = TcpStream::connect(args.server)
        .await
        .with_context(|| format!("failed to connect to {}", args.server))?;
    info!(server = %args.server, "connected to relay");

    let (reader, mut writer) = stream.into_split();
    let mut relay_lines = forward_lines(BufReader::new(reader));
    join(&mut relay_lines, &mut writer, &args.nickname).await?;

    let mut typed = spawn_stdin_reader();
    let outcome = chat(&mut relay_lines, &mut typed, &mut writer, &codec).await;

    if let Err(error) = writer.shutdown().await {
        warn!(?error, "failed to shut down connection cleanly");
    }
    outcome
}

/// Waits for the name prompt and answers it verbatim.
async fn join<W>(relay_lines: &mut RelayLines, writer: &mut W, nickname: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(prompt) = relay_lines.recv().await else {
        bail!("relay closed the connection before prompting for a name");
    };
    prompt.context("failed to read name prompt")?;

    write_line(writer, nickname)
        .await
        .context("failed to send display name")?;
    print_line(&format!("*** connected as {nickname}")).await?;
    Ok(())
}

async fn chat<W>(
    relay_lines: &mut RelayLines,
    typed: &mut mpsc::UnboundedReceiver<String>,
    writer: &mut W,
    codec: &dyn LineCodec,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let step = select! {
            line = relay_lines.recv() => show_relay_line(line, codec).await?,
            line = typed.recv() => send_typed_line(line, writer, codec).await?,
            ctrl_c = tokio::signal::ctrl_c() => {
                if let Err(error) = ctrl_c {
                    warn!(?error, "ctrl-c handler failed");
                }
                Step::Stop
            }
        };
        if step == Step::Stop {
            return Ok(());
        }
    }
}

async fn show_relay_line(line: Option<io::Result<String>>, codec: &dyn LineCodec) -> Result<Step> {
    let Some(wire) = line else {
        print_line("*** relay closed the connection").await?;
        return Ok(Step::Stop);
    };
    let wire = wire.context("failed to read from relay")?;
    print_line(&codec.decode(&wire)).await?;
    Ok(Step::Continue)
}

async fn send_typed_line<W>(
    line: Option<String>,
    writer: &mut W,
    codec: &dyn LineCodec,
) -> Result<Step>
where
    W: AsyncWrite + Unpin,
{
    // Stdin closed.
    let Some(line) = line else {
        return Ok(Step::Stop);
    };
    if line.trim().is_empty() {
        return Ok(Step::Continue);
    }

    write_encoded(writer, codec, &line)
        .await
        .context("failed to send to relay")?;

    if line.eq_ignore_ascii_case("/quit") {
        print_line("*** leaving chat").await?;
        return Ok(Step::Stop);
    }
    Ok(Step::Continue)
}

/// Blocking stdin lives on its own OS thread so a pending read never holds
/// up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (lines, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        use std::io::BufRead;

        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if lines.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn print_line(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(format!("{line}\n").as_bytes()).await?;
    stdout.flush().await
}
