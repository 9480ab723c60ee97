//! Lifecycle of one accepted connection.
//!
//! `Connecting -> Handshaking -> Active -> Closing -> Closed`. The handshake
//! prompts for a name and reads it verbatim. Once registered, the read loop
//! decodes each line, parses it and hands it to the router until the peer
//! hangs up, asks to quit, or the socket fails. A bare `QUIT` is recognised
//! before decoding since clients send it unencoded. Teardown runs exactly
//! once on every one of those paths.
//!
//! Outbound traffic never touches the socket directly: every sender queues
//! plaintext on the session's channel and a dedicated writer task encodes
//! and writes one line at a time, which keeps lines whole and per-sender
//! order intact.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufRead, AsyncWrite, BufReader},
    net::TcpStream,
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    codec::LineCodec,
    command::{Command, PLAIN_QUIT},
    message::{NAME_PROMPT, read_line, write_encoded, write_line},
    registry::SessionHandle,
    router::Router,
};

/// How long teardown lets the writer flush queued lines to a peer that may
/// have stopped reading.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Why the read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ended {
    PeerClosed,
    Quit,
}

pub async fn run(stream: TcpStream, router: Router, codec: Arc<dyn LineCodec>) -> Result<()> {
    let peer = stream.peer_addr().ok();
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let Some(name) = handshake(&mut reader, &mut writer).await? else {
        debug!(?peer, "connection closed before handshake");
        return Ok(());
    };

    let (outbound, inbox) = mpsc::unbounded_channel();
    let handle = SessionHandle::new(router.registry().next_id(), name, outbound);
    let writer_task = spawn_writer(writer, inbox, Arc::clone(&codec), handle.name().to_string());

    router.registry().register(handle.clone()).await;
    info!(?peer, id = handle.id(), name = handle.name(), "client joined");
    router.announce_join(&handle).await;

    let outcome = read_loop(&mut reader, &router, &handle, codec.as_ref()).await;
    teardown(&router, handle, writer_task, peer).await;
    drop(reader);

    match outcome {
        Ok(ended) => {
            debug!(?peer, ?ended, "session ended");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Sends the name prompt and reads the reply. `None` if the peer hung up first.
async fn handshake<R, W>(reader: &mut R, writer: &mut W) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    write_line(writer, NAME_PROMPT)
        .await
        .context("failed to send name prompt")?;
    read_line(reader).await.context("failed to read display name")
}

async fn read_loop<R>(
    reader: &mut R,
    router: &Router,
    handle: &SessionHandle,
    codec: &dyn LineCodec,
) -> Result<Ended>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let Some(wire) = read_line(reader)
            .await
            .context("failed to read from client")?
        else {
            return Ok(Ended::PeerClosed);
        };
        if wire == PLAIN_QUIT {
            return Ok(Ended::Quit);
        }

        match Command::parse(&codec.decode(&wire)) {
            Ok(Command::Quit) => return Ok(Ended::Quit),
            Ok(command) => {
                router.dispatch(handle, command).await;
            }
            Err(err) => debug!(name = handle.name(), %err, "ignoring malformed command"),
        }
    }
}

/// Unregisters, announces the departure and gives the writer a bounded
/// window to flush before the socket is released.
async fn teardown(
    router: &Router,
    handle: SessionHandle,
    mut writer_task: JoinHandle<()>,
    peer: Option<SocketAddr>,
) {
    router.registry().unregister(handle.id()).await;
    info!(?peer, id = handle.id(), name = handle.name(), "client disconnected");
    router.announce_leave(&handle).await;

    // The writer exits once every sender clone is gone.
    drop(handle);
    match timeout(WRITER_DRAIN_TIMEOUT, &mut writer_task).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(?peer, error = ?err, "session writer task failed"),
        Err(_) => {
            debug!(?peer, "peer not reading; dropping unsent lines");
            writer_task.abort();
        }
    }
}

fn spawn_writer<W>(
    mut writer: W,
    mut inbox: mpsc::UnboundedReceiver<String>,
    codec: Arc<dyn LineCodec>,
    name: String,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(line) = inbox.recv().await {
            if let Err(err) = write_encoded(&mut writer, codec.as_ref(), &line).await {
                debug!(%name, ?err, "failed to write to client");
                break;
            }
        }
        // Dropping the write half (and the read half in `run`) closes the socket.
    })
}
