use std::io;

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};

use crate::codec::LineCodec;

/// Sent in plain text right after accept; the reply is the display name.
pub const NAME_PROMPT: &str = "Enter your nickname:";

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Reads one newline-delimited line with its terminator stripped.
///
/// Returns `Ok(None)` at end of stream. Invalid UTF-8 is replaced rather
/// than treated as an I/O error so a stray byte never ends a session.
pub async fn read_line<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let bytes = reader.read_until(b'\n', &mut buf).await?;
    if bytes == 0 {
        return Ok(None);
    }

    let line = String::from_utf8_lossy(&buf);
    Ok(Some(line.trim_end_matches(LINE_ENDINGS).to_string()))
}

pub async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = Vec::with_capacity(line.len() + 1);
    encoded.extend_from_slice(line.as_bytes());
    encoded.push(b'\n');
    // Single write per line, flushed so peers see it immediately.
    writer.write_all(&encoded).await?;
    writer.flush().await
}

pub async fn write_encoded<W>(
    writer: &mut W,
    codec: &dyn LineCodec,
    plain: &str,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_line(writer, &codec.encode(plain)).await
}

/// Reads lines on a dedicated task and hands them over a channel.
///
/// `read_line` is not cancel safe: racing it in `select!` can drop half a
/// line. Receiving from the returned channel is. The channel closes after
/// end of stream, or after forwarding the first I/O error.
pub fn forward_lines<R>(mut reader: R) -> mpsc::UnboundedReceiver<io::Result<String>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (lines, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            match read_line(&mut reader).await {
                Ok(Some(line)) => {
                    if lines.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    let _ = lines.send(Err(err));
                    break;
                }
            }
        }
    });
    rx
}
