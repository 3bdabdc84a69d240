//! Newline-delimited framing.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame accepted by default (64 MiB of JSON).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Reads one frame, without its line terminator.
///
/// Returns `Ok(None)` on a clean end of stream.
///
/// # Errors
///
/// Returns `InvalidData` if the frame exceeds `max_size` bytes and
/// `UnexpectedEof` if the stream ends mid-frame.
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = max_size as u64 + 1;
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Ok(None);
    }

    if buf.last() != Some(&b'\n') {
        if buf.len() > max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame exceeds {max_size} bytes"),
            ));
        }
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream closed mid-frame",
        ));
    }

    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(Some(buf))
}

/// Writes one frame followed by a newline and flushes.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(payload).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
