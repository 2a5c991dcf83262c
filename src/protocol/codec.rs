//! Newline-delimited JSON framing
//!
//! Every connection speaks one JSON object per line. Reads go through a
//! `BufReader`; writes serialize, append the newline, and flush so a framed
//! message is never left sitting in a buffer across a suspension point.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::Result;

/// Read the next framed message.
///
/// Returns `Ok(None)` on clean EOF. A line that is not valid JSON for `T`
/// surfaces as `Error::Json`; the connection stays usable and the caller
/// decides whether to answer with an error envelope or skip the line.
pub async fn read_message<R, T>(reader: &mut BufReader<R>) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    let message = serde_json::from_str(line.trim())?;
    Ok(Some(message))
}

/// Serialize and send one framed message.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let line = encode_line(message)?;
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Serialize a message into a framed line.
///
/// Broadcast paths serialize once and hand the same `Bytes` to every
/// recipient; only the reference count is copied per write.
pub fn encode_line<T: Serialize>(message: &T) -> Result<Bytes> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}
