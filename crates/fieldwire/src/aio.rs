// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Async mirror of the codec drivers (feature `async`).
//!
//! Fields are encoded and decoded in memory. The reader does not wait for
//! the end of the stream: it decodes what it has buffered, and whenever the
//! decode runs off the end of the buffer it fetches exactly the missing
//! bytes and decodes again. Nothing past the last byte the decode touched
//! is taken from the stream, so several messages can follow each other on
//! one connection. Dropping the future cancels the I/O.

use crate::codec::{Decoded, Decoder, Encoder};
use crate::error::{Error, Result};
use crate::field::Field;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Encode `root` and write it (heap included) to `writer`.
pub async fn write_to<W>(writer: &mut W, root: &dyn Field, encoder: &Encoder<'_>) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encoder.encode(root)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    log::debug!("[aio] wrote {} bytes", bytes.len());
    Ok(bytes.len() as u64)
}

/// Read one message from `reader` and decode it into `root`.
///
/// The stream may stay open afterwards. Heap entries no pointer reaches are
/// never read, so they remain in the stream.
pub async fn read_from<R>(reader: &mut R, root: &mut dyn Field, decoder: &Decoder<'_>) -> Result<Decoded>
where
    R: AsyncRead + Unpin,
{
    let limit = decoder.config().max_stream_len;
    let mut bytes = Vec::new();
    loop {
        let err = match decoder.decode(root, &bytes) {
            Ok(decoded) => {
                log::debug!("[aio] read {} bytes", bytes.len());
                return Ok(decoded);
            }
            Err(err) => err,
        };
        let missing = match err.missing_bytes() {
            Some(missing) => missing.max(1),
            None => return Err(err),
        };

        let start = bytes.len();
        let wanted = (start as u64).saturating_add(missing);
        if wanted > limit {
            return Err(Error::structural(
                start as u64,
                format!("message needs {} bytes, stream limit is {}", wanted, limit),
            ));
        }
        let wanted = usize::try_from(wanted)
            .map_err(|_| Error::structural(start as u64, "message larger than memory"))?;
        bytes.resize(wanted, 0);
        if let Err(io) = reader.read_exact(&mut bytes[start..]).await {
            if io.kind() == std::io::ErrorKind::UnexpectedEof {
                log::debug!("[aio] stream ended after {} bytes", start);
                return Err(err);
            }
            return Err(io.into());
        }
    }
}
