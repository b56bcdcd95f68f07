// src/exec/output.rs

//! Output multiplexing: one reader per child channel.
//!
//! Each reader decodes its channel into lines with [`LineCodec`] and forwards
//! every non-empty line through the shared [`EventWriter`], touching the
//! activity clock on the way. Readers run until their channel reaches EOF.

use std::io;
use std::sync::Arc;

use bytes::BytesMut;
use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};
use tracing::{debug, warn};

use crate::protocol::EventWriter;
use crate::types::Channel;
use crate::watch::ActivityClock;

#[derive(Debug, Error)]
pub enum LineError {
    #[error("line exceeds {max} bytes")]
    TooLong { max: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Splits a byte stream on `\n`.
///
/// Trailing `\r`/`\n` characters are stripped and invalid UTF-8 is replaced
/// rather than rejected. A line longer than `max_length` is an error: the
/// codec never hands out a truncated line and never resynchronizes silently.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Bytes of the buffer already scanned for a newline.
    next_index: usize,
}

impl LineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = LineError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LineError> {
        // A complete line may be at most max_length bytes plus its '\n'.
        let read_to = buf.len().min(self.max_length.saturating_add(1));

        let newline = buf[self.next_index..read_to]
            .iter()
            .position(|b| *b == b'\n');

        match newline {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let line = buf.split_to(end + 1);
                Ok(Some(decode_line(&line)))
            }
            None if buf.len() > self.max_length => Err(LineError::TooLong {
                max: self.max_length,
            }),
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LineError> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        // Final line without a terminator.
        self.next_index = 0;
        let line = buf.split_to(buf.len());
        Ok(Some(decode_line(&line)))
    }
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Read `reader` to the end, emitting one event per non-empty line.
///
/// An over-long line fails this reader: an `error` event is emitted and the
/// rest of the channel is drained without producing events, so the child
/// never blocks on a full pipe.
pub async fn pump_lines<R>(
    reader: R,
    channel: Channel,
    writer: EventWriter,
    clock: Arc<ActivityClock>,
    max_line_bytes: usize,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(reader, LineCodec::new(max_line_bytes));
    let mut emitted: u64 = 0;

    while let Some(item) = lines.next().await {
        match item {
            Ok(line) => {
                if line.is_empty() {
                    continue;
                }
                clock.touch();
                writer.line(channel, line);
                emitted += 1;
            }
            Err(LineError::TooLong { max }) => {
                warn!(%channel, max, "output line too long; failing reader");
                writer.error(format!(
                    "{channel} line exceeds {max} bytes; remaining {channel} output discarded"
                ));
                let mut rest = lines.into_inner();
                if let Err(err) = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await {
                    debug!(%channel, error = %err, "draining failed reader ended with error");
                }
                return;
            }
            Err(LineError::Io(err)) => {
                debug!(%channel, error = %err, "output channel closed with error");
                break;
            }
        }
    }

    debug!(%channel, lines = emitted, "output reader finished");
}
