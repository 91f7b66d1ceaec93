//! Shared plumbing for turning a response body into text fragments
//!
//! Network reads split the body at arbitrary byte offsets, including inside a
//! line, a JSON object or a multi-byte UTF-8 sequence. Decoders therefore
//! buffer raw bytes and only interpret complete units.

use bytes::Bytes;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::http_client::ByteStream;
use crate::domain::{DomainError, FragmentStream};

/// One decoded unit of a provider response
#[derive(Debug)]
pub(crate) enum Frame {
    Text(String),
    /// Explicit end-of-stream marker; nothing after it is read
    Done,
    /// Error reported by the backend inside the stream
    Failed(DomainError),
}

/// Incremental decoder for one wire protocol
pub(crate) trait FrameDecoder: Send + 'static {
    /// Consume the next chunk of the body
    fn decode(&mut self, chunk: &[u8]) -> Vec<Frame>;

    /// Called once at end of body to drain any unterminated tail
    fn finish(&mut self) -> Vec<Frame>;

    /// Units that were dropped because they could not be parsed
    fn skipped(&self) -> usize;
}

/// Splits a byte stream into `\n`-terminated lines
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Complete lines found after appending `chunk`, without terminators
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(Self::to_text(&line[..line.len() - 1]));
        }

        lines
    }

    /// Unterminated remainder, if any
    pub fn take_rest(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }

        let rest = std::mem::take(&mut self.pending);
        Some(Self::to_text(&rest))
    }

    fn to_text(line: &[u8]) -> String {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        String::from_utf8_lossy(line).into_owned()
    }
}

/// Payload of an SSE `data:` line, trimmed
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

async fn next_chunk(
    body: &mut ByteStream,
    cancellation: Option<&CancellationToken>,
) -> Result<Option<Bytes>, DomainError> {
    let next = match cancellation {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => return Err(DomainError::Cancelled),
            next = body.next() => next,
        },
        None => body.next().await,
    };

    next.transpose()
}

/// Drive `decoder` over `body`, yielding non-empty text fragments in order
pub(crate) fn fragment_stream<D: FrameDecoder>(
    provider: &'static str,
    body: ByteStream,
    decoder: D,
    cancellation: Option<CancellationToken>,
) -> FragmentStream {
    Box::pin(async_stream::try_stream! {
        let mut body = body;
        let mut decoder = decoder;
        let mut done = false;
        let mut fragments = 0usize;

        while !done {
            let Some(chunk) = next_chunk(&mut body, cancellation.as_ref()).await? else {
                break;
            };

            for frame in decoder.decode(&chunk) {
                match frame {
                    Frame::Text(text) if text.is_empty() => {}
                    Frame::Text(text) => {
                        fragments += 1;
                        yield text;
                    }
                    Frame::Done => {
                        done = true;
                        break;
                    }
                    Frame::Failed(err) => Err::<(), DomainError>(err)?,
                }
            }
        }

        if !done {
            for frame in decoder.finish() {
                match frame {
                    Frame::Text(text) if text.is_empty() => {}
                    Frame::Text(text) => {
                        fragments += 1;
                        yield text;
                    }
                    Frame::Done => break,
                    Frame::Failed(err) => Err::<(), DomainError>(err)?,
                }
            }
        }

        let skipped = decoder.skipped();
        if skipped > 0 {
            warn!(provider, skipped, fragments, "Skipped unparseable stream units");
        } else {
            debug!(provider, fragments, "Stream finished");
        }
    })
}
